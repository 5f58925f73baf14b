//! # MMO Server Benchmark
//!
//! A research harness for measuring massively-multiplayer game server
//! architectures. The server partitions the connected player population
//! into a fixed number of shards, runs one dedicated worker thread per
//! shard, and drives every worker through synchronized simulation ticks
//! while sampling per-thread throughput and latency.
//!
//! ## Core Design
//!
//! ### Sharded Ownership
//! Every connected player belongs to exactly one shard, and every shard is
//! mutated by exactly one thread. There are no locks on the hot path:
//! player state, shard state and tracker state are all thread-exclusive,
//! and anything that needs to cross a shard boundary travels as a typed
//! command through that shard's queue.
//!
//! ### Tick Lockstep
//! Each tick a worker drains its command queue without blocking, applies
//! the commands in arrival order, advances its slice of the world, then
//! meets every sibling worker at a shared barrier. The barrier keeps the
//! shards in strict tick lockstep, which is what makes timing samples
//! taken on different threads comparable on the same tick axis.
//!
//! ### Instrumentation
//! Four trackers per shard record how many commands each drain produced,
//! how long the drain took, and the same pair for the world advance.
//! Trackers either record raw samples or report a trailing moving average,
//! and their sequences are exported as per-shard CSV files when the run
//! stops.
//!
//! ## Failure Model
//!
//! A command the shard refuses (duplicate join, unknown player, bad
//! direction code) is dropped with a diagnostic and the tick carries on.
//! Anything worse is deliberately fatal to the whole process: a benchmark
//! that degrades partially produces numbers that lie, so it stops instead.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::coordinator::Coordinator;
//! use server::network::{self, ShardRouter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::load("config.json".as_ref())?;
//!
//!     // One worker thread per shard, all gated by a shared barrier.
//!     let (coordinator, senders) = Coordinator::launch(&config)?;
//!
//!     // The transport decodes datagrams into commands and routes each
//!     // one to the queue of the shard that owns the player.
//!     let router = ShardRouter::new(senders, config.max_players);
//!     let socket = network::bind(8080).await?;
//!     tokio::spawn(network::run(socket, router));
//!
//!     // ... until the operator stops the run:
//!     coordinator.request_stop();
//!     let reports = coordinator.finish()?;
//!     server::metrics::export_run(&config, &reports)?;
//!     Ok(())
//! }
//! ```

pub mod barrier;
pub mod command;
pub mod config;
pub mod coordinator;
pub mod metrics;
pub mod network;
pub mod shard;
pub mod worker;
pub mod world;
