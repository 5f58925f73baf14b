//! Builds and owns one benchmark run: the barrier, the shards and their
//! worker threads.

use crate::barrier::TickBarrier;
use crate::command::Command;
use crate::config::ServerConfig;
use crate::shard::WorldShard;
use crate::worker::{WorkerLoop, WorkerReport};
use crate::world::WorldMap;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("shard {shard_id} worker panicked")]
pub struct WorkerPanicked {
    pub shard_id: usize,
}

/// The run context: everything one benchmark run shares, constructed once
/// and owned here. Worker threads receive their state by move; the only
/// pieces handed out as `Arc`s are the barrier, the stop flag and the
/// read-only world map.
pub struct Coordinator {
    stop: Arc<AtomicBool>,
    barrier: Arc<TickBarrier>,
    handles: Vec<JoinHandle<WorkerReport>>,
}

impl Coordinator {
    /// Generates the world, builds one shard + command channel + worker
    /// per configured thread and starts them all. Returns the coordinator
    /// and the per-shard command senders for the transport router.
    pub fn launch(config: &ServerConfig) -> std::io::Result<(Self, Vec<Sender<Command>>)> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let map = Arc::new(WorldMap::generate(config, &mut rng));
        let barrier = Arc::new(TickBarrier::new(config.num_threads));
        let stop = Arc::new(AtomicBool::new(false));

        let mut senders = Vec::with_capacity(config.num_threads);
        let mut handles = Vec::with_capacity(config.num_threads);
        for shard_id in 0..config.num_threads {
            let (sender, receiver) = mpsc::channel();
            senders.push(sender);

            let shard = WorldShard::new(
                shard_id,
                Arc::clone(&map),
                config.quest_between_ms,
                config.seed,
            );
            let worker = WorkerLoop::new(
                shard,
                receiver,
                Arc::clone(&barrier),
                Arc::clone(&stop),
                config.metrics_window,
            );
            let handle = std::thread::Builder::new()
                .name(format!("shard-{shard_id}"))
                .spawn(move || worker.run())?;
            handles.push(handle);
        }

        info!("Launched {} shard workers", config.num_threads);
        Ok((
            Self {
                stop,
                barrier,
                handles,
            },
            senders,
        ))
    }

    /// Asks every worker to halt after its current tick. The workers
    /// settle the exact stopping tick among themselves at the barrier.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// How many lockstep ticks the barrier has completed.
    pub fn tick_cycles(&self) -> u64 {
        self.barrier.cycles()
    }

    /// Joins every worker and collects their reports, ordered by shard.
    /// A worker that panicked is a run-ending failure, not a partial
    /// result.
    pub fn finish(self) -> Result<Vec<WorkerReport>, WorkerPanicked> {
        let mut reports = Vec::with_capacity(self.handles.len());
        for (shard_id, handle) in self.handles.into_iter().enumerate() {
            match handle.join() {
                Ok(report) => reports.push(report),
                Err(_) => return Err(WorkerPanicked { shard_id }),
            }
        }
        reports.sort_by_key(|report| report.shard_id);
        Ok(reports)
    }
}
