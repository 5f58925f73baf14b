//! The per-shard simulation loop: drain, apply, advance, rendezvous.

use crate::barrier::TickBarrier;
use crate::command::Command;
use crate::metrics::TickMetrics;
use crate::shard::WorldShard;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Instant;

/// Ticks between periodic debug summaries.
const TICK_LOG_INTERVAL: u64 = 1000;
/// Caps the simulation step after a stall so one long tick cannot fling
/// players across the map.
const MAX_TICK_DELTA: f32 = 1.0 / 20.0;
/// Smoothing factor for the two event-interval averages.
const INTERVAL_SMOOTHING: f64 = 0.1;

/// Drives one shard through the fixed tick cycle on its own thread:
/// drain the command queue, apply the commands in arrival order, advance
/// the world, then rendezvous with the sibling workers at the barrier.
///
/// The barrier is the only cross-thread contact in the steady state; the
/// shard, the queue consumer side and all four trackers are owned by this
/// loop alone.
pub struct WorkerLoop {
    shard: WorldShard,
    inbox: Receiver<Command>,
    barrier: Arc<TickBarrier>,
    stop: Arc<AtomicBool>,
    metrics: TickMetrics,
    tick: u64,
    last_advance: Instant,
    pending: Vec<Command>,
    avg_world_interval_ms: f64,
    avg_regular_interval_ms: f64,
    last_world_event: Instant,
    last_regular_event: Instant,
}

/// Everything a worker hands back when its thread finishes: the tracker
/// sequences for export plus the shard's final population.
pub struct WorkerReport {
    pub shard_id: usize,
    pub ticks: u64,
    pub player_ids: Vec<u32>,
    pub metrics: TickMetrics,
    pub avg_world_interval_ms: f64,
    pub avg_regular_interval_ms: f64,
}

impl WorkerLoop {
    pub fn new(
        shard: WorldShard,
        inbox: Receiver<Command>,
        barrier: Arc<TickBarrier>,
        stop: Arc<AtomicBool>,
        metrics_window: i64,
    ) -> Self {
        let now = Instant::now();
        Self {
            shard,
            inbox,
            barrier,
            stop,
            metrics: TickMetrics::new(metrics_window),
            tick: 0,
            last_advance: now,
            pending: Vec::new(),
            avg_world_interval_ms: 0.0,
            avg_regular_interval_ms: 0.0,
            last_world_event: now,
            last_regular_event: now,
        }
    }

    /// Runs ticks until the barrier agrees on a halt, then reports.
    ///
    /// The stop flag is sampled once per tick and fed into the barrier
    /// vote, so every shard observes the same halt decision on the same
    /// tick; nobody is left waiting for a sibling that already returned.
    pub fn run(mut self) -> WorkerReport {
        info!("shard {}: worker running", self.shard.shard_id());
        loop {
            let halt_requested = self.stop.load(Ordering::Relaxed);
            if self.tick(halt_requested) {
                break;
            }
        }
        info!(
            "shard {}: halted after {} ticks with {} players \
             (world interval {:.1}ms, regular interval {:.1}ms)",
            self.shard.shard_id(),
            self.tick,
            self.shard.player_count(),
            self.avg_world_interval_ms,
            self.avg_regular_interval_ms
        );
        WorkerReport {
            shard_id: self.shard.shard_id(),
            ticks: self.tick,
            player_ids: self.shard.player_ids(),
            metrics: self.metrics,
            avg_world_interval_ms: self.avg_world_interval_ms,
            avg_regular_interval_ms: self.avg_regular_interval_ms,
        }
    }

    /// One full tick. Returns true when the barrier parties agreed to
    /// halt, which is the only way the cycle ends.
    pub fn tick(&mut self, halt_vote: bool) -> bool {
        // DRAIN_COMMANDS: take whatever is queued right now; an empty
        // queue means a zero-command tick, never a stall.
        let drain_start = Instant::now();
        while let Ok(command) = self.inbox.try_recv() {
            self.pending.push(command);
        }
        self.metrics
            .requests_count
            .add_sample(self.pending.len() as i64);
        self.metrics
            .requests_time
            .add_sample(drain_start.elapsed().as_secs_f64() * 1000.0);

        // APPLY_COMMANDS, in arrival order.
        let mut pending = std::mem::take(&mut self.pending);
        for command in pending.drain(..) {
            self.apply(command);
        }
        self.pending = pending;

        // ADVANCE_WORLD.
        let advance_start = Instant::now();
        let dt = advance_start
            .duration_since(self.last_advance)
            .as_secs_f32()
            .min(MAX_TICK_DELTA);
        self.last_advance = advance_start;
        self.shard.advance(dt);
        self.metrics.updates_count.add_sample(1);
        self.metrics
            .updates_time
            .add_sample(advance_start.elapsed().as_secs_f64() * 1000.0);

        self.tick += 1;
        if self.tick % TICK_LOG_INTERVAL == 0 {
            debug!(
                "shard {}: tick {}, {} players",
                self.shard.shard_id(),
                self.tick,
                self.shard.player_count()
            );
        }

        // BARRIER_WAIT closes the tick; the trackers were already fed, so
        // the release doubles as the record-metrics boundary.
        self.barrier.wait_vote(halt_vote)
    }

    fn apply(&mut self, command: Command) {
        let result = match command {
            Command::Join { id, addr } => {
                self.note_world_event();
                self.shard.apply_join(id, addr)
            }
            Command::Leave { id } => {
                self.note_world_event();
                self.shard.apply_leave(id).map(|_| ())
            }
            Command::Move { id, direction } => {
                self.note_regular_event();
                self.shard.apply_move(id, direction)
            }
        };
        if let Err(cause) = result {
            // Rejected commands are dropped; the tick carries on.
            warn!(
                "shard {}: dropped command: {}",
                self.shard.shard_id(),
                cause
            );
        }
    }

    fn note_world_event(&mut self) {
        let now = Instant::now();
        let interval_ms = now.duration_since(self.last_world_event).as_secs_f64() * 1000.0;
        self.last_world_event = now;
        self.avg_world_interval_ms = smooth(self.avg_world_interval_ms, interval_ms);
    }

    fn note_regular_event(&mut self) {
        let now = Instant::now();
        let interval_ms = now.duration_since(self.last_regular_event).as_secs_f64() * 1000.0;
        self.last_regular_event = now;
        self.avg_regular_interval_ms = smooth(self.avg_regular_interval_ms, interval_ms);
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn shard(&self) -> &WorldShard {
        &self.shard
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }
}

fn smooth(current: f64, sample: f64) -> f64 {
    if current == 0.0 {
        sample
    } else {
        current * (1.0 - INTERVAL_SMOOTHING) + sample * INTERVAL_SMOOTHING
    }
}
