//! Per-tick instrumentation: the generic moving-average tracker and the
//! end-of-run export.

use crate::config::ServerConfig;
use crate::worker::WorkerReport;
use chrono::Utc;
use log::info;
use num_traits::{Num, NumCast};
use std::collections::VecDeque;
use std::fmt::Display;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Trailing moving average over the last `window_size` samples.
///
/// One sample in, one output out: every `add_sample` call appends exactly
/// one element to the output sequence, so outputs line up with tick
/// indices across trackers. Until the window has filled, the output is a
/// `0` placeholder rather than a mean over partial data. A window size of
/// zero or less turns the tracker into a raw recorder that passes samples
/// through unmodified.
///
/// Integer instantiations truncate the windowed division, floating-point
/// ones divide exactly; both come from the same definition.
pub struct SampleTracker<T> {
    window_size: i64,
    name: String,
    divisor: T,
    window: VecDeque<T>,
    window_sum: T,
    averages: Vec<T>,
}

impl<T: Num + NumCast + Copy> SampleTracker<T> {
    pub fn new(window_size: i64, name: impl Into<String>) -> Self {
        Self {
            window_size,
            name: name.into(),
            divisor: <T as NumCast>::from(window_size.max(1)).unwrap_or_else(T::one),
            window: VecDeque::new(),
            window_sum: T::zero(),
            averages: Vec::new(),
        }
    }

    pub fn add_sample(&mut self, sample: T) {
        if self.window_size <= 0 {
            self.averages.push(sample);
            return;
        }

        self.window.push_back(sample);
        let current_size = self.window.len();
        let window_size = self.window_size as usize;

        if current_size < window_size {
            // Not enough data for a trailing mean yet.
            self.averages.push(T::zero());
        } else if current_size == window_size {
            self.window_sum = self
                .window
                .iter()
                .fold(T::zero(), |sum, &sample| sum + sample);
            self.averages.push(self.window_sum / self.divisor);
        } else if let Some(oldest) = self.window.pop_front() {
            self.window_sum = self.window_sum - oldest + sample;
            self.averages.push(self.window_sum / self.divisor);
        }
    }

    /// Every output produced so far, in sample order.
    pub fn averages(&self) -> &[T] {
        &self.averages
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The four series recorded by every worker, one sample per series per
/// tick: how many commands the drain produced and how long it took, and
/// the same pair for the world advance.
pub struct TickMetrics {
    pub requests_count: SampleTracker<i64>,
    pub requests_time: SampleTracker<f64>,
    pub updates_count: SampleTracker<i64>,
    pub updates_time: SampleTracker<f64>,
}

impl TickMetrics {
    pub fn new(window_size: i64) -> Self {
        Self {
            requests_count: SampleTracker::new(window_size, "requests_count"),
            requests_time: SampleTracker::new(window_size, "requests_time"),
            updates_count: SampleTracker::new(window_size, "updates_count"),
            updates_time: SampleTracker::new(window_size, "updates_time"),
        }
    }

    pub fn csv_header(&self) -> String {
        [
            self.requests_count.name(),
            self.requests_time.name(),
            self.updates_count.name(),
            self.updates_time.name(),
        ]
        .join(",")
    }

    /// One comma-delimited row per tick index; a series that stopped early
    /// leaves its trailing cells blank.
    pub fn csv_rows(&self) -> Vec<String> {
        let rows = self
            .requests_count
            .averages()
            .len()
            .max(self.requests_time.averages().len())
            .max(self.updates_count.averages().len())
            .max(self.updates_time.averages().len());

        (0..rows)
            .map(|tick| {
                format!(
                    "{},{},{},{}",
                    cell(&self.requests_count, tick),
                    cell(&self.requests_time, tick),
                    cell(&self.updates_count, tick),
                    cell(&self.updates_time, tick),
                )
            })
            .collect()
    }
}

fn cell<T: Display + Copy + Num + NumCast>(tracker: &SampleTracker<T>, tick: usize) -> String {
    tracker
        .averages()
        .get(tick)
        .map(|value| value.to_string())
        .unwrap_or_default()
}

/// Writes one directory per run under `metrics/`, stamped with the UTC
/// start-of-export time: a `label.txt` describing the run and one CSV of
/// tracker outputs per shard.
pub fn export_run(config: &ServerConfig, reports: &[WorkerReport]) -> std::io::Result<PathBuf> {
    let stamp = Utc::now().format("UTC_%Y-%m-%d-%H_%M_%S");
    let dir = PathBuf::from("metrics").join(stamp.to_string());
    fs::create_dir_all(&dir)?;

    let total_players: usize = reports.iter().map(|report| report.player_ids.len()).sum();
    fs::write(
        dir.join("label.txt"),
        format!(
            "{},{},{}",
            config.algorithm_name,
            config.quest_setting(),
            total_players
        ),
    )?;

    for report in reports {
        let mut file = fs::File::create(dir.join(format!("{}.csv", report.shard_id)))?;
        writeln!(file, "{}", report.metrics.csv_header())?;
        for row in report.metrics.csv_rows() {
            writeln!(file, "{}", row)?;
        }
    }

    info!(
        "Exported metrics for {} shards ({} players) to {}",
        reports.len(),
        total_players,
        dir.display()
    );
    Ok(dir)
}
