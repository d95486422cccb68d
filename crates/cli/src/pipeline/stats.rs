//! Capture run statistics.

use std::time::Duration;

use observability::CaptureStatsAggregator;
use session::LoopStats;
use sync_engine::{ListenerStats, SyncStats};

/// Statistics from a capture run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Frames delivered to the consumer
    pub frames_captured: u64,

    /// Waits that timed out and were retried
    pub timeouts: u64,

    /// Frames remapped into the legacy canvas
    pub frames_remapped: u64,

    /// Wall time of the capture loop
    pub duration: Duration,

    /// Synchronizer counters at stop
    pub sync: SyncStats,

    /// Listener counters at stop
    pub listener: ListenerStats,

    /// Per-frame aggregation
    pub capture_metrics: CaptureStatsAggregator,
}

impl RunStats {
    pub fn apply_loop(&mut self, stats: &LoopStats) {
        self.frames_captured = stats.frames;
        self.timeouts = stats.timeouts;
        self.duration = stats.elapsed;
    }

    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.frames_captured as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Timeouts as a percentage of all capture attempts
    pub fn timeout_rate(&self) -> f64 {
        let total = self.frames_captured + self.timeouts;
        if total > 0 {
            (self.timeouts as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n=== Capture Statistics ===\n");

        println!("Overview");
        println!("  Duration: {:.2}s", self.duration.as_secs_f64());
        println!("  Frames captured: {}", self.frames_captured);
        println!("  FPS: {:.2}", self.fps());
        println!(
            "  Timeouts: {} ({:.2}%)",
            self.timeouts,
            self.timeout_rate()
        );
        if self.frames_remapped > 0 {
            println!("  Legacy remaps: {}", self.frames_remapped);
        }

        println!("\nSynchronizer");
        println!("  Bundles captured: {}", self.sync.bundles_captured);
        println!("  Failed cycles: {}", self.sync.failed_cycles);
        println!("  Timestamp regressions: {}", self.sync.timestamp_regressions);

        println!("\nListener");
        println!("  Frames received: {}", self.listener.frames_received);
        println!("  Frames superseded: {}", self.listener.frames_superseded);
        println!("  Bundles published: {}", self.listener.bundles_published);
        println!("  Bundles dropped: {}", self.listener.bundles_dropped);

        println!("\n{}", self.capture_metrics.summary(self.duration));
    }
}
