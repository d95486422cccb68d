//! Capture metrics
//!
//! Session-level gauges and histograms on top of the counters the
//! synchronizer already emits, plus an in-memory aggregator for the summary
//! printed at the end of a run.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use contracts::{StreamKind, Timestamps};
use metrics::{counter, gauge, histogram};

/// Device ticks per millisecond (timestamps count 0.1 ms ticks)
const TICKS_PER_MS: f64 = 10.0;

/// Record one delivered frame.
///
/// Call once per successful capture, after the buffers were refreshed.
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_frame_metrics;
///
/// let report = session.capture_frame()?;
/// record_frame_metrics(report.bundle_id, &report.timestamps, report.latency);
/// ```
pub fn record_frame_metrics(bundle_id: u64, timestamps: &Timestamps, latency: Duration) {
    counter!("kinect_sync_frames_total").increment(1);
    gauge!("kinect_sync_last_bundle_id").set(bundle_id as f64);
    histogram!("kinect_sync_frame_latency_ms").record(latency.as_secs_f64() * 1000.0);

    for kind in StreamKind::ALL {
        gauge!("kinect_sync_stream_timestamp", "stream" => kind.as_str())
            .set(timestamps.get(kind) as f64);
    }
}

/// Record a capture that ran out of time
pub fn record_capture_timeout(missing: &[StreamKind]) {
    counter!("kinect_sync_capture_timeouts_total").increment(1);
    for kind in missing {
        counter!("kinect_sync_stream_missing_total", "stream" => kind.as_str()).increment(1);
    }
}

/// Record bundles the listener replaced before they were consumed
pub fn record_dropped_bundles(total: u64) {
    gauge!("kinect_sync_bundles_dropped").set(total as f64);
}

/// Record the capture loop rate
pub fn record_loop_fps(fps: f64) {
    gauge!("kinect_sync_loop_fps").set(fps);
}

/// Record a session state transition
pub fn record_state_transition(state: &str) {
    counter!("kinect_sync_state_transitions_total", "state" => state.to_string()).increment(1);
}

/// Capture statistics aggregator
///
/// Aggregates in memory so the CLI can print a summary without an exporter.
#[derive(Debug, Clone, Default)]
pub struct CaptureStatsAggregator {
    /// Delivered frames
    pub total_frames: u64,

    /// Waits that timed out
    pub timeouts: u64,

    /// Bundles replaced before consumption, as last reported by the listener
    pub dropped_bundles: u64,

    /// Frames whose timestamp went backwards on some stream
    pub regressions: u64,

    /// Capture latency (ms)
    pub latency_stats: RunningStats,

    /// Inter-frame interval per stream (ms)
    pub interval_stats: BTreeMap<StreamKind, RunningStats>,

    /// Times a stream was missing at timeout
    pub missing_counts: BTreeMap<StreamKind, u64>,

    last: Option<Timestamps>,
}

impl CaptureStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one delivered frame into the statistics
    pub fn record_frame(&mut self, timestamps: &Timestamps, latency: Duration) {
        self.total_frames += 1;
        self.latency_stats.push(latency.as_secs_f64() * 1000.0);

        if let Some(previous) = self.last {
            if !timestamps.not_before(&previous) {
                self.regressions += 1;
            }
            for kind in StreamKind::ALL {
                let (now, then) = (timestamps.get(kind), previous.get(kind));
                if now >= then {
                    self.interval_stats
                        .entry(kind)
                        .or_default()
                        .push((now - then) as f64 / TICKS_PER_MS);
                }
            }
        }
        self.last = Some(*timestamps);
    }

    pub fn record_timeout(&mut self, missing: &[StreamKind]) {
        self.timeouts += 1;
        for kind in missing {
            *self.missing_counts.entry(*kind).or_insert(0) += 1;
        }
    }

    pub fn set_dropped_bundles(&mut self, total: u64) {
        self.dropped_bundles = total;
    }

    pub fn summary(&self, elapsed: Duration) -> CaptureSummary {
        let secs = elapsed.as_secs_f64();
        let attempts = self.total_frames + self.timeouts;
        CaptureSummary {
            total_frames: self.total_frames,
            timeouts: self.timeouts,
            dropped_bundles: self.dropped_bundles,
            regressions: self.regressions,
            fps: if secs > 0.0 {
                self.total_frames as f64 / secs
            } else {
                0.0
            },
            timeout_rate: if attempts > 0 {
                self.timeouts as f64 / attempts as f64 * 100.0
            } else {
                0.0
            },
            latency_ms: StatsSummary::from(&self.latency_stats),
            interval_ms: self
                .interval_stats
                .iter()
                .map(|(kind, stats)| (*kind, StatsSummary::from(stats)))
                .collect(),
            missing_counts: self.missing_counts.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Capture summary
#[derive(Debug, Clone, Default)]
pub struct CaptureSummary {
    pub total_frames: u64,
    pub timeouts: u64,
    pub dropped_bundles: u64,
    pub regressions: u64,
    pub fps: f64,
    pub timeout_rate: f64,
    pub latency_ms: StatsSummary,
    pub interval_ms: BTreeMap<StreamKind, StatsSummary>,
    pub missing_counts: BTreeMap<StreamKind, u64>,
}

impl fmt::Display for CaptureSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Capture Summary ===")?;
        writeln!(f, "Frames: {} ({:.1} fps)", self.total_frames, self.fps)?;
        writeln!(f, "Timeouts: {} ({:.2}%)", self.timeouts, self.timeout_rate)?;
        writeln!(f, "Dropped bundles: {}", self.dropped_bundles)?;
        writeln!(f, "Timestamp regressions: {}", self.regressions)?;
        writeln!(f, "Capture latency (ms): {}", self.latency_ms)?;

        for (kind, stats) in &self.interval_ms {
            writeln!(f, "{} interval (ms): {}", kind.as_str(), stats)?;
        }
        if !self.missing_counts.is_empty() {
            writeln!(f, "Missing at timeout:")?;
            for (kind, count) in &self.missing_counts {
                writeln!(f, "  {}: {}", kind.as_str(), count)?;
            }
        }
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
