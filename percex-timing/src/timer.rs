use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use time::OffsetDateTime;

/// Trait for session timers
pub trait Timer: Clone + Send + Sync {
    /// Monotonic nanoseconds since the timer was created
    fn now(&self) -> u64;
    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }
    /// Wall-clock time for record timestamps
    fn wall_clock(&self) -> OffsetDateTime;
    fn record_frame(&mut self, d: Duration);
    fn frame_stats(&self) -> FrameStats;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub samples: usize,
    pub average_frame_time_ns: f64,
    pub jitter_ns: f64,
    pub min_frame_time_ns: f64,
    pub max_frame_time_ns: f64,
    pub effective_fps: f64,
}

impl FrameStats {
    pub fn from_samples(frame_times: &[Duration]) -> Self {
        let times: Vec<f64> = frame_times.iter().map(|d| d.as_nanos() as f64).collect();
        if times.is_empty() {
            return FrameStats::default();
        }
        let avg = times.iter().sum::<f64>() / times.len() as f64;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / times.len() as f64;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        FrameStats {
            samples: times.len(),
            average_frame_time_ns: avg,
            jitter_ns: var.sqrt(),
            min_frame_time_ns: min,
            max_frame_time_ns: max,
            effective_fps: if avg > 0.0 { 1e9 / avg } else { 0.0 },
        }
    }
}

/// Monotonic timer backed by `Instant`, with a bounded frame-time history
#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    pub start: Instant,
    pub frame_times: Vec<Duration>,
    pub max_samples: usize,
}

impl Timer for HighPrecisionTimer {
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }

    fn wall_clock(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn record_frame(&mut self, d: Duration) {
        if self.frame_times.len() >= self.max_samples {
            self.frame_times.remove(0);
        }
        self.frame_times.push(d);
    }

    fn frame_stats(&self) -> FrameStats {
        FrameStats::from_samples(&self.frame_times)
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            frame_times: Vec::with_capacity(1000),
            max_samples: 1000,
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer that only moves when told to.
///
/// Clones share the same clock, so a handle kept outside a session can advance
/// the copy the session owns.
#[derive(Debug, Clone)]
pub struct ManualTimer {
    nanos: Arc<AtomicU64>,
    epoch: OffsetDateTime,
    frame_times: Vec<Duration>,
}

impl ManualTimer {
    pub fn new(epoch: OffsetDateTime) -> Self {
        Self {
            nanos: Arc::new(AtomicU64::new(0)),
            epoch,
            frame_times: Vec::new(),
        }
    }

    pub fn advance(&self, d: Duration) {
        self.nanos.fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Timer for ManualTimer {
    fn now(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }

    fn wall_clock(&self) -> OffsetDateTime {
        self.epoch + Duration::from_nanos(self.now())
    }

    fn record_frame(&mut self, d: Duration) {
        self.frame_times.push(d);
    }

    fn frame_stats(&self) -> FrameStats {
        FrameStats::from_samples(&self.frame_times)
    }
}
