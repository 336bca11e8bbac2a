use std::time::{Duration, Instant};

/// Wall-clock timer for a single named operation.
pub struct Telemetry {
    label: &'static str,
    start: Instant,
}

impl Telemetry {
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Log the elapsed time and return it.
    pub fn finish(self) -> Duration {
        let elapsed = self.start.elapsed();
        tracing::debug!(label = self.label, ?elapsed, "operation finished");
        elapsed
    }
}
