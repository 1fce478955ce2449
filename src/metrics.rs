//! Start/success/fail timing around named operations.
//!
//! ```ignore
//! let metric = report_metric("register /api/books/*");
//! match register() {
//!     Ok(_) => metric.success(),
//!     Err(_) => metric.fail(),
//! }
//! ```

use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use tracing::{info, warn};

static PROCESS_START: Lazy<Instant> = Lazy::new(Instant::now);

/// Pins the process start time. Call early in `main`.
pub fn init() {
    Lazy::force(&PROCESS_START);
}

pub fn since_process_start() -> Duration {
    PROCESS_START.elapsed()
}

/// Timer for one operation. Finish it with exactly one of [`MetricHandle::success`]
/// or [`MetricHandle::fail`].
#[must_use = "finish the metric with success() or fail()"]
pub struct MetricHandle {
    name: String,
    started: Instant,
    finished: bool,
}

pub fn report_metric(name: impl Into<String>) -> MetricHandle {
    let name = name.into();
    info!(metric = %name, "started");
    MetricHandle {
        name,
        started: Instant::now(),
        finished: false,
    }
}

impl MetricHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn success(mut self) -> Duration {
        self.finished = true;
        let elapsed = self.elapsed();
        info!(
            metric = %self.name,
            elapsed_ms = elapsed.as_millis() as u64,
            since_start_ms = since_process_start().as_millis() as u64,
            "completed"
        );
        elapsed
    }

    pub fn fail(mut self) -> Duration {
        self.finished = true;
        let elapsed = self.elapsed();
        warn!(
            metric = %self.name,
            elapsed_ms = elapsed.as_millis() as u64,
            since_start_ms = since_process_start().as_millis() as u64,
            "failed"
        );
        elapsed
    }
}

impl Drop for MetricHandle {
    fn drop(&mut self) {
        if !self.finished {
            warn!(metric = %self.name, "metric dropped without an outcome");
        }
    }
}
