//! Spacing sends out on a fixed cadence.
//!
//! Every row has a target offset from a single reference instant, so latency
//! in one send shortens the following sleep instead of pushing back every
//! later row. A send that is already late goes out immediately; lost time is
//! never made up by sending faster than the cadence afterwards.

use std::time::Duration;

use tokio::time::{sleep, Instant};

/// How long to sleep before sending row `index`, given the time already
/// elapsed since the reference instant.
pub fn delay_for(index: usize, pace: Duration, elapsed: Duration) -> Duration {
    let target = Duration::try_from_secs_f64(pace.as_secs_f64() * index as f64)
        .unwrap_or(Duration::MAX);
    target.saturating_sub(elapsed)
}

pub struct Pacer {
    start: Instant,
    pace: Duration,
}

impl Pacer {
    /// Capture the reference instant now.
    pub fn start(pace: Duration) -> Self {
        Self {
            start: Instant::now(),
            pace,
        }
    }

    /// Sleep until row `index` is due.
    pub async fn wait_for(&self, index: usize) {
        let delay = delay_for(index, self.pace, self.start.elapsed());
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}
