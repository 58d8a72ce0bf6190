use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

/// What one run cost and how long it took.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerfResults {
    pub duration_seconds: f64,
    pub tokens_sent: usize,
    pub tokens_received: usize,
    /// Set only once the whole response has reached the sink.
    pub completed_successfully: bool,
}

impl PerfResults {
    pub fn duration_millis(&self) -> u64 {
        (self.duration_seconds * 1000.0) as u64
    }
}

impl fmt::Display for PerfResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Completed Successfully: {}", self.completed_successfully)?;
        writeln!(f, "Duration: {}ms", self.duration_millis())?;
        writeln!(f, "Tokens Sent: {}", self.tokens_sent)?;
        write!(f, "Tokens Received: {}", self.tokens_received)
    }
}

/// Awaits `future` and reports the wall-clock time it took.
pub async fn measure<F, T>(future: F) -> (T, Duration)
where
    F: Future<Output = T>,
{
    let started = Instant::now();
    let output = future.await;
    (output, started.elapsed())
}
