use std::time::Duration;

/// Exponential backoff between reconnection attempts:
/// `min * 2^attempts`, randomized by `jitter` and capped at `max`.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    min: Duration,
    max: Duration,
    jitter: f64,
    attempts: u32,
}

impl Backoff {
    const FACTOR: f64 = 2.0;

    pub fn new(min: Duration, max: Duration, jitter: f64) -> Self {
        Self {
            min,
            max,
            jitter: jitter.clamp(0.0, 1.0),
            attempts: 0,
        }
    }

    /// The delay before the next attempt. It increments the attempt count.
    pub fn duration(&mut self) -> Duration {
        let exp = i32::try_from(self.attempts).unwrap_or(i32::MAX);
        self.attempts = self.attempts.saturating_add(1);

        let mut ms = (self.min.as_millis() as f64 * Self::FACTOR.powi(exp)).min(u64::MAX as f64);
        if self.jitter > 0.0 {
            let rand: f64 = rand::random();
            let deviation = (rand * self.jitter * ms).floor();
            ms = if (rand * 10.0).floor() as u64 & 1 == 0 {
                ms - deviation
            } else {
                ms + deviation
            };
        }
        let max = self.max.as_millis() as f64;
        Duration::from_millis(ms.clamp(0.0, max) as u64)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
