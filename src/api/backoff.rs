use backon::BackoffBuilder;
use std::time::Duration;

/// Linear backoff for `backon`: the n-th retry waits `base * n`.
///
/// `attempts` counts the first call too, so `attempts = 3` sleeps `base`
/// and then `2 * base`.
#[derive(Debug, Clone, Copy)]
pub struct LinearBuilder {
    base: Duration,
    attempts: usize,
}

impl LinearBuilder {
    pub fn new(base: Duration, attempts: usize) -> Self {
        Self { base, attempts }
    }
}

impl BackoffBuilder for LinearBuilder {
    type Backoff = LinearBackoff;

    fn build(self) -> Self::Backoff {
        LinearBackoff {
            base: self.base,
            retries_left: self.attempts.saturating_sub(1),
            next_factor: 1,
        }
    }
}

#[derive(Debug)]
pub struct LinearBackoff {
    base: Duration,
    retries_left: usize,
    next_factor: u32,
}

impl Iterator for LinearBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.retries_left == 0 {
            return None;
        }
        self.retries_left -= 1;
        let delay = self.base.saturating_mul(self.next_factor);
        self.next_factor += 1;
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_linearly() {
        let delays: Vec<_> = LinearBuilder::new(Duration::from_millis(500), 3)
            .build()
            .collect();
        assert_eq!(
            delays,
            [Duration::from_millis(500), Duration::from_millis(1000)]
        );
    }

    #[test]
    fn single_attempt_never_sleeps() {
        assert_eq!(LinearBuilder::new(Duration::from_secs(1), 1).build().count(), 0);
        assert_eq!(LinearBuilder::new(Duration::from_secs(1), 0).build().count(), 0);
    }
}
