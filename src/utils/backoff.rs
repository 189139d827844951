use std::time::Duration;

/// Linear backoff with a ceiling, reset after a successful connection.
/// The teacher's own `ws_feed` panics on a failed `logs_subscribe` instead
/// of retrying; spec.md §4.1 requires the monitor to reconnect rather than
/// die, with the delay itself growing `base × min(attempt, 5)` rather than
/// doubling — matched here literally rather than swapped for the more
/// common doubling shape.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempt: 0,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        self.attempt += 1;
        let delay = self.base.saturating_mul(self.attempt.min(5));
        delay.min(self.max)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_linearly_until_ceiling() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(450));
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(300));
        assert_eq!(backoff.next_delay(), Duration::from_millis(400));
        assert_eq!(backoff.next_delay(), Duration::from_millis(450), "5th and later attempts cap at the ceiling");
        assert_eq!(backoff.next_delay(), Duration::from_millis(450));
    }

    #[test]
    fn reset_restarts_from_base() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(500));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }
}
