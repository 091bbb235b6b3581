use std::time::{Duration, Instant};

/// Holds the latest value until `delay` has passed without a newer one.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    /// Returns the value once its quiet period is over.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, due)) if *due <= now => self.pending.take().map(|(v, _)| v),
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_latest_value_fires_after_quiet_period() {
        let start = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(100));
        d.schedule(1, start);
        d.schedule(2, start + Duration::from_millis(50));
        assert_eq!(d.poll(start + Duration::from_millis(120)), None);
        assert_eq!(d.poll(start + Duration::from_millis(150)), Some(2));
        assert_eq!(d.poll(start + Duration::from_millis(500)), None);
    }

    #[test]
    fn cancel_drops_pending() {
        let start = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(10));
        d.schedule("x", start);
        assert!(d.is_pending());
        d.cancel();
        assert_eq!(d.poll(start + Duration::from_secs(1)), None);
    }
}
