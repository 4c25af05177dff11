use std::time::{Duration, Instant};

/// Spaces out probes to hold a target send rate.
///
/// Each probe is given a slot `1 / rate` seconds after the previous one and the sending thread
/// sleeps until its slot arrives.  A sender which falls behind may catch up by at most `burst`
/// probes before the schedule is reset.
#[derive(Debug)]
pub struct Pacer {
    interval: Option<Duration>,
    burst: u32,
    next: Instant,
}

impl Pacer {
    /// A pacer for `rate` probes per second, where a rate of zero is unlimited.
    #[must_use]
    pub fn new(rate: u32) -> Self {
        let interval = (rate > 0).then(|| Duration::from_secs(1) / rate);
        Self {
            interval,
            burst: (rate / 20).max(1),
            next: Instant::now(),
        }
    }

    /// Block until the next probe may be sent.
    pub fn wait(&mut self) {
        let Some(interval) = self.interval else {
            return;
        };
        let now = Instant::now();
        if self.next > now {
            std::thread::sleep(self.next - now);
        } else if now - self.next > interval * self.burst {
            self.next = now;
        }
        self.next += interval;
    }

    #[must_use]
    pub const fn is_unlimited(&self) -> bool {
        self.interval.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited() {
        let mut pacer = Pacer::new(0);
        assert!(pacer.is_unlimited());
        let start = Instant::now();
        for _ in 0..10_000 {
            pacer.wait();
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_rate_is_held() {
        let start = Instant::now();
        let mut pacer = Pacer::new(200);
        for _ in 0..21 {
            pacer.wait();
        }
        assert!(start.elapsed() >= Duration::from_millis(95));
    }

    #[test]
    fn test_late_sender_does_not_burst() {
        let mut pacer = Pacer::new(1000);
        pacer.wait();
        std::thread::sleep(Duration::from_millis(200));
        let start = Instant::now();
        for _ in 0..101 {
            pacer.wait();
        }
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
