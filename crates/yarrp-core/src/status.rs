use crate::constants::PREFIX_DECAY_RANGE_MS;
use crate::histogram::decay_prob;
use indexmap::IndexSet;
use itertools::Itertools;
use rand::Rng;
use std::fmt::{Display, Formatter};

/// Probing status of a single routed prefix.
///
/// Updated by the sender each time a target inside the prefix is probed and by the receiver each
/// time a reply attributed to the prefix arrives.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Status {
    probes: u32,
    returns: u32,
    last_sent: u32,
    last_reply: u32,
    high_ttl: u8,
    low_ttl: u8,
    missing_ttl: IndexSet<u8>,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            probes: 0,
            returns: 0,
            last_sent: 0,
            last_reply: 0,
            high_ttl: 1,
            low_ttl: u8::MAX,
            missing_ttl: IndexSet::new(),
        }
    }
}

impl Status {
    /// Record a probe sent at `ttl`.
    pub fn probed(&mut self, ttl: u8, elapsed: u32) {
        self.last_sent = elapsed;
        self.missing_ttl.insert(ttl);
        self.probes = self.probes.saturating_add(1);
    }

    /// Record a reply to a probe sent at `ttl`.
    pub fn result(&mut self, ttl: u8, elapsed: u32) {
        self.returns = self.returns.saturating_add(1);
        self.last_reply = elapsed;
        self.high_ttl = self.high_ttl.max(ttl);
        self.low_ttl = self.low_ttl.min(ttl);
        self.missing_ttl.shift_remove(&ttl);
    }

    /// Decide whether the prefix should keep being probed.
    ///
    /// If the TTL beyond the highest answered one is still outstanding, the longer the prefix
    /// has been silent the more likely it is that the frontier is pushed one hop deeper.  The
    /// prefix is always probed.
    pub fn should_probe<R: Rng>(&mut self, rng: &mut R) -> bool {
        if !self.missing_ttl.contains(&self.high_ttl.saturating_add(1)) {
            return true;
        }
        let delta = i64::from(self.last_sent) - i64::from(self.last_reply);
        let prob = decay_prob(delta as f64, f64::from(PREFIX_DECAY_RANGE_MS));
        let draw = rng.gen::<f64>();
        tracing::debug!(delta, prob, draw, "prefix decay");
        if draw > prob {
            self.high_ttl = self.high_ttl.saturating_add(1);
            self.last_reply = self.last_sent;
        }
        true
    }

    /// Forget everything learned about the prefix.
    pub fn reset(&mut self) {
        *self = Self {
            last_sent: self.last_sent,
            high_ttl: 0,
            ..Self::default()
        };
    }

    #[must_use]
    pub const fn probes(&self) -> u32 {
        self.probes
    }

    #[must_use]
    pub const fn returns(&self) -> u32 {
        self.returns
    }

    #[must_use]
    pub const fn high_ttl(&self) -> u8 {
        self.high_ttl
    }

    #[must_use]
    pub const fn low_ttl(&self) -> u8 {
        self.low_ttl
    }

    /// The TTLs probed but not yet answered, in the order they were first probed.
    pub fn missing_ttl(&self) -> impl Iterator<Item = u8> + '_ {
        self.missing_ttl.iter().copied()
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let delta = i64::from(self.last_reply) - i64::from(self.last_sent);
        write!(
            f,
            "probes: {} returns: {} last probed: {} last reply: {} delta: {delta} ttl high: {} ttl low: {} missing: [{}]",
            self.probes,
            self.returns,
            self.last_sent,
            self.last_reply,
            self.high_ttl,
            self.low_ttl,
            self.missing_ttl.iter().join(" ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn test_probe_and_result() {
        let mut status = Status::default();
        status.probed(3, 100);
        status.probed(4, 110);
        status.probed(5, 120);
        status.result(4, 150);
        assert_eq!(3, status.probes());
        assert_eq!(1, status.returns());
        assert_eq!(4, status.high_ttl());
        assert_eq!(4, status.low_ttl());
        assert_eq!(vec![3, 5], status.missing_ttl().collect::<Vec<_>>());
        assert!(status.returns() <= status.probes());
        assert!(status.high_ttl() >= status.low_ttl());
    }

    #[test]
    fn test_should_probe_when_frontier_answered() {
        let mut status = Status::default();
        status.probed(1, 10);
        status.result(1, 20);
        let mut rng = StepRng::new(u64::MAX, 0);
        assert!(status.should_probe(&mut rng));
        assert_eq!(1, status.high_ttl());
    }

    #[test]
    fn test_long_silence_pushes_frontier() {
        let mut status = Status::default();
        status.probed(2, 100_000);
        // a draw close to 1 always exceeds the decayed probability
        let mut rng = StepRng::new(u64::MAX, 0);
        assert!(status.should_probe(&mut rng));
        assert_eq!(2, status.high_ttl());
    }

    #[test]
    fn test_recent_reply_keeps_frontier() {
        let mut status = Status::default();
        status.result(1, 1000);
        status.probed(2, 1000);
        // a draw of 0 never exceeds the probability
        let mut rng = StepRng::new(0, 0);
        assert!(status.should_probe(&mut rng));
        assert_eq!(1, status.high_ttl());
    }

    #[test]
    fn test_display() {
        let mut status = Status::default();
        status.probed(7, 5);
        assert_eq!(
            "probes: 1 returns: 0 last probed: 5 last reply: 0 delta: -5 ttl high: 1 ttl low: 255 missing: [7]",
            status.to_string()
        );
    }

    #[test]
    fn test_reset() {
        let mut status = Status::default();
        status.probed(7, 5);
        status.result(7, 9);
        status.reset();
        assert_eq!(0, status.probes());
        assert_eq!(0, status.high_ttl());
        assert_eq!(u8::MAX, status.low_ttl());
        assert_eq!(0, status.missing_ttl().count());
    }
}
