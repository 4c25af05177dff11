use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A scan counter.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Counter {
    /// Probes sent.
    Count,
    /// Probes skipped because the TTL neighborhood has converged.
    NbrSkipped,
    /// Probes skipped because the routed prefix has converged.
    BgpSkipped,
    /// Candidates whose TTL lies outside the configured window.
    TtlOutside,
    /// Candidates not covered by a routed prefix.
    BgpOutside,
    /// Candidates whose address is filtered or blocked.
    AdrOutside,
    /// Replies whose quoted destination fails the checksum test.
    BadDst,
    /// Replies whose decoded send time lies in the future.
    RttAnomaly,
    /// Extra probes sent beyond the maximum TTL.
    Fills,
    /// Replies from this instance.
    Replies,
    /// Replies carrying another instance's tag.
    Foreign,
}

/// Scan counters shared between the sender and the receiver.
#[derive(Debug, Default)]
pub struct Stats {
    to_probe: AtomicU64,
    count: AtomicU64,
    nbr_skipped: AtomicU64,
    bgp_skipped: AtomicU64,
    ttl_outside: AtomicU64,
    bgp_outside: AtomicU64,
    adr_outside: AtomicU64,
    baddst: AtomicU64,
    rtt_anomaly: AtomicU64,
    fills: AtomicU64,
    replies: AtomicU64,
    foreign: AtomicU64,
}

impl Stats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment `counter`, returning the new value.
    pub fn incr(&self, counter: Counter) -> u64 {
        self.counter(counter).fetch_add(1, Ordering::Relaxed) + 1
    }

    #[must_use]
    pub fn get(&self, counter: Counter) -> u64 {
        self.counter(counter).load(Ordering::Relaxed)
    }

    pub fn set_to_probe(&self, to_probe: u64) {
        self.to_probe.store(to_probe, Ordering::Relaxed);
    }

    #[must_use]
    pub fn to_probe(&self) -> u64 {
        self.to_probe.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn snapshot(&self, elapsed: Duration) -> Snapshot {
        Snapshot {
            elapsed,
            to_probe: self.to_probe(),
            count: self.get(Counter::Count),
            nbr_skipped: self.get(Counter::NbrSkipped),
            bgp_skipped: self.get(Counter::BgpSkipped),
            ttl_outside: self.get(Counter::TtlOutside),
            bgp_outside: self.get(Counter::BgpOutside),
            adr_outside: self.get(Counter::AdrOutside),
            baddst: self.get(Counter::BadDst),
            rtt_anomaly: self.get(Counter::RttAnomaly),
            fills: self.get(Counter::Fills),
            replies: self.get(Counter::Replies),
            foreign: self.get(Counter::Foreign),
        }
    }

    const fn counter(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::Count => &self.count,
            Counter::NbrSkipped => &self.nbr_skipped,
            Counter::BgpSkipped => &self.bgp_skipped,
            Counter::TtlOutside => &self.ttl_outside,
            Counter::BgpOutside => &self.bgp_outside,
            Counter::AdrOutside => &self.adr_outside,
            Counter::BadDst => &self.baddst,
            Counter::RttAnomaly => &self.rtt_anomaly,
            Counter::Fills => &self.fills,
            Counter::Replies => &self.replies,
            Counter::Foreign => &self.foreign,
        }
    }
}

/// A point in time copy of the scan counters.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct Snapshot {
    pub elapsed: Duration,
    pub to_probe: u64,
    pub count: u64,
    pub nbr_skipped: u64,
    pub bgp_skipped: u64,
    pub ttl_outside: u64,
    pub bgp_outside: u64,
    pub adr_outside: u64,
    pub baddst: u64,
    pub rtt_anomaly: u64,
    pub fills: u64,
    pub replies: u64,
    pub foreign: u64,
}

impl Snapshot {
    /// Probes sent per second.
    #[must_use]
    pub fn pps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.count as f64 / secs
        } else {
            0.0
        }
    }

    /// Percentage of the scan completed.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.to_probe > 0 {
            self.count as f64 * 100.0 / self.to_probe as f64
        } else {
            0.0
        }
    }
}

/// The terse one line progress summary.
impl Display for Snapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} ({:.1}%), NBskip: {}/{} TBAout: {}/{}/{} Bad: {} Fill: {} in: {:.1}s ({:.1} pps)",
            self.count,
            self.to_probe,
            self.progress(),
            self.nbr_skipped,
            self.bgp_skipped,
            self.ttl_outside,
            self.bgp_outside,
            self.adr_outside,
            self.baddst,
            self.fills,
            self.elapsed.as_secs_f64(),
            self.pps()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = Stats::new();
        assert_eq!(1, stats.incr(Counter::Count));
        assert_eq!(2, stats.incr(Counter::Count));
        stats.incr(Counter::BadDst);
        assert_eq!(2, stats.get(Counter::Count));
        assert_eq!(1, stats.get(Counter::BadDst));
        assert_eq!(0, stats.get(Counter::Fills));
    }

    #[test]
    fn test_terse() {
        let stats = Stats::new();
        stats.set_to_probe(200);
        for _ in 0..50 {
            stats.incr(Counter::Count);
        }
        stats.incr(Counter::NbrSkipped);
        stats.incr(Counter::TtlOutside);
        stats.incr(Counter::BgpOutside);
        stats.incr(Counter::BgpOutside);
        let snapshot = stats.snapshot(Duration::from_secs(5));
        assert_eq!(
            "50/200 (25.0%), NBskip: 1/0 TBAout: 1/2/0 Bad: 0 Fill: 0 in: 5.0s (10.0 pps)",
            snapshot.to_string()
        );
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Stats::new().snapshot(Duration::ZERO);
        assert!(snapshot.pps().abs() < f64::EPSILON);
        assert!(snapshot.progress().abs() < f64::EPSILON);
    }
}
