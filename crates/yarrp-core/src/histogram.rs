use crate::config::TimeUnit;
use crate::constants::{NEIGHBORHOOD_DISCOVERY_THRESHOLD, NEIGHBORHOOD_QUIET_MS};
use indexmap::IndexSet;
use itertools::Itertools;
use parking_lot::Mutex;
use std::net::IpAddr;

/// Discovery state of a single TTL.
#[derive(Debug, Clone)]
pub struct TtlHistogram {
    routers: IndexSet<IpAddr>,
    probes: u32,
    last_new: u32,
    last_sent: u32,
    quiet: u32,
}

impl TtlHistogram {
    /// A histogram which goes quiet after `quiet` time units without a new router.
    #[must_use]
    pub fn new(quiet: u32) -> Self {
        Self {
            routers: IndexSet::new(),
            probes: 0,
            last_new: 0,
            last_sent: 0,
            quiet,
        }
    }

    /// Record a probe sent at this TTL.
    pub fn probed(&mut self, elapsed: u32) {
        self.last_sent = elapsed;
    }

    /// Record a reply from `router`, returning true if the router is new.
    ///
    /// A discovery resets the probe count to parity with the number of routers.
    pub fn add(&mut self, router: IpAddr, elapsed: u32) -> bool {
        self.probes = self.probes.saturating_add(1);
        if self.routers.contains(&router) {
            return false;
        }
        self.probes = self.routers.len() as u32 + 1;
        self.routers.insert(router);
        self.last_new = elapsed;
        true
    }

    /// False once no new router has been seen for the quiet period.
    #[must_use]
    pub fn should_probe(&self) -> bool {
        i64::from(self.last_sent) - i64::from(self.last_new) <= i64::from(self.quiet)
    }

    /// False once too few replies at this TTL reveal new routers.
    #[must_use]
    pub fn should_probe_prob(&self) -> bool {
        if self.probes == 0 {
            return true;
        }
        self.routers.len() as f64 / f64::from(self.probes) >= NEIGHBORHOOD_DISCOVERY_THRESHOLD
    }

    #[must_use]
    pub fn routers(&self) -> usize {
        self.routers.len()
    }

    #[must_use]
    pub const fn probes(&self) -> u32 {
        self.probes
    }
}

/// Per-TTL histograms shared between the sender and the receiver.
#[derive(Debug)]
pub struct TtlController {
    histograms: Vec<Mutex<TtlHistogram>>,
}

impl TtlController {
    /// Histograms for TTLs `0..len`.
    #[must_use]
    pub fn new(len: usize, unit: TimeUnit) -> Self {
        let quiet = unit.scale_millis(NEIGHBORHOOD_QUIET_MS);
        Self {
            histograms: (0..len)
                .map(|_| Mutex::new(TtlHistogram::new(quiet)))
                .collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }

    pub fn probed(&self, ttl: u8, elapsed: u32) {
        if let Some(histogram) = self.histograms.get(usize::from(ttl)) {
            histogram.lock().probed(elapsed);
        }
    }

    /// Record a reply at `ttl`, returning true if `router` is new for that TTL.
    pub fn add(&self, ttl: u8, router: IpAddr, elapsed: u32) -> bool {
        self.histograms
            .get(usize::from(ttl))
            .is_some_and(|histogram| histogram.lock().add(router, elapsed))
    }

    #[must_use]
    pub fn should_probe(&self, ttl: u8) -> bool {
        self.histograms
            .get(usize::from(ttl))
            .map_or(true, |histogram| histogram.lock().should_probe())
    }

    #[must_use]
    pub fn should_probe_prob(&self, ttl: u8) -> bool {
        self.histograms
            .get(usize::from(ttl))
            .map_or(true, |histogram| histogram.lock().should_probe_prob())
    }

    /// Log a one line summary per TTL.
    pub fn dump(&self) {
        for (ttl, histogram) in self.histograms.iter().enumerate().skip(1) {
            let histogram = histogram.lock();
            tracing::debug!(
                ttl,
                routers = histogram.routers(),
                probes = histogram.probes(),
                last_new = histogram.last_new,
                last_sent = histogram.last_sent,
                seen = %histogram.routers.iter().take(8).join(" "),
                "ttl histogram"
            );
        }
    }
}

/// The probability of a Poisson(λ) variable taking the value `k`.
#[must_use]
pub fn poisson_pmf(k: u8, lambda: f64) -> f64 {
    let ln_factorial = (2..=u32::from(k)).map(f64::from).map(f64::ln).sum::<f64>();
    (f64::from(k) * lambda.ln() - ln_factorial - lambda).exp()
}

/// A probability which decays from 1 to 0 as `t` runs over `range`.
#[must_use]
pub fn decay_prob(t: f64, range: f64) -> f64 {
    1.0 - sigmoid(t / (range / 12.0) - 6.0)
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use test_case::test_case;

    fn router(n: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 0, 2, n))
    }

    #[test]
    fn test_repeated_router_converges() {
        let mut histogram = TtlHistogram::new(30_000);
        assert!(histogram.should_probe_prob());
        assert!(histogram.add(router(1), 0));
        for _ in 0..19 {
            assert!(!histogram.add(router(1), 0));
        }
        assert_eq!(20, histogram.probes());
        assert!(histogram.should_probe_prob());
        assert!(!histogram.add(router(1), 0));
        assert!(!histogram.should_probe_prob());
    }

    #[test]
    fn test_distinct_routers_keep_probing() {
        let mut histogram = TtlHistogram::new(30_000);
        for n in 0..100 {
            assert!(histogram.add(router(n), u32::from(n)));
            assert!(histogram.should_probe_prob());
        }
        assert_eq!(100, histogram.routers());
        assert_eq!(100, histogram.probes());
    }

    #[test]
    fn test_discovery_resets_to_parity() {
        let mut histogram = TtlHistogram::new(30_000);
        histogram.add(router(1), 0);
        for _ in 0..50 {
            histogram.add(router(1), 0);
        }
        assert!(!histogram.should_probe_prob());
        assert!(histogram.add(router(2), 10));
        assert_eq!(2, histogram.probes());
        assert!(histogram.should_probe_prob());
    }

    #[test]
    fn test_quiet_period() {
        let mut histogram = TtlHistogram::new(30_000);
        histogram.add(router(1), 5_000);
        histogram.probed(35_000);
        assert!(histogram.should_probe());
        histogram.probed(35_001);
        assert!(!histogram.should_probe());
        histogram.add(router(2), 35_001);
        assert!(histogram.should_probe());
    }

    #[test]
    fn test_controller_scales_quiet_period() {
        let controller = TtlController::new(4, TimeUnit::Micros);
        controller.probed(2, 29_000_000);
        assert!(controller.should_probe(2));
        controller.probed(2, 30_000_001);
        assert!(!controller.should_probe(2));
    }

    #[test]
    fn test_controller_out_of_range_ttl() {
        let controller = TtlController::new(4, TimeUnit::Millis);
        assert!(!controller.add(4, router(1), 0));
        assert!(controller.should_probe(9));
        assert!(controller.should_probe_prob(9));
        assert!(controller.add(3, router(1), 0));
        assert!(!controller.add(3, router(1), 0));
    }

    #[test_case(0, 1.0, 0.367_879)]
    #[test_case(2, 3.0, 0.224_042)]
    #[test_case(5, 5.0, 0.175_467)]
    #[test_case(10, 2.0, 0.000_038)]
    fn test_poisson_pmf(k: u8, lambda: f64, expected: f64) {
        assert!((poisson_pmf(k, lambda) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_poisson_sums_to_one() {
        let total = (0..=60).map(|k| poisson_pmf(k, 4.0)).sum::<f64>();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test_case(0.0, 0.997_527)]
    #[test_case(30_000.0, 0.5)]
    #[test_case(60_000.0, 0.002_473)]
    fn test_decay_prob(t: f64, expected: f64) {
        assert!((decay_prob(t, 60_000.0) - expected).abs() < 1e-6);
    }
}
