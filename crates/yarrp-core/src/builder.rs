use crate::bgp::{load_route_table, RouteTable};
use crate::config::{ProbeMode, ProbeType, ScanConfig, ScanOrder, Targets, TimeUnit};
use crate::error::{Error, Result};
use crate::permutation::Cipher;
use crate::scanner::Scanner;
use crate::trie::Family;
use crate::types::{InstanceId, Port, TimeToLive};
use ipnetwork::IpNetwork;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// The longest `IPv6` subnet which may be scanned.
const MAX_IPV6_SUBNET_PREFIX: u8 = 64;

/// Build a scanner.
///
/// Every setting not given takes its value from [`crate::defaults`]; the configuration is
/// validated when the scanner is built.
///
/// # Examples
///
/// ```no_run
/// # fn main() -> anyhow::Result<()> {
/// use yarrp_core::{Builder, ProbeType, Targets};
///
/// let targets = Targets::Subnets(vec!["192.0.2.0/24".parse()?]);
/// let scanner = Builder::new(targets)
///     .probe_type(ProbeType::Icmp)
///     .rate(1000)
///     .max_ttl(16)
///     .build()?;
/// scanner.run(std::io::stdout())?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Builder {
    config: ScanConfig,
    routes: Option<RouteTable>,
}

impl Builder {
    /// A builder for a scan of `targets`.
    #[must_use]
    pub fn new(targets: Targets) -> Self {
        Self {
            config: ScanConfig {
                targets,
                ..ScanConfig::default()
            },
            routes: None,
        }
    }

    /// Set the probe type.
    ///
    /// The destination port follows the probe type unless set with [`Builder::dest_port`].
    #[must_use]
    pub fn probe_type(mut self, probe_type: ProbeType) -> Self {
        if self.config.dest_port == self.config.probe_type.default_port() {
            self.config.dest_port = probe_type.default_port();
        }
        self.config.probe_type = probe_type;
        self
    }

    #[must_use]
    pub fn dest_port(mut self, port: u16) -> Self {
        self.config.dest_port = Port(port);
        self
    }

    /// Set the source address.
    ///
    /// If not set then the source address is discovered from the routing table.
    #[must_use]
    pub fn source_addr(mut self, source_addr: Option<IpAddr>) -> Self {
        self.config.source_addr = source_addr;
        self
    }

    /// Set the send rate in probes per second, zero for unlimited.
    #[must_use]
    pub fn rate(mut self, rate: u32) -> Self {
        self.config.rate = rate;
        self
    }

    #[must_use]
    pub fn min_ttl(mut self, ttl: u8) -> Self {
        self.config.min_ttl = TimeToLive(ttl);
        self
    }

    #[must_use]
    pub fn max_ttl(mut self, ttl: u8) -> Self {
        self.config.max_ttl = TimeToLive(ttl);
        self
    }

    /// Keep probing past the maximum TTL, up to `ttl`, while hops keep answering.
    ///
    /// Zero disables fill mode.
    #[must_use]
    pub fn fill_ttl(mut self, ttl: u8) -> Self {
        self.config.fill_ttl = TimeToLive(ttl);
        self
    }

    /// Skip TTLs below `ttl` once they stop revealing new routers.
    #[must_use]
    pub fn neighborhood(mut self, ttl: u8) -> Self {
        self.config.neighborhood = TimeToLive(ttl);
        self
    }

    /// Bias the probed TTLs towards a Poisson distribution with mean `lambda`.
    #[must_use]
    pub fn poisson(mut self, lambda: u8) -> Self {
        self.config.poisson = lambda;
        self
    }

    #[must_use]
    pub fn scan_order(mut self, scan_order: ScanOrder) -> Self {
        self.config.scan_order = scan_order;
        self
    }

    #[must_use]
    pub fn cipher(mut self, cipher: Cipher) -> Self {
        self.config.cipher = cipher;
        self
    }

    /// Set the seed of the permutation key.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Stop after sending `count` probes.
    #[must_use]
    pub fn count(mut self, count: Option<u64>) -> Self {
        self.config.count = count;
        self
    }

    #[must_use]
    pub fn instance(mut self, instance: u8) -> Self {
        self.config.instance = InstanceId(instance);
        self
    }

    #[must_use]
    pub fn time_unit(mut self, time_unit: TimeUnit) -> Self {
        self.config.time_unit = time_unit;
        self
    }

    #[must_use]
    pub fn probe_mode(mut self, probe_mode: ProbeMode) -> Self {
        self.config.probe_mode = probe_mode;
        self
    }

    /// Enumerate and log probes without sending them.
    #[must_use]
    pub fn testing(mut self, testing: bool) -> Self {
        self.config.testing = testing;
        self
    }

    /// Restrict probing to the prefixes of a BGP table file.
    #[must_use]
    pub fn bgp_table(mut self, path: Option<PathBuf>) -> Self {
        self.config.bgp_table = path;
        self
    }

    /// Never probe the prefixes of a blocklist file.
    #[must_use]
    pub fn blocklist(mut self, path: Option<PathBuf>) -> Self {
        self.config.blocklist = path;
        self
    }

    /// Use an already built route table instead of reading one from a file.
    #[must_use]
    pub fn route_table(mut self, routes: RouteTable) -> Self {
        self.routes = Some(routes);
        self
    }

    /// The prefixes an entire `IPv6` scan may probe.
    #[must_use]
    pub fn allowed_ipv6(mut self, prefixes: Vec<IpNetwork>) -> Self {
        self.config.allowed_ipv6 = prefixes;
        self
    }

    #[must_use]
    pub fn output(mut self, output: PathBuf) -> Self {
        self.config.output = output;
        self
    }

    /// How long to keep receiving once every probe has been sent.
    #[must_use]
    pub fn shutdown_wait(mut self, wait: Duration) -> Self {
        self.config.shutdown_wait = wait;
        self
    }

    /// The directory holding instance lock files, `$HOME/.yarrp` if not set.
    #[must_use]
    pub fn lock_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config.lock_dir = dir;
        self
    }

    /// Validate the configuration and build the [`Scanner`].
    ///
    /// A BGP table given by path is read here.
    pub fn build(self) -> Result<Scanner> {
        let config = self.config;
        validate(&config)?;
        let family = if config.is_ipv6() {
            Family::V6
        } else {
            Family::V4
        };
        let routes = match (self.routes, &config.bgp_table) {
            (Some(routes), _) => Some(routes),
            (None, Some(bgp_table)) => Some(load_route_table(
                family,
                bgp_table,
                config.blocklist.as_deref(),
            )?),
            (None, None) if config.blocklist.is_some() => {
                return Err(Error::BadConfig(String::from(
                    "a blocklist requires a bgp table",
                )));
            }
            (None, None) => None,
        };
        if config.targets.is_entire() && routes.is_none() {
            return Err(Error::BadConfig(String::from(
                "entire Internet mode requires a bgp table",
            )));
        }
        if let Some(routes) = &routes {
            if routes.family() != family {
                return Err(Error::AddressFamily(String::from("route table")));
            }
        }
        tracing::debug!(?config, "scanner configured");
        Ok(Scanner::new(config, routes))
    }
}

fn validate(config: &ScanConfig) -> Result<()> {
    let ipv6 = config.is_ipv6();
    if config.targets.is_empty() {
        return Err(Error::BadConfig(String::from("no targets to scan")));
    }
    if config.min_ttl.0 == 0 {
        return Err(Error::BadConfig(String::from("min_ttl must be at least 1")));
    }
    if config.min_ttl > config.max_ttl {
        return Err(Error::BadConfig(format!(
            "min_ttl {} > max_ttl {}",
            config.min_ttl.0, config.max_ttl.0
        )));
    }
    if config.fill_enabled() && config.fill_ttl <= config.max_ttl {
        return Err(Error::BadConfig(format!(
            "fill_ttl {} must be larger than max_ttl {}",
            config.fill_ttl.0, config.max_ttl.0
        )));
    }
    if let Some(addr) = config.source_addr {
        if addr.is_ipv6() != ipv6 {
            return Err(Error::AddressFamily(addr.to_string()));
        }
    }
    match &config.targets {
        Targets::List { addrs, .. } => {
            if let Some(addr) = addrs.iter().find(|addr| addr.is_ipv6() != ipv6) {
                return Err(Error::AddressFamily(addr.to_string()));
            }
        }
        Targets::Subnets(subnets) => {
            for subnet in subnets {
                match subnet {
                    IpNetwork::V6(net) if ipv6 && net.prefix() > MAX_IPV6_SUBNET_PREFIX => {
                        return Err(Error::BadConfig(format!(
                            "ipv6 subnet {subnet} is longer than /{MAX_IPV6_SUBNET_PREFIX}"
                        )));
                    }
                    IpNetwork::V6(_) if ipv6 => {}
                    IpNetwork::V4(_) if !ipv6 => {}
                    _ => return Err(Error::AddressFamily(subnet.to_string())),
                }
            }
        }
        Targets::Entire => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgp::RouteInfo;
    use test_case::test_case;

    fn subnets(nets: &[&str]) -> Targets {
        Targets::Subnets(nets.iter().map(|net| net.parse().unwrap()).collect())
    }

    #[test]
    fn test_defaults() {
        let scanner = Builder::new(subnets(&["192.0.2.0/24"])).build().unwrap();
        let config = scanner.config();
        assert_eq!(ProbeType::TcpAck, config.probe_type);
        assert_eq!(Port(80), config.dest_port);
        assert_eq!(10, config.rate);
        assert_eq!(TimeToLive(32), config.max_ttl);
        assert!(scanner.routes().is_none());
    }

    #[test]
    fn test_port_follows_probe_type() {
        let scanner = Builder::new(subnets(&["192.0.2.0/24"]))
            .probe_type(ProbeType::Udp)
            .build()
            .unwrap();
        assert_eq!(Port(53), scanner.config().dest_port);
        let scanner = Builder::new(subnets(&["192.0.2.0/24"]))
            .dest_port(443)
            .probe_type(ProbeType::Udp)
            .build()
            .unwrap();
        assert_eq!(Port(443), scanner.config().dest_port);
    }

    #[test_case(Builder::new(subnets(&[])); "no targets")]
    #[test_case(Builder::new(subnets(&["192.0.2.0/24"])).min_ttl(0); "zero min ttl")]
    #[test_case(Builder::new(subnets(&["192.0.2.0/24"])).min_ttl(9).max_ttl(8); "min above max")]
    #[test_case(Builder::new(subnets(&["192.0.2.0/24"])).max_ttl(16).fill_ttl(16); "fill at max")]
    #[test_case(Builder::new(Targets::Entire); "entire without bgp")]
    #[test_case(Builder::new(subnets(&["192.0.2.0/24"])).blocklist(Some(PathBuf::from("b"))); "blocklist without bgp")]
    #[test_case(Builder::new(subnets(&["2001:db8::/80"])).probe_type(ProbeType::Icmp6); "long ipv6 subnet")]
    fn test_bad_config(builder: Builder) {
        assert!(matches!(builder.build(), Err(Error::BadConfig(_))));
    }

    #[test]
    fn test_family_mismatch() {
        let err = Builder::new(subnets(&["2001:db8::/48"]))
            .probe_type(ProbeType::Udp)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::AddressFamily(_)));
        let err = Builder::new(Targets::List {
            source: String::from("-"),
            addrs: vec!["192.0.2.1".parse().unwrap()],
        })
        .probe_type(ProbeType::Icmp6)
        .build()
        .unwrap_err();
        assert!(matches!(err, Error::AddressFamily(_)));
        let err = Builder::new(subnets(&["192.0.2.0/24"]))
            .source_addr(Some("2001:db8::1".parse().unwrap()))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::AddressFamily(_)));
    }

    #[test]
    fn test_fill_above_max() {
        let scanner = Builder::new(subnets(&["192.0.2.0/24"]))
            .max_ttl(16)
            .fill_ttl(24)
            .build()
            .unwrap();
        assert!(scanner.config().fill_enabled());
    }

    #[test]
    fn test_entire_with_route_table() {
        let mut routes = RouteTable::new(Family::V4);
        routes
            .insert("0.0.0.0/1".parse().unwrap(), RouteInfo::new(64496))
            .unwrap();
        let scanner = Builder::new(Targets::Entire)
            .route_table(routes)
            .build()
            .unwrap();
        assert_eq!(1, scanner.routes().map_or(0, RouteTable::len));
    }

    #[test]
    fn test_route_table_family() {
        let routes = RouteTable::new(Family::V6);
        let err = Builder::new(Targets::Entire)
            .route_table(routes)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::AddressFamily(_)));
    }
}
