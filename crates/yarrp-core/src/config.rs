use crate::permutation::Cipher;
use crate::types::{InstanceId, Port, TimeToLive};
use ipnetwork::IpNetwork;
use std::fmt::{Display, Formatter};
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default values for configuration.
pub mod defaults {
    use crate::config::{ProbeMode, ProbeType, ScanOrder, TimeUnit};
    use crate::permutation::Cipher;
    use std::time::Duration;

    /// The default value for `type`.
    pub const DEFAULT_PROBE_TYPE: ProbeType = ProbeType::TcpAck;

    /// The default value for `rate`, in packets per second.
    pub const DEFAULT_RATE: u32 = 10;

    /// The default value for `min-ttl`.
    pub const DEFAULT_MIN_TTL: u8 = 1;

    /// The default value for `max-ttl`.
    pub const DEFAULT_MAX_TTL: u8 = 32;

    /// The default value for `fill-mode`, disabled.
    pub const DEFAULT_FILL_TTL: u8 = 0;

    /// The default value for `neighborhood`, disabled.
    pub const DEFAULT_NEIGHBORHOOD: u8 = 0;

    /// The default value for `poisson`, disabled.
    pub const DEFAULT_POISSON: u8 = 0;

    /// The default destination port for `TCP` and `ICMP` probes.
    pub const DEFAULT_TCP_PORT: u16 = 80;

    /// The default destination port for `UDP` probes.
    pub const DEFAULT_UDP_PORT: u16 = 53;

    /// The default value for `instance`.
    pub const DEFAULT_INSTANCE: u8 = 0;

    /// The default value for `output`.
    pub const DEFAULT_OUTPUT: &str = "output.yrp";

    /// The default scan order.
    pub const DEFAULT_SCAN_ORDER: ScanOrder = ScanOrder::Random;

    /// The default RTT granularity.
    pub const DEFAULT_TIME_UNIT: TimeUnit = TimeUnit::Micros;

    /// The default probing mode.
    pub const DEFAULT_PROBE_MODE: ProbeMode = ProbeMode::Both;

    /// The default permutation cipher.
    pub const DEFAULT_CIPHER: Cipher = Cipher::Auto;

    /// How long to wait for outstanding replies once probing has finished.
    pub const DEFAULT_SHUTDOWN_WAIT: Duration = Duration::from_secs(60);

    /// The global unicast prefixes probed in entire `IPv6` mode.
    pub const DEFAULT_ALLOWED_IPV6_PREFIXES: [&str; 7] = [
        "2001::/16",
        "2003::/16",
        "2400::/12",
        "2600::/8",
        "2800::/12",
        "2a00::/12",
        "2c00::/12",
    ];
}

/// The probe type.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ProbeType {
    Icmp6,
    Icmp,
    Udp6,
    Udp,
    Tcp6Syn,
    TcpSyn,
    Tcp6Ack,
    TcpAck,
    /// An `ICMPv4` echo reply sent as the probe.
    IcmpReply,
}

impl ProbeType {
    pub const ALL: [Self; 9] = [
        Self::Icmp6,
        Self::Icmp,
        Self::Udp6,
        Self::Udp,
        Self::Tcp6Syn,
        Self::TcpSyn,
        Self::Tcp6Ack,
        Self::TcpAck,
        Self::IcmpReply,
    ];

    /// The numeric identifier written to the output header.
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::Icmp6 => 0,
            Self::Icmp => 1,
            Self::Udp6 => 2,
            Self::Udp => 3,
            Self::Tcp6Syn => 4,
            Self::TcpSyn => 5,
            Self::Tcp6Ack => 6,
            Self::TcpAck => 7,
            Self::IcmpReply => 8,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Icmp6 => "ICMP6",
            Self::Icmp => "ICMP",
            Self::Udp6 => "UDP6",
            Self::Udp => "UDP",
            Self::Tcp6Syn => "TCP6_SYN",
            Self::TcpSyn => "TCP_SYN",
            Self::Tcp6Ack => "TCP6_ACK",
            Self::TcpAck => "TCP_ACK",
            Self::IcmpReply => "ICMP_REPLY",
        }
    }

    #[must_use]
    pub const fn is_ipv6(self) -> bool {
        matches!(self, Self::Icmp6 | Self::Udp6 | Self::Tcp6Syn | Self::Tcp6Ack)
    }

    #[must_use]
    pub const fn protocol(self) -> Protocol {
        match self {
            Self::Icmp6 | Self::Icmp | Self::IcmpReply => Protocol::Icmp,
            Self::Udp6 | Self::Udp => Protocol::Udp,
            Self::Tcp6Syn | Self::TcpSyn | Self::Tcp6Ack | Self::TcpAck => Protocol::Tcp,
        }
    }

    /// The destination port used when none is configured.
    #[must_use]
    pub const fn default_port(self) -> Port {
        match self.protocol() {
            Protocol::Udp => Port(defaults::DEFAULT_UDP_PORT),
            Protocol::Icmp | Protocol::Tcp => Port(defaults::DEFAULT_TCP_PORT),
        }
    }
}

impl Display for ProbeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ProbeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown probe type: {s}"))
    }
}

/// The transport protocol of a probe.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Protocol {
    Icmp,
    Udp,
    Tcp,
}

/// The granularity of the scan clock and of reported round trip times.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TimeUnit {
    Millis,
    Micros,
}

impl TimeUnit {
    /// Convert a scan duration to clock ticks.
    ///
    /// The clock is 32 bits wide and wraps.
    #[must_use]
    pub fn ticks(self, elapsed: Duration) -> u32 {
        match self {
            Self::Millis => elapsed.as_millis() as u32,
            Self::Micros => elapsed.as_micros() as u32,
        }
    }

    /// Convert a number of milliseconds to clock ticks.
    #[must_use]
    pub const fn scale_millis(self, millis: u32) -> u32 {
        match self {
            Self::Millis => millis,
            Self::Micros => millis.saturating_mul(1000),
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Millis => "ms",
            Self::Micros => "us",
        }
    }
}

impl Display for TimeUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The order in which (address, TTL) pairs are visited.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ScanOrder {
    Random,
    Sequential,
}

impl ScanOrder {
    #[must_use]
    pub const fn is_random(self) -> bool {
        matches!(self, Self::Random)
    }
}

/// Whether to send probes, receive replies or both.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ProbeMode {
    Both,
    ProbeOnly,
    ReceiveOnly,
}

impl ProbeMode {
    #[must_use]
    pub const fn probes(self) -> bool {
        matches!(self, Self::Both | Self::ProbeOnly)
    }

    #[must_use]
    pub const fn receives(self) -> bool {
        matches!(self, Self::Both | Self::ReceiveOnly)
    }
}

/// The set of targets to scan.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Targets {
    /// Individual addresses, each probed at every TTL.
    List { source: String, addrs: Vec<IpAddr> },
    /// Subnets, probed at one address per `/24` (`IPv4`) or `/48` (`IPv6`).
    Subnets(Vec<IpNetwork>),
    /// Every routed address block of the Internet.
    Entire,
}

impl Targets {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::List { addrs, .. } => addrs.is_empty(),
            Self::Subnets(subnets) => subnets.is_empty(),
            Self::Entire => false,
        }
    }

    #[must_use]
    pub const fn is_entire(&self) -> bool {
        matches!(self, Self::Entire)
    }
}

/// Scanner configuration.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub targets: Targets,
    pub probe_type: ProbeType,
    pub dest_port: Port,
    pub source_addr: Option<IpAddr>,
    pub rate: u32,
    pub min_ttl: TimeToLive,
    pub max_ttl: TimeToLive,
    pub fill_ttl: TimeToLive,
    pub neighborhood: TimeToLive,
    pub poisson: u8,
    pub scan_order: ScanOrder,
    pub cipher: Cipher,
    pub seed: u64,
    pub count: Option<u64>,
    pub instance: InstanceId,
    pub time_unit: TimeUnit,
    pub probe_mode: ProbeMode,
    pub testing: bool,
    pub bgp_table: Option<PathBuf>,
    pub blocklist: Option<PathBuf>,
    pub allowed_ipv6: Vec<IpNetwork>,
    pub output: PathBuf,
    pub shutdown_wait: Duration,
    pub lock_dir: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            targets: Targets::Subnets(vec![]),
            probe_type: defaults::DEFAULT_PROBE_TYPE,
            dest_port: defaults::DEFAULT_PROBE_TYPE.default_port(),
            source_addr: None,
            rate: defaults::DEFAULT_RATE,
            min_ttl: TimeToLive(defaults::DEFAULT_MIN_TTL),
            max_ttl: TimeToLive(defaults::DEFAULT_MAX_TTL),
            fill_ttl: TimeToLive(defaults::DEFAULT_FILL_TTL),
            neighborhood: TimeToLive(defaults::DEFAULT_NEIGHBORHOOD),
            poisson: defaults::DEFAULT_POISSON,
            scan_order: defaults::DEFAULT_SCAN_ORDER,
            cipher: defaults::DEFAULT_CIPHER,
            seed: 0,
            count: None,
            instance: InstanceId(defaults::DEFAULT_INSTANCE),
            time_unit: defaults::DEFAULT_TIME_UNIT,
            probe_mode: defaults::DEFAULT_PROBE_MODE,
            testing: false,
            bgp_table: None,
            blocklist: None,
            allowed_ipv6: default_allowed_ipv6(),
            output: PathBuf::from(defaults::DEFAULT_OUTPUT),
            shutdown_wait: defaults::DEFAULT_SHUTDOWN_WAIT,
            lock_dir: None,
        }
    }
}

impl ScanConfig {
    /// The number of TTLs probed per target.
    #[must_use]
    pub const fn ttl_span(&self) -> u8 {
        self.max_ttl.0 - self.min_ttl.0 + 1
    }

    #[must_use]
    pub const fn is_ipv6(&self) -> bool {
        self.probe_type.is_ipv6()
    }

    #[must_use]
    pub fn fill_enabled(&self) -> bool {
        self.fill_ttl.0 > 0
    }
}

/// The parsed default list of allowed `IPv6` prefixes.
#[must_use]
pub fn default_allowed_ipv6() -> Vec<IpNetwork> {
    defaults::DEFAULT_ALLOWED_IPV6_PREFIXES
        .iter()
        .filter_map(|prefix| prefix.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("ICMP6", ProbeType::Icmp6, 0, true)]
    #[test_case("ICMP", ProbeType::Icmp, 1, false)]
    #[test_case("UDP6", ProbeType::Udp6, 2, true)]
    #[test_case("udp", ProbeType::Udp, 3, false)]
    #[test_case("TCP6_SYN", ProbeType::Tcp6Syn, 4, true)]
    #[test_case("TCP_SYN", ProbeType::TcpSyn, 5, false)]
    #[test_case("TCP6_ACK", ProbeType::Tcp6Ack, 6, true)]
    #[test_case("TCP_ACK", ProbeType::TcpAck, 7, false)]
    #[test_case("ICMP_REPLY", ProbeType::IcmpReply, 8, false)]
    fn test_probe_type(name: &str, expected: ProbeType, id: u8, ipv6: bool) {
        let ty = ProbeType::from_str(name).unwrap();
        assert_eq!(expected, ty);
        assert_eq!(id, ty.id());
        assert_eq!(ipv6, ty.is_ipv6());
        assert_eq!(name.to_ascii_uppercase(), ty.to_string());
    }

    #[test]
    fn test_unknown_probe_type() {
        assert!(ProbeType::from_str("SCTP").is_err());
    }

    #[test_case(ProbeType::Udp, 53)]
    #[test_case(ProbeType::Udp6, 53)]
    #[test_case(ProbeType::TcpAck, 80)]
    #[test_case(ProbeType::Icmp6, 80)]
    fn test_default_port(ty: ProbeType, port: u16) {
        assert_eq!(Port(port), ty.default_port());
    }

    #[test]
    fn test_time_unit() {
        let elapsed = Duration::from_micros(1_234_567);
        assert_eq!(1234, TimeUnit::Millis.ticks(elapsed));
        assert_eq!(1_234_567, TimeUnit::Micros.ticks(elapsed));
        assert_eq!(30_000, TimeUnit::Millis.scale_millis(30_000));
        assert_eq!(30_000_000, TimeUnit::Micros.scale_millis(30_000));
    }

    #[test]
    fn test_default_config() {
        let config = ScanConfig::default();
        assert_eq!(32, config.ttl_span());
        assert_eq!(Port(80), config.dest_port);
        assert!(!config.fill_enabled());
        assert_eq!(7, config.allowed_ipv6.len());
        assert!(config.targets.is_empty());
    }
}
