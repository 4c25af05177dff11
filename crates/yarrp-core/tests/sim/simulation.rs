use serde::Deserialize;
use std::net::IpAddr;

/// A simulated network path and the counters a scan of it must produce.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Simulation {
    pub name: String,
    pub protocol: Protocol,
    pub source: IpAddr,
    pub targets: Vec<IpAddr>,
    pub max_ttl: u8,
    #[serde(default)]
    pub fill_ttl: u8,
    #[serde(default)]
    pub sequential: bool,
    pub hops: Vec<Hop>,
    pub expected: Expected,
}

impl Simulation {
    /// The hop which answers a probe sent with `ttl`, if any.
    ///
    /// Probes which travel past the last hop reach the target.
    pub fn hop(&self, ttl: u8) -> Option<&Hop> {
        self.hops.iter().find(|hop| hop.ttl == ttl)
    }

    /// The distance to the target: one past the last hop.
    pub fn target_ttl(&self) -> u8 {
        self.hops.iter().map(|hop| hop.ttl).max().unwrap_or(0) + 1
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    Icmp,
    Udp,
    TcpSyn,
    TcpAck,
}

/// A router on the path.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Hop {
    pub ttl: u8,
    /// The router address, or `None` for a router which never answers.
    pub addr: Option<IpAddr>,
    #[serde(default)]
    pub tamper: Option<Tamper>,
}

/// A modification a router makes to the quote of the probe.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tamper {
    /// Rewrite the quoted instance, as if another scanner had sent the probe.
    Foreign,
    /// Rewrite the quoted destination address.
    BadDestination,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Expected {
    pub probes: u64,
    pub replies: u64,
    pub records: usize,
    #[serde(default)]
    pub fills: u64,
    #[serde(default)]
    pub foreign: u64,
    #[serde(default)]
    pub baddst: u64,
    /// The (target, ttl, hop) triples which must appear in the output.
    #[serde(default)]
    pub hops: Vec<(IpAddr, u8, IpAddr)>,
}
