use crate::bgp::RouteTable;
use crate::config::ScanConfig;
use crate::constants::MAX_ENTIRE_TTL;
use crate::error::Result;
use crate::permutation::{Cipher, Mode, Permutation};
use crate::stats::{Counter, Stats};
use crate::types::Target;
use ipnetwork::IpNetwork;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

/// The permuted space of an entire `IPv4` scan: a /24 and a TTL per value.
const ENTIRE_V4_RANGE: u64 = 1 << 32;

/// The permuted space of an entire `IPv6` scan: a /48 candidate and a TTL per value.
const ENTIRE_V6_RANGE: u64 = (1 << 48) - 1;

/// Outcome of checking a candidate against the route table.
enum Routed {
    Yes,
    Unrouted,
    Blocked,
}

fn routed(routes: &RouteTable, addr: IpAddr) -> Routed {
    match routes.get(addr) {
        Some(route) if route.is_blocked() => Routed::Blocked,
        Some(_) => Routed::Yes,
        None => Routed::Unrouted,
    }
}

/// Walk every routed /24 of the `IPv4` Internet at every TTL, in a keyed random order.
#[derive(Debug)]
pub struct EntireV4 {
    perm: Permutation,
    routes: Arc<RouteTable>,
    stats: Arc<Stats>,
    min_ttl: u8,
    max_ttl: u8,
}

impl EntireV4 {
    pub fn new(config: &ScanConfig, routes: Arc<RouteTable>, stats: Arc<Stats>) -> Result<Self> {
        let perm = Permutation::from_seed(ENTIRE_V4_RANGE, Mode::Cycle, config.cipher, config.seed)?;
        Ok(Self {
            perm,
            routes,
            stats,
            min_ttl: config.min_ttl.0,
            max_ttl: config.max_ttl.0,
        })
    }

    pub fn next_address(&mut self) -> Option<Target> {
        loop {
            let value = self.perm.next_value().ok()?;
            let [b0, b1, b2, ttl] = (value as u32).to_le_bytes();
            if u32::from(ttl) >= u32::from(MAX_ENTIRE_TTL) {
                self.stats.incr(Counter::TtlOutside);
                continue;
            }
            if ttl >= self.max_ttl {
                continue;
            }
            let host = b0.wrapping_add(b1).wrapping_add(b2);
            let addr = Ipv4Addr::new(b0, b1, b2, host);
            match routed(&self.routes, IpAddr::V4(addr)) {
                Routed::Yes => {}
                Routed::Unrouted => {
                    self.stats.incr(Counter::BgpOutside);
                    continue;
                }
                Routed::Blocked => {
                    self.stats.incr(Counter::AdrOutside);
                    continue;
                }
            }
            let ttl = ttl + 1;
            if ttl < self.min_ttl {
                self.stats.incr(Counter::TtlOutside);
                continue;
            }
            return Some(Target::new(addr, ttl));
        }
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.perm.range()
    }
}

/// Walk candidate /48s of the global unicast `IPv6` space, in a keyed random order.
///
/// Each 48 bit permuted value carries 44 bits of prefix and 4 bits of TTL.  A candidate is
/// probed only if it falls inside one of the allowed prefixes and is routed.
#[derive(Debug)]
pub struct EntireV6 {
    perm: Permutation,
    routes: Arc<RouteTable>,
    stats: Arc<Stats>,
    allowed: Vec<IpNetwork>,
    min_ttl: u8,
    max_ttl: u8,
}

impl EntireV6 {
    pub fn new(config: &ScanConfig, routes: Arc<RouteTable>, stats: Arc<Stats>) -> Result<Self> {
        let perm =
            Permutation::from_seed(ENTIRE_V6_RANGE, Mode::Cycle, Cipher::Speck, config.seed)?;
        Ok(Self {
            perm,
            routes,
            stats,
            allowed: config.allowed_ipv6.clone(),
            min_ttl: config.min_ttl.0,
            max_ttl: config.max_ttl.0,
        })
    }

    pub fn next_address(&mut self) -> Option<Target> {
        loop {
            let value = self.perm.next_value().ok()?;
            let (mut octets, ttl) = candidate(value);
            let net = IpAddr::V6(Ipv6Addr::from(octets));
            if !self.allowed.iter().any(|prefix| prefix.contains(net)) {
                self.stats.incr(Counter::BgpOutside);
                continue;
            }
            match routed(&self.routes, net) {
                Routed::Yes => {}
                Routed::Unrouted => {
                    self.stats.incr(Counter::BgpOutside);
                    continue;
                }
                Routed::Blocked => {
                    self.stats.incr(Counter::AdrOutside);
                    continue;
                }
            }
            if ttl > self.max_ttl {
                continue;
            }
            if ttl < self.min_ttl {
                self.stats.incr(Counter::TtlOutside);
                continue;
            }
            fill_host(&mut octets);
            return Some(Target::new(Ipv6Addr::from(octets), ttl));
        }
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.perm.range()
    }
}

/// Derive the low 32 bits of a candidate from its prefix.
///
/// The word is stored least significant byte first.
fn fill_host(octets: &mut [u8; 16]) {
    let low = ((u32::from(octets[0]) + u32::from(octets[1])) << 5) + u32::from(octets[4]);
    octets[12..].copy_from_slice(&low.to_le_bytes());
    octets[15] = octets[2].wrapping_add(octets[3]).wrapping_add(100);
}

/// Split a permuted value into a candidate /48 and a TTL.
fn candidate(value: u64) -> ([u8; 16], u8) {
    let b0 = (value & 0xff_ffff) as u32;
    let b1 = (value >> 24) as u32;
    let mut octets = [0_u8; 16];
    octets[0] = 0x20 | (b0 & 0xf) as u8;
    octets[1] = (b0 >> 4) as u8;
    octets[2] = (b0 >> 12) as u8;
    octets[3] = ((((b0 >> 20) & 0xf) << 4) | (b1 & 0xf)) as u8;
    octets[4] = (b1 >> 4) as u8;
    octets[5] = (b1 >> 12) as u8;
    let ttl = ((b1 >> 20) & 0xf) as u8 + 1;
    (octets, ttl)
}
