use super::ttl_bits;
use crate::config::ScanConfig;
use crate::constants::SUBNET_PREFIX_TABLE;
use crate::error::{Error, Result};
use crate::permutation::{Mode, Permutation};
use crate::types::Target;
use ipnetwork::IpNetwork;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// The longest `IPv6` prefix which may be enumerated.
const MAX_IPV6_PREFIX: u8 = 64;

/// A CIDR block split into /24 (`IPv4`) or /48 (`IPv6`) units.
#[derive(Debug, Clone, Copy)]
struct Block {
    base: u128,
    units: u64,
    /// The first permuted value belonging to this block.
    start: u64,
}

#[derive(Debug)]
enum Walk {
    Sequential {
        block: usize,
        unit: u64,
        offset: u8,
    },
    Random(Permutation),
}

/// Enumerate one address per /24 or /48 of a set of blocks, at every TTL.
#[derive(Debug)]
pub struct SubnetEnumerator {
    blocks: Vec<Block>,
    ipv6: bool,
    min_ttl: u8,
    span: u8,
    ttl_bits: u32,
    walk: Walk,
    rng: StdRng,
}

impl SubnetEnumerator {
    pub fn new(subnets: Vec<IpNetwork>, config: &ScanConfig) -> Result<Self> {
        if subnets.is_empty() {
            return Err(Error::BadConfig(String::from("empty subnet list")));
        }
        let ipv6 = config.is_ipv6();
        let span = config.ttl_span();
        let ttl_bits = ttl_bits(span);
        let mut start = 0_u64;
        let mut blocks = Vec::with_capacity(subnets.len());
        for subnet in subnets {
            let (base, units) = match subnet {
                IpNetwork::V4(net) if !ipv6 => {
                    let base = u32::from(net.network()) & 0xffff_ff00;
                    (u128::from(base), 1_u64 << 24_u8.saturating_sub(net.prefix()))
                }
                IpNetwork::V6(net) if ipv6 => {
                    if net.prefix() > MAX_IPV6_PREFIX {
                        return Err(Error::BadConfig(format!(
                            "ipv6 subnet {subnet} is longer than /{MAX_IPV6_PREFIX}"
                        )));
                    }
                    (
                        u128::from(net.network()),
                        1_u64 << 48_u8.saturating_sub(net.prefix()),
                    )
                }
                _ => return Err(Error::AddressFamily(subnet.to_string())),
            };
            blocks.push(Block { base, units, start });
            start = start.saturating_add(units << ttl_bits);
        }
        let walk = if config.scan_order.is_random() {
            Walk::Random(Permutation::from_seed(
                start,
                Mode::Auto {
                    prefix_table_below: SUBNET_PREFIX_TABLE,
                },
                config.cipher,
                config.seed,
            )?)
        } else {
            Walk::Sequential {
                block: 0,
                unit: 0,
                offset: 0,
            }
        };
        tracing::debug!(blocks = blocks.len(), range = start, ttl_bits, "subnets ready");
        Ok(Self {
            blocks,
            ipv6,
            min_ttl: config.min_ttl.0,
            span,
            ttl_bits,
            walk,
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    pub fn next_address(&mut self) -> Option<Target> {
        match &mut self.walk {
            Walk::Sequential {
                block,
                unit,
                offset,
            } => {
                let current = *self.blocks.get(*block)?;
                let ttl = self.min_ttl + *offset;
                let target = *unit;
                *offset += 1;
                if *offset == self.span {
                    *offset = 0;
                    *unit += 1;
                    if *unit == current.units {
                        *unit = 0;
                        *block += 1;
                    }
                }
                Some(Target::new(self.sequential_addr(current, target), ttl))
            }
            Walk::Random(perm) => loop {
                let value = perm.next_value().ok()?;
                let index = self
                    .blocks
                    .partition_point(|block| block.start <= value)
                    .checked_sub(1)?;
                let block = self.blocks[index];
                let offset = value - block.start;
                let ttl_offset = offset & ((1 << self.ttl_bits) - 1);
                if ttl_offset >= u64::from(self.span) {
                    continue;
                }
                let ttl = self.min_ttl + ttl_offset as u8;
                let unit = offset >> self.ttl_bits;
                let addr = random_addr(self.ipv6, &mut self.rng, block, unit);
                break Some(Target::new(addr, ttl));
            },
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.blocks.iter().map(|block| block.units).sum::<u64>() * u64::from(self.span)
    }

    fn sequential_addr(&self, block: Block, unit: u64) -> IpAddr {
        if self.ipv6 {
            IpAddr::V6(Ipv6Addr::from(v6_unit(block, unit) | 1))
        } else {
            IpAddr::V4(Ipv4Addr::from(v4_unit(block, unit) | 1))
        }
    }
}

/// A random interface identifier within the /48 (`IPv6`), or a host derived from the /24
/// (`IPv4`).
///
/// The identifier only fills the host bits below /64, the network's own bits are kept.
fn random_addr(ipv6: bool, rng: &mut StdRng, block: Block, unit: u64) -> IpAddr {
    if ipv6 {
        let iid = (u64::from(rng.gen::<u32>()) << 32) | u64::from(rng.gen::<u32>());
        let net = v6_unit(block, unit);
        IpAddr::V6(Ipv6Addr::from((net & !u128::from(u64::MAX)) | u128::from(iid)))
    } else {
        let net = v4_unit(block, unit);
        let host = net
            .to_be_bytes()
            .iter()
            .fold(127_u8, |sum, &octet| sum.wrapping_add(octet));
        IpAddr::V4(Ipv4Addr::from(net | u32::from(host)))
    }
}

fn v4_unit(block: Block, unit: u64) -> u32 {
    (block.base as u32).wrapping_add((unit as u32) << 8) & 0xffff_ff00
}

fn v6_unit(block: Block, unit: u64) -> u128 {
    block.base.wrapping_add(u128::from(unit) << 80)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProbeType, ScanOrder};
    use crate::types::TimeToLive;
    use std::collections::HashSet;
    use test_case::test_case;

    fn config(max_ttl: u8, scan_order: ScanOrder, probe_type: ProbeType) -> ScanConfig {
        ScanConfig {
            max_ttl: TimeToLive(max_ttl),
            scan_order,
            probe_type,
            seed: 99,
            ..ScanConfig::default()
        }
    }

    fn nets(subnets: &[&str]) -> Vec<IpNetwork> {
        subnets.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn test_sequential_v4() {
        let config = config(2, ScanOrder::Sequential, ProbeType::TcpAck);
        let mut subnets = SubnetEnumerator::new(nets(&["10.0.0.0/23"]), &config).unwrap();
        assert_eq!(4, subnets.total());
        let targets = std::iter::from_fn(|| subnets.next_address()).collect::<Vec<_>>();
        assert_eq!(
            vec![
                Target::new(Ipv4Addr::new(10, 0, 0, 1), 1),
                Target::new(Ipv4Addr::new(10, 0, 0, 1), 2),
                Target::new(Ipv4Addr::new(10, 0, 1, 1), 1),
                Target::new(Ipv4Addr::new(10, 0, 1, 1), 2),
            ],
            targets
        );
    }

    #[test]
    fn test_random_v4_host_offset() {
        let config = config(3, ScanOrder::Random, ProbeType::Udp);
        let mut subnets =
            SubnetEnumerator::new(nets(&["10.0.0.0/23", "192.0.2.64/26"]), &config).unwrap();
        assert_eq!(9, subnets.total());
        let targets = std::iter::from_fn(|| subnets.next_address()).collect::<HashSet<_>>();
        let expected = [
            Ipv4Addr::new(10, 0, 0, 137),
            Ipv4Addr::new(10, 0, 1, 138),
            Ipv4Addr::new(192, 0, 2, 65),
        ]
        .into_iter()
        .flat_map(|addr| (1..=3).map(move |ttl| Target::new(addr, ttl)))
        .collect::<HashSet<_>>();
        assert_eq!(expected, targets);
    }

    #[test]
    fn test_random_v6_units() {
        let config = config(4, ScanOrder::Random, ProbeType::Icmp6);
        let mut subnets = SubnetEnumerator::new(nets(&["2001:db8::/47"]), &config).unwrap();
        assert_eq!(8, subnets.total());
        let targets = std::iter::from_fn(|| subnets.next_address()).collect::<Vec<_>>();
        assert_eq!(8, targets.len());
        let units = targets
            .iter()
            .map(|target| match target.addr {
                IpAddr::V6(addr) => u128::from(addr) >> 80,
                IpAddr::V4(_) => unreachable!(),
            })
            .collect::<HashSet<_>>();
        assert_eq!(HashSet::from([0x2001_0db8_0000, 0x2001_0db8_0001]), units);
        assert!(targets.iter().all(|target| (1..=4).contains(&target.ttl.0)));
    }

    #[test]
    fn test_sequential_v6_host() {
        let config = config(1, ScanOrder::Sequential, ProbeType::Udp6);
        let mut subnets = SubnetEnumerator::new(nets(&["2001:db8:5::/48"]), &config).unwrap();
        assert_eq!(
            Some(Target::new("2001:db8:5::1".parse::<Ipv6Addr>().unwrap(), 1)),
            subnets.next_address()
        );
        assert_eq!(None, subnets.next_address());
    }

    #[test_case("2001:db8:5:7::/64", 0x2001_0db8_0005_0007; "slash 64")]
    #[test_case("2001:db8:5:700::/56", 0x2001_0db8_0005_0700; "slash 56")]
    fn test_random_v6_keeps_network_bits(subnet: &str, network: u64) {
        let config = config(2, ScanOrder::Random, ProbeType::Udp6);
        let mut subnets = SubnetEnumerator::new(nets(&[subnet]), &config).unwrap();
        assert_eq!(2, subnets.total());
        let targets = std::iter::from_fn(|| subnets.next_address()).collect::<Vec<_>>();
        assert_eq!(2, targets.len());
        for target in targets {
            let IpAddr::V6(addr) = target.addr else {
                panic!("expected an ipv6 target");
            };
            assert_eq!(network, (u128::from(addr) >> 64) as u64);
        }
    }

    #[test]
    fn test_long_v6_prefix_rejected() {
        let config = config(4, ScanOrder::Random, ProbeType::Icmp6);
        let err = SubnetEnumerator::new(nets(&["2001:db8::/80"]), &config).unwrap_err();
        assert!(matches!(err, Error::BadConfig(_)));
    }

    #[test]
    fn test_family_mismatch() {
        let config = config(4, ScanOrder::Random, ProbeType::Icmp);
        let err = SubnetEnumerator::new(nets(&["2001:db8::/48"]), &config).unwrap_err();
        assert!(matches!(err, Error::AddressFamily(_)));
    }
}
