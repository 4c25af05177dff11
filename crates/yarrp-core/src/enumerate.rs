use crate::bgp::RouteTable;
use crate::config::{ScanConfig, Targets};
use crate::error::{Error, Result};
use crate::stats::Stats;
use crate::types::Target;
use std::sync::Arc;

/// Enumerate an explicit list of addresses.
mod list;

/// Enumerate CIDR blocks.
mod subnet;

/// Enumerate the entire routed Internet.
mod entire;

pub use entire::{EntireV4, EntireV6};
pub use list::{parse_targets, ListEnumerator};
pub use subnet::SubnetEnumerator;

/// The source of (address, TTL) pairs to probe.
#[derive(Debug)]
pub enum Enumerator {
    List(ListEnumerator),
    Subnet(SubnetEnumerator),
    EntireV4(EntireV4),
    EntireV6(EntireV6),
}

impl Enumerator {
    /// Create the enumerator for the targets of `config`.
    ///
    /// Entire-Internet scans need the route table and tally the candidates they skip in `stats`.
    pub fn new(
        config: &ScanConfig,
        routes: Option<Arc<RouteTable>>,
        stats: Arc<Stats>,
    ) -> Result<Self> {
        match &config.targets {
            Targets::List { addrs, .. } => Ok(Self::List(ListEnumerator::new(
                addrs.clone(),
                config,
            )?)),
            Targets::Subnets(subnets) => Ok(Self::Subnet(SubnetEnumerator::new(
                subnets.clone(),
                config,
            )?)),
            Targets::Entire => {
                let routes = routes.ok_or_else(|| {
                    Error::BadConfig(String::from("entire mode requires a bgp table"))
                })?;
                if config.is_ipv6() {
                    Ok(Self::EntireV6(EntireV6::new(config, routes, stats)?))
                } else {
                    Ok(Self::EntireV4(EntireV4::new(config, routes, stats)?))
                }
            }
        }
    }

    /// The next pair to probe, or `None` once the enumeration is exhausted.
    pub fn next_address(&mut self) -> Option<Target> {
        match self {
            Self::List(inner) => inner.next_address(),
            Self::Subnet(inner) => inner.next_address(),
            Self::EntireV4(inner) => inner.next_address(),
            Self::EntireV6(inner) => inner.next_address(),
        }
    }

    /// The number of pairs this enumeration covers.
    ///
    /// For an entire-Internet scan this is the size of the permuted space, not the number of
    /// candidates which survive filtering.
    #[must_use]
    pub fn total(&self) -> u64 {
        match self {
            Self::List(inner) => inner.total(),
            Self::Subnet(inner) => inner.total(),
            Self::EntireV4(inner) => inner.total(),
            Self::EntireV6(inner) => inner.total(),
        }
    }
}

impl Iterator for Enumerator {
    type Item = Target;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_address()
    }
}

/// The number of bits needed to encode `span` TTL offsets.
const fn ttl_bits(span: u8) -> u32 {
    u32::BITS - (span as u32).saturating_sub(1).leading_zeros()
}
