use bitflags::bitflags;
use derive_more::{Add, AddAssign, Sub};
use std::fmt::{Display, Formatter};
use std::net::IpAddr;

/// `TimeToLive` (ttl) newtype.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Hash, Add, Sub, AddAssign,
)]
pub struct TimeToLive(pub u8);

/// `InstanceId` newtype.
///
/// Carried in every probe so that concurrent scanners sharing a host can ignore each other's
/// replies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Hash)]
pub struct InstanceId(pub u8);

/// Port newtype.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd)]
pub struct Port(pub u16);

/// A single (address, TTL) pair to be probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub addr: IpAddr,
    pub ttl: TimeToLive,
}

impl Target {
    #[must_use]
    pub fn new(addr: impl Into<IpAddr>, ttl: u8) -> Self {
        Self {
            addr: addr.into(),
            ttl: TimeToLive(ttl),
        }
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ttl {}", self.addr, self.ttl.0)
    }
}

bitflags! {
    /// Conditions found while decoding a reply.
    ///
    /// A reply carrying any anomaly is still recorded but does not update the prefix trie or the
    /// TTL histograms.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct Anomaly: u8 {
        /// The decoded send time lies in the future.
        const RTT_UNDERFLOW = 1;
        /// The quoted source port does not match the checksum of the quoted destination.
        const BAD_DESTINATION = 2;
        /// The quote was too short to recover the probe state.
        const TRUNCATED = 4;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_ttl_arithmetic() {
        let mut ttl = TimeToLive(3) + TimeToLive(2);
        ttl += TimeToLive(1);
        assert_eq!(TimeToLive(6), ttl);
        assert_eq!(TimeToLive(4), ttl - TimeToLive(2));
    }

    #[test]
    fn test_target_display() {
        let target = Target::new(Ipv4Addr::new(192, 0, 2, 7), 12);
        assert_eq!("192.0.2.7 ttl 12", target.to_string());
    }
}
