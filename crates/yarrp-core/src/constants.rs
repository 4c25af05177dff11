use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

/// The largest TTL an entire-Internet scan can draw from a permutation value.
pub const MAX_ENTIRE_TTL: u8 = 32;

/// The number of consecutive empty receive waits after which the receiver gives up.
pub const MAX_NULL_READS: u32 = 10;

/// How long the receiver waits for a reply before counting an empty read.
pub const NULL_READ_WAIT: Duration = Duration::from_secs(5);

/// The delay before an entire-Internet scan starts probing, giving the receiver time to settle.
pub const ENTIRE_STARTUP_DELAY: Duration = Duration::from_secs(10);

/// The number of `MPLS` label stack entries kept per reply.
pub const MAX_MPLS_LABELS: usize = 16;

/// Below this many permuted values an `IPv4` target list uses a prefix table.
pub const LIST_PREFIX_TABLE_V4: u64 = 1_000_000;

/// Below this many permuted values an `IPv6` target list uses a prefix table.
pub const LIST_PREFIX_TABLE_V6: u64 = 5_000_000;

/// Below this many permuted values per block a subnet scan uses a prefix table.
pub const SUBNET_PREFIX_TABLE: u64 = 500_000;

/// A TTL stops being probed once it yields no new router for this many milliseconds.
pub const NEIGHBORHOOD_QUIET_MS: u32 = 30_000;

/// A TTL stops being probed once fewer than this fraction of its replies reveal a new router.
pub const NEIGHBORHOOD_DISCOVERY_THRESHOLD: f64 = 0.05;

/// The time range over which a silent prefix decays towards a deeper TTL, in milliseconds.
pub const PREFIX_DECAY_RANGE_MS: u32 = 60_000;

/// Scans smaller than this many probes do not report progress.
pub const PROGRESS_MIN_PROBES: u64 = 10_000;

/// The number of progress reports emitted over a scan.
pub const PROGRESS_STEPS: u64 = 1_000;

/// The receive buffer requested for the raw `ICMP` socket.
pub const RECV_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// The address used to discover an `IPv4` source address when no target gives one.
pub const DISCOVERY_TARGET_V4: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);

/// The address used to discover an `IPv6` source address when no target gives one.
pub const DISCOVERY_TARGET_V6: Ipv6Addr = Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8888);
