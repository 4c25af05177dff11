//! yarrp - a stateless, randomized Internet-scale traceroute engine.
//!
//! Probes carry all the state needed to interpret their replies: the TTL and scanner instance in
//! the network header, the send time in a transport field and a checksum of the destination so a
//! quoted reply can be verified.  Targets are visited in the order of a keyed permutation, so a
//! scan needs neither per-probe state nor a visited set, and adjacent probes rarely share a path.
//!
//! # Example
//!
//! The following example scans two subnets with `ICMP` echo probes at 1000 probes per second
//! and writes the replies to a file:
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use yarrp_core::{Builder, ProbeType, Targets};
//!
//! let targets = Targets::Subnets(vec!["192.0.2.0/24".parse()?, "198.51.100.0/23".parse()?]);
//! let scanner = Builder::new(targets)
//!     .probe_type(ProbeType::Icmp)
//!     .rate(1000)
//!     .build()?;
//! let stats = scanner.run(std::fs::File::create("output.yrp")?)?;
//! println!("{stats}");
//! # Ok(())
//! # }
//! ```
//!
//! # See Also
//!
//! - [`Builder`] - Build a [`Scanner`].
//! - [`Scanner::run`] - Run a scan over raw sockets.
//! - [`Scanner::run_with`] - Run a scan over caller supplied endpoints.

mod builder;
mod config;
mod constants;
mod error;
mod histogram;
mod lock;
mod pacer;
mod record;
mod scanner;
mod stats;
mod status;
mod types;

/// Route tables read from BGP and blocklist files.
pub mod bgp;

/// Probe encoding and reply decoding.
pub mod codec;

/// The sources of (address, TTL) pairs.
pub mod enumerate;

/// Network sockets and channels.
pub mod net;

/// Keyed pseudorandom permutations.
pub mod permutation;

/// Longest prefix match tries.
pub mod trie;

pub use builder::Builder;
pub use config::{
    defaults, ProbeMode, ProbeType, Protocol, ScanConfig, ScanOrder, Targets, TimeUnit,
};
pub use constants::{MAX_ENTIRE_TTL, MAX_MPLS_LABELS};
pub use error::{Error, ErrorKind, IoError, IoOperation, IoResult, PermError, PermResult, Result};
pub use histogram::{decay_prob, poisson_pmf, TtlController, TtlHistogram};
pub use lock::InstanceLock;
pub use pacer::Pacer;
pub use record::RecordWriter;
pub use scanner::{Endpoints, Scanner};
pub use stats::{Counter, Snapshot, Stats};
pub use status::Status;
pub use types::{Anomaly, InstanceId, Port, Target, TimeToLive};
