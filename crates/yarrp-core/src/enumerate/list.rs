use crate::config::ScanConfig;
use crate::constants::{LIST_PREFIX_TABLE_V4, LIST_PREFIX_TABLE_V6};
use crate::error::{Error, IoError, IoOperation, Result};
use crate::permutation::{Mode, Permutation};
use crate::types::Target;
use std::io::BufRead;
use std::net::IpAddr;
use tracing::instrument;

/// Read target addresses, one per line.
///
/// Carriage returns are stripped and blank lines and `#` comments ignored.  Lines which do not
/// hold an address of the requested family are logged and skipped.
#[instrument(skip(reader), level = "debug")]
pub fn parse_targets<R: BufRead>(reader: R, ipv6: bool) -> Result<Vec<IpAddr>> {
    let mut addrs = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|err| IoError::Other(err, IoOperation::ReadInput))?;
        let text = line.replace('\r', "");
        let text = text.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        match text.parse::<IpAddr>() {
            Ok(addr) if addr.is_ipv6() == ipv6 => addrs.push(addr),
            Ok(addr) => tracing::warn!(line = index + 1, %addr, "skipping target of wrong family"),
            Err(_) => tracing::warn!(line = index + 1, text, "skipping invalid target"),
        }
    }
    tracing::debug!(targets = addrs.len(), "read targets");
    Ok(addrs)
}

#[derive(Debug)]
enum Walk {
    Sequential { index: usize, offset: u8 },
    Random(Permutation),
}

/// Enumerate every TTL of every address in a list.
#[derive(Debug)]
pub struct ListEnumerator {
    addrs: Vec<IpAddr>,
    min_ttl: u8,
    span: u8,
    walk: Walk,
}

impl ListEnumerator {
    pub fn new(addrs: Vec<IpAddr>, config: &ScanConfig) -> Result<Self> {
        if addrs.is_empty() {
            return Err(Error::BadConfig(String::from("empty target list")));
        }
        let span = config.ttl_span();
        let walk = if config.scan_order.is_random() {
            let range = addrs.len() as u64 * u64::from(span);
            let prefix_table_below = if config.is_ipv6() {
                if range >= LIST_PREFIX_TABLE_V6 {
                    tracing::warn!(
                        range,
                        "reduced performance with this many targets, use fewer targets or a lower max ttl"
                    );
                }
                LIST_PREFIX_TABLE_V6
            } else {
                LIST_PREFIX_TABLE_V4
            };
            Walk::Random(Permutation::from_seed(
                range,
                Mode::Auto { prefix_table_below },
                config.cipher,
                config.seed,
            )?)
        } else {
            Walk::Sequential {
                index: 0,
                offset: 0,
            }
        };
        Ok(Self {
            addrs,
            min_ttl: config.min_ttl.0,
            span,
            walk,
        })
    }

    pub fn next_address(&mut self) -> Option<Target> {
        match &mut self.walk {
            Walk::Sequential { index, offset } => {
                let addr = *self.addrs.get(*index)?;
                let ttl = self.min_ttl + *offset;
                *offset += 1;
                if *offset == self.span {
                    *offset = 0;
                    *index += 1;
                }
                Some(Target::new(addr, ttl))
            }
            Walk::Random(perm) => {
                let value = perm.next_value().ok()?;
                let span = u64::from(self.span);
                let addr = *self.addrs.get(usize::try_from(value / span).ok()?)?;
                Some(Target::new(addr, self.min_ttl + (value % span) as u8))
            }
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.addrs.len() as u64 * u64::from(self.span)
    }
}
