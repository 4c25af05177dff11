use crate::error::{Error, IoError, IoOperation, Result};
use crate::status::Status;
use crate::trie::{Family, PrefixTrie};
use ipnetwork::IpNetwork;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::IpAddr;
use std::path::Path;
use tracing::instrument;

/// The origin ASN recorded for a blocked prefix.
pub const BLOCKED_ASN: u32 = 0;

/// The payload of a routed (or blocked) prefix.
#[derive(Debug, Default)]
pub struct RouteInfo {
    pub asn: u32,
    pub status: Mutex<Status>,
}

impl RouteInfo {
    #[must_use]
    pub fn new(asn: u32) -> Self {
        Self {
            asn,
            status: Mutex::new(Status::default()),
        }
    }

    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        self.asn == BLOCKED_ASN
    }
}

/// A trie of routed prefixes.
pub type RouteTable = PrefixTrie<RouteInfo>;

/// Load a blocklist, one `prefix/len` per line, returning the number of prefixes added.
///
/// Blank lines and `#` comments are ignored; any other malformed line is an error.  Prefixes of
/// the other address family are skipped.
#[instrument(skip(table, reader), level = "debug")]
pub fn load_blocklist<R: BufRead>(table: &mut RouteTable, reader: R) -> Result<usize> {
    let before = table.len();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|err| IoError::Other(err, IoOperation::ReadInput))?;
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        let prefix = parse_block_line(text).ok_or_else(|| Error::BadPrefix {
            line: index + 1,
            text: text.to_string(),
        })?;
        if family_of(prefix) == table.family() {
            table.insert(prefix, RouteInfo::new(BLOCKED_ASN))?;
        }
    }
    let added = table.len() - before;
    tracing::debug!(added, "loaded blocklist");
    Ok(added)
}

/// Load a BGP table, returning the number of prefixes added.
///
/// Each line names a prefix (first token) and its origin ASN (last token).  Lines which cannot
/// be parsed, lines of the other address family and prefixes covered by a blocked prefix are
/// skipped.
#[instrument(skip(table, reader), level = "debug")]
pub fn load_bgp_table<R: BufRead>(table: &mut RouteTable, reader: R) -> Result<usize> {
    let before = table.len();
    let mut skipped = 0_usize;
    for line in reader.lines() {
        let line = line.map_err(|err| IoError::Other(err, IoOperation::ReadInput))?;
        let Some((prefix, asn)) = parse_bgp_line(&line) else {
            skipped += 1;
            continue;
        };
        if family_of(prefix) != table.family() {
            continue;
        }
        let blocked = table
            .lookup_best(prefix, true)
            .and_then(|id| table.payload(id))
            .is_some_and(RouteInfo::is_blocked);
        if blocked {
            tracing::trace!(%prefix, "prefix is blocked");
            continue;
        }
        table.insert(prefix, RouteInfo::new(asn))?;
    }
    let added = table.len() - before;
    tracing::debug!(added, skipped, "loaded bgp table");
    Ok(added)
}

/// Build a route table for `family` from the files given.
pub fn load_route_table(
    family: Family,
    bgp_table: &Path,
    blocklist: Option<&Path>,
) -> Result<RouteTable> {
    let mut table = RouteTable::new(family);
    if let Some(blocklist) = blocklist {
        load_blocklist(&mut table, open(blocklist)?)?;
    }
    load_bgp_table(&mut table, open(bgp_table)?)?;
    tracing::info!(prefixes = table.len(), path = %bgp_table.display(), "route table ready");
    Ok(table)
}

/// Parse a BGP table line into its prefix and origin ASN.
///
/// A leading route selection marker such as `>` or `*>` is stripped from the prefix.
#[must_use]
pub fn parse_bgp_line(line: &str) -> Option<(IpNetwork, u32)> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;
    let last = tokens.last()?;
    let prefix = first
        .trim_start_matches(|c: char| c == '*' || c == '>')
        .parse::<IpNetwork>()
        .ok()?;
    let asn = last
        .trim_matches(|c: char| !c.is_ascii_digit())
        .parse::<u32>()
        .ok()?;
    Some((prefix, asn))
}

/// Parse a blocklist line, ignoring embedded whitespace.
#[must_use]
pub fn parse_block_line(line: &str) -> Option<IpNetwork> {
    let compact = line.split_whitespace().collect::<String>();
    let (addr, len) = compact.split_once('/')?;
    IpNetwork::new(addr.parse::<IpAddr>().ok()?, len.parse().ok()?).ok()
}

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|err| Error::IoError(IoError::Other(err, IoOperation::ReadInput)))
}

const fn family_of(prefix: IpNetwork) -> Family {
    match prefix {
        IpNetwork::V4(_) => Family::V4,
        IpNetwork::V6(_) => Family::V6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use test_case::test_case;

    #[test_case("1.0.0.0/24 203.0.113.1 0 13335", "1.0.0.0/24", 13335)]
    #[test_case(">1.0.4.0/22 203.0.113.1 4608", "1.0.4.0/22", 4608)]
    #[test_case("*>8.8.8.0/24 x 15169", "8.8.8.0/24", 15169)]
    #[test_case("*>2001:db8::/32 :: {64496}", "2001:db8::/32", 64496; "braced asn set")]
    fn test_parse_bgp_line(line: &str, prefix: &str, asn: u32) {
        let expected = prefix.parse::<IpNetwork>().unwrap();
        assert_eq!(Some((expected, asn)), parse_bgp_line(line));
    }

    #[test_case(""; "empty")]
    #[test_case("not-a-prefix 1"; "bad prefix")]
    #[test_case("10.0.0.0/8"; "missing asn")]
    #[test_case("*> 8.8.8.0/24 x 15169"; "detached marker")]
    #[test_case("10.0.0.0/8 x i"; "bad asn")]
    fn test_parse_bad_bgp_line(line: &str) {
        assert_eq!(None, parse_bgp_line(line));
    }

    #[test]
    fn test_parse_block_line() {
        assert_eq!(
            Some("192.0.2.0/24".parse().unwrap()),
            parse_block_line(" 192.0.2.0 / 24 ")
        );
        assert_eq!(None, parse_block_line("192.0.2.0"));
        assert_eq!(None, parse_block_line("192.0.2.0/33"));
    }

    #[test]
    fn test_blocked_prefix_not_inserted() {
        let mut table = RouteTable::new(Family::V4);
        let blocked = load_blocklist(&mut table, "# comment\n\n10.0.0.0/8\n".as_bytes()).unwrap();
        assert_eq!(1, blocked);
        let bgp = "10.1.0.0/16 x 100\n11.0.0.0/8 x 200\n2001:db8::/32 x 300\ngarbage\n";
        let added = load_bgp_table(&mut table, bgp.as_bytes()).unwrap();
        assert_eq!(1, added);
        let blocked = table.get(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3))).unwrap();
        assert!(blocked.is_blocked());
        let routed = table.get(IpAddr::V4(Ipv4Addr::new(11, 1, 2, 3))).unwrap();
        assert_eq!(200, routed.asn);
        assert!(table.get(IpAddr::V4(Ipv4Addr::new(12, 0, 0, 1))).is_none());
    }

    #[test]
    fn test_bad_blocklist_line() {
        let mut table = RouteTable::new(Family::V4);
        let err = load_blocklist(&mut table, "10.0.0.0/8\nbogus\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::BadPrefix { line: 2, .. }));
    }

    #[test]
    fn test_first_writer_wins() {
        let mut table = RouteTable::new(Family::V4);
        let bgp = "192.0.2.0/24 x 1\n192.0.2.0/24 x 2\n";
        assert_eq!(1, load_bgp_table(&mut table, bgp.as_bytes()).unwrap());
        let route = table.get(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))).unwrap();
        assert_eq!(1, route.asn);
    }
}
