use crate::codec::Reply;
use crate::config::{ScanConfig, Targets};
use crate::error::{IoError, IoOperation, Result};
use crate::stats::Snapshot;
use chrono::{DateTime, Local, Utc};
use itertools::Itertools;
use std::io::Write;
use std::net::IpAddr;

/// The column names written at the end of the header.
const COLUMNS: &str =
    "target, sec, usec, type, code, ttl, hop, rtt, ipid, psize, rsize, rttl, rtos, mpls, count";

/// Writes the `.yrp` text output of a scan.
///
/// The file is a `#` comment header describing the scan, one space separated line per reply and
/// a `#` comment trailer with the final counters.
pub struct RecordWriter<W: Write> {
    out: W,
}

impl<W: Write> RecordWriter<W> {
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write_header(
        &mut self,
        config: &ScanConfig,
        source: IpAddr,
        started: DateTime<Local>,
    ) -> Result<()> {
        let mut header = vec![
            format!("yarrp v{}", env!("CARGO_PKG_VERSION")),
            format!("Started: {}", started.format("%a %b %e %T %Y")),
            format!("Source: {source}"),
            format!(
                "Trace type: {} ({})",
                config.probe_type,
                config.probe_type.id()
            ),
            format!("Rate: {} pps", config.rate),
        ];
        header.push(match &config.targets {
            Targets::List { source, .. } => format!("Target file: {source}"),
            Targets::Subnets(subnets) => format!("Targets: {}", subnets.iter().join(" ")),
            Targets::Entire => String::from("Targets: entire"),
        });
        header.push(format!(
            "Probing: Random: {} Seed: {} Mode: {:?}",
            u8::from(config.scan_order.is_random()),
            config.seed,
            config.probe_mode
        ));
        header.push(format!(
            "TTL control: Max: {} Fill: {} Poisson: {} Nbrhood: {}",
            config.max_ttl.0, config.fill_ttl.0, config.poisson, config.neighborhood.0
        ));
        if let Some(bgp_table) = &config.bgp_table {
            header.push(format!("BGP table: {}", bgp_table.display()));
        }
        header.push(format!("RTT granularity: {}", config.time_unit));
        header.push(String::from(COLUMNS));
        for line in header {
            self.line(&format!("# {line}"))?;
        }
        Ok(())
    }

    /// Write one reply, received at `received`, after `count` probes had been sent.
    ///
    /// A reply with anomalies is preceded by a `# Anomaly:` comment naming them.
    pub fn write_reply(&mut self, reply: &Reply, received: DateTime<Utc>, count: u64) -> Result<()> {
        if !reply.anomalies.is_empty() {
            let names = reply.anomalies.iter_names().map(|(name, _)| name).join(",");
            self.line(&format!("# Anomaly: {names}"))?;
        }
        let mpls = if reply.mpls.is_empty() {
            String::from("0")
        } else {
            reply
                .mpls
                .iter()
                .map(|member| format!("{}:{}", member.label, member.ttl))
                .join(",")
        };
        self.line(&format!(
            "{} {} {} {} {} {} {} {} {} {} {} {} {} {} {}",
            reply.target,
            received.timestamp(),
            received.timestamp_subsec_micros(),
            reply.icmp_type,
            reply.icmp_code,
            reply.ttl,
            reply.hop,
            reply.rtt,
            reply.ipid,
            reply.probe_size,
            reply.reply_size,
            reply.reply_ttl,
            reply.reply_tos,
            mpls,
            count
        ))
    }

    pub fn write_trailer(&mut self, stats: &Snapshot, ended: DateTime<Local>) -> Result<()> {
        let trailer = [
            format!("End: {}", ended.format("%a, %d %b %Y %T %z")),
            format!("Bad_Resp: {}", stats.baddst),
            format!("Rtt_Anomaly: {}", stats.rtt_anomaly),
            format!("Fills: {}", stats.fills),
            format!("Outside_TTL: {}", stats.ttl_outside),
            format!("Outside_BGP: {}", stats.bgp_outside),
            format!("Outside_Addr: {}", stats.adr_outside),
            format!("Skipped_Nbr: {}", stats.nbr_skipped),
            format!("Skipped_BGP: {}", stats.bgp_skipped),
            format!("Replies: {}", stats.replies),
            format!("Foreign: {}", stats.foreign),
            format!("Pkts: {}", stats.count),
            format!("Elapsed: {:.2}s", stats.elapsed.as_secs_f64()),
            format!("PPS: {:.2}", stats.pps()),
        ];
        for line in trailer {
            self.line(&format!("# {line}"))?;
        }
        self.line("#")?;
        self.flush()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out
            .flush()
            .map_err(|err| IoError::Other(err, IoOperation::WriteOutput).into())
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, line: &str) -> Result<()> {
        writeln!(self.out, "{line}").map_err(|err| IoError::Other(err, IoOperation::WriteOutput))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProbeType;
    use crate::types::{Anomaly, InstanceId, TimeToLive};
    use arrayvec::ArrayVec;
    use chrono::TimeZone;
    use std::net::Ipv4Addr;
    use std::path::PathBuf;
    use std::time::Duration;
    use yarrp_packet::icmp_extension::MplsLabelStackMember;

    fn reply() -> Reply {
        Reply {
            hop: IpAddr::V4(Ipv4Addr::new(203, 0, 113, 1)),
            target: IpAddr::V4(Ipv4Addr::new(198, 51, 100, 7)),
            icmp_type: 11,
            icmp_code: 0,
            protocol: 6,
            ttl: 4,
            instance: InstanceId(0),
            rtt: 15_321,
            sport: 0x1234,
            dport: 80,
            ipid: 4660,
            probe_size: 40,
            reply_size: 56,
            reply_ttl: 61,
            reply_tos: 0,
            mpls: ArrayVec::new(),
            anomalies: Anomaly::empty(),
        }
    }

    fn write<F>(f: F) -> String
    where
        F: FnOnce(&mut RecordWriter<Vec<u8>>) -> Result<()>,
    {
        let mut writer = RecordWriter::new(Vec::new());
        f(&mut writer).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn test_reply_line() {
        let received = Utc.timestamp_opt(1_700_000_000, 123_456_000).unwrap();
        let line = write(|writer| writer.write_reply(&reply(), received, 99));
        assert_eq!(
            "198.51.100.7 1700000000 123456 11 0 4 203.0.113.1 15321 4660 40 56 61 0 0 99\n",
            line
        );
    }

    #[test]
    fn test_anomalous_reply_is_marked() {
        let received = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut reply = reply();
        reply.anomalies = Anomaly::BAD_DESTINATION | Anomaly::RTT_UNDERFLOW;
        reply.rtt = 0;
        let output = write(|writer| writer.write_reply(&reply, received, 3));
        let lines = output.lines().collect::<Vec<_>>();
        assert_eq!(
            vec![
                "# Anomaly: RTT_UNDERFLOW,BAD_DESTINATION",
                "198.51.100.7 1700000000 0 11 0 4 203.0.113.1 0 4660 40 56 61 0 0 3",
            ],
            lines
        );
    }

    #[test]
    fn test_reply_line_with_mpls() {
        let mut reply = reply();
        for (label, ttl) in [(24_000, 1), (16, 255)] {
            reply.mpls.push(MplsLabelStackMember {
                label,
                exp: 0,
                bos: u8::from(ttl == 255),
                ttl,
            });
        }
        let received = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let line = write(|writer| writer.write_reply(&reply, received, 1));
        assert!(line.ends_with(" 24000:1,16:255 1\n"));
    }

    #[test]
    fn test_header() {
        let config = ScanConfig {
            targets: Targets::List {
                source: String::from("targets.txt"),
                addrs: vec![],
            },
            probe_type: ProbeType::Udp,
            rate: 500,
            max_ttl: TimeToLive(16),
            fill_ttl: TimeToLive(24),
            seed: 7,
            bgp_table: Some(PathBuf::from("rib.txt")),
            ..ScanConfig::default()
        };
        let started = Local.with_ymd_and_hms(2024, 3, 5, 9, 7, 1).unwrap();
        let header = write(|writer| {
            writer.write_header(&config, IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), started)
        });
        let lines = header.lines().collect::<Vec<_>>();
        assert_eq!(11, lines.len());
        assert!(lines.iter().all(|line| line.starts_with("# ")));
        assert_eq!("# Started: Tue Mar  5 09:07:01 2024", lines[1]);
        assert_eq!("# Source: 192.0.2.1", lines[2]);
        assert_eq!("# Trace type: UDP (3)", lines[3]);
        assert_eq!("# Rate: 500 pps", lines[4]);
        assert_eq!("# Target file: targets.txt", lines[5]);
        assert_eq!("# Probing: Random: 1 Seed: 7 Mode: Both", lines[6]);
        assert_eq!("# TTL control: Max: 16 Fill: 24 Poisson: 0 Nbrhood: 0", lines[7]);
        assert_eq!("# BGP table: rib.txt", lines[8]);
        assert_eq!("# RTT granularity: us", lines[9]);
        assert_eq!(format!("# {COLUMNS}"), lines[10]);
    }

    #[test]
    fn test_trailer() {
        let stats = Snapshot {
            elapsed: Duration::from_secs(4),
            count: 10,
            baddst: 2,
            fills: 1,
            replies: 6,
            ..Snapshot::default()
        };
        let ended = Local.with_ymd_and_hms(2024, 3, 5, 9, 7, 5).unwrap();
        let trailer = write(|writer| writer.write_trailer(&stats, ended));
        let lines = trailer.lines().collect::<Vec<_>>();
        assert!(lines[0].starts_with("# End: Tue, 05 Mar 2024 09:07:05 "));
        assert!(lines.contains(&"# Bad_Resp: 2"));
        assert!(lines.contains(&"# Fills: 1"));
        assert!(lines.contains(&"# Replies: 6"));
        assert!(lines.contains(&"# Pkts: 10"));
        assert!(lines.contains(&"# Elapsed: 4.00s"));
        assert!(lines.contains(&"# PPS: 2.50"));
        assert_eq!(Some(&"#"), lines.last());
    }
}
