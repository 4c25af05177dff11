#![allow(clippy::needless_pass_by_value)]

use crate::simulation::{Protocol, Simulation};
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use test_case::test_case;
use tracing::info;
use tracing_subscriber::fmt::format::FmtSpan;
use yarrp_core::net::platform::Ipv4ByteOrder;
use yarrp_core::{Builder, Endpoints, ProbeType, RecordWriter, ScanOrder, Targets};

mod network;
mod simulation;

/// How long the scanner waits for stragglers once probing is complete.
const SHUTDOWN_WAIT: Duration = Duration::from_millis(300);

static LOGGING: OnceLock<()> = OnceLock::new();

fn logging() {
    LOGGING.get_or_init(|| {
        tracing_subscriber::fmt()
            .with_span_events(FmtSpan::NONE)
            .with_env_filter("sim=debug,yarrp_core=info")
            .with_test_writer()
            .init();
    });
}

macro_rules! sim {
    ($path:expr) => {{
        let data = include_str!(concat!("../resources/simulation/", $path));
        toml::from_str(data)?
    }};
}

#[test_case(sim!("ipv4_udp_sequential.toml"))]
#[test_case(sim!("ipv4_tcp_syn_fill.toml"))]
#[test_case(sim!("ipv4_tcp_ack_random.toml"))]
#[test_case(sim!("ipv4_icmp_gaps.toml"))]
#[test_case(sim!("ipv4_icmp_tamper.toml"))]
fn test_simulation(simulation: Simulation) -> anyhow::Result<()> {
    logging();
    let sim = Arc::new(simulation);
    info!("start simulating {}", sim.name);
    let probe_type = match sim.protocol {
        Protocol::Icmp => ProbeType::Icmp,
        Protocol::Udp => ProbeType::Udp,
        Protocol::TcpSyn => ProbeType::TcpSyn,
        Protocol::TcpAck => ProbeType::TcpAck,
    };
    let scan_order = if sim.sequential {
        ScanOrder::Sequential
    } else {
        ScanOrder::Random
    };
    let scanner = Builder::new(Targets::List {
        source: sim.name.clone(),
        addrs: sim.targets.clone(),
    })
    .probe_type(probe_type)
    .source_addr(Some(sim.source))
    .scan_order(scan_order)
    .max_ttl(sim.max_ttl)
    .fill_ttl(sim.fill_ttl)
    .rate(0)
    .seed(7)
    .shutdown_wait(SHUTDOWN_WAIT)
    .build()?;
    let (sender, receiver) = network::network(sim.clone());
    let endpoints = Endpoints {
        source_addr: sim.source,
        byte_order: Ipv4ByteOrder::Network,
        sender: Some(sender),
        receiver: Some(receiver),
    };
    let mut writer = RecordWriter::new(Vec::new());
    let stats = scanner.run_with(endpoints, &mut writer)?;
    let output = String::from_utf8(writer.into_inner())?;
    info!("end simulating {}: {}", sim.name, stats);

    let expected = &sim.expected;
    assert_eq!(expected.probes, stats.count, "probes");
    assert_eq!(expected.replies, stats.replies, "replies");
    assert_eq!(expected.fills, stats.fills, "fills");
    assert_eq!(expected.foreign, stats.foreign, "foreign");
    assert_eq!(expected.baddst, stats.baddst, "baddst");
    assert_eq!(0, stats.rtt_anomaly, "rtt anomalies");

    let records = output
        .lines()
        .filter(|line| !line.starts_with('#'))
        .collect::<Vec<_>>();
    assert_eq!(expected.records, records.len(), "records");
    let marked = output
        .lines()
        .filter(|line| line.starts_with("# Anomaly: BAD_DESTINATION"))
        .count();
    assert_eq!(expected.baddst, marked as u64, "marked records");
    let seen = records
        .iter()
        .map(|line| parse_record(line))
        .collect::<anyhow::Result<HashSet<_>>>()?;
    for hop in &expected.hops {
        assert!(seen.contains(hop), "missing record {hop:?}");
    }
    assert!(output.starts_with("# yarrp v"));
    assert!(output.contains("# Trace type: "));
    assert!(output.trim_end().ends_with('#'));
    Ok(())
}

/// Extract the (target, ttl, hop) triple of an output record.
fn parse_record(line: &str) -> anyhow::Result<(IpAddr, u8, IpAddr)> {
    let fields = line.split_whitespace().collect::<Vec<_>>();
    anyhow::ensure!(fields.len() == 15, "bad record: {line}");
    Ok((fields[0].parse()?, fields[5].parse()?, fields[6].parse()?))
}
