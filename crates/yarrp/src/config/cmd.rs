use crate::config::{LogFormat, LogSpanEvents, ProbeTypeConfig};
use clap::builder::Styles;
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Stateless, randomized traceroute of the Internet
#[derive(Parser, Debug)]
#[command(name = "yarrp", author, version, about, long_about = None, arg_required_else_help(true), styles=Styles::styled())]
pub struct Args {
    /// A space delimited list of subnets to trace, one address per /24 (IPv4) or /48 (IPv6)
    #[arg(conflicts_with_all(["input", "entire"]))]
    pub targets: Vec<String>,

    /// Config file
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub config_file: Option<String>,

    /// Input target file, one address per line
    #[arg(short = 'i', long, value_hint = clap::ValueHint::FilePath, conflicts_with = "entire")]
    pub input: Option<PathBuf>,

    /// Trace the entire routed IPv4 or IPv6 Internet, requires a BGP table
    #[arg(short = 'Q', long)]
    pub entire: bool,

    /// Output file, `-` for stdout [default: output.yrp]
    #[arg(short = 'o', long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// The number of probes to send [default: unlimited]
    #[arg(short = 'c', long)]
    pub count: Option<u64>,

    /// Probe type [default: TCP_ACK]
    #[arg(value_enum, short = 't', long = "type", ignore_case = true)]
    pub probe_type: Option<ProbeTypeConfig>,

    /// Scan rate in packets per second, 0 for unlimited [default: 10]
    #[arg(short = 'r', long)]
    pub rate: Option<u32>,

    /// The maximum TTL [default: 32]
    #[arg(short = 'm', long)]
    pub max_ttl: Option<u8>,

    /// The minimum TTL [default: 1]
    #[arg(short = 'l', long)]
    pub min_ttl: Option<u8>,

    /// Keep probing past the maximum TTL, up to this TTL, while hops answer [default: off]
    #[arg(short = 'F', long)]
    pub fill_ttl: Option<u8>,

    /// Trace sequentially [default: random]
    #[arg(short = 's', long)]
    pub sequential: bool,

    /// Skip TTLs below this once they stop revealing new routers [default: off]
    #[arg(short = 'n', long)]
    pub neighborhood: Option<u8>,

    /// Bias probed TTLs towards a Poisson distribution with this mean [default: off]
    #[arg(short = 'B', long)]
    pub poisson: Option<u8>,

    /// BGP table of routed prefixes and their origin AS
    #[arg(short = 'b', long, value_hint = clap::ValueHint::FilePath)]
    pub bgp: Option<PathBuf>,

    /// Prefixes never to probe, requires a BGP table
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub blocklist: Option<PathBuf>,

    /// The permutation seed [default: random]
    #[arg(short = 'S', long)]
    pub seed: Option<u64>,

    /// The transport destination port [default: 80, 53 for UDP]
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// The prober instance, so that concurrent scans ignore each other [default: 0]
    #[arg(short = 'E', long)]
    pub instance: Option<u8>,

    /// Do not send probes
    #[arg(short = 'T', long)]
    pub test: bool,

    /// The source IP address [default: auto]
    #[arg(short = 'a', long, value_parser = parse_addr)]
    pub srcaddr: Option<IpAddr>,

    /// Measure round trip times in milliseconds [default: microseconds]
    #[arg(short = 'C', long)]
    pub coarse: bool,

    /// Send probes without receiving replies
    #[arg(short = 'P', long, conflicts_with = "receive_only")]
    pub probe_only: bool,

    /// Receive replies without sending probes
    #[arg(short = 'R', long)]
    pub receive_only: bool,

    /// Seconds to wait for replies once probing has finished [default: 60]
    #[arg(long)]
    pub shutdown_wait: Option<u64>,

    /// The directory holding the instance lock files [default: ~/.yarrp]
    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    pub lock_dir: Option<PathBuf>,

    /// Print a template toml config file and exit
    #[arg(long)]
    pub print_config_template: bool,

    /// The debug log format [default: pretty]
    #[arg(long)]
    pub log_format: Option<LogFormat>,

    /// The debug log filter [default: yarrp=debug]
    #[arg(long)]
    pub log_filter: Option<String>,

    /// The debug log span events [default: off]
    #[arg(long)]
    pub log_span_events: Option<LogSpanEvents>,

    /// Enable verbose debug logging
    #[arg(short = 'v', long, default_value_t = false)]
    pub verbose: bool,
}

fn parse_addr(value: &str) -> anyhow::Result<IpAddr> {
    Ok(IpAddr::from_str(value)?)
}
