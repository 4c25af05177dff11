use anyhow::{anyhow, Context};
use clap::ValueEnum;
use file::ConfigFile;
use ipnetwork::IpNetwork;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use yarrp_core::{defaults, enumerate, ProbeMode, ProbeType, ScanOrder, Targets, TimeUnit};

mod cmd;
mod constants;
mod file;

pub use cmd::Args;
pub use constants::{QUIET_LOG_FILTER, STDOUT_OUTPUT};

/// The probe type.
#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum, Deserialize)]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeTypeConfig {
    /// `ICMPv6` echo request.
    Icmp6,
    /// `ICMP` echo request.
    Icmp,
    /// `UDP` over `IPv6`.
    Udp6,
    /// `UDP` over `IPv4`.
    Udp,
    /// `TCP` SYN over `IPv6`.
    Tcp6Syn,
    /// `TCP` SYN over `IPv4`.
    TcpSyn,
    /// `TCP` ACK over `IPv6`.
    Tcp6Ack,
    /// `TCP` ACK over `IPv4`.
    TcpAck,
    /// `ICMP` echo reply.
    IcmpReply,
}

impl From<ProbeTypeConfig> for ProbeType {
    fn from(value: ProbeTypeConfig) -> Self {
        match value {
            ProbeTypeConfig::Icmp6 => Self::Icmp6,
            ProbeTypeConfig::Icmp => Self::Icmp,
            ProbeTypeConfig::Udp6 => Self::Udp6,
            ProbeTypeConfig::Udp => Self::Udp,
            ProbeTypeConfig::Tcp6Syn => Self::Tcp6Syn,
            ProbeTypeConfig::TcpSyn => Self::TcpSyn,
            ProbeTypeConfig::Tcp6Ack => Self::Tcp6Ack,
            ProbeTypeConfig::TcpAck => Self::TcpAck,
            ProbeTypeConfig::IcmpReply => Self::IcmpReply,
        }
    }
}

/// How to format log data.
#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// Display log data in a compact format.
    Compact,
    /// Display log data in a pretty format.
    Pretty,
}

/// How to log event spans.
#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogSpanEvents {
    /// Do not display event spans.
    Off,
    /// Display enter and exit event spans.
    Active,
    /// Display all event spans.
    All,
}

/// The action to perform.
#[derive(Debug)]
pub enum YarrpAction {
    /// Run a scan.
    Yarrp(YarrpConfig),
    /// Print a template toml config file.
    PrintConfigTemplate,
}

impl YarrpAction {
    pub fn from(args: Args) -> anyhow::Result<Self> {
        Ok(if args.print_config_template {
            Self::PrintConfigTemplate
        } else {
            Self::Yarrp(YarrpConfig::from(args)?)
        })
    }
}

/// Fully parsed and validated configuration.
#[derive(Debug, Eq, PartialEq)]
pub struct YarrpConfig {
    pub targets: Targets,
    pub probe_type: ProbeType,
    pub port: Option<u16>,
    pub source_addr: Option<IpAddr>,
    pub rate: u32,
    pub count: Option<u64>,
    pub min_ttl: u8,
    pub max_ttl: u8,
    pub fill_ttl: u8,
    pub neighborhood: u8,
    pub poisson: u8,
    pub scan_order: ScanOrder,
    pub seed: u64,
    pub instance: u8,
    pub time_unit: TimeUnit,
    pub probe_mode: ProbeMode,
    pub testing: bool,
    pub bgp: Option<PathBuf>,
    pub blocklist: Option<PathBuf>,
    pub output: PathBuf,
    pub shutdown_wait: Duration,
    pub lock_dir: Option<PathBuf>,
    pub verbose: bool,
    pub log_format: LogFormat,
    pub log_filter: String,
    pub log_span_events: LogSpanEvents,
}

impl YarrpConfig {
    pub fn from(args: Args) -> anyhow::Result<Self> {
        let cfg_file = if let Some(cfg) = &args.config_file {
            file::read_config_file(cfg)?
        } else {
            ConfigFile::default()
        };
        Self::build_config(args, cfg_file)
    }

    #[allow(clippy::too_many_lines)]
    fn build_config(args: Args, cfg_file: ConfigFile) -> anyhow::Result<Self> {
        let cfg_file_yarrp = cfg_file.yarrp.unwrap_or_default();
        let cfg_file_targets = cfg_file.targets.unwrap_or_default();
        let cfg_file_scan = cfg_file.scan.unwrap_or_default();
        let verbose = cfg_layer_bool_flag(
            args.verbose,
            cfg_file_yarrp.verbose,
            constants::DEFAULT_VERBOSE,
        );
        let log_format = cfg_layer(
            args.log_format,
            cfg_file_yarrp.log_format,
            constants::DEFAULT_LOG_FORMAT,
        );
        let log_filter = cfg_layer(
            args.log_filter,
            cfg_file_yarrp.log_filter,
            String::from(constants::DEFAULT_LOG_FILTER),
        );
        let log_span_events = cfg_layer(
            args.log_span_events,
            cfg_file_yarrp.log_span_events,
            constants::DEFAULT_LOG_SPAN_EVENTS,
        );
        let probe_type = ProbeType::from(cfg_layer(
            args.probe_type,
            cfg_file_scan.probe_type,
            ProbeTypeConfig::from(defaults::DEFAULT_PROBE_TYPE),
        ));
        let port = cfg_layer_opt(args.port, cfg_file_scan.port);
        let source_addr = cfg_layer_opt(args.srcaddr, cfg_file_scan.source_address);
        let rate = cfg_layer(args.rate, cfg_file_scan.rate, defaults::DEFAULT_RATE);
        let count = cfg_layer_opt(args.count, cfg_file_scan.count);
        let min_ttl = cfg_layer(
            args.min_ttl,
            cfg_file_scan.min_ttl,
            defaults::DEFAULT_MIN_TTL,
        );
        let max_ttl = cfg_layer(
            args.max_ttl,
            cfg_file_scan.max_ttl,
            defaults::DEFAULT_MAX_TTL,
        );
        let fill_ttl = cfg_layer(
            args.fill_ttl,
            cfg_file_scan.fill_ttl,
            defaults::DEFAULT_FILL_TTL,
        );
        let neighborhood = cfg_layer(
            args.neighborhood,
            cfg_file_scan.neighborhood,
            defaults::DEFAULT_NEIGHBORHOOD,
        );
        let poisson = cfg_layer(
            args.poisson,
            cfg_file_scan.poisson,
            defaults::DEFAULT_POISSON,
        );
        let sequential = cfg_layer_bool_flag(
            args.sequential,
            cfg_file_scan.sequential,
            constants::DEFAULT_SEQUENTIAL,
        );
        let scan_order = if sequential {
            ScanOrder::Sequential
        } else {
            defaults::DEFAULT_SCAN_ORDER
        };
        let seed = cfg_layer_opt(args.seed, cfg_file_scan.seed).unwrap_or_else(rand::random);
        let instance = cfg_layer(
            args.instance,
            cfg_file_scan.instance,
            defaults::DEFAULT_INSTANCE,
        );
        let coarse = cfg_layer_bool_flag(
            args.coarse,
            cfg_file_scan.coarse,
            constants::DEFAULT_COARSE,
        );
        let time_unit = if coarse {
            TimeUnit::Millis
        } else {
            defaults::DEFAULT_TIME_UNIT
        };
        let probe_mode = match (args.probe_only, args.receive_only) {
            (true, true) => return Err(anyhow!("probe-only and receive-only are exclusive")),
            (true, false) => ProbeMode::ProbeOnly,
            (false, true) => ProbeMode::ReceiveOnly,
            (false, false) => defaults::DEFAULT_PROBE_MODE,
        };
        let testing = cfg_layer_bool_flag(
            args.test,
            cfg_file_scan.testing,
            constants::DEFAULT_TESTING,
        );
        let shutdown_wait = cfg_layer_opt(args.shutdown_wait, cfg_file_scan.shutdown_wait)
            .map_or(defaults::DEFAULT_SHUTDOWN_WAIT, Duration::from_secs);
        let lock_dir = cfg_layer_opt(args.lock_dir, cfg_file_scan.lock_dir);
        let bgp = cfg_layer_opt(args.bgp, cfg_file_targets.bgp);
        let blocklist = cfg_layer_opt(args.blocklist, cfg_file_targets.blocklist);
        let output = cfg_layer(
            args.output,
            cfg_file_targets.output,
            PathBuf::from(defaults::DEFAULT_OUTPUT),
        );
        let entire = cfg_layer_bool_flag(
            args.entire,
            cfg_file_targets.entire,
            constants::DEFAULT_ENTIRE,
        );
        let input = cfg_layer_opt(args.input, cfg_file_targets.input);
        let subnets = if args.targets.is_empty() {
            cfg_file_targets.subnets.unwrap_or_default()
        } else {
            args.targets
        };
        let targets = if entire {
            Targets::Entire
        } else if let Some(input) = input {
            let reader = BufReader::new(
                File::open(&input)
                    .with_context(|| format!("cannot open input file {}", input.display()))?,
            );
            let addrs = enumerate::parse_targets(reader, probe_type.is_ipv6())
                .with_context(|| format!("cannot read input file {}", input.display()))?;
            Targets::List {
                source: input.display().to_string(),
                addrs,
            }
        } else if !subnets.is_empty() {
            Targets::Subnets(
                subnets
                    .iter()
                    .map(|subnet| {
                        subnet
                            .parse::<IpNetwork>()
                            .with_context(|| format!("invalid subnet {subnet}"))
                    })
                    .collect::<anyhow::Result<Vec<_>>>()?,
            )
        } else {
            return Err(anyhow!(
                "no targets, give an input file, subnets or entire Internet mode"
            ));
        };
        if entire && max_ttl > yarrp_core::MAX_ENTIRE_TTL {
            return Err(anyhow!(
                "max-ttl {max_ttl} is larger than {} in entire Internet mode",
                yarrp_core::MAX_ENTIRE_TTL
            ));
        }
        Ok(Self {
            targets,
            probe_type,
            port,
            source_addr,
            rate,
            count,
            min_ttl,
            max_ttl,
            fill_ttl,
            neighborhood,
            poisson,
            scan_order,
            seed,
            instance,
            time_unit,
            probe_mode,
            testing,
            bgp,
            blocklist,
            output,
            shutdown_wait,
            lock_dir,
            verbose,
            log_format,
            log_filter,
            log_span_events,
        })
    }
}

impl From<ProbeType> for ProbeTypeConfig {
    fn from(value: ProbeType) -> Self {
        match value {
            ProbeType::Icmp6 => Self::Icmp6,
            ProbeType::Icmp => Self::Icmp,
            ProbeType::Udp6 => Self::Udp6,
            ProbeType::Udp => Self::Udp,
            ProbeType::Tcp6Syn => Self::Tcp6Syn,
            ProbeType::TcpSyn => Self::TcpSyn,
            ProbeType::Tcp6Ack => Self::Tcp6Ack,
            ProbeType::TcpAck => Self::TcpAck,
            ProbeType::IcmpReply => Self::IcmpReply,
        }
    }
}

fn cfg_layer<T>(fst: Option<T>, snd: Option<T>, def: T) -> T {
    match (fst, snd) {
        (Some(val), _) | (None, Some(val)) => val,
        (None, None) => def,
    }
}

fn cfg_layer_opt<T>(fst: Option<T>, snd: Option<T>) -> Option<T> {
    match (fst, snd) {
        (Some(val), _) | (None, Some(val)) => Some(val),
        (None, None) => None,
    }
}

const fn cfg_layer_bool_flag(fst: bool, snd: Option<bool>, default: bool) -> bool {
    match (fst, snd) {
        (true, _) => true,
        (false, Some(val)) => val,
        (false, None) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use test_case::test_case;

    fn parse(cmd: &str) -> anyhow::Result<YarrpConfig> {
        let args = Args::try_parse_from(cmd.split_whitespace())?;
        YarrpConfig::from(args)
    }

    #[test]
    fn test_defaults() -> anyhow::Result<()> {
        let cfg = parse("yarrp 192.0.2.0/24 -S 1")?;
        assert_eq!(
            Targets::Subnets(vec!["192.0.2.0/24".parse()?]),
            cfg.targets
        );
        assert_eq!(ProbeType::TcpAck, cfg.probe_type);
        assert_eq!(None, cfg.port);
        assert_eq!(10, cfg.rate);
        assert_eq!((1, 32, 0), (cfg.min_ttl, cfg.max_ttl, cfg.fill_ttl));
        assert_eq!(ScanOrder::Random, cfg.scan_order);
        assert_eq!(TimeUnit::Micros, cfg.time_unit);
        assert_eq!(ProbeMode::Both, cfg.probe_mode);
        assert_eq!(PathBuf::from("output.yrp"), cfg.output);
        assert_eq!(Duration::from_secs(60), cfg.shutdown_wait);
        assert_eq!(String::from("yarrp=debug"), cfg.log_filter);
        assert!(!cfg.verbose);
        Ok(())
    }

    #[test_case("yarrp 192.0.2.0/24 -t ICMP", ProbeType::Icmp; "icmp")]
    #[test_case("yarrp 192.0.2.0/24 -t udp", ProbeType::Udp; "lowercase udp")]
    #[test_case("yarrp 2001:db8::/32 --type TCP6_SYN", ProbeType::Tcp6Syn; "tcp6 syn")]
    #[test_case("yarrp 192.0.2.0/24 -t ICMP_REPLY", ProbeType::IcmpReply; "icmp reply")]
    fn test_probe_type(cmd: &str, expected: ProbeType) {
        assert_eq!(expected, parse(cmd).unwrap().probe_type);
    }

    #[test]
    fn test_flags() -> anyhow::Result<()> {
        let cfg = parse(
            "yarrp 192.0.2.0/24 -s -C -P -r 0 -m 16 -l 2 -F 20 -n 3 -B 8 -E 4 -p 443 -c 99 -S 5 -o -",
        )?;
        assert_eq!(ScanOrder::Sequential, cfg.scan_order);
        assert_eq!(TimeUnit::Millis, cfg.time_unit);
        assert_eq!(ProbeMode::ProbeOnly, cfg.probe_mode);
        assert_eq!(0, cfg.rate);
        assert_eq!((2, 16, 20), (cfg.min_ttl, cfg.max_ttl, cfg.fill_ttl));
        assert_eq!((3, 8, 4), (cfg.neighborhood, cfg.poisson, cfg.instance));
        assert_eq!(Some(443), cfg.port);
        assert_eq!(Some(99), cfg.count);
        assert_eq!(5, cfg.seed);
        assert_eq!(PathBuf::from(STDOUT_OUTPUT), cfg.output);
        Ok(())
    }

    #[test]
    fn test_entire_mode() -> anyhow::Result<()> {
        let cfg = parse("yarrp -Q -b rib.txt -m 16")?;
        assert_eq!(Targets::Entire, cfg.targets);
        assert_eq!(Some(PathBuf::from("rib.txt")), cfg.bgp);
        Ok(())
    }

    #[test]
    fn test_entire_mode_max_ttl() {
        assert!(parse("yarrp -Q -b rib.txt -m 33").is_err());
    }

    #[test]
    fn test_exclusive_modes() {
        assert!(parse("yarrp 192.0.2.0/24 -P -R").is_err());
        assert!(parse("yarrp 192.0.2.0/24 -Q").is_err());
    }

    #[test]
    fn test_invalid_subnet() {
        assert!(parse("yarrp 192.0.2.0/33").is_err());
    }

    #[test]
    fn test_missing_input_file() {
        assert!(parse("yarrp -i /nonexistent/yarrp/targets.txt").is_err());
    }

    #[test]
    fn test_print_config_template() -> anyhow::Result<()> {
        let args = Args::try_parse_from(["yarrp", "--print-config-template"])?;
        assert!(matches!(
            YarrpAction::from(args)?,
            YarrpAction::PrintConfigTemplate
        ));
        Ok(())
    }

    #[test]
    fn test_file_layer() -> anyhow::Result<()> {
        let cfg_file: ConfigFile = toml::from_str(
            r#"
            [yarrp]
            verbose = true
            log-format = "compact"

            [targets]
            subnets = ["198.51.100.0/23"]

            [scan]
            probe-type = "UDP"
            rate = 500
            max-ttl = 12
            "#,
        )?;
        let args = Args::try_parse_from(["yarrp", "-m", "20", "-S", "1"])?;
        let cfg = YarrpConfig::build_config(args, cfg_file)?;
        assert_eq!(
            Targets::Subnets(vec!["198.51.100.0/23".parse()?]),
            cfg.targets
        );
        assert_eq!(ProbeType::Udp, cfg.probe_type);
        assert_eq!(500, cfg.rate);
        assert_eq!(20, cfg.max_ttl);
        assert_eq!(LogFormat::Compact, cfg.log_format);
        assert!(cfg.verbose);
        Ok(())
    }

    #[test]
    fn test_cfg_layer() {
        assert_eq!(1, cfg_layer(Some(1), Some(2), 3));
        assert_eq!(2, cfg_layer(None, Some(2), 3));
        assert_eq!(3, cfg_layer(None, None, 3));
        assert_eq!(Some(2), cfg_layer_opt(None, Some(2)));
        assert!(cfg_layer_bool_flag(true, Some(false), false));
        assert!(!cfg_layer_bool_flag(false, Some(false), true));
        assert!(cfg_layer_bool_flag(false, None, true));
    }
}
