use crate::config::{LogFormat, LogSpanEvents, YarrpConfig, QUIET_LOG_FILTER, STDOUT_OUTPUT};
use anyhow::Context;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;
use tracing_subscriber::fmt::format::FmtSpan;
use yarrp_core::{Builder, Scanner, Snapshot};

/// Run a scan and report the final counters.
pub fn run_yarrp(cfg: &YarrpConfig) -> anyhow::Result<()> {
    configure_logging(cfg);
    let scanner = make_scanner(cfg)?;
    let stats = if cfg.output == Path::new(STDOUT_OUTPUT) {
        run_scanner(&scanner, BufWriter::new(io::stdout()))?
    } else {
        let file = File::create(&cfg.output)
            .with_context(|| format!("cannot create output file {}", cfg.output.display()))?;
        run_scanner(&scanner, BufWriter::new(file))?
    };
    tracing::info!(%stats, "scan complete");
    eprintln!("{stats}");
    Ok(())
}

/// Print the config file template.
pub fn print_config_template() {
    println!("{}", include_str!("../yarrp-config-template.toml"));
}

fn run_scanner<W: io::Write + Send>(scanner: &Scanner, out: W) -> anyhow::Result<Snapshot> {
    Ok(scanner.run(out)?)
}

fn make_scanner(cfg: &YarrpConfig) -> anyhow::Result<Scanner> {
    let builder = Builder::new(cfg.targets.clone())
        .probe_type(cfg.probe_type)
        .source_addr(cfg.source_addr)
        .rate(cfg.rate)
        .count(cfg.count)
        .min_ttl(cfg.min_ttl)
        .max_ttl(cfg.max_ttl)
        .fill_ttl(cfg.fill_ttl)
        .neighborhood(cfg.neighborhood)
        .poisson(cfg.poisson)
        .scan_order(cfg.scan_order)
        .seed(cfg.seed)
        .instance(cfg.instance)
        .time_unit(cfg.time_unit)
        .probe_mode(cfg.probe_mode)
        .testing(cfg.testing)
        .bgp_table(cfg.bgp.clone())
        .blocklist(cfg.blocklist.clone())
        .output(cfg.output.clone())
        .shutdown_wait(cfg.shutdown_wait)
        .lock_dir(cfg.lock_dir.clone());
    let builder = match cfg.port {
        Some(port) => builder.dest_port(port),
        None => builder,
    };
    Ok(builder.build()?)
}

fn configure_logging(cfg: &YarrpConfig) {
    let fmt_span = match cfg.log_span_events {
        LogSpanEvents::Off => FmtSpan::NONE,
        LogSpanEvents::Active => FmtSpan::ACTIVE,
        LogSpanEvents::All => FmtSpan::FULL,
    };
    let filter = if cfg.verbose {
        cfg.log_filter.as_str()
    } else {
        QUIET_LOG_FILTER
    };
    match cfg.log_format {
        LogFormat::Compact => {
            tracing_subscriber::fmt()
                .with_writer(io::stderr)
                .with_span_events(fmt_span)
                .with_env_filter(filter)
                .compact()
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .with_writer(io::stderr)
                .with_span_events(fmt_span)
                .with_env_filter(filter)
                .pretty()
                .init();
        }
    }
}
