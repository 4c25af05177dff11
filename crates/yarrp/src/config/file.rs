use crate::config::{LogFormat, LogSpanEvents, ProbeTypeConfig};
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Read the config from the given path.
pub fn read_config_file<P: AsRef<Path>>(path: P) -> anyhow::Result<ConfigFile> {
    let data = fs::read_to_string(path.as_ref())
        .with_context(|| format!("config file not found: {}", path.as_ref().display()))?;
    toml::from_str(&data)
        .with_context(|| format!("invalid config file: {}", path.as_ref().display()))
}

#[derive(Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigFile {
    pub yarrp: Option<ConfigYarrp>,
    pub targets: Option<ConfigTargets>,
    pub scan: Option<ConfigScan>,
}

#[derive(Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigYarrp {
    pub verbose: Option<bool>,
    pub log_format: Option<LogFormat>,
    pub log_filter: Option<String>,
    pub log_span_events: Option<LogSpanEvents>,
}

#[derive(Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigTargets {
    pub input: Option<PathBuf>,
    pub subnets: Option<Vec<String>>,
    pub entire: Option<bool>,
    pub bgp: Option<PathBuf>,
    pub blocklist: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigScan {
    pub probe_type: Option<ProbeTypeConfig>,
    pub port: Option<u16>,
    pub source_address: Option<IpAddr>,
    pub rate: Option<u32>,
    pub count: Option<u64>,
    pub min_ttl: Option<u8>,
    pub max_ttl: Option<u8>,
    pub fill_ttl: Option<u8>,
    pub neighborhood: Option<u8>,
    pub poisson: Option<u8>,
    pub sequential: Option<bool>,
    pub seed: Option<u64>,
    pub instance: Option<u8>,
    pub coarse: Option<bool>,
    pub testing: Option<bool>,
    pub shutdown_wait: Option<u64>,
    pub lock_dir: Option<PathBuf>,
}
