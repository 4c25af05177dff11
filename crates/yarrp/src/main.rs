#![allow(clippy::struct_excessive_bools)]
#![forbid(unsafe_code)]

use crate::config::{Args, YarrpAction};
use clap::Parser;

mod app;
mod config;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    match YarrpAction::from(args)? {
        YarrpAction::Yarrp(cfg) => app::run_yarrp(&cfg)?,
        YarrpAction::PrintConfigTemplate => app::print_config_template(),
    }
    Ok(())
}
