#![forbid(unsafe_code)]

use crate::config::{Args, PingkitConfig};
use clap::Parser;

mod app;
mod config;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cfg = PingkitConfig::try_from(args)?;
    app::run_pingkit(&cfg)
}
