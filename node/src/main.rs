mod builder;
mod config;
mod session;

use std::{env, fs};

use anyhow::Context;
use log::{info, warn};
use tokio::signal;

use crate::{builder::MetaTrainerBuilder, config::MetaTrainSpec};

/// Reads the path of the run specification from the first argument or `CONFIG`.
fn config_path() -> anyhow::Result<String> {
    env::args()
        .nth(1)
        .or_else(|| env::var("CONFIG").ok())
        .context("usage: node <config.json> (or set CONFIG)")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let path = config_path()?;
    let raw = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let spec: MetaTrainSpec =
        serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?;
    let output = spec.output.clone();

    let session = MetaTrainerBuilder::new().build(spec)?;
    info!("meta training started");

    let out = tokio::select! {
        out = session.run() => out?,
        _ = signal::ctrl_c() => {
            warn!("received SIGINT, stopping");
            return Ok(());
        }
    };

    if let Some(last) = out.rounds.last() {
        info!(
            outer_iteration = last.outer_iteration,
            mean_loss = last.mean_loss,
            metrics = log::kv::Value::from_debug(&last.metrics);
            "meta training finished"
        );
    }

    let theta = serde_json::to_string_pretty(&out.theta)?;
    match output {
        Some(path) => {
            fs::write(&path, theta).with_context(|| format!("writing {}", path.display()))?
        }
        None => println!("{theta}"),
    }

    Ok(())
}
