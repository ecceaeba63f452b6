// SPDX-License-Identifier: AGPL-3.0-only

//! Production HMC run for bosonic matrix quantum mechanics.
//!
//! Streams the per-trajectory log lines to stdout and optionally writes a
//! JSON run summary.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --bin bqm_hmc -- \
//!   --config run.json --nt 24 --workers 4 --integrator omelyan --summary out.json
//! ```

use std::path::PathBuf;
use std::process;
use std::thread;

use bqm_hmc::config::ConfigArgs;
use bqm_hmc::error::Result;
use bqm_hmc::lattice::driver::{run_simulation, RunSummary};
use clap::Parser;
use crossbeam_channel::unbounded;

#[derive(Debug, Parser)]
#[command(name = "bqm_hmc", about = "HMC for bosonic matrix quantum mechanics")]
struct Cli {
    #[command(flatten)]
    run: ConfigArgs,
    /// Write the run summary as JSON here.
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn run(cli: &Cli) -> Result<RunSummary> {
    let config = cli.run.resolve()?;
    let (tx, rx) = unbounded::<String>();
    let printer = thread::spawn(move || {
        for line in rx {
            println!("{line}");
        }
    });
    let outcome = run_simulation(&config, &tx);
    drop(tx);
    if printer.join().is_err() {
        log::warn!("output thread panicked");
    }
    let summary = outcome?;
    if let Some(path) = &cli.summary {
        std::fs::write(path, serde_json::to_string_pretty(&summary)?)?;
        log::info!("summary written to {}", path.display());
    }
    Ok(summary)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        eprintln!("bqm_hmc: {err}");
        process::exit(1);
    }
}
