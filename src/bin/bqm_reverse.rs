// SPDX-License-Identifier: AGPL-3.0-only

//! Reversibility validation.
//!
//! Draws one set of momenta, integrates a trajectory, negates the momenta
//! and integrates again. The fields must come back to the start and the
//! two action changes must cancel. The bosonic action per site, scalar
//! squares and Polyakov loop are printed before, between and after the
//! legs.
//!
//! | Check | Threshold |
//! |-------|-----------|
//! | RMS field deviation | `REVERSIBILITY_RMS_MAX` |
//! | ΔS_forward + ΔS_backward | `REVERSIBILITY_DELTA_S_ABS` |
//! | S_B/nt after − before | `REVERSIBILITY_DELTA_S_ABS` |
//!
//! Exit code 0 when all hold, 1 otherwise.

use std::process;

use bqm_hmc::config::ConfigArgs;
use bqm_hmc::lattice::hmc::{reversibility_check, TrajectoryReport};
use bqm_hmc::lattice::mesh::launch;
use bqm_hmc::lattice::simulation::Simulation;
use bqm_hmc::tolerances::{REVERSIBILITY_DELTA_S_ABS, REVERSIBILITY_RMS_MAX};
use bqm_hmc::validation::ValidationHarness;
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "bqm_reverse", about = "Forward/backward reversibility check")]
struct Cli {
    #[command(flatten)]
    run: ConfigArgs,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = match cli.run.resolve() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("bqm_reverse: {err}");
            process::exit(1);
        }
    };

    let reports = launch(config.nt, config.workers, |mesh| {
        let mut sim = Simulation::new(mesh, &config)?;
        reversibility_check(&mut sim)
    });
    let report = match reports {
        Ok(mut reports) if !reports.is_empty() => reports.swap_remove(0),
        Ok(_) => {
            eprintln!("bqm_reverse: no workers ran");
            process::exit(1);
        }
        Err(err) => {
            eprintln!("bqm_reverse: {err}");
            process::exit(1);
        }
    };

    println!(
        "nt={} S={} beta={} omega={} nsteps={} integrator={:?}",
        config.nt, config.n_scalars, config.beta, config.omega, config.nsteps, config.integrator
    );
    let legs = [
        ("initial", &report.initial, None),
        ("forward", &report.after_forward, Some(&report.forward)),
        ("backward", &report.after_backward, Some(&report.backward)),
    ];
    for (name, fields, traj) in legs {
        println!("{name}:");
        for line in traj.into_iter().flat_map(TrajectoryReport::log_lines) {
            println!("{line}");
        }
        for line in fields.log_lines() {
            println!("{line}");
        }
    }
    println!("RMS deviation {:.4e}", report.rms_deviation);

    let mut harness = ValidationHarness::new("bqm_reverse");
    harness.check_upper("RMS field deviation", report.rms_deviation, REVERSIBILITY_RMS_MAX);
    harness.check_abs(
        "dS forward + dS backward",
        report.forward.delta + report.backward.delta,
        0.0,
        REVERSIBILITY_DELTA_S_ABS,
    );
    harness.check_abs(
        "S_B/nt restored",
        report.after_backward.action_per_site,
        report.initial.action_per_site,
        REVERSIBILITY_DELTA_S_ABS,
    );
    harness.finish();
}
