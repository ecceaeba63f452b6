// SPDX-License-Identifier: AGPL-3.0-only

//! Run loop: warmups, production trajectories, measurements, save.
//!
//! Every worker executes the same loop on its own thread; worker 0 alone
//! formats the log lines and sends them down a channel, so the output is
//! never interleaved. The lines, in order:
//!
//! ```text
//! START <S_B/nt>
//! SCALAR SQUARES <x_0> … <x_{S-1}> <avg> <width>
//! eps <traj_length/nsteps>
//! … warmup trajectory lines …
//! WARMUPS COMPLETED
//! … per trajectory: [WARNING …] ACCEPT|REJECT|CHECK … [MONITOR_FORCE …]
//! … every measure_interval: GMES <re> <im>, b_act/nt <value>
//! RUNNING COMPLETED
//! GMES <mean re> <mean im>
//! ACCEPTANCE <rate>
//! STOP <S_B/nt>
//! Time = <seconds> seconds
//! ```

use std::time::Instant;

use crossbeam_channel::Sender;
use log::{debug, info};
use num_complex::Complex64;
use serde::Serialize;

use super::action::bosonic_action;
use super::checkpoint;
use super::hmc::HmcStatistics;
use super::mesh::launch;
use super::observables::{polyakov_loop, scalar_squares, ScalarSquares};
use super::simulation::Simulation;
use crate::config::RunConfig;
use crate::error::Result;

/// Outcome of a run as seen by worker 0.
#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    /// Parameters of the run.
    pub config: RunConfig,
    /// Bosonic action per site before the warmups.
    pub start_action_per_site: f64,
    /// Bosonic action per site after the last trajectory.
    pub end_action_per_site: f64,
    /// Scalar squares before the warmups.
    pub initial_scalar_squares: ScalarSquares,
    /// Production trajectory statistics.
    pub statistics: HmcStatistics,
    /// Polyakov loop averaged over measurements.
    pub polyakov_mean: Complex64,
    /// Number of measurements taken.
    pub measurements: usize,
    /// Wall-clock time of the loop.
    pub wall_time_s: f64,
}

struct LineSink<'a> {
    tx: &'a Sender<String>,
    root: bool,
}

impl LineSink<'_> {
    fn emit(&self, line: String) {
        if self.root && self.tx.send(line).is_err() {
            debug!("log line receiver dropped");
        }
    }
}

/// Run warmups and production trajectories on an existing simulation.
///
/// Calling this again on the same `sim` continues the Markov chain.
/// Returns the summary on worker 0 and `None` elsewhere.
///
/// # Errors
///
/// Communication failure, or I/O when saving.
pub fn run_loop(sim: &mut Simulation, lines: &Sender<String>) -> Result<Option<RunSummary>> {
    let t0 = Instant::now();
    let sink = LineSink {
        tx: lines,
        root: sim.mesh.is_root(),
    };
    let nt = sim.params.nt as f64;

    let start_action_per_site = bosonic_action(sim)? / nt;
    sink.emit(format!("START {start_action_per_site:.8}"));
    let initial_scalar_squares = scalar_squares(sim)?;
    sink.emit(initial_scalar_squares.log_line());
    sink.emit(format!("eps {:.4}", sim.params.step_size()));

    for _ in 0..sim.params.warms {
        let report = sim.run_trajectory()?;
        for line in report.log_lines() {
            sink.emit(line);
        }
    }
    sink.emit("WARMUPS COMPLETED".to_string());
    if sink.root {
        info!("{} warmup trajectories done", sim.params.warms);
    }

    let mut statistics = HmcStatistics::default();
    let mut polyakov_sum = Complex64::new(0.0, 0.0);
    let mut measurements = 0usize;
    for traj in 0..sim.params.trajecs {
        let report = sim.run_trajectory()?;
        for line in report.log_lines() {
            sink.emit(line);
        }
        statistics.record(&report);

        if (traj + 1) % sim.params.measure_interval == 0 {
            let ploop = polyakov_loop(sim)?;
            let b_act = bosonic_action(sim)?;
            if let Some(p) = ploop {
                sink.emit(format!("GMES {:.8} {:.8}", p.re, p.im));
                polyakov_sum += p;
            }
            sink.emit(format!("b_act/nt {:.8}", b_act / nt));
            measurements += 1;
        }
    }
    sink.emit("RUNNING COMPLETED".to_string());

    let polyakov_mean = polyakov_sum / measurements.max(1) as f64;
    sink.emit(format!("GMES {:.8} {:.8}", polyakov_mean.re, polyakov_mean.im));
    sink.emit(format!("ACCEPTANCE {:.4}", statistics.acceptance_rate()));
    let end_action_per_site = bosonic_action(sim)? / nt;
    sink.emit(format!("STOP {end_action_per_site:.8}"));
    let wall_time_s = t0.elapsed().as_secs_f64();
    sink.emit(format!("Time = {wall_time_s:.4} seconds"));

    if let Some(path) = sim.params.save.clone() {
        checkpoint::save(sim, &path)?;
    }

    if !sink.root {
        return Ok(None);
    }
    info!(
        "{} trajectories, acceptance {:.3}, <exp(-dS)> {:.4}",
        statistics.n_trajectories,
        statistics.acceptance_rate(),
        statistics.mean_exp_minus_delta()
    );
    Ok(Some(RunSummary {
        config: sim.params.clone(),
        start_action_per_site,
        end_action_per_site,
        initial_scalar_squares,
        statistics,
        polyakov_mean,
        measurements,
        wall_time_s,
    }))
}

/// Validate `config`, spawn its workers and run the loop on each.
///
/// # Errors
///
/// Invalid configuration, or any worker's failure.
pub fn run_simulation(config: &RunConfig, lines: &Sender<String>) -> Result<RunSummary> {
    config.validate()?;
    info!(
        "running nt={} S={} beta={} omega={} on {} workers ({:?}, {:?})",
        config.nt, config.n_scalars, config.beta, config.omega, config.workers,
        config.integrator, config.mode
    );
    let summaries = launch(config.nt, config.workers, |mesh| {
        let mut sim = Simulation::new(mesh, config)?;
        run_loop(&mut sim, lines)
    })?;
    summaries
        .into_iter()
        .flatten()
        .next()
        .ok_or_else(|| crate::error::BqmError::CommunicationFailure {
            rank: 0,
            peer: 0,
            detail: "worker 0 returned no summary".into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::hmc::TrajectoryMode;
    use crossbeam_channel::unbounded;

    #[test]
    fn log_lines_come_in_order() {
        let cfg = RunConfig {
            nt: 4,
            n_scalars: 1,
            workers: 2,
            nsteps: 5,
            warms: 1,
            trajecs: 4,
            measure_interval: 2,
            mode: TrajectoryMode::AlwaysAccept,
            ..RunConfig::default()
        };
        let (tx, rx) = unbounded();
        let summary = run_simulation(&cfg, &tx).expect("run completes");
        drop(tx);
        let lines: Vec<String> = rx.iter().collect();

        assert!(lines[0].starts_with("START "));
        assert!(lines[1].starts_with("SCALAR SQUARES "));
        assert_eq!(lines[2], "eps 0.2000");
        let checks = lines.iter().filter(|l| l.starts_with("CHECK: ")).count();
        assert_eq!(checks, 5);
        let monitors = lines.iter().filter(|l| l.starts_with("MONITOR_FORCE ")).count();
        assert_eq!(monitors, 5);
        let gmes = lines.iter().filter(|l| l.starts_with("GMES ")).count();
        assert_eq!(gmes, 2 + 1);
        let warm = lines.iter().position(|l| l == "WARMUPS COMPLETED").expect("warmup marker");
        let done = lines.iter().position(|l| l == "RUNNING COMPLETED").expect("done marker");
        assert!(warm < done);
        assert_eq!(lines[done + 2], "ACCEPTANCE 1.0000");
        assert!(lines[done + 3].starts_with("STOP "));
        assert!(lines.last().is_some_and(|l| l.starts_with("Time = ")));

        assert_eq!(summary.measurements, 2);
        assert_eq!(summary.statistics.n_trajectories, 4);
        assert!((summary.start_action_per_site - cfg.beta * cfg.omega.powi(2)).abs() < 1e-12);
    }

    #[test]
    fn invalid_config_fails_before_spawning() {
        let cfg = RunConfig {
            nt: 2,
            workers: 3,
            ..RunConfig::default()
        };
        let (tx, _rx) = unbounded();
        assert!(run_simulation(&cfg, &tx).is_err());
    }
}
