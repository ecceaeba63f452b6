// SPDX-License-Identifier: AGPL-3.0-only

//! Trajectory controller.
//!
//! One trajectory runs
//!
//! ```text
//! refresh momenta → [snapshot] → S_start → integrate → S_end → guard → [accept/reject]
//! ```
//!
//! In [`TrajectoryMode::Metropolis`] the accept test `exp(−ΔS) ≥ u` uses a
//! single uniform `u` drawn on worker 0 and broadcast, so every worker takes
//! the same branch. A rejected trajectory restores U and X bit-exactly from
//! the snapshot. [`TrajectoryMode::AlwaysAccept`] never snapshots and never
//! rejects; ΔS is only reported.
//!
//! # References
//!
//! - Duane, Kennedy, Pendleton, Roweth, PLB 195, 216 (1987)

use log::warn;
use serde::{Deserialize, Serialize};

use super::constants::{DELTA_S_OVERFLOW, NCOL};
use super::integrator::integrate;
use super::matrix::Matrix;
use super::observables::{field_summary, FieldSummary};
use super::simulation::Simulation;
use crate::error::Result;

/// Accept/reject policy for a trajectory.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum TrajectoryMode {
    /// Metropolis accept/reject on ΔS.
    #[default]
    Metropolis,
    /// Keep every trajectory; ΔS is diagnostic only.
    AlwaysAccept,
}

/// Outcome of one trajectory.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrajectoryReport {
    /// Total action before integration.
    pub start_action: f64,
    /// Total action after integration.
    pub end_action: f64,
    /// ΔS after the overflow guard.
    pub delta: f64,
    /// ΔS as computed.
    pub raw_delta: f64,
    /// Whether the overflow guard replaced `raw_delta`.
    pub overflow_corrected: bool,
    /// Metropolis decision; `None` in always-accept mode.
    pub accepted: Option<bool>,
    /// Mean force-norm monitor over the trajectory.
    pub avg_force_norm: f64,
    /// Largest force-norm monitor over the trajectory.
    pub max_force_norm: f64,
    /// Force evaluations performed.
    pub force_evaluations: usize,
    /// Whether `MONITOR_FORCE` is reported (nonzero trajectory length).
    pub monitor_force: bool,
}

impl TrajectoryReport {
    /// Whether the fields after the trajectory are the integrated ones.
    #[must_use]
    pub fn kept(&self) -> bool {
        self.accepted.unwrap_or(true)
    }

    /// Log lines in their fixed order.
    #[must_use]
    pub fn log_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(3);
        if self.overflow_corrected {
            lines.push(format!(
                "WARNING: Correcting Apparent Overflow: Delta S = {:.4e}",
                self.raw_delta
            ));
        }
        let tag = match self.accepted {
            Some(true) => "ACCEPT",
            Some(false) => "REJECT",
            None => "CHECK",
        };
        lines.push(format!(
            "{tag}: delta S = {:.4e} start S = {:.12e} end S = {:.12e}",
            self.delta, self.start_action, self.end_action
        ));
        if self.monitor_force {
            lines.push(format!(
                "MONITOR_FORCE {:.4e} {:.4e}",
                self.avg_force_norm, self.max_force_norm
            ));
        }
        lines
    }
}

/// Replace a non-finite or absurdly large ΔS by [`DELTA_S_OVERFLOW`].
///
/// Returns the value to use and whether it was replaced.
#[must_use]
pub fn guard_overflow(raw: f64) -> (f64, bool) {
    if !raw.is_finite() || raw.abs() > DELTA_S_OVERFLOW {
        (DELTA_S_OVERFLOW, true)
    } else {
        (raw, false)
    }
}

/// Integrate and decide, using the momenta already in the store.
///
/// # Errors
///
/// Communication failure.
pub fn molecular_dynamics(sim: &mut Simulation, mode: TrajectoryMode) -> Result<TrajectoryReport> {
    if mode == TrajectoryMode::Metropolis {
        sim.store.take_snapshot();
    }

    let start_action = sim.evaluate_action()?;
    let monitor = integrate(sim)?;
    let end_action = sim.evaluate_action()?;

    let raw_delta = end_action - start_action;
    let (delta, overflow_corrected) = guard_overflow(raw_delta);
    if overflow_corrected && sim.mesh.is_root() {
        warn!("ΔS = {raw_delta:.4e} treated as overflow, using {delta:.1e}");
    }

    let accepted = match mode {
        TrajectoryMode::Metropolis => {
            let u = sim.draw_uniform()?.value();
            let accept = (-delta).exp() >= u;
            if accept {
                sim.store.discard_snapshot();
            } else {
                sim.store.restore_snapshot();
            }
            Some(accept)
        }
        TrajectoryMode::AlwaysAccept => None,
    };

    Ok(TrajectoryReport {
        start_action,
        end_action,
        delta,
        raw_delta,
        overflow_corrected,
        accepted,
        avg_force_norm: monitor.average(),
        max_force_norm: monitor.max,
        force_evaluations: monitor.count,
        monitor_force: sim.params.traj_length > 0.0,
    })
}

/// Full trajectory: fresh momenta, then [`molecular_dynamics`].
///
/// # Errors
///
/// Communication failure.
pub fn run_trajectory(sim: &mut Simulation, mode: TrajectoryMode) -> Result<TrajectoryReport> {
    sim.refresh_momenta();
    molecular_dynamics(sim, mode)
}

/// Forward/backward integration from one momentum draw.
#[derive(Clone, Debug, Serialize)]
pub struct ReversibilityReport {
    /// Forward leg.
    pub forward: TrajectoryReport,
    /// Leg with negated momenta.
    pub backward: TrajectoryReport,
    /// RMS entry deviation of U and X from the starting fields.
    pub rms_deviation: f64,
    /// Observables before the forward leg.
    pub initial: FieldSummary,
    /// Observables between the legs.
    pub after_forward: FieldSummary,
    /// Observables after the backward leg.
    pub after_backward: FieldSummary,
}

/// Integrate forward, negate the momenta, integrate again, and compare
/// with the starting fields.
///
/// Both legs run in always-accept mode. The fields are left at the end of
/// the backward leg.
///
/// # Errors
///
/// Communication failure.
pub fn reversibility_check(sim: &mut Simulation) -> Result<ReversibilityReport> {
    sim.refresh_momenta();
    let links0 = sim.store.links.clone();
    let scalars0 = sim.store.scalars.clone();
    let initial = field_summary(sim)?;

    let forward = molecular_dynamics(sim, TrajectoryMode::AlwaysAccept)?;
    let after_forward = field_summary(sim)?;
    sim.store.negate_momenta();
    let backward = molecular_dynamics(sim, TrajectoryMode::AlwaysAccept)?;
    let after_backward = field_summary(sim)?;

    let distance = |a: &[Matrix], b: &[Matrix]| -> f64 {
        a.iter().zip(b).map(|(x, y)| (*x - *y).norm_sq()).sum()
    };
    let mut local = distance(&sim.store.links, &links0);
    for (now, then) in sim.store.scalars.iter().zip(&scalars0) {
        local += distance(now, then);
    }
    let total = sim.mesh.sum(local)?;
    let fields = (1 + sim.params.n_scalars) as f64;
    let entries = sim.params.nt as f64 * fields * (NCOL * NCOL) as f64;

    Ok(ReversibilityReport {
        forward,
        backward,
        rms_deviation: (total / entries).sqrt(),
        initial,
        after_forward,
        after_backward,
    })
}

/// Running statistics over production trajectories.
#[derive(Clone, Debug, Default, Serialize)]
pub struct HmcStatistics {
    /// Trajectories recorded.
    pub n_trajectories: usize,
    /// Trajectories kept.
    pub accepted: usize,
    /// Σ |ΔS|.
    pub sum_abs_delta: f64,
    /// Σ exp(−ΔS).
    pub sum_exp_minus_delta: f64,
}

impl HmcStatistics {
    /// Add one trajectory.
    pub fn record(&mut self, report: &TrajectoryReport) {
        self.n_trajectories += 1;
        if report.kept() {
            self.accepted += 1;
        }
        self.sum_abs_delta += report.delta.abs();
        self.sum_exp_minus_delta += (-report.delta).exp();
    }

    /// Fraction of trajectories kept.
    #[must_use]
    pub fn acceptance_rate(&self) -> f64 {
        self.mean(self.accepted as f64)
    }

    /// ⟨|ΔS|⟩.
    #[must_use]
    pub fn mean_abs_delta(&self) -> f64 {
        self.mean(self.sum_abs_delta)
    }

    /// ⟨exp(−ΔS)⟩, which is 1 in equilibrium.
    #[must_use]
    pub fn mean_exp_minus_delta(&self) -> f64 {
        self.mean(self.sum_exp_minus_delta)
    }

    fn mean(&self, total: f64) -> f64 {
        if self.n_trajectories == 0 {
            0.0
        } else {
            total / self.n_trajectories as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::lattice::mesh::launch;

    fn report(delta: f64, accepted: Option<bool>) -> TrajectoryReport {
        TrajectoryReport {
            start_action: 1.0,
            end_action: 1.0 + delta,
            delta,
            raw_delta: delta,
            overflow_corrected: false,
            accepted,
            avg_force_norm: 0.5,
            max_force_norm: 0.75,
            force_evaluations: 10,
            monitor_force: true,
        }
    }

    #[test]
    fn overflow_guard_clamps_non_finite_and_huge() {
        assert_eq!(guard_overflow(0.25), (0.25, false));
        assert_eq!(guard_overflow(-3.0), (-3.0, false));
        assert_eq!(guard_overflow(f64::NAN), (DELTA_S_OVERFLOW, true));
        assert_eq!(guard_overflow(f64::NEG_INFINITY), (DELTA_S_OVERFLOW, true));
        assert_eq!(guard_overflow(-2e20), (DELTA_S_OVERFLOW, true));
        assert_eq!(guard_overflow(1e20), (1e20, false));
    }

    #[test]
    fn log_lines_follow_decision() {
        let lines = report(0.125, Some(true)).log_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ACCEPT: delta S = 1.2500e-1 start S = "));
        assert_eq!(lines[1], "MONITOR_FORCE 5.0000e-1 7.5000e-1");
        assert!(report(1.0, Some(false)).log_lines()[0].starts_with("REJECT:"));
        assert!(report(1.0, None).log_lines()[0].starts_with("CHECK:"));
    }

    #[test]
    fn overflow_line_comes_first() {
        let mut r = report(DELTA_S_OVERFLOW, Some(false));
        r.raw_delta = f64::INFINITY;
        r.overflow_corrected = true;
        r.monitor_force = false;
        let lines = r.log_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "WARNING: Correcting Apparent Overflow: Delta S = inf");
        assert!(lines[1].starts_with("REJECT: delta S = 1.0000e20"));
    }

    #[test]
    fn statistics_average_over_trajectories() {
        let mut stats = HmcStatistics::default();
        assert_eq!(stats.acceptance_rate(), 0.0);
        stats.record(&report(0.5, Some(true)));
        stats.record(&report(-0.5, Some(false)));
        stats.record(&report(0.0, None));
        assert_eq!(stats.n_trajectories, 3);
        assert_eq!(stats.accepted, 2);
        assert!((stats.acceptance_rate() - 2.0 / 3.0).abs() < 1e-15);
        assert!((stats.mean_abs_delta() - 1.0 / 3.0).abs() < 1e-15);
    }

    #[test]
    fn every_worker_reaches_the_same_decision() {
        let cfg = RunConfig {
            nt: 6,
            n_scalars: 2,
            workers: 3,
            nsteps: 4,
            ..RunConfig::default()
        };
        let decisions = launch(6, 3, |mesh| {
            let mut sim = Simulation::new(mesh, &cfg)?;
            (0..5)
                .map(|_| sim.run_trajectory().map(|r| (r.accepted, r.delta.to_bits())))
                .collect::<Result<Vec<_>>>()
        })
        .expect("mesh runs");
        for other in &decisions[1..] {
            assert_eq!(other, &decisions[0]);
        }
    }

    #[test]
    fn reversibility_restores_fields() {
        let cfg = RunConfig {
            nt: 4,
            n_scalars: 2,
            nsteps: 20,
            ..RunConfig::default()
        };
        let out = launch(4, 2, |mesh| {
            let mut sim = Simulation::new(mesh, &cfg)?;
            reversibility_check(&mut sim)
        })
        .expect("mesh runs");
        let r = &out[0];
        assert!(r.rms_deviation < 1e-10, "rms {}", r.rms_deviation);
        assert!((r.forward.delta + r.backward.delta).abs() < 1e-8);

        assert!((r.after_backward.action_per_site - r.initial.action_per_site).abs() < 1e-8);
        assert!((r.after_forward.action_per_site - r.initial.action_per_site).abs() > 1e-10);
        let squares = r.initial.scalar_squares.per_scalar.iter();
        for (a, b) in squares.zip(&r.after_backward.scalar_squares.per_scalar) {
            assert!((a - b).abs() < 1e-10);
        }
        let (p0, p2) = (r.initial.polyakov.expect("root"), r.after_backward.polyakov.expect("root"));
        assert!((p0 - p2).norm() < 1e-10);
        assert!(out[1].initial.polyakov.is_none());
    }
}
