// SPDX-License-Identifier: AGPL-3.0-only

//! Symplectic integrators for the molecular-dynamics trajectory.
//!
//! Both schemes integrate total time `traj_length` and end with one pass of
//! the field projector.
//!
//! Leapfrog (`eps = traj_length / nsteps`):
//!
//! ```text
//! U(eps/2) · [ F(eps) · U(eps) ]^(nsteps−1) · F(eps) · U(eps/2)
//! ```
//!
//! Omelyan minimum-norm, two blocks per outer step, `inner` repetitions
//! per block with `h = traj_length / (2 · nsteps · inner)`:
//!
//! ```text
//! F(λh) · [ U(h/2) · F((1−2λ)h) · U(h/2) · F(2λh) ]^(inner−1)
//!       ·   U(h/2) · F((1−2λ)h) · U(h/2) · F(λh)
//! ```
//!
//! `U(s)` moves every link and scalar by time `s`; `F(s)` kicks every
//! momentum by `s` times its force.
//!
//! # References
//!
//! - Omelyan, Mryglod, Folk, Comput. Phys. Commun. 151, 272 (2003)
//! - Takaishi & de Forcrand, PRE 73, 036706 (2006)

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::constants::{EXP_SERIES_ORDER, OMELYAN_LAMBDA, OMELYAN_LAMBDA_MID};
use super::force::bosonic_force;
use super::matrix::Matrix;
use super::simulation::Simulation;
use super::store::LatticeStore;
use crate::error::Result;

/// Integration scheme.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorKind {
    /// Velocity-Verlet leapfrog: O(eps²) energy error, one force per step.
    #[default]
    Leapfrog,
    /// Omelyan 2MN: O(eps²) with a ~10× smaller coefficient.
    Omelyan,
}

/// Running statistics of the force-norm monitor over one trajectory.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ForceMonitor {
    /// Sum of recorded norms.
    pub sum: f64,
    /// Largest recorded norm.
    pub max: f64,
    /// Number of force evaluations.
    pub count: usize,
}

impl ForceMonitor {
    /// Record one force evaluation.
    pub fn record(&mut self, norm: f64) {
        self.sum += norm;
        self.max = self.max.max(norm);
        self.count += 1;
    }

    /// Mean norm per force evaluation (0 if none).
    #[must_use]
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// exp(eps·P)·U by an 8th-order truncated series in Horner form.
///
/// acc ← U + (eps/k)·P·acc for k = 8 … 1, starting from acc = U.
pub fn exp_times(p: &Matrix, u: &Matrix, eps: f64) -> Matrix {
    let mut acc = *u;
    for k in (1..=EXP_SERIES_ORDER).rev() {
        acc = u.add_scaled(*p * acc, eps / k as f64);
    }
    acc
}

/// Move every link and scalar along its momentum for time `eps`.
///
/// `U ← exp(eps·P_U)·U`, `X_j ← X_j + eps·P_Xj`. Momenta are untouched.
/// Sites are independent, so each field is updated in parallel.
pub fn update_link(store: &mut LatticeStore, eps: f64) {
    store
        .links
        .par_iter_mut()
        .zip(store.link_mom.par_iter())
        .for_each(|(u, p)| *u = exp_times(&p.to_matrix(), u, eps));
    for (field, mom) in store.scalars.iter_mut().zip(&store.scalar_mom) {
        field
            .par_iter_mut()
            .zip(mom.par_iter())
            .for_each(|(x, p)| *x = x.add_scaled(*p, eps));
    }
}

/// Leapfrog trajectory; no projection.
///
/// # Errors
///
/// Communication failure in a force evaluation.
pub fn leapfrog(sim: &mut Simulation, monitor: &mut ForceMonitor) -> Result<()> {
    let nsteps = sim.params.nsteps;
    let eps = sim.params.step_size();

    update_link(&mut sim.store, 0.5 * eps);
    for step in 0..nsteps {
        monitor.record(bosonic_force(sim, eps)?);
        if step + 1 < nsteps {
            update_link(&mut sim.store, eps);
        } else {
            update_link(&mut sim.store, 0.5 * eps);
        }
    }
    Ok(())
}

fn omelyan_block(
    sim: &mut Simulation,
    monitor: &mut ForceMonitor,
    h: f64,
    inner: usize,
) -> Result<()> {
    monitor.record(bosonic_force(sim, h * OMELYAN_LAMBDA)?);
    for rep in 0..inner {
        update_link(&mut sim.store, 0.5 * h);
        monitor.record(bosonic_force(sim, h * OMELYAN_LAMBDA_MID)?);
        update_link(&mut sim.store, 0.5 * h);
        let closing = if rep + 1 < inner {
            2.0 * OMELYAN_LAMBDA
        } else {
            OMELYAN_LAMBDA
        };
        monitor.record(bosonic_force(sim, h * closing)?);
    }
    Ok(())
}

/// Omelyan trajectory: two blocks per outer step; no projection.
///
/// # Errors
///
/// Communication failure in a force evaluation.
pub fn omelyan(sim: &mut Simulation, monitor: &mut ForceMonitor) -> Result<()> {
    let outer = sim.params.nsteps;
    let inner = sim.params.omelyan_inner();
    let h = sim.params.traj_length / (2 * outer * inner) as f64;

    for _ in 0..outer {
        omelyan_block(sim, monitor, h, inner)?;
        omelyan_block(sim, monitor, h, inner)?;
    }
    Ok(())
}

/// Integrate one trajectory with the configured scheme, then project.
///
/// # Errors
///
/// Communication failure.
pub fn integrate(sim: &mut Simulation) -> Result<ForceMonitor> {
    let mut monitor = ForceMonitor::default();
    match sim.params.integrator {
        IntegratorKind::Leapfrog => leapfrog(sim, &mut monitor)?,
        IntegratorKind::Omelyan => omelyan(sim, &mut monitor)?,
    }
    sim.project_fields()?;
    Ok(monitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::lattice::action::evaluate_action;
    use crate::lattice::mesh::launch;
    use crate::lattice::rng::{gaussian_antiherm, site_stream};

    #[test]
    fn exp_times_matches_closed_form_on_diagonal() {
        // Truncation after θ^8/8!: error bounded by θ^9/9!
        for (theta, tol) in [(0.1, 1e-14), (0.37, 1e-9)] {
            let mut p = Matrix::ZERO;
            p.m[0][0] = num_complex::Complex64::new(0.0, theta);
            p.m[1][1] = num_complex::Complex64::new(0.0, -theta);
            let u = exp_times(&p, &Matrix::IDENTITY, 1.0);
            assert!((u.m[0][0].re - theta.cos()).abs() < tol, "theta {theta}");
            assert!((u.m[0][0].im - theta.sin()).abs() < tol, "theta {theta}");
            assert!((u.m[1][1].im + theta.sin()).abs() < tol, "theta {theta}");
        }
    }

    #[test]
    fn exp_times_stays_unitary() {
        let p = gaussian_antiherm(&mut site_stream(3, 0)).to_matrix();
        let u = exp_times(&p, &Matrix::IDENTITY, 0.1);
        assert!(u.unitarity_deviation() < 1e-12);
    }

    #[test]
    fn force_monitor_tracks_mean_and_max() {
        let mut m = ForceMonitor::default();
        assert_eq!(m.average(), 0.0);
        m.record(1.0);
        m.record(3.0);
        assert_eq!(m.average(), 2.0);
        assert_eq!(m.max, 3.0);
        assert_eq!(m.count, 2);
    }

    fn energy_error(integrator: IntegratorKind, nsteps: usize) -> (f64, usize) {
        let cfg = RunConfig {
            nt: 4,
            n_scalars: 2,
            omega: 1.0,
            nsteps,
            integrator,
            ..RunConfig::default()
        };
        launch(4, 2, |mesh| {
            let mut sim = Simulation::new(mesh, &cfg)?;
            sim.refresh_momenta();
            let start = evaluate_action(&mut sim)?;
            let monitor = integrate(&mut sim)?;
            let end = evaluate_action(&mut sim)?;
            Ok(((end - start).abs(), monitor.count))
        })
        .expect("mesh runs")[0]
    }

    #[test]
    fn force_counts_follow_schedules() {
        assert_eq!(energy_error(IntegratorKind::Leapfrog, 7).1, 7);
        // 2 blocks × (1 + 2·inner) per outer step, inner = nsteps
        assert_eq!(energy_error(IntegratorKind::Omelyan, 3).1, 3 * 2 * (1 + 2 * 3));
    }

    #[test]
    fn omelyan_beats_leapfrog_at_equal_step_count() {
        let (lf, _) = energy_error(IntegratorKind::Leapfrog, 10);
        let (om, _) = energy_error(IntegratorKind::Omelyan, 10);
        assert!(lf > 0.0);
        assert!(om < lf, "omelyan {om} vs leapfrog {lf}");
    }

    #[test]
    fn zero_length_trajectory_is_identity() {
        let cfg = RunConfig {
            nt: 3,
            n_scalars: 1,
            traj_length: 0.0,
            ..RunConfig::default()
        };
        let same = launch(3, 1, |mesh| {
            let mut sim = Simulation::new(mesh, &cfg)?;
            sim.refresh_momenta();
            let before = sim.store.clone();
            integrate(&mut sim)?;
            Ok(before.links == sim.store.links && before.scalars == sim.store.scalars)
        })
        .expect("mesh runs");
        assert!(same[0]);
    }
}
