// SPDX-License-Identifier: AGPL-3.0-only

//! Action evaluator.
//!
//! Bosonic action of the matrix model on the periodic time lattice:
//!
//! ```text
//! S_B = β Σ_t Σ_j [ −(2+ω²) Tr X_j(t)² + 2 Tr X_j(t) U(t) X_j(t+1) U(t)† ]
//!     = β Σ_t Σ_j [ ‖U X_j(t+1) U† − X_j(t)‖² + ω² ‖X_j(t)‖² ]      (≥ 0)
//! ```
//!
//! plus the momentum terms ½‖P_U‖² (packed form) and ½‖P_X‖². Every
//! partial sum is reduced over all workers; the result is deterministic
//! given the fields.

use log::debug;

use super::halo::Direction;
use super::simulation::Simulation;
use crate::error::Result;

/// Globally reduced pieces of the total action.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ActionBreakdown {
    /// Bosonic (potential) action.
    pub bosonic: f64,
    /// Kinetic term of the link momenta.
    pub gauge_kinetic: f64,
    /// Kinetic term of the scalar momenta.
    pub scalar_kinetic: f64,
}

impl ActionBreakdown {
    /// Sum of all three pieces.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.bosonic + self.gauge_kinetic + self.scalar_kinetic
    }
}

/// Bosonic action, reduced over all workers.
///
/// # Errors
///
/// Communication failure in the halo exchange or the reduction.
pub fn bosonic_action(sim: &mut Simulation) -> Result<f64> {
    let mass = 2.0 + sim.params.omega * sim.params.omega;
    let store = &sim.store;
    let mesh = &mut sim.mesh;

    let handles = store
        .scalars
        .iter()
        .map(|x| mesh.start_gather(x, Direction::Forward))
        .collect::<Result<Vec<_>>>()?;

    let mut local = 0.0;
    for (j, handle) in handles.into_iter().enumerate() {
        let next = mesh.wait(handle)?;
        for (i, (x, u)) in store.scalars[j].iter().zip(&store.links).enumerate() {
            let hop = (*u * *next.get(i)).mul_na(*u);
            local += -mass * x.re_trace_mul(*x) + 2.0 * x.re_trace_mul(hop);
        }
        next.release();
    }
    mesh.sum(sim.params.beta * local)
}

/// Kinetic action of the current momenta: (gauge, scalar), reduced.
///
/// # Errors
///
/// Communication failure in the reduction.
pub fn momentum_action(sim: &mut Simulation) -> Result<(f64, f64)> {
    let gauge: f64 = sim.store.link_mom.iter().map(|p| p.kinetic()).sum();
    let scalar: f64 = sim
        .store
        .scalar_mom
        .iter()
        .flatten()
        .map(|p| 0.5 * p.realtrace(*p))
        .sum();
    Ok((sim.mesh.sum(gauge)?, sim.mesh.sum(scalar)?))
}

/// All pieces of the action.
///
/// # Errors
///
/// Communication failure.
pub fn action_breakdown(sim: &mut Simulation) -> Result<ActionBreakdown> {
    let bosonic = bosonic_action(sim)?;
    let (gauge_kinetic, scalar_kinetic) = momentum_action(sim)?;
    Ok(ActionBreakdown {
        bosonic,
        gauge_kinetic,
        scalar_kinetic,
    })
}

/// Total action used by the Metropolis test.
///
/// # Errors
///
/// Communication failure.
pub fn evaluate_action(sim: &mut Simulation) -> Result<f64> {
    let parts = action_breakdown(sim)?;
    if sim.mesh.is_root() {
        debug!(
            "action: bosonic {:.12e} Umom {:.12e} Xmom {:.12e} sum {:.12e}",
            parts.bosonic,
            parts.gauge_kinetic,
            parts.scalar_kinetic,
            parts.total()
        );
    }
    Ok(parts.total())
}
