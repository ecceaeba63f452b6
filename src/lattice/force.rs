// SPDX-License-Identifier: AGPL-3.0-only

//! Force evaluator: gradient of the bosonic action, applied to the momenta.
//!
//! With `Y_j(t) = U(t) X_j(t+1) U(t)†` and
//! `Z_j(t) = U(t−1)† X_j(t−1) U(t−1)`, the equations of motion for the
//! action in [`super::action`] are
//!
//! ```text
//! dP_U/dτ   = −4β · Π( Σ_j X_j(t) Y_j(t) )
//! dP_Xj/dτ  =  2β · Π( Y_j(t) + Z_j(t) − (2+ω²) X_j(t) )
//! ```
//!
//! where Π is the traceless anti-Hermitian projection. `Y` needs a forward
//! gather of X; `Z` is formed on the owning site and gathered backward.
//! All 2S gathers are issued before the first wait so they overlap.

use super::antiherm::AntiHermitian;
use super::halo::Direction;
use super::matrix::Matrix;
use super::simulation::Simulation;
use crate::error::Result;

/// Advance every momentum by `eps` times its force.
///
/// Returns the force-norm monitor `eps · sqrt(Σ ‖F‖²) / nt`, summed over
/// every updated link and scalar momentum on all workers. The force
/// accumulators `link_force` (Σ_j X_j Y_j) and `scalar_force` (applied
/// scalar force) are left filled for inspection.
///
/// # Errors
///
/// Communication failure in a gather or the norm reduction.
pub fn bosonic_force(sim: &mut Simulation, eps: f64) -> Result<f64> {
    let beta = sim.params.beta;
    let mass = 2.0 + sim.params.omega * sim.params.omega;
    let nt = sim.params.nt as f64;
    let store = &mut sim.store;
    let mesh = &mut sim.mesh;

    // U† X U on the owning site becomes Z at t+1
    let conjugated: Vec<Vec<Matrix>> = store
        .scalars
        .iter()
        .map(|field| {
            field
                .iter()
                .zip(&store.links)
                .map(|(x, u)| u.mul_an(*x * *u))
                .collect()
        })
        .collect();

    let forward = store
        .scalars
        .iter()
        .map(|x| mesh.start_gather(x, Direction::Forward))
        .collect::<Result<Vec<_>>>()?;
    let backward = conjugated
        .iter()
        .map(|z| mesh.start_gather(z, Direction::Backward))
        .collect::<Result<Vec<_>>>()?;

    store.link_force.fill(Matrix::ZERO);
    let mut hops: Vec<Vec<Matrix>> = Vec::with_capacity(forward.len());
    for (j, handle) in forward.into_iter().enumerate() {
        let next = mesh.wait(handle)?;
        let mut hop = Vec::with_capacity(next.len());
        for (i, u) in store.links.iter().enumerate() {
            let y = (*u * *next.get(i)).mul_na(*u);
            store.link_force[i] += store.scalars[j][i] * y;
            hop.push(y);
        }
        next.release();
        hops.push(hop);
    }

    let mut norm_sq = 0.0;
    let gauge_coupling = 4.0 * beta;
    for (p, f) in store.link_mom.iter_mut().zip(&store.link_force) {
        let force = AntiHermitian::project(f).to_matrix().scale(-gauge_coupling);
        norm_sq += force.norm_sq();
        *p = AntiHermitian::project(&p.to_matrix().add_scaled(force, eps));
    }

    let scalar_coupling = 2.0 * beta;
    for (j, handle) in backward.into_iter().enumerate() {
        let prev = mesh.wait(handle)?;
        for i in 0..prev.len() {
            let x = store.scalars[j][i];
            let force = (hops[j][i] + *prev.get(i) - x.scale(mass))
                .scale(scalar_coupling)
                .anti_hermitian_part();
            norm_sq += force.norm_sq();
            store.scalar_force[j][i] = force;
            store.scalar_mom[j][i] = store.scalar_mom[j][i].add_scaled(force, eps);
        }
        prev.release();
    }

    let total = mesh.sum(norm_sq)?;
    Ok(eps * total.sqrt() / nt)
}
