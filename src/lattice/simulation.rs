// SPDX-License-Identifier: AGPL-3.0-only

//! Per-worker simulation context.
//!
//! A [`Simulation`] owns everything one worker needs for a run: its part of
//! the lattice, its mesh endpoint, the run parameters, the random streams
//! and the field projector. Every evaluator and integrator takes it by
//! `&mut`; there is no global state.

use log::{debug, warn};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::checkpoint;
use super::hmc::{self, TrajectoryReport};
use super::mesh::{GlobalConsensusValue, Mesh};
use super::projector::{DriftReport, FieldProjector};
use super::rng::{gaussian_antiherm, node_stream, site_stream};
use super::store::LatticeStore;
use super::action;
use crate::config::{RunConfig, StartLattice};
use crate::error::{BqmError, Result};

/// One worker's view of a running simulation.
#[derive(Debug)]
pub struct Simulation {
    /// Immutable run parameters.
    pub params: RunConfig,
    /// This worker's sites.
    pub store: LatticeStore,
    /// This worker's mesh endpoint.
    pub mesh: Mesh,
    /// Manifold projector applied after every trajectory.
    pub projector: FieldProjector,
    site_rngs: Vec<ChaCha8Rng>,
    node_rng: ChaCha8Rng,
}

impl Simulation {
    /// Build the context for `mesh`'s slice, starting from `params.start`.
    ///
    /// A reloaded configuration is projected onto its manifolds right away
    /// and the correction is logged.
    ///
    /// # Errors
    ///
    /// Invalid parameters, a mesh built for a different `nt`, unreadable or
    /// mismatched checkpoints, and communication failures.
    pub fn new(mesh: Mesh, params: &RunConfig) -> Result<Self> {
        let store = match &params.start {
            StartLattice::Fresh => LatticeStore::cold(*mesh.slice(), params.n_scalars),
            StartLattice::Reload { path } => {
                checkpoint::load_slice(path, *mesh.slice(), params.n_scalars)?
            }
        };
        let mut sim = Self::with_store(mesh, params, store)?;
        if let StartLattice::Reload { path } = &params.start {
            let drift = sim.project_fields()?;
            if sim.mesh.is_root() {
                log::info!(
                    "reloaded {}: unitarity {:.2e} -> {:.2e}, anti-hermiticity {:.2e} -> {:.2e}",
                    path.display(),
                    drift.link_before,
                    drift.link_after,
                    drift.scalar_before,
                    drift.scalar_after
                );
            }
        }
        Ok(sim)
    }

    /// Build the context around an existing store (continuing a run).
    ///
    /// # Errors
    ///
    /// Invalid parameters or a store/mesh that does not match them.
    pub fn with_store(mesh: Mesh, params: &RunConfig, store: LatticeStore) -> Result<Self> {
        params.validate()?;
        let slice = *mesh.slice();
        if slice.nt != params.nt {
            return Err(BqmError::invalid(
                "nt",
                format!("mesh spans {} sites, configuration says {}", slice.nt, params.nt),
            ));
        }
        if store.slice != slice || store.n_scalars() != params.n_scalars {
            return Err(BqmError::invalid(
                "n_scalars",
                "lattice store does not match this worker's slice",
            ));
        }
        let site_rngs = store
            .sites
            .iter()
            .map(|site| site_stream(params.seed, site.t))
            .collect();
        let node_rng = node_stream(params.seed, params.nt, slice.rank);
        Ok(Self {
            params: params.clone(),
            store,
            mesh,
            projector: FieldProjector::default(),
            site_rngs,
            node_rng,
        })
    }

    /// Draw fresh Gaussian momenta for every link and scalar.
    ///
    /// Each site draws from its own stream: link momentum first, then the
    /// scalar momenta in order. The result is independent of the partition.
    pub fn refresh_momenta(&mut self) {
        let store = &mut self.store;
        for (i, rng) in self.site_rngs.iter_mut().enumerate() {
            store.link_mom[i] = gaussian_antiherm(rng);
            for field in &mut store.scalar_mom {
                field[i] = gaussian_antiherm(rng).to_matrix();
            }
        }
    }

    /// Uniform number in [0, 1) drawn on worker 0 and shared with all.
    ///
    /// # Errors
    ///
    /// Communication failure.
    pub fn draw_uniform(&mut self) -> Result<GlobalConsensusValue> {
        let rng = &mut self.node_rng;
        self.mesh.consensus(|| rng.gen::<f64>())
    }

    /// Project all fields and reduce the drift report over workers.
    ///
    /// Drift above the projector threshold is logged as a warning with the
    /// before/after magnitudes; it never aborts the run.
    ///
    /// # Errors
    ///
    /// Communication failure.
    pub fn project_fields(&mut self) -> Result<DriftReport> {
        let local = self.projector.project(&mut self.store);
        let report = DriftReport {
            link_before: self.mesh.max(local.link_before)?,
            link_after: self.mesh.max(local.link_after)?,
            scalar_before: self.mesh.max(local.scalar_before)?,
            scalar_after: self.mesh.max(local.scalar_after)?,
        };
        if self.mesh.is_root() {
            if report.exceeds(self.projector.warn_threshold) {
                warn!(
                    "numeric drift: unitarity {:.3e} -> {:.3e}, anti-hermiticity {:.3e} -> {:.3e}",
                    report.link_before, report.link_after, report.scalar_before, report.scalar_after
                );
            } else {
                debug!(
                    "reprojected: unitarity {:.3e}, anti-hermiticity {:.3e}",
                    report.link_before, report.scalar_before
                );
            }
        }
        Ok(report)
    }

    /// Total action: bosonic plus both kinetic terms.
    ///
    /// # Errors
    ///
    /// Communication failure.
    pub fn evaluate_action(&mut self) -> Result<f64> {
        action::evaluate_action(self)
    }

    /// One trajectory in the configured mode.
    ///
    /// # Errors
    ///
    /// Communication failure.
    pub fn run_trajectory(&mut self) -> Result<TrajectoryReport> {
        let mode = self.params.mode;
        hmc::run_trajectory(self, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::mesh::launch;

    fn config(nt: usize, workers: usize) -> RunConfig {
        RunConfig {
            nt,
            workers,
            n_scalars: 2,
            ..RunConfig::default()
        }
    }

    #[test]
    fn momenta_do_not_depend_on_partition() {
        let draw = |workers: usize| {
            let cfg = config(6, workers);
            let parts = launch(6, workers, |mesh| {
                let mut sim = Simulation::new(mesh, &cfg)?;
                sim.refresh_momenta();
                Ok((sim.store.link_mom.clone(), sim.store.scalar_mom[1].clone()))
            })
            .expect("mesh runs");
            let mut links = Vec::new();
            let mut scalars = Vec::new();
            for (l, s) in parts {
                links.extend(l);
                scalars.extend(s);
            }
            (links, scalars)
        };
        assert_eq!(draw(1), draw(3));
    }

    #[test]
    fn uniform_is_shared() {
        let cfg = config(4, 4);
        let values = launch(4, 4, |mesh| {
            let mut sim = Simulation::new(mesh, &cfg)?;
            Ok(sim.draw_uniform()?.value())
        })
        .expect("mesh runs");
        assert!(values.iter().all(|v| v.to_bits() == values[0].to_bits()));
        assert!((0.0..1.0).contains(&values[0]));
    }

    #[test]
    fn mismatched_mesh_is_rejected() {
        let cfg = config(4, 1);
        let err = launch(5, 1, |mesh| Simulation::new(mesh, &cfg).map(|_| ())).unwrap_err();
        assert!(matches!(err, BqmError::InputValidation { field: "nt", .. }));
    }
}
