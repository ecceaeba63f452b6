// SPDX-License-Identifier: AGPL-3.0-only

//! Bosonic matrix quantum mechanics on a periodic 1-D time lattice.
//!
//! Each site t carries a U(N) link U(t) to site t+1 and S traceless
//! anti-Hermitian scalars X_j(t). The lattice is split into contiguous
//! slices, one per worker thread; nearest-neighbour terms cross slices
//! through the halo exchange.
//!
//! | Component | Matrix model |
//! |-----------|--------------|
//! | State | U(t) ∈ U(N), X_j(t) ∈ su(N) |
//! | Force law | gradient of β Σ ‖U X(t+1) U† − X(t)‖² + ω² ‖X‖² |
//! | Integrator | Leapfrog or Omelyan, then reprojection |
//! | Observables | ΔS, force monitor, Tr X², Polyakov loop |
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `constants` | Matrix size, integrator coefficients, numerical guards |
//! | `matrix` | Dense N×N complex matrices |
//! | `antiherm` | Packed traceless anti-Hermitian matrices |
//! | `rng` | Seeded per-site and per-worker streams, Gaussian momenta |
//! | `partition` | Contiguous split of the ring over workers |
//! | `mesh` | Worker threads, channels, reductions, consensus |
//! | `halo` | Two-phase neighbour gather (start → wait → release) |
//! | `store` | One worker's fields, momenta, forces, snapshot |
//! | `simulation` | Per-worker context passed to every evaluator |
//! | `action` | Bosonic and kinetic action |
//! | `force` | Momentum update from the action gradient |
//! | `integrator` | Link/scalar update, leapfrog and Omelyan schedules |
//! | `projector` | Reunitarize links, re-anti-hermitize scalars |
//! | `hmc` | Trajectory controller, Metropolis, reversibility check |
//! | `observables` | Scalar squares, Polyakov loop |
//! | `checkpoint` | JSON lattice files with checksum |
//! | `driver` | Warmup/production loop and its log lines |
//!
//! # References
//!
//! - Catterall & Wiseman, JHEP 0712:104 (2007)
//! - Filev & O'Connor, JHEP 1605:167 (2016)

/// Bosonic and kinetic action.
pub mod action;
/// Packed traceless anti-Hermitian matrices.
pub mod antiherm;
/// JSON lattice checkpoints.
pub mod checkpoint;
/// Matrix size, integrator coefficients, numerical guards.
pub mod constants;
/// Run loop and log lines.
pub mod driver;
/// Bosonic force.
pub mod force;
/// Two-phase halo exchange.
pub mod halo;
/// Trajectory controller.
pub mod hmc;
/// Leapfrog and Omelyan integrators.
pub mod integrator;
/// Dense N×N complex matrices.
pub mod matrix;
/// Worker mesh and collectives.
pub mod mesh;
/// Scalar squares and Polyakov loop.
pub mod observables;
/// Lattice partition over workers.
pub mod partition;
/// Manifold projection after drift.
pub mod projector;
/// Seeded random streams.
pub mod rng;
/// Per-worker simulation context.
pub mod simulation;
/// Per-worker field storage.
pub mod store;
