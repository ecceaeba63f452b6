// SPDX-License-Identifier: AGPL-3.0-only

//! bqm-hmc — Hybrid Monte Carlo for bosonic matrix quantum mechanics
//!
//! Samples U(N) links and S traceless anti-Hermitian scalar matrices on a
//! periodic 1-D time lattice, split over worker threads that talk only
//! through channels.
//!
//! ## Modules
//!   - `lattice` — fields, halo exchange, action, force, integrators,
//!     trajectory controller, observables, checkpoints, run loop
//!   - `config` — run parameters from JSON and the command line
//!   - `error` — crate error type
//!   - `tolerances` — named thresholds with justification
//!   - `validation` — pass/fail harness for validation binaries
//!
//! ## Binaries
//!   - `bqm_hmc` — warmups, production trajectories and measurements
//!   - `bqm_reverse` — forward/backward reversibility validation

pub mod config;
pub mod error;
pub mod lattice;
pub mod tolerances;
pub mod validation;
