// SPDX-License-Identifier: AGPL-3.0-only

//! Centralized constants for the matrix quantum mechanics modules.
//!
//! Collects the matrix size, integrator coefficients and numerical guards
//! used across `matrix.rs`, `antiherm.rs`, `integrator.rs` and `hmc.rs`.

/// Matrix dimension N of every link, scalar and momentum.
pub const NCOL: usize = 3;

/// Number of independent off-diagonal entries of an N×N anti-Hermitian matrix.
pub const N_OFFDIAG: usize = NCOL * (NCOL - 1) / 2;

/// 1/N, used for traceless projections and per-color normalizations.
pub const ONE_OV_N: f64 = 1.0 / NCOL as f64;

/// Order of the truncated exponential series in the link update.
///
/// Eighth order keeps the truncation error of `exp(eps·P)` below the
/// double-precision floor for step sizes up to ~0.1.
pub const EXP_SERIES_ORDER: usize = 8;

/// Omelyan minimum-norm coefficient λ (Omelyan, Mryglod, Folk 2003).
pub const OMELYAN_LAMBDA: f64 = 0.193_183_327_503_783_6;

/// Middle Omelyan coefficient 1 − 2λ.
pub const OMELYAN_LAMBDA_MID: f64 = 1.0 - 2.0 * OMELYAN_LAMBDA;

/// Action-change sanity threshold.
///
/// Any |ΔS| above this (or a non-finite ΔS) is treated as overflow and
/// clamped to this value, which forces a Metropolis rejection.
pub const DELTA_S_OVERFLOW: f64 = 1e20;

/// Division guard for Gram-Schmidt normalization.
pub const LATTICE_DIVISION_GUARD: f64 = 1e-30;
