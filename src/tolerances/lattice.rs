// SPDX-License-Identifier: AGPL-3.0-only

//! Matrix quantum mechanics lattice tolerances.

// ═══════════════════════════════════════════════════════════════════
// Field manifolds
// ═══════════════════════════════════════════════════════════════════

/// Checked compression: largest allowed element of `M + M†`.
///
/// Momenta and forces are built from exact anti-Hermitian parts, so any
/// violation comes from rounding in O(10) multiply-adds: ~1e-14. A matrix
/// off by more than 1e-10 was never in the algebra.
pub const ANTIHERM_COMPRESS_TOL: f64 = 1e-10;

/// Manifold drift above which the field projector logs a warning.
///
/// One trajectory of the 8th-order exponential update drifts links by
/// ~1e-14 per step. Drift of 1e-8 means truncation is no longer negligible
/// (step size too large) or a reloaded configuration was written in
/// single precision.
pub const PROJECTOR_DRIFT_WARN: f64 = 1e-8;

// ═══════════════════════════════════════════════════════════════════
// Action and integrators
// ═══════════════════════════════════════════════════════════════════

/// Cold-start bosonic action: absolute error against the closed form.
///
/// On the cold lattice every term is a product of exact diagonal entries
/// (±i/√2, 0, 1), so only the √2 rounding survives: ~1e-15 per site.
pub const COLD_ACTION_ABS: f64 = 1e-10;

/// Cold fixed point at ω = 0 with zero momenta: |ΔS| bound.
///
/// Uniform scalars and identity links make every force vanish, so the
/// trajectory is static and ΔS is pure rounding.
pub const COLD_FIXED_POINT_DELTA_S_ABS: f64 = 1e-6;

/// Cold start with refreshed momenta, `nsteps = 10`, `traj_length = 1`:
/// |ΔS| upper bound.
///
/// Leapfrog energy error scales as eps² × (force variation); with
/// eps = 0.1 and O(1) Gaussian momenta on a 4-site lattice ΔS is O(1e-2).
pub const COLD_REFRESHED_DELTA_S_MAX: f64 = 0.5;

/// Reversibility: RMS field deviation after forward, negate, forward
/// with `nsteps = 20`.
///
/// Each step is exactly reversible in exact arithmetic; in f64 the
/// residual is accumulated rounding, O(nsteps × 1e-15).
pub const REVERSIBILITY_RMS_MAX: f64 = 1e-10;

/// Reversibility: |ΔS_forward + ΔS_backward| bound.
///
/// The backward leg retraces the forward one, so the two action changes
/// cancel up to rounding of O(10) actions summed over the trajectory.
pub const REVERSIBILITY_DELTA_S_ABS: f64 = 1e-8;

/// Reduction agreement across worker partitions: relative error.
///
/// Partitions change only the summation order of per-site partial sums,
/// so totals agree to a few ulps of the O(10) action.
pub const PARTITION_AGREEMENT_REL: f64 = 1e-12;

/// Leapfrog order: lower bound on ⟨|ΔS|⟩(n) / ⟨|ΔS|⟩(2n).
///
/// A second-order integrator gives a ratio of 4 asymptotically. Finite
/// step sizes and a finite trajectory sample spread it by roughly ±40%.
pub const LEAPFROG_ORDER_RATIO_MIN: f64 = 2.5;

/// Leapfrog order: upper bound on the same ratio.
pub const LEAPFROG_ORDER_RATIO_MAX: f64 = 6.5;

/// Metropolis acceptance lower bound for a well-tuned short trajectory.
///
/// With |ΔS| ≲ 0.1 nearly every trajectory is accepted; falling under 30%
/// indicates a force/integrator mismatch.
pub const HMC_ACCEPTANCE_MIN: f64 = 0.30;
