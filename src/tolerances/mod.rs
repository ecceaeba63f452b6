// SPDX-License-Identifier: AGPL-3.0-only

//! Centralized tolerances with numerical justification.
//!
//! Every threshold used by the field projector, the checked conversions,
//! the validation binaries and the tests is defined here with a note on
//! where the number comes from. No ad-hoc magic numbers.
//!
//! # Tolerance categories
//!
//! | Category | Basis | Example |
//! |----------|-------|---------|
//! | Machine precision | IEEE 754 f64 | 1e-10 for exact arithmetic |
//! | Integrator | O(eps²) error of symplectic schemes | 1e-6 on ΔS |
//! | Statistical | Finite trajectory counts | acceptance > 30% |

/// Lattice field, integrator and Metropolis tolerances.
pub mod lattice;

pub use lattice::{
    ANTIHERM_COMPRESS_TOL, COLD_ACTION_ABS, COLD_FIXED_POINT_DELTA_S_ABS,
    COLD_REFRESHED_DELTA_S_MAX, HMC_ACCEPTANCE_MIN, LEAPFROG_ORDER_RATIO_MAX,
    LEAPFROG_ORDER_RATIO_MIN, PARTITION_AGREEMENT_REL, PROJECTOR_DRIFT_WARN,
    REVERSIBILITY_DELTA_S_ABS, REVERSIBILITY_RMS_MAX,
};

/// Expected values smaller than this are compared absolutely, not relatively.
///
/// Relative error is meaningless when the reference value is itself at the
/// rounding floor of an O(1) computation.
pub const NEAR_ZERO_EXPECTED: f64 = 1e-12;
