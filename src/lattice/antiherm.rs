// SPDX-License-Identifier: AGPL-3.0-only

//! Packed traceless anti-Hermitian matrices (gauge momenta).
//!
//! An anti-Hermitian N×N matrix is fixed by the imaginary parts of its
//! diagonal and its strict upper triangle. The packed form stores exactly
//! those, so the invariant M = −M† holds by construction. Conversions to
//! and from [`Matrix`] are explicit:
//!
//! | Conversion | Behavior |
//! |------------|----------|
//! | [`AntiHermitian::to_matrix`] | exact decompression |
//! | [`AntiHermitian::project`] | traceless anti-Hermitian part of any matrix |
//! | `TryFrom<&Matrix>` | checked compression, rejects non-anti-Hermitian input |

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::constants::{NCOL, N_OFFDIAG, ONE_OV_N};
use super::matrix::Matrix;
use crate::error::BqmError;
use crate::tolerances::ANTIHERM_COMPRESS_TOL;

/// Upper-triangle (row, col) pairs in packed order.
const OFFDIAG_INDEX: [(usize, usize); N_OFFDIAG] = offdiag_index();

const fn offdiag_index() -> [(usize, usize); N_OFFDIAG] {
    let mut out = [(0, 0); N_OFFDIAG];
    let mut k = 0;
    let mut i = 0;
    while i < NCOL {
        let mut j = i + 1;
        while j < NCOL {
            out[k] = (i, j);
            k += 1;
            j += 1;
        }
        i += 1;
    }
    out
}

/// Packed anti-Hermitian matrix.
///
/// `im_diag[i]` is Im(M\_ii); `offdiag[k]` is M\_ij for the k-th upper
/// pair (i < j). The lower triangle is −conj of the upper.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct AntiHermitian {
    /// Imaginary parts of the diagonal.
    pub im_diag: [f64; NCOL],
    /// Strict upper triangle, row-major.
    pub offdiag: [Complex64; N_OFFDIAG],
}

impl AntiHermitian {
    /// Zero momentum.
    pub const ZERO: Self = Self {
        im_diag: [0.0; NCOL],
        offdiag: [Complex64::new(0.0, 0.0); N_OFFDIAG],
    };

    /// Decompress into a dense matrix.
    pub fn to_matrix(&self) -> Matrix {
        let mut r = Matrix::ZERO;
        for (i, &d) in self.im_diag.iter().enumerate() {
            r.m[i][i] = Complex64::new(0.0, d);
        }
        for (&(i, j), &z) in OFFDIAG_INDEX.iter().zip(self.offdiag.iter()) {
            r.m[i][j] = z;
            r.m[j][i] = -z.conj();
        }
        r
    }

    /// Compress the traceless anti-Hermitian part of `m`.
    ///
    /// Always succeeds; the non-algebra part of `m` is discarded.
    pub fn project(m: &Matrix) -> Self {
        let mut im_diag = [0.0; NCOL];
        for (i, d) in im_diag.iter_mut().enumerate() {
            *d = m.m[i][i].im;
        }
        let mean = im_diag.iter().sum::<f64>() * ONE_OV_N;
        for d in &mut im_diag {
            *d -= mean;
        }
        let mut offdiag = [Complex64::new(0.0, 0.0); N_OFFDIAG];
        for (&(i, j), z) in OFFDIAG_INDEX.iter().zip(offdiag.iter_mut()) {
            *z = (m.m[i][j] - m.m[j][i].conj()).scale(0.5);
        }
        Self { im_diag, offdiag }
    }

    /// Kinetic energy 0.5·‖P‖² in packed form: ½Σd² + Σ|m|².
    #[must_use]
    pub fn kinetic(&self) -> f64 {
        let diag: f64 = self.im_diag.iter().map(|d| d * d).sum();
        let off: f64 = self.offdiag.iter().map(Complex64::norm_sqr).sum();
        0.5 * diag + off
    }

    /// Sum of the diagonal imaginary parts (Im Tr).
    #[must_use]
    pub fn im_trace(&self) -> f64 {
        self.im_diag.iter().sum()
    }

    /// Flip the sign in place.
    pub fn negate(&mut self) {
        for d in &mut self.im_diag {
            *d = -*d;
        }
        for z in &mut self.offdiag {
            *z = -*z;
        }
    }
}

impl TryFrom<&Matrix> for AntiHermitian {
    type Error = BqmError;

    fn try_from(m: &Matrix) -> Result<Self, Self::Error> {
        let mut deviation: f64 = 0.0;
        for i in 0..NCOL {
            deviation = deviation.max(m.m[i][i].re.abs());
            for j in (i + 1)..NCOL {
                deviation = deviation.max((m.m[i][j] + m.m[j][i].conj()).norm());
            }
        }
        if deviation > ANTIHERM_COMPRESS_TOL {
            return Err(BqmError::NotAntiHermitian { deviation });
        }
        let mut im_diag = [0.0; NCOL];
        for (i, d) in im_diag.iter_mut().enumerate() {
            *d = m.m[i][i].im;
        }
        let mut offdiag = [Complex64::new(0.0, 0.0); N_OFFDIAG];
        for (&(i, j), z) in OFFDIAG_INDEX.iter().zip(offdiag.iter_mut()) {
            *z = m.m[i][j];
        }
        Ok(Self { im_diag, offdiag })
    }
}
