// SPDX-License-Identifier: AGPL-3.0-only

//! Dense N×N complex matrices for links, scalars and scalar momenta.
//!
//! Links live on U(N) (unitary, det ≈ 1 from a cold start since every
//! momentum is traceless). Scalars and their momenta live in the algebra:
//! anti-Hermitian and traceless. Both are stored densely here; the packed
//! momentum form is [`super::antiherm::AntiHermitian`].
//!
//! Storage: row-major, N² `Complex64` values.
//!
//! # References
//!
//! - Gattringer & Lang, "QCD on the Lattice" (2010), Ch. 2
//! - Hanada, "Markov Chain Monte Carlo for Dummies" (2018), §6 (matrix QM)

use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::constants::{LATTICE_DIVISION_GUARD, NCOL, ONE_OV_N};

const C_ZERO: Complex64 = Complex64::new(0.0, 0.0);
const C_ONE: Complex64 = Complex64::new(1.0, 0.0);

/// N×N complex matrix.
///
/// Row-major storage: `m[row][col]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct Matrix {
    /// Matrix elements m[row][col].
    pub m: [[Complex64; NCOL]; NCOL],
}

impl Default for Matrix {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Mul for Matrix {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        let mut r = Self::ZERO;
        for i in 0..NCOL {
            for j in 0..NCOL {
                let mut s = C_ZERO;
                for k in 0..NCOL {
                    s += self.m[i][k] * rhs.m[k][j];
                }
                r.m[i][j] = s;
            }
        }
        r
    }
}

impl Add for Matrix {
    type Output = Self;
    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl Sub for Matrix {
    type Output = Self;
    fn sub(mut self, rhs: Self) -> Self {
        self -= rhs;
        self
    }
}

impl AddAssign for Matrix {
    fn add_assign(&mut self, rhs: Self) {
        for (row, rrow) in self.m.iter_mut().zip(rhs.m.iter()) {
            for (a, b) in row.iter_mut().zip(rrow.iter()) {
                *a += *b;
            }
        }
    }
}

impl SubAssign for Matrix {
    fn sub_assign(&mut self, rhs: Self) {
        for (row, rrow) in self.m.iter_mut().zip(rhs.m.iter()) {
            for (a, b) in row.iter_mut().zip(rrow.iter()) {
                *a -= *b;
            }
        }
    }
}

impl Neg for Matrix {
    type Output = Self;
    fn neg(self) -> Self {
        self.scale(-1.0)
    }
}

impl Matrix {
    /// Zero matrix (all elements 0).
    pub const ZERO: Self = Self {
        m: [[C_ZERO; NCOL]; NCOL],
    };

    /// N×N identity matrix.
    pub const IDENTITY: Self = Self::identity();

    const fn identity() -> Self {
        let mut m = [[C_ZERO; NCOL]; NCOL];
        let mut i = 0;
        while i < NCOL {
            m[i][i] = C_ONE;
            i += 1;
        }
        Self { m }
    }

    /// Diagonal matrix from its entries.
    pub fn from_diagonal(diag: [Complex64; NCOL]) -> Self {
        let mut r = Self::ZERO;
        for (i, d) in diag.into_iter().enumerate() {
            r.m[i][i] = d;
        }
        r
    }

    /// Conjugate transpose (adjoint / dagger).
    pub fn adjoint(self) -> Self {
        let mut r = Self::ZERO;
        for i in 0..NCOL {
            for j in 0..NCOL {
                r.m[i][j] = self.m[j][i].conj();
            }
        }
        r
    }

    /// `self · rhs†` without forming the adjoint.
    pub fn mul_na(self, rhs: Self) -> Self {
        let mut r = Self::ZERO;
        for i in 0..NCOL {
            for j in 0..NCOL {
                let mut s = C_ZERO;
                for k in 0..NCOL {
                    s += self.m[i][k] * rhs.m[j][k].conj();
                }
                r.m[i][j] = s;
            }
        }
        r
    }

    /// `self† · rhs` without forming the adjoint.
    pub fn mul_an(self, rhs: Self) -> Self {
        let mut r = Self::ZERO;
        for i in 0..NCOL {
            for j in 0..NCOL {
                let mut s = C_ZERO;
                for k in 0..NCOL {
                    s += self.m[k][i].conj() * rhs.m[k][j];
                }
                r.m[i][j] = s;
            }
        }
        r
    }

    /// Trace: Tr(M) = sum\_i `M_ii`
    pub fn trace(self) -> Complex64 {
        (0..NCOL).fold(C_ZERO, |acc, i| acc + self.m[i][i])
    }

    /// Real part of trace.
    #[must_use]
    pub fn re_trace(self) -> f64 {
        (0..NCOL).map(|i| self.m[i][i].re).sum()
    }

    /// Re Tr(self · rhs), without forming the product.
    #[must_use]
    pub fn re_trace_mul(self, rhs: Self) -> f64 {
        let mut s = 0.0;
        for i in 0..NCOL {
            for k in 0..NCOL {
                s += (self.m[i][k] * rhs.m[k][i]).re;
            }
        }
        s
    }

    /// Re Tr(self† · rhs), the real inner product on matrices.
    #[must_use]
    pub fn realtrace(self, rhs: Self) -> f64 {
        let mut s = 0.0;
        for (row, rrow) in self.m.iter().zip(rhs.m.iter()) {
            for (a, b) in row.iter().zip(rrow.iter()) {
                s += a.re * b.re + a.im * b.im;
            }
        }
        s
    }

    /// Scale by a real number.
    pub fn scale(self, s: f64) -> Self {
        let mut r = self;
        for row in &mut r.m {
            for cell in row.iter_mut() {
                *cell = cell.scale(s);
            }
        }
        r
    }

    /// `self + s · rhs`
    pub fn add_scaled(self, rhs: Self, s: f64) -> Self {
        let mut r = self;
        for (row, rrow) in r.m.iter_mut().zip(rhs.m.iter()) {
            for (a, b) in row.iter_mut().zip(rrow.iter()) {
                *a += b.scale(s);
            }
        }
        r
    }

    /// Frobenius norm squared: sum |`m_ij`|²
    #[must_use]
    pub fn norm_sq(self) -> f64 {
        self.m.iter().flatten().map(Complex64::norm_sqr).sum()
    }

    /// Traceless anti-Hermitian part: (M − M†)/2 − Tr[(M − M†)/2]/N.
    pub fn anti_hermitian_part(self) -> Self {
        let mut r = Self::ZERO;
        for i in 0..NCOL {
            for j in 0..NCOL {
                r.m[i][j] = (self.m[i][j] - self.m[j][i].conj()).scale(0.5);
            }
        }
        let shift = r.trace().scale(ONE_OV_N);
        for i in 0..NCOL {
            r.m[i][i] -= shift;
        }
        r
    }

    /// Largest violation of M = −M† and Tr M = 0.
    #[must_use]
    pub fn anti_hermitian_deviation(self) -> f64 {
        let mut dev = self.trace().norm();
        for i in 0..NCOL {
            for j in 0..NCOL {
                dev = dev.max((self.m[i][j] + self.m[j][i].conj()).norm());
            }
        }
        dev
    }

    /// Largest element of U·U† − I.
    #[must_use]
    pub fn unitarity_deviation(self) -> f64 {
        let prod = self.mul_na(self);
        let mut dev: f64 = 0.0;
        for i in 0..NCOL {
            for j in 0..NCOL {
                let target = if i == j { C_ONE } else { C_ZERO };
                dev = dev.max((prod.m[i][j] - target).norm());
            }
        }
        dev
    }

    /// Project back onto U(N) via modified Gram-Schmidt on the rows.
    ///
    /// After numerical integration, link matrices drift off the group
    /// manifold. Each row is orthogonalized against all earlier rows and
    /// normalized.
    pub fn reunitarize(self) -> Self {
        let mut u = self;
        for r in 0..NCOL {
            for prev in 0..r {
                let dot = row_dot(&u, prev, r);
                for j in 0..NCOL {
                    let shift = u.m[prev][j] * dot;
                    u.m[r][j] -= shift;
                }
            }
            let n = row_norm(&u, r);
            if n > LATTICE_DIVISION_GUARD {
                let inv = 1.0 / n;
                for cell in &mut u.m[r] {
                    *cell = cell.scale(inv);
                }
            }
        }
        u
    }
}

fn row_norm(u: &Matrix, row: usize) -> f64 {
    u.m[row].iter().map(Complex64::norm_sqr).sum::<f64>().sqrt()
}

fn row_dot(u: &Matrix, r1: usize, r2: usize) -> Complex64 {
    let mut s = C_ZERO;
    for j in 0..NCOL {
        s += u.m[r1][j].conj() * u.m[r2][j];
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample() -> Matrix {
        let mut a = Matrix::ZERO;
        for i in 0..NCOL {
            for j in 0..NCOL {
                a.m[i][j] = Complex64::new(0.3 * i as f64 - 0.1 * j as f64, 0.2 + 0.05 * (i * j) as f64);
            }
        }
        a
    }

    fn max_diff(a: Matrix, b: Matrix) -> f64 {
        a.m.iter()
            .flatten()
            .zip(b.m.iter().flatten())
            .map(|(x, y)| (x - y).norm())
            .fold(0.0, f64::max)
    }

    #[test]
    fn identity_properties() {
        let i = Matrix::IDENTITY;
        assert_abs_diff_eq!(i.re_trace(), NCOL as f64, epsilon = 1e-14);
        assert!(i.unitarity_deviation() < 1e-15);
        assert_eq!(i.adjoint(), i);
    }

    #[test]
    fn mul_identity() {
        let a = sample();
        assert!(max_diff(a * Matrix::IDENTITY, a) < 1e-15);
        assert!(max_diff(Matrix::IDENTITY * a, a) < 1e-15);
    }

    #[test]
    fn adjoint_variants_match_explicit_products() {
        let a = sample();
        let b = sample().scale(0.7) + Matrix::IDENTITY;
        assert!(max_diff(a.mul_na(b), a * b.adjoint()) < 1e-14);
        assert!(max_diff(a.mul_an(b), a.adjoint() * b) < 1e-14);
    }

    #[test]
    fn realtrace_is_frobenius_inner_product() {
        let a = sample();
        assert_abs_diff_eq!(a.realtrace(a), a.norm_sq(), epsilon = 1e-14);
        assert_abs_diff_eq!(a.realtrace(a), (a.adjoint() * a).re_trace(), epsilon = 1e-13);
    }

    #[test]
    fn re_trace_mul_matches_product() {
        let a = sample();
        let b = sample().adjoint();
        assert_abs_diff_eq!(a.re_trace_mul(b), (a * b).re_trace(), epsilon = 1e-13);
    }

    #[test]
    fn anti_hermitian_part_is_idempotent_and_traceless() {
        let p = sample().anti_hermitian_part();
        assert!(p.anti_hermitian_deviation() < 1e-15);
        assert!(max_diff(p.anti_hermitian_part(), p) < 1e-15);
    }

    #[test]
    fn hermitian_matrix_has_no_anti_hermitian_part() {
        let a = sample();
        let h = a + a.adjoint();
        assert!(h.anti_hermitian_part().norm_sq() < 1e-28);
    }

    #[test]
    fn reunitarize_fixes_drift() {
        let drifted = Matrix::IDENTITY + sample().scale(0.05);
        assert!(drifted.unitarity_deviation() > 1e-3);
        let fixed = drifted.reunitarize();
        assert!(
            fixed.unitarity_deviation() < 1e-14,
            "deviation after reunitarize: {}",
            fixed.unitarity_deviation()
        );
    }

    #[test]
    fn reunitarize_leaves_unitary_matrix_alone() {
        let i = Complex64::new(0.0, 1.0);
        let mut d = [C_ONE; NCOL];
        d[0] = i;
        d[1] = -i;
        let u = Matrix::from_diagonal(d);
        assert!(max_diff(u.reunitarize(), u) < 1e-15);
    }

    #[test]
    fn add_scaled_and_neg() {
        let a = sample();
        assert!(max_diff(a.add_scaled(a, -1.0), Matrix::ZERO) < 1e-15);
        assert!(max_diff(-a + a, Matrix::ZERO) < 1e-15);
        assert!(max_diff(a - a.scale(2.0), -a) < 1e-15);
    }
}
