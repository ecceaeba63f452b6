// SPDX-License-Identifier: AGPL-3.0-only

//! Per-worker lattice storage.
//!
//! Fields are stored as one vector per field (struct of arrays) rather than
//! one struct per site, so that a gather can borrow one field while the
//! force evaluator writes another.
//!
//! | Field | Type | Per site |
//! |-------|------|----------|
//! | `links` | [`Matrix`] | U(t), unitary |
//! | `scalars[j]` | [`Matrix`] | X\_j(t), traceless anti-Hermitian |
//! | `link_mom` | [`AntiHermitian`] | conjugate to U |
//! | `scalar_mom[j]` | [`Matrix`] | conjugate to X\_j |
//! | `link_force`, `scalar_force[j]` | [`Matrix`] | accumulators |
//!
//! Local index `i` corresponds to global time `slice.t_start + i`.

use num_complex::Complex64;

use super::antiherm::AntiHermitian;
use super::constants::NCOL;
use super::matrix::Matrix;
use super::partition::TimeSlice;

/// Checkerboard parity of a time slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parity {
    /// Even t.
    Even,
    /// Odd t.
    Odd,
}

/// Coordinates of one local site.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Site {
    /// Global time coordinate.
    pub t: usize,
    /// Parity of `t`.
    pub parity: Parity,
    /// Index into the local field vectors.
    pub index: usize,
}

#[derive(Clone, Debug)]
struct Snapshot {
    links: Vec<Matrix>,
    scalars: Vec<Vec<Matrix>>,
}

/// One worker's sites and all their fields.
#[derive(Clone, Debug)]
pub struct LatticeStore {
    /// Owned part of the lattice.
    pub slice: TimeSlice,
    /// Site coordinates, by local index.
    pub sites: Vec<Site>,
    /// U(t).
    pub links: Vec<Matrix>,
    /// X\_j(t), indexed `[j][i]`.
    pub scalars: Vec<Vec<Matrix>>,
    /// Packed link momenta.
    pub link_mom: Vec<AntiHermitian>,
    /// Dense scalar momenta, indexed `[j][i]`.
    pub scalar_mom: Vec<Vec<Matrix>>,
    /// Link force accumulator.
    pub link_force: Vec<Matrix>,
    /// Scalar force accumulators, indexed `[j][i]`.
    pub scalar_force: Vec<Vec<Matrix>>,
    snapshot: Option<Snapshot>,
}

impl LatticeStore {
    /// Allocate storage for `slice` with `n_scalars` scalar fields.
    ///
    /// Links start at the identity, everything else at zero.
    pub fn new(slice: TimeSlice, n_scalars: usize) -> Self {
        let len = slice.len;
        let sites = (0..len)
            .map(|index| {
                let t = slice.global_t(index);
                let parity = if t % 2 == 0 { Parity::Even } else { Parity::Odd };
                Site { t, parity, index }
            })
            .collect();
        let zeros = || vec![vec![Matrix::ZERO; len]; n_scalars];
        Self {
            slice,
            sites,
            links: vec![Matrix::IDENTITY; len],
            scalars: zeros(),
            link_mom: vec![AntiHermitian::ZERO; len],
            scalar_mom: zeros(),
            link_force: vec![Matrix::ZERO; len],
            scalar_force: zeros(),
            snapshot: None,
        }
    }

    /// Cold configuration: identity links, every scalar set to
    /// [`Self::cold_scalar`], momenta zero.
    pub fn cold(slice: TimeSlice, n_scalars: usize) -> Self {
        let mut store = Self::new(slice, n_scalars);
        for field in &mut store.scalars {
            field.fill(Self::cold_scalar());
        }
        store
    }

    /// Seed matrix for cold starts: diag(i/√2, −i/√2, 0, …).
    ///
    /// Traceless anti-Hermitian with Tr X² = −1.
    pub fn cold_scalar() -> Matrix {
        let a = std::f64::consts::FRAC_1_SQRT_2;
        let mut diag = [Complex64::new(0.0, 0.0); NCOL];
        diag[0] = Complex64::new(0.0, a);
        diag[1] = Complex64::new(0.0, -a);
        Matrix::from_diagonal(diag)
    }

    /// Number of local sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Whether this worker owns no sites.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Number of scalar fields.
    #[must_use]
    pub fn n_scalars(&self) -> usize {
        self.scalars.len()
    }

    /// Copy U and X into the snapshot.
    pub fn take_snapshot(&mut self) {
        self.snapshot = Some(Snapshot {
            links: self.links.clone(),
            scalars: self.scalars.clone(),
        });
    }

    /// Whether a snapshot is held.
    #[must_use]
    pub const fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Move the snapshot back into U and X. Returns false if none was held.
    pub fn restore_snapshot(&mut self) -> bool {
        match self.snapshot.take() {
            Some(Snapshot { links, scalars }) => {
                self.links = links;
                self.scalars = scalars;
                true
            }
            None => false,
        }
    }

    /// Drop the snapshot without restoring.
    pub fn discard_snapshot(&mut self) {
        self.snapshot = None;
    }

    /// Flip the sign of every momentum (time reversal).
    pub fn negate_momenta(&mut self) {
        for p in &mut self.link_mom {
            p.negate();
        }
        for field in &mut self.scalar_mom {
            for p in field.iter_mut() {
                *p = -*p;
            }
        }
    }

    /// Zero every momentum.
    pub fn zero_momenta(&mut self) {
        self.link_mom.fill(AntiHermitian::ZERO);
        for field in &mut self.scalar_mom {
            field.fill(Matrix::ZERO);
        }
    }
}
