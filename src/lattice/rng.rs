// SPDX-License-Identifier: AGPL-3.0-only

//! Seeded random streams for momentum refresh and the Metropolis test.
//!
//! Every lattice site owns a ChaCha8 stream keyed by `(seed, t)` with the
//! global time coordinate as stream id, so the momenta drawn for a site do
//! not depend on which worker owns it. Each worker also owns a node stream
//! (id `nt + rank`); only worker 0 ever draws from it.

use num_complex::Complex64;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use super::antiherm::AntiHermitian;
use super::constants::{NCOL, N_OFFDIAG};

/// Random stream owned by one lattice site.
pub fn site_stream(seed: u64, t: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(t as u64);
    rng
}

/// Random stream owned by one worker.
pub fn node_stream(seed: u64, nt: usize, rank: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream((nt + rank) as u64);
    rng
}

/// Gaussian momentum with density ∝ exp(−½‖P‖²) on the traceless algebra.
///
/// The first N−1 diagonal entries are unit Gaussians with their mean
/// removed; the last is minus the sum of the others, so the trace is zero
/// exactly, not just statistically. Off-diagonal real and imaginary parts
/// have variance ½.
pub fn gaussian_antiherm<R: Rng + ?Sized>(rng: &mut R) -> AntiHermitian {
    let mut g = [0.0; NCOL];
    for v in &mut g {
        *v = rng.sample(StandardNormal);
    }
    let mean = g.iter().sum::<f64>() / NCOL as f64;

    let mut p = AntiHermitian::ZERO;
    let mut partial = 0.0;
    for k in 0..NCOL - 1 {
        p.im_diag[k] = g[k] - mean;
        partial += p.im_diag[k];
    }
    p.im_diag[NCOL - 1] = -partial;

    let scale = std::f64::consts::FRAC_1_SQRT_2;
    for z in p.offdiag.iter_mut().take(N_OFFDIAG) {
        let re: f64 = rng.sample(StandardNormal);
        let im: f64 = rng.sample(StandardNormal);
        *z = Complex64::new(scale * re, scale * im);
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_streams_are_deterministic_and_distinct() {
        let a: f64 = site_stream(7, 3).sample(StandardNormal);
        let b: f64 = site_stream(7, 3).sample(StandardNormal);
        let c: f64 = site_stream(7, 4).sample(StandardNormal);
        assert_eq!(a.to_bits(), b.to_bits());
        assert_ne!(a.to_bits(), c.to_bits());
    }

    #[test]
    fn node_stream_differs_from_site_streams() {
        let node: f64 = node_stream(7, 4, 0).gen();
        for t in 0..4 {
            let site: f64 = site_stream(7, t).gen();
            assert_ne!(node.to_bits(), site.to_bits());
        }
    }

    #[test]
    fn drawn_momenta_are_exactly_traceless() {
        let mut rng = site_stream(42, 0);
        for _ in 0..1000 {
            let p = gaussian_antiherm(&mut rng);
            assert_eq!(p.im_trace(), 0.0);
            let dense = p.to_matrix();
            for i in 0..NCOL {
                for j in 0..NCOL {
                    assert_eq!(dense.m[i][j], -dense.m[j][i].conj());
                }
            }
        }
    }

    #[test]
    fn offdiag_variance_is_one_half() {
        let mut rng = site_stream(1234, 0);
        let n = 20_000;
        let mut sum_sq = 0.0;
        for _ in 0..n {
            let p = gaussian_antiherm(&mut rng);
            sum_sq += p.offdiag[0].re * p.offdiag[0].re;
        }
        let var = sum_sq / f64::from(n);
        assert!((var - 0.5).abs() < 0.03, "off-diagonal variance {var}");
    }
}
