// SPDX-License-Identifier: AGPL-3.0-only

//! Measurements on the current fields.
//!
//! - Scalar squares: ⟨Tr X_j X_j†⟩ / N per scalar, averaged over sites,
//!   with the width of the per-site distribution.
//! - Polyakov loop: Tr[U(0) U(1) ⋯ U(nt−1)] / N.
//! - [`FieldSummary`]: both of the above plus S_B/nt, taken together.

use num_complex::Complex64;
use serde::Serialize;

use super::action::bosonic_action;
use super::constants::ONE_OV_N;
use super::matrix::Matrix;
use super::simulation::Simulation;
use crate::error::{BqmError, Result};

/// Globally reduced scalar-square measurement.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScalarSquares {
    /// ⟨Tr X_j X_j†⟩/N for each scalar.
    pub per_scalar: Vec<f64>,
    /// Mean over scalars.
    pub average: f64,
    /// sqrt(⟨tr²⟩ − ⟨tr⟩²) over all sites and scalars.
    pub width: f64,
}

impl ScalarSquares {
    /// `SCALAR SQUARES x_0 … x_{S−1} avg width`.
    #[must_use]
    pub fn log_line(&self) -> String {
        let mut line = String::from("SCALAR SQUARES");
        for x in &self.per_scalar {
            line.push_str(&format!(" {x:.6}"));
        }
        line.push_str(&format!(" {:.6} {:.6}", self.average, self.width));
        line
    }
}

/// Measure the scalar squares.
///
/// # Errors
///
/// Communication failure.
pub fn scalar_squares(sim: &mut Simulation) -> Result<ScalarSquares> {
    let nt = sim.params.nt as f64;
    let n_scalars = sim.params.n_scalars as f64;

    let mut per_scalar = Vec::with_capacity(sim.store.n_scalars());
    let mut local_sq = 0.0;
    for field in &sim.store.scalars {
        let mut local = 0.0;
        for x in field {
            let tr = x.realtrace(*x) * ONE_OV_N;
            local += tr;
            local_sq += tr * tr;
        }
        per_scalar.push(local / nt);
    }
    for value in &mut per_scalar {
        *value = sim.mesh.sum(*value)?;
    }
    let mean_sq = sim.mesh.sum(local_sq / (nt * n_scalars))?;

    let average = per_scalar.iter().sum::<f64>() / n_scalars;
    Ok(ScalarSquares {
        per_scalar,
        average,
        width: (mean_sq - average * average).max(0.0).sqrt(),
    })
}

/// Polyakov loop Tr[Π_t U(t)]/N on worker 0, `None` elsewhere.
///
/// Each worker multiplies its own links in time order; worker 0 chains
/// the partial products in rank order.
///
/// # Errors
///
/// Communication failure.
pub fn polyakov_loop(sim: &mut Simulation) -> Result<Option<Complex64>> {
    let partial = sim
        .store
        .links
        .iter()
        .fold(Matrix::IDENTITY, |acc, u| acc * *u);
    let Some(parts) = sim.mesh.gather_to_root(vec![partial])? else {
        return Ok(None);
    };
    let mut chain = Matrix::IDENTITY;
    for (rank, part) in parts.iter().enumerate() {
        let product = part.first().ok_or_else(|| BqmError::CommunicationFailure {
            rank: sim.mesh.rank(),
            peer: rank,
            detail: "empty Polyakov partial product".into(),
        })?;
        chain = chain * *product;
    }
    Ok(Some(chain.trace() * ONE_OV_N))
}

/// Bosonic action per site, scalar squares and Polyakov loop of one
/// configuration.
#[derive(Clone, Debug, Serialize)]
pub struct FieldSummary {
    /// S_B / nt.
    pub action_per_site: f64,
    /// Scalar squares.
    pub scalar_squares: ScalarSquares,
    /// Polyakov loop; worker 0 only.
    pub polyakov: Option<Complex64>,
}

impl FieldSummary {
    /// `b_act/nt`, `SCALAR SQUARES` and, on worker 0, `GMES` lines.
    #[must_use]
    pub fn log_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("b_act/nt {:.8}", self.action_per_site),
            self.scalar_squares.log_line(),
        ];
        if let Some(p) = self.polyakov {
            lines.push(format!("GMES {:.8} {:.8}", p.re, p.im));
        }
        lines
    }
}

/// Measure all three observables on the current fields.
///
/// # Errors
///
/// Communication failure.
pub fn field_summary(sim: &mut Simulation) -> Result<FieldSummary> {
    let action_per_site = bosonic_action(sim)? / sim.params.nt as f64;
    let scalar_squares = scalar_squares(sim)?;
    let polyakov = polyakov_loop(sim)?;
    Ok(FieldSummary {
        action_per_site,
        scalar_squares,
        polyakov,
    })
}
