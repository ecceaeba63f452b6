// SPDX-License-Identifier: AGPL-3.0-only

//! Field projector: pulls links back onto U(N) and scalars back onto the
//! traceless anti-Hermitian subspace after numerical drift.

use super::matrix::Matrix;
use super::store::LatticeStore;
use crate::tolerances::PROJECTOR_DRIFT_WARN;

/// Largest manifold deviation before and after one projection pass.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DriftReport {
    /// max |U U† − I| before.
    pub link_before: f64,
    /// max |U U† − I| after.
    pub link_after: f64,
    /// max |X + X†|, |Tr X| before.
    pub scalar_before: f64,
    /// max |X + X†|, |Tr X| after.
    pub scalar_after: f64,
}

impl DriftReport {
    /// Whether the incoming drift was large enough to report.
    #[must_use]
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.link_before > threshold || self.scalar_before > threshold
    }
}

/// Reunitarize / re-anti-hermitize pass over one worker's sites.
#[derive(Clone, Copy, Debug)]
pub struct FieldProjector {
    /// Drift above which a warning is logged.
    pub warn_threshold: f64,
}

impl Default for FieldProjector {
    fn default() -> Self {
        Self {
            warn_threshold: PROJECTOR_DRIFT_WARN,
        }
    }
}

impl FieldProjector {
    /// Reunitarize every link. Returns (max deviation before, after).
    pub fn reunitarize(&self, links: &mut [Matrix]) -> (f64, f64) {
        let mut before: f64 = 0.0;
        let mut after: f64 = 0.0;
        for u in links.iter_mut() {
            before = before.max(u.unitarity_deviation());
            *u = u.reunitarize();
            after = after.max(u.unitarity_deviation());
        }
        (before, after)
    }

    /// Replace every scalar by its traceless anti-Hermitian part.
    pub fn reantihermize(&self, field: &mut [Matrix]) -> (f64, f64) {
        let mut before: f64 = 0.0;
        let mut after: f64 = 0.0;
        for x in field.iter_mut() {
            before = before.max(x.anti_hermitian_deviation());
            *x = x.anti_hermitian_part();
            after = after.max(x.anti_hermitian_deviation());
        }
        (before, after)
    }

    /// Project every link and scalar of `store`; local deviations only.
    pub fn project(&self, store: &mut LatticeStore) -> DriftReport {
        let (link_before, link_after) = self.reunitarize(&mut store.links);
        let mut report = DriftReport {
            link_before,
            link_after,
            ..DriftReport::default()
        };
        for field in &mut store.scalars {
            let (before, after) = self.reantihermize(field);
            report.scalar_before = report.scalar_before.max(before);
            report.scalar_after = report.scalar_after.max(after);
        }
        report
    }
}
