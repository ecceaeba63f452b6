// SPDX-License-Identifier: AGPL-3.0-only

//! Lattice checkpoints: the full U and X fields as one JSON file.
//!
//! Worker 0 gathers every slice and writes the file. On reload each worker
//! reads the file, verifies the dimensions and the checksum, and keeps only
//! its own sites. The checksum is a 32-bit wrapping sum over the two 32-bit
//! words of every stored f64, links first, then the scalars in order.

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use super::constants::{NCOL, ONE_OV_N};
use super::matrix::Matrix;
use super::partition::TimeSlice;
use super::simulation::Simulation;
use super::store::LatticeStore;
use crate::error::{BqmError, Result};

/// On-disk lattice.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatticeFile {
    /// Number of time slices.
    pub nt: usize,
    /// Matrix size.
    pub ncol: usize,
    /// Number of scalar fields.
    pub n_scalars: usize,
    /// U(t) for t = 0..nt.
    pub links: Vec<Matrix>,
    /// X\_j(t), indexed `[j][t]`.
    pub scalars: Vec<Vec<Matrix>>,
    /// Word-sum checksum of `links` and `scalars`.
    pub checksum: u32,
}

fn word_sum<'a>(matrices: impl IntoIterator<Item = &'a Matrix>) -> u32 {
    let mut sum = 0u32;
    for m in matrices {
        for z in m.m.iter().flatten() {
            for x in [z.re, z.im] {
                let bits = x.to_bits();
                sum = sum
                    .wrapping_add(bits as u32)
                    .wrapping_add((bits >> 32) as u32);
            }
        }
    }
    sum
}

impl LatticeFile {
    /// Checksum of the stored fields.
    #[must_use]
    pub fn compute_checksum(&self) -> u32 {
        word_sum(self.links.iter().chain(self.scalars.iter().flatten()))
    }

    /// Average Re Tr U / N over all links.
    #[must_use]
    pub fn link_trace(&self) -> f64 {
        let total: f64 = self.links.iter().map(|u| u.re_trace()).sum();
        total * ONE_OV_N / self.links.len().max(1) as f64
    }

    /// Write as JSON.
    ///
    /// # Errors
    ///
    /// I/O or serialization failure.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read and verify shape and checksum.
    ///
    /// # Errors
    ///
    /// I/O, JSON, or [`BqmError::Checkpoint`] for inconsistent content.
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let file: Self = serde_json::from_str(&text)?;
        if file.ncol != NCOL {
            return Err(BqmError::Checkpoint(format!(
                "{}: matrices are {}x{}, this build uses {NCOL}x{NCOL}",
                path.display(),
                file.ncol,
                file.ncol
            )));
        }
        if file.links.len() != file.nt
            || file.scalars.len() != file.n_scalars
            || file.scalars.iter().any(|x| x.len() != file.nt)
        {
            return Err(BqmError::Checkpoint(format!(
                "{}: field lengths do not match nt = {}, n_scalars = {}",
                path.display(),
                file.nt,
                file.n_scalars
            )));
        }
        let computed = file.compute_checksum();
        if computed != file.checksum {
            return Err(BqmError::Checkpoint(format!(
                "{}: checksum {computed:08x}, file says {:08x}",
                path.display(),
                file.checksum
            )));
        }
        Ok(file)
    }
}

/// Gather the lattice on worker 0 and write it to `path`.
///
/// Returns the written file on worker 0, `None` elsewhere.
///
/// # Errors
///
/// Communication failure, or I/O on worker 0.
pub fn save(sim: &mut Simulation, path: &Path) -> Result<Option<LatticeFile>> {
    let links = sim.mesh.gather_to_root(sim.store.links.clone())?;
    let mut scalars = Vec::with_capacity(sim.store.n_scalars());
    for field in sim.store.scalars.clone() {
        scalars.push(sim.mesh.gather_to_root(field)?);
    }

    let Some(links) = links else {
        return Ok(None);
    };
    let mut file = LatticeFile {
        nt: sim.params.nt,
        ncol: NCOL,
        n_scalars: sim.params.n_scalars,
        links: links.into_iter().flatten().collect(),
        scalars: scalars
            .into_iter()
            .map(|parts| parts.unwrap_or_default().into_iter().flatten().collect())
            .collect(),
        checksum: 0,
    };
    file.checksum = file.compute_checksum();
    file.write(path)?;
    info!(
        "saved {}: link trace {:.16e} checksum {:08x}",
        path.display(),
        file.link_trace(),
        file.checksum
    );
    Ok(Some(file))
}

/// Read `path` and build the store for one worker's slice.
///
/// # Errors
///
/// I/O, JSON, checksum, or a file whose dimensions differ from `slice` and
/// `n_scalars`.
pub fn load_slice(path: &Path, slice: TimeSlice, n_scalars: usize) -> Result<LatticeStore> {
    let file = LatticeFile::read(path)?;
    if file.nt != slice.nt || file.n_scalars != n_scalars {
        return Err(BqmError::Checkpoint(format!(
            "{}: holds nt = {}, n_scalars = {}; run wants nt = {}, n_scalars = {n_scalars}",
            path.display(),
            file.nt,
            file.n_scalars,
            slice.nt
        )));
    }
    let range = slice.t_start..slice.t_end();
    let mut store = LatticeStore::new(slice, n_scalars);
    store.links.copy_from_slice(&file.links[range.clone()]);
    for (dst, src) in store.scalars.iter_mut().zip(&file.scalars) {
        dst.copy_from_slice(&src[range.clone()]);
    }
    if slice.rank == 0 {
        info!(
            "loaded {}: link trace {:.16e} checksum {:08x}",
            path.display(),
            file.link_trace(),
            file.checksum
        );
    }
    Ok(store)
}
