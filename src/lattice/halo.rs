// SPDX-License-Identifier: AGPL-3.0-only

//! Two-phase nearest-neighbor gathers along the time direction.
//!
//! ```text
//! start_gather(field, dir) ──► GatherHandle<'a>   (boundary value sent)
//! wait(handle)             ──► NeighborView<'a>   (halo value received)
//! view.get(i)              ──► &field[t(i) ± 1]
//! view.release()
//! ```
//!
//! Only one value per worker crosses a channel: the boundary site its
//! neighbor cannot see. Interior neighbors are read straight from the
//! local slice. Both the handle and the view hold a shared borrow of the
//! source field, so the compiler rejects any write to that field until the
//! view is released.

use super::matrix::Matrix;
use super::mesh::{Mesh, Payload};
use crate::error::Result;

/// Time direction of a gather.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Fetch the value at `t + 1`.
    Forward,
    /// Fetch the value at `t − 1`.
    Backward,
}

/// Outstanding gather. Must be passed to [`Mesh::wait`].
#[derive(Debug)]
#[must_use = "a started gather must be waited on"]
pub struct GatherHandle<'a> {
    field: &'a [Matrix],
    direction: Direction,
    source: usize,
    tag: u64,
}

/// Completed gather: per-site read-only access to the neighboring value.
#[derive(Debug)]
pub struct NeighborView<'a> {
    local: &'a [Matrix],
    halo: Matrix,
    direction: Direction,
}

impl NeighborView<'_> {
    /// Neighbor of local site `i` in the gather's direction.
    #[must_use]
    pub fn get(&self, i: usize) -> &Matrix {
        match self.direction {
            Direction::Forward if i + 1 < self.local.len() => &self.local[i + 1],
            Direction::Backward if i > 0 => &self.local[i - 1],
            _ => &self.halo,
        }
    }

    /// Number of local sites covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.local.len()
    }

    /// Whether the view covers no sites.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }

    /// Give up the borrow of the source field.
    pub fn release(self) {}
}

impl Mesh {
    /// Start fetching `field` from the neighboring site in `direction`.
    ///
    /// Sends this worker's boundary value immediately and returns without
    /// blocking. `field` must hold one entry per local site.
    ///
    /// # Errors
    ///
    /// [`crate::error::BqmError::CommunicationFailure`] if the receiving
    /// worker has gone away.
    pub fn start_gather<'a>(
        &mut self,
        field: &'a [Matrix],
        direction: Direction,
    ) -> Result<GatherHandle<'a>> {
        debug_assert_eq!(field.len(), self.slice().len);
        let tag = self.take_tag();
        let slice = *self.slice();
        let (dst, source, boundary) = match direction {
            Direction::Forward => (slice.backward_rank(), slice.forward_rank(), field[0]),
            Direction::Backward => (
                slice.forward_rank(),
                slice.backward_rank(),
                field[field.len() - 1],
            ),
        };
        self.send(dst, tag, Payload::Matrix(boundary))?;
        Ok(GatherHandle {
            field,
            direction,
            source,
            tag,
        })
    }

    /// Block until the halo value for `handle` has arrived.
    ///
    /// # Errors
    ///
    /// [`crate::error::BqmError::CommunicationFailure`] if the sending
    /// worker has gone away.
    pub fn wait<'a>(&mut self, handle: GatherHandle<'a>) -> Result<NeighborView<'a>> {
        let halo = self.recv_matrix(handle.source, handle.tag)?;
        Ok(NeighborView {
            local: handle.field,
            halo,
            direction: handle.direction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::mesh::launch;

    fn marked(t: usize) -> Matrix {
        Matrix::IDENTITY.scale(t as f64)
    }

    fn gather_marks(nt: usize, workers: usize) -> Vec<(usize, f64, f64)> {
        let per_worker = launch(nt, workers, |mut mesh| {
            let slice = *mesh.slice();
            let field: Vec<Matrix> = (0..slice.len).map(|i| marked(slice.global_t(i))).collect();
            let fwd = mesh.start_gather(&field, Direction::Forward)?;
            let bwd = mesh.start_gather(&field, Direction::Backward)?;
            // wait out of issue order on purpose
            let bwd = mesh.wait(bwd)?;
            let fwd = mesh.wait(fwd)?;
            let out = (0..slice.len)
                .map(|i| (slice.global_t(i), fwd.get(i).m[0][0].re, bwd.get(i).m[0][0].re))
                .collect::<Vec<_>>();
            fwd.release();
            bwd.release();
            Ok(out)
        })
        .expect("mesh runs");
        per_worker.into_iter().flatten().collect()
    }

    #[test]
    fn neighbors_wrap_periodically() {
        for workers in [1, 2, 3, 5] {
            for (t, fwd, bwd) in gather_marks(5, workers) {
                assert_eq!(fwd, ((t + 1) % 5) as f64, "forward of t={t}, {workers} workers");
                assert_eq!(bwd, ((t + 4) % 5) as f64, "backward of t={t}, {workers} workers");
            }
        }
    }

    #[test]
    fn single_site_is_its_own_neighbor() {
        let marks = gather_marks(1, 1);
        assert_eq!(marks, vec![(0, 0.0, 0.0)]);
    }

    #[test]
    fn two_sites_two_workers_exchange() {
        let marks = gather_marks(2, 2);
        assert_eq!(marks, vec![(0, 1.0, 1.0), (1, 0.0, 0.0)]);
    }
}
