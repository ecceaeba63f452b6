// SPDX-License-Identifier: AGPL-3.0-only

//! Contiguous 1-D decomposition of the periodic time lattice.
//!
//! Worker `r` of `n` owns `base + (r < rem)` consecutive sites. Its forward
//! neighbor in time is worker `r + 1 mod n`, its backward neighbor
//! `r − 1 mod n`; with a single worker both are itself.

use crate::error::{BqmError, Result};

/// One worker's share of the lattice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeSlice {
    /// Owning worker.
    pub rank: usize,
    /// Total number of workers.
    pub nranks: usize,
    /// Global lattice extent.
    pub nt: usize,
    /// First owned global time coordinate.
    pub t_start: usize,
    /// Number of owned sites.
    pub len: usize,
}

impl TimeSlice {
    /// One past the last owned time coordinate.
    #[must_use]
    pub const fn t_end(&self) -> usize {
        self.t_start + self.len
    }

    /// Worker holding site `t_end mod nt`.
    #[must_use]
    pub const fn forward_rank(&self) -> usize {
        (self.rank + 1) % self.nranks
    }

    /// Worker holding site `t_start − 1 mod nt`.
    #[must_use]
    pub const fn backward_rank(&self) -> usize {
        (self.rank + self.nranks - 1) % self.nranks
    }

    /// Global time coordinate of local index `i`.
    #[must_use]
    pub const fn global_t(&self, i: usize) -> usize {
        self.t_start + i
    }
}

/// Split `nt` sites over `nranks` workers, lowest ranks taking the remainder.
///
/// # Errors
///
/// [`BqmError::InputValidation`] when `nt == 0`, `nranks == 0` or
/// `nranks > nt` (some worker would own nothing).
pub fn decompose(nt: usize, nranks: usize) -> Result<Vec<TimeSlice>> {
    if nt < 1 {
        return Err(BqmError::invalid("nt", "lattice needs at least one site"));
    }
    if nranks < 1 {
        return Err(BqmError::invalid("workers", "need at least one worker"));
    }
    if nranks > nt {
        return Err(BqmError::invalid(
            "workers",
            format!("cannot split nt={nt} across {nranks} workers"),
        ));
    }

    let base = nt / nranks;
    let rem = nt % nranks;
    let mut out = Vec::with_capacity(nranks);
    let mut cursor = 0usize;
    for rank in 0..nranks {
        let len = base + usize::from(rank < rem);
        out.push(TimeSlice {
            rank,
            nranks,
            nt,
            t_start: cursor,
            len,
        });
        cursor += len;
    }
    Ok(out)
}
