// SPDX-License-Identifier: AGPL-3.0-only

//! Worker mesh: point-to-point channels and collectives between workers.
//!
//! Each worker runs on its own thread and owns one [`Mesh`] endpoint. The
//! workers share no lattice memory; everything crosses through channels.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  launch(nt, n, body)                                 │
//! │                                                      │
//! │  ┌──────────┐  ┌──────────┐        ┌──────────┐      │
//! │  │ worker 0 │⇄ │ worker 1 │ ⇄ ...⇄ │ worker n │      │
//! │  │ t 0..k   │  │ t k..2k  │        │ ..nt     │      │
//! │  └──────────┘  └──────────┘        └──────────┘      │
//! │       ▲  sum / max / consensus via worker 0          │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Every ordered pair of workers (including each worker with itself) has a
//! dedicated FIFO channel. When a worker exits, for any reason, its
//! senders drop and every peer waiting on it gets
//! [`BqmError::CommunicationFailure`] instead of hanging.
//!
//! All workers issue the same sequence of gathers and collectives. Every
//! operation takes the next value of a per-worker tag counter, so matching
//! operations carry matching tags on all workers. Messages that arrive
//! before their operation is waited on are parked in a per-peer mailbox.

use std::collections::HashMap;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::debug;

use super::matrix::Matrix;
use super::partition::{decompose, TimeSlice};
use crate::error::{BqmError, Result};

/// Worker that reduces and draws consensus values.
pub const ROOT: usize = 0;

/// Message body.
#[derive(Debug)]
pub(crate) enum Payload {
    Matrix(Matrix),
    Scalar(f64),
    Matrices(Vec<Matrix>),
}

#[derive(Debug)]
pub(crate) struct Packet {
    tag: u64,
    payload: Payload,
}

/// A value drawn on worker 0 and observed identically by every worker.
///
/// Only [`Mesh::consensus`] constructs one, so code that branches on it
/// cannot accidentally use a locally drawn number.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlobalConsensusValue(f64);

impl GlobalConsensusValue {
    /// The agreed value.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }
}

/// One worker's endpoint of the mesh.
#[derive(Debug)]
pub struct Mesh {
    slice: TimeSlice,
    senders: Vec<Sender<Packet>>,
    receivers: Vec<Receiver<Packet>>,
    mailbox: Vec<HashMap<u64, Payload>>,
    next_tag: u64,
}

impl Mesh {
    /// Build the fully connected endpoints for `nranks` workers over `nt` sites.
    ///
    /// # Errors
    ///
    /// Propagates partition errors (`nranks > nt`, empty lattice).
    pub fn group(nt: usize, nranks: usize) -> Result<Vec<Self>> {
        let slices = decompose(nt, nranks)?;

        let mut senders: Vec<Vec<Sender<Packet>>> = (0..nranks).map(|_| Vec::new()).collect();
        let mut receivers: Vec<Vec<Receiver<Packet>>> = (0..nranks).map(|_| Vec::new()).collect();
        for src_senders in &mut senders {
            for dst_receivers in &mut receivers {
                let (tx, rx) = unbounded();
                src_senders.push(tx);
                dst_receivers.push(rx);
            }
        }

        Ok(slices
            .into_iter()
            .zip(senders)
            .zip(receivers)
            .map(|((slice, senders), receivers)| Self {
                slice,
                senders,
                receivers,
                mailbox: (0..nranks).map(|_| HashMap::new()).collect(),
                next_tag: 0,
            })
            .collect())
    }

    /// This worker's rank.
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.slice.rank
    }

    /// Number of workers in the mesh.
    #[must_use]
    pub const fn nranks(&self) -> usize {
        self.slice.nranks
    }

    /// Whether this worker reduces and draws consensus values.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.slice.rank == ROOT
    }

    /// The sites this worker owns.
    #[must_use]
    pub const fn slice(&self) -> &TimeSlice {
        &self.slice
    }

    pub(crate) fn take_tag(&mut self) -> u64 {
        let tag = self.next_tag;
        self.next_tag += 1;
        tag
    }

    fn failure(&self, peer: usize, detail: impl Into<String>) -> BqmError {
        BqmError::CommunicationFailure {
            rank: self.rank(),
            peer,
            detail: detail.into(),
        }
    }

    pub(crate) fn send(&self, dst: usize, tag: u64, payload: Payload) -> Result<()> {
        self.senders[dst]
            .send(Packet { tag, payload })
            .map_err(|_| self.failure(dst, "peer endpoint closed"))
    }

    pub(crate) fn recv(&mut self, src: usize, tag: u64) -> Result<Payload> {
        if let Some(payload) = self.mailbox[src].remove(&tag) {
            return Ok(payload);
        }
        loop {
            let packet = self.receivers[src]
                .recv()
                .map_err(|_| self.failure(src, "channel disconnected"))?;
            if packet.tag == tag {
                return Ok(packet.payload);
            }
            debug!(
                "worker {} parked tag {} from {src} while waiting for {tag}",
                self.rank(),
                packet.tag
            );
            self.mailbox[src].insert(packet.tag, packet.payload);
        }
    }

    pub(crate) fn recv_matrix(&mut self, src: usize, tag: u64) -> Result<Matrix> {
        match self.recv(src, tag)? {
            Payload::Matrix(m) => Ok(m),
            other => Err(self.failure(src, format!("expected matrix, got {other:?}"))),
        }
    }

    fn recv_scalar(&mut self, src: usize, tag: u64) -> Result<f64> {
        match self.recv(src, tag)? {
            Payload::Scalar(v) => Ok(v),
            other => Err(self.failure(src, format!("expected scalar, got {other:?}"))),
        }
    }

    fn reduce(&mut self, local: f64, op: impl Fn(f64, f64) -> f64) -> Result<f64> {
        let tag = self.take_tag();
        if self.is_root() {
            let mut acc = local;
            for src in 1..self.nranks() {
                acc = op(acc, self.recv_scalar(src, tag)?);
            }
            for dst in 1..self.nranks() {
                self.send(dst, tag, Payload::Scalar(acc))?;
            }
            Ok(acc)
        } else {
            self.send(ROOT, tag, Payload::Scalar(local))?;
            self.recv_scalar(ROOT, tag)
        }
    }

    /// Global sum. Partial sums are combined in rank order on worker 0, so
    /// every worker returns the bit-identical total.
    ///
    /// # Errors
    ///
    /// [`BqmError::CommunicationFailure`] if any worker has gone away.
    pub fn sum(&mut self, local: f64) -> Result<f64> {
        self.reduce(local, |a, b| a + b)
    }

    /// Global maximum.
    ///
    /// # Errors
    ///
    /// [`BqmError::CommunicationFailure`] if any worker has gone away.
    pub fn max(&mut self, local: f64) -> Result<f64> {
        self.reduce(local, f64::max)
    }

    /// Evaluate `draw` on worker 0 only and hand the result to everyone.
    ///
    /// Non-root workers never call `draw`.
    ///
    /// # Errors
    ///
    /// [`BqmError::CommunicationFailure`] if any worker has gone away.
    pub fn consensus(&mut self, draw: impl FnOnce() -> f64) -> Result<GlobalConsensusValue> {
        let tag = self.take_tag();
        if self.is_root() {
            let value = draw();
            for dst in 1..self.nranks() {
                self.send(dst, tag, Payload::Scalar(value))?;
            }
            Ok(GlobalConsensusValue(value))
        } else {
            Ok(GlobalConsensusValue(self.recv_scalar(ROOT, tag)?))
        }
    }

    /// Collect one vector of matrices per worker on worker 0, in rank order.
    ///
    /// Returns `Some` on worker 0 and `None` elsewhere.
    ///
    /// # Errors
    ///
    /// [`BqmError::CommunicationFailure`] if any worker has gone away.
    pub fn gather_to_root(&mut self, local: Vec<Matrix>) -> Result<Option<Vec<Vec<Matrix>>>> {
        let tag = self.take_tag();
        if !self.is_root() {
            self.send(ROOT, tag, Payload::Matrices(local))?;
            return Ok(None);
        }
        let mut parts = Vec::with_capacity(self.nranks());
        parts.push(local);
        for src in 1..self.nranks() {
            match self.recv(src, tag)? {
                Payload::Matrices(v) => parts.push(v),
                other => {
                    return Err(self.failure(src, format!("expected matrices, got {other:?}")))
                }
            }
        }
        Ok(Some(parts))
    }
}

/// Run `body` on `nranks` worker threads sharing an `nt`-site lattice.
///
/// Results come back in rank order. If any worker fails, the first error
/// that is not a knock-on communication failure is returned (the root
/// cause); otherwise the first communication failure.
///
/// # Errors
///
/// Partition errors, thread spawn failures, and any worker's error.
pub fn launch<T, F>(nt: usize, nranks: usize, body: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(Mesh) -> Result<T> + Sync,
{
    let meshes = Mesh::group(nt, nranks)?;
    let body = &body;

    let results = thread::scope(|scope| -> Result<Vec<Result<T>>> {
        let mut handles = Vec::with_capacity(nranks);
        for mesh in meshes {
            let rank = mesh.rank();
            let handle = thread::Builder::new()
                .name(format!("bqm-worker-{rank}"))
                .spawn_scoped(scope, move || body(mesh))?;
            handles.push((rank, handle));
        }
        Ok(handles
            .into_iter()
            .map(|(rank, handle)| {
                handle.join().unwrap_or_else(|_| {
                    Err(BqmError::CommunicationFailure {
                        rank,
                        peer: rank,
                        detail: "worker panicked".into(),
                    })
                })
            })
            .collect())
    })?;

    let mut out = Vec::with_capacity(nranks);
    let mut knock_on = None;
    for result in results {
        match result {
            Ok(value) => out.push(value),
            Err(err) if err.is_communication() => {
                knock_on.get_or_insert(err);
            }
            Err(err) => return Err(err),
        }
    }
    match knock_on {
        Some(err) => Err(err),
        None => Ok(out),
    }
}
