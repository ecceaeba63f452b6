// SPDX-License-Identifier: AGPL-3.0-only

//! Run configuration: JSON file, command-line overrides, validation.
//!
//! Every binary accepts `--config run.json` plus the individual overrides
//! in [`ConfigArgs`]; flags win over the file, the file wins over
//! [`RunConfig::default`]. Validation runs before any worker is spawned.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BqmError, Result};
use crate::lattice::hmc::TrajectoryMode;
use crate::lattice::integrator::IntegratorKind;

/// Initial field configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartLattice {
    /// Identity links and the cold scalar seed at every site.
    #[default]
    Fresh,
    /// Load a checkpoint written by a previous run.
    Reload {
        /// Checkpoint file.
        path: PathBuf,
    },
}

/// Parameters fixed for the whole run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Number of time slices.
    pub nt: usize,
    /// Number of scalar matrices per site.
    pub n_scalars: usize,
    /// Overall coupling multiplying the bosonic action.
    pub beta: f64,
    /// Scalar mass regulator.
    pub omega: f64,
    /// Molecular-dynamics time per trajectory.
    pub traj_length: f64,
    /// Outer integrator steps per trajectory.
    pub nsteps: usize,
    /// Omelyan inner repetitions per block (defaults to `nsteps`).
    pub omelyan_inner_steps: Option<usize>,
    /// Integration scheme.
    pub integrator: IntegratorKind,
    /// Accept/reject policy.
    pub mode: TrajectoryMode,
    /// Thermalization trajectories (no measurements).
    pub warms: usize,
    /// Production trajectories.
    pub trajecs: usize,
    /// Measure observables every this many production trajectories.
    pub measure_interval: usize,
    /// Base seed for every random stream.
    pub seed: u64,
    /// Worker threads sharing the lattice.
    pub workers: usize,
    /// Initial configuration.
    pub start: StartLattice,
    /// Write a checkpoint here after the run.
    pub save: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            nt: 16,
            n_scalars: 3,
            beta: 1.0,
            omega: 1.0,
            traj_length: 1.0,
            nsteps: 20,
            omelyan_inner_steps: None,
            integrator: IntegratorKind::Leapfrog,
            mode: TrajectoryMode::Metropolis,
            warms: 10,
            trajecs: 100,
            measure_interval: 1,
            seed: 1234,
            workers: 1,
            start: StartLattice::Fresh,
            save: None,
        }
    }
}

impl RunConfig {
    /// Read a JSON configuration; omitted keys take their defaults.
    ///
    /// # Errors
    ///
    /// I/O or JSON errors. The result is not yet validated.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Reject malformed parameters.
    ///
    /// # Errors
    ///
    /// [`BqmError::InputValidation`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.nt < 1 {
            return Err(BqmError::invalid("nt", "lattice needs at least one site"));
        }
        if self.n_scalars < 1 {
            return Err(BqmError::invalid("n_scalars", "need at least one scalar"));
        }
        if self.nsteps < 1 {
            return Err(BqmError::invalid("nsteps", "need at least one step"));
        }
        if self.omelyan_inner_steps == Some(0) {
            return Err(BqmError::invalid("omelyan_inner_steps", "must be at least 1"));
        }
        if self.workers < 1 || self.workers > self.nt {
            return Err(BqmError::invalid(
                "workers",
                format!("must be between 1 and nt={}, got {}", self.nt, self.workers),
            ));
        }
        if self.measure_interval < 1 {
            return Err(BqmError::invalid("measure_interval", "must be at least 1"));
        }
        if !self.beta.is_finite() {
            return Err(BqmError::invalid("beta", "must be finite"));
        }
        if !self.omega.is_finite() {
            return Err(BqmError::invalid("omega", "must be finite"));
        }
        if !self.traj_length.is_finite() || self.traj_length < 0.0 {
            return Err(BqmError::invalid(
                "traj_length",
                format!("must be finite and non-negative, got {}", self.traj_length),
            ));
        }
        Ok(())
    }

    /// Outer step size `traj_length / nsteps`.
    #[must_use]
    pub fn step_size(&self) -> f64 {
        self.traj_length / self.nsteps as f64
    }

    /// Omelyan inner repetitions per block.
    #[must_use]
    pub fn omelyan_inner(&self) -> usize {
        self.omelyan_inner_steps.unwrap_or(self.nsteps)
    }
}

/// Command-line overrides shared by the binaries.
#[derive(Debug, Default, clap::Args)]
pub struct ConfigArgs {
    /// JSON run configuration.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Number of time slices.
    #[arg(long)]
    pub nt: Option<usize>,
    /// Number of scalar matrices.
    #[arg(long)]
    pub n_scalars: Option<usize>,
    /// Coupling.
    #[arg(long)]
    pub beta: Option<f64>,
    /// Mass regulator.
    #[arg(long)]
    pub omega: Option<f64>,
    /// Trajectory length.
    #[arg(long)]
    pub traj_length: Option<f64>,
    /// Integrator steps.
    #[arg(long)]
    pub nsteps: Option<usize>,
    /// Omelyan inner repetitions per block.
    #[arg(long)]
    pub omelyan_inner_steps: Option<usize>,
    /// Integration scheme.
    #[arg(long, value_enum)]
    pub integrator: Option<IntegratorKind>,
    /// Accept/reject policy.
    #[arg(long, value_enum)]
    pub mode: Option<TrajectoryMode>,
    /// Warmup trajectories.
    #[arg(long)]
    pub warms: Option<usize>,
    /// Production trajectories.
    #[arg(long)]
    pub trajecs: Option<usize>,
    /// Measure every this many production trajectories.
    #[arg(long)]
    pub measure_interval: Option<usize>,
    /// Random seed.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Worker threads.
    #[arg(long)]
    pub workers: Option<usize>,
    /// Start from this checkpoint instead of a cold lattice.
    #[arg(long)]
    pub reload: Option<PathBuf>,
    /// Save a checkpoint here at the end.
    #[arg(long)]
    pub save: Option<PathBuf>,
}

impl ConfigArgs {
    /// Build the validated configuration: file (if any), then flags.
    ///
    /// # Errors
    ///
    /// File errors and [`RunConfig::validate`] failures.
    pub fn resolve(&self) -> Result<RunConfig> {
        let mut cfg = match &self.config {
            Some(path) => RunConfig::from_json_file(path)?,
            None => RunConfig::default(),
        };
        self.apply(&mut cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply(&self, cfg: &mut RunConfig) {
        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(v) = self.$field { cfg.$field = v; })*
            };
        }
        set!(
            nt, n_scalars, beta, omega, traj_length, nsteps, integrator, mode, warms, trajecs,
            measure_interval, seed, workers
        );
        if self.omelyan_inner_steps.is_some() {
            cfg.omelyan_inner_steps = self.omelyan_inner_steps;
        }
        if let Some(path) = &self.reload {
            cfg.start = StartLattice::Reload { path: path.clone() };
        }
        if self.save.is_some() {
            cfg.save.clone_from(&self.save);
        }
    }
}
