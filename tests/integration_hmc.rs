// SPDX-License-Identifier: AGPL-3.0-only

//! Integration tests: trajectories end-to-end over the worker mesh.
//!
//! Reversibility, integrator order, partition independence, momentum
//! validity, accept/reject bookkeeping and the cold-start fixture.

use bqm_hmc::config::RunConfig;
use bqm_hmc::error::Result;
use bqm_hmc::lattice::action::evaluate_action;
use bqm_hmc::lattice::hmc::{molecular_dynamics, reversibility_check, TrajectoryMode};
use bqm_hmc::lattice::integrator::{integrate, IntegratorKind};
use bqm_hmc::lattice::matrix::Matrix;
use bqm_hmc::lattice::mesh::launch;
use bqm_hmc::lattice::simulation::Simulation;
use bqm_hmc::tolerances::{
    COLD_ACTION_ABS, COLD_FIXED_POINT_DELTA_S_ABS, COLD_REFRESHED_DELTA_S_MAX,
    HMC_ACCEPTANCE_MIN, LEAPFROG_ORDER_RATIO_MAX, LEAPFROG_ORDER_RATIO_MIN,
    PARTITION_AGREEMENT_REL, REVERSIBILITY_DELTA_S_ABS, REVERSIBILITY_RMS_MAX,
};

fn small(nt: usize, workers: usize) -> RunConfig {
    RunConfig {
        nt,
        workers,
        n_scalars: 2,
        mode: TrajectoryMode::AlwaysAccept,
        ..RunConfig::default()
    }
}

/// Run `body` on every worker and return worker 0's result.
fn on_root<T, F>(cfg: &RunConfig, body: F) -> T
where
    T: Send,
    F: Fn(&mut Simulation) -> Result<T> + Sync,
{
    launch(cfg.nt, cfg.workers, |mesh| {
        let mut sim = Simulation::new(mesh, cfg)?;
        body(&mut sim)
    })
    .expect("mesh runs")
    .into_iter()
    .next()
    .expect("at least one worker")
}

#[test]
fn leapfrog_is_reversible() {
    let cfg = RunConfig {
        nsteps: 20,
        ..small(6, 2)
    };
    let report = on_root(&cfg, reversibility_check);
    assert!(
        report.rms_deviation < REVERSIBILITY_RMS_MAX,
        "rms {}",
        report.rms_deviation
    );
    assert!((report.forward.delta + report.backward.delta).abs() < REVERSIBILITY_DELTA_S_ABS);
}

#[test]
fn omelyan_is_reversible() {
    let cfg = RunConfig {
        nsteps: 5,
        integrator: IntegratorKind::Omelyan,
        ..small(6, 3)
    };
    let report = on_root(&cfg, reversibility_check);
    assert!(
        report.rms_deviation < REVERSIBILITY_RMS_MAX,
        "rms {}",
        report.rms_deviation
    );
    assert_eq!(report.forward.force_evaluations, 5 * 2 * (1 + 2 * 5));
}

/// ⟨|ΔS|⟩ over `draws` momentum draws from the same starting fields.
fn mean_abs_delta(nsteps: usize, draws: usize) -> f64 {
    let cfg = RunConfig {
        nsteps,
        omega: 1.0,
        ..small(8, 2)
    };
    on_root(&cfg, |sim| {
        let links = sim.store.links.clone();
        let scalars = sim.store.scalars.clone();
        let mut total = 0.0;
        for _ in 0..draws {
            let report = sim.run_trajectory()?;
            total += report.delta.abs();
            sim.store.links.clone_from(&links);
            sim.store.scalars.clone_from(&scalars);
        }
        Ok(total / draws as f64)
    })
}

#[test]
fn leapfrog_error_is_second_order() {
    let coarse = mean_abs_delta(20, 8);
    let fine = mean_abs_delta(40, 8);
    let ratio = coarse / fine;
    assert!(
        (LEAPFROG_ORDER_RATIO_MIN..LEAPFROG_ORDER_RATIO_MAX).contains(&ratio),
        "<|dS|> {coarse:.3e} -> {fine:.3e}, ratio {ratio:.2}"
    );
}

#[test]
fn actions_agree_across_partitions() {
    let run = |workers: usize| {
        let cfg = RunConfig {
            nsteps: 10,
            ..small(8, workers)
        };
        on_root(&cfg, |sim| {
            let first = sim.run_trajectory()?;
            let second = sim.run_trajectory()?;
            Ok([first.start_action, first.end_action, second.end_action])
        })
    };
    let reference = run(1);
    for workers in [2, 8] {
        let other = run(workers);
        for (a, b) in reference.iter().zip(&other) {
            assert!(
                (a - b).abs() <= PARTITION_AGREEMENT_REL * a.abs(),
                "{workers} workers: {b} vs {a}"
            );
        }
    }
}

#[test]
fn drawn_momenta_are_exactly_traceless_anti_hermitian() {
    let cfg = small(5, 5);
    let ok = launch(cfg.nt, cfg.workers, |mesh| {
        let mut sim = Simulation::new(mesh, &cfg)?;
        let mut ok = true;
        for _ in 0..3 {
            sim.refresh_momenta();
            let links = sim.store.link_mom.iter().map(|p| p.to_matrix());
            let scalars = sim.store.scalar_mom.iter().flatten().copied();
            for m in links.chain(scalars) {
                ok &= m == -m.adjoint();
                ok &= m.trace().re == 0.0 && m.trace().im == 0.0;
            }
        }
        Ok(ok)
    })
    .expect("mesh runs");
    assert!(ok.into_iter().all(|x| x));
}

#[test]
fn always_accept_keeps_integrator_output() {
    // Far too coarse a step: |ΔS| is large and its sign is irrelevant.
    let cfg = RunConfig {
        nsteps: 1,
        traj_length: 3.0,
        ..small(4, 2)
    };
    let via_controller = on_root(&cfg, |sim| {
        sim.refresh_momenta();
        let report = molecular_dynamics(sim, TrajectoryMode::AlwaysAccept)?;
        Ok((report, sim.store.links.clone(), sim.store.scalars.clone()))
    });
    let direct = on_root(&cfg, |sim| {
        sim.refresh_momenta();
        evaluate_action(sim)?;
        integrate(sim)?;
        Ok((sim.store.links.clone(), sim.store.scalars.clone()))
    });
    let (report, links, scalars) = via_controller;
    assert_eq!(report.accepted, None);
    assert!(report.delta.abs() > 1e-6);
    assert_eq!(links, direct.0);
    assert_eq!(scalars, direct.1);
}

#[test]
fn rejected_trajectory_restores_fields_bit_exactly() {
    let cfg = RunConfig {
        nsteps: 2,
        traj_length: 10.0,
        mode: TrajectoryMode::Metropolis,
        ..small(4, 2)
    };
    let rejections = launch(cfg.nt, cfg.workers, |mesh| {
        let mut sim = Simulation::new(mesh, &cfg)?;
        let mut rejections = 0;
        for _ in 0..10 {
            let links: Vec<Matrix> = sim.store.links.clone();
            let scalars = sim.store.scalars.clone();
            let report = sim.run_trajectory()?;
            if report.accepted == Some(false) {
                assert_eq!(sim.store.links, links);
                assert_eq!(sim.store.scalars, scalars);
                assert!(!sim.store.has_snapshot());
                rejections += 1;
            }
        }
        Ok(rejections)
    })
    .expect("mesh runs");
    assert!(rejections[0] > 0);
    assert!(rejections.iter().all(|&r| r == rejections[0]));
}

fn cold_fixture() -> RunConfig {
    RunConfig {
        nt: 4,
        n_scalars: 1,
        beta: 1.0,
        omega: 0.0,
        nsteps: 10,
        traj_length: 1.0,
        integrator: IntegratorKind::Leapfrog,
        mode: TrajectoryMode::AlwaysAccept,
        ..RunConfig::default()
    }
}

#[test]
fn cold_start_is_a_fixed_point_without_momenta() {
    let cfg = cold_fixture();
    let report = on_root(&cfg, |sim| molecular_dynamics(sim, TrajectoryMode::AlwaysAccept));
    // β · nt · S · ω² = 0
    assert!(report.start_action.abs() < COLD_ACTION_ABS);
    assert!(report.delta.abs() < COLD_FIXED_POINT_DELTA_S_ABS);
    assert_eq!(report.accepted, None);
    assert!(report.log_lines()[0].starts_with("CHECK: delta S = "));
}

#[test]
fn cold_start_with_momenta_conserves_action() {
    let cfg = cold_fixture();
    for workers in [1, 2, 4] {
        let report = on_root(&RunConfig { workers, ..cfg.clone() }, Simulation::run_trajectory);
        assert!(report.delta.abs() < COLD_REFRESHED_DELTA_S_MAX, "dS {}", report.delta);
        assert!(report.avg_force_norm > 0.0);
        assert!(report.max_force_norm >= report.avg_force_norm);
    }
}

#[test]
fn single_site_ring_runs() {
    let cfg = RunConfig {
        nsteps: 20,
        ..small(1, 1)
    };
    let report = on_root(&cfg, reversibility_check);
    assert!(report.forward.delta.is_finite());
    assert!(report.rms_deviation < REVERSIBILITY_RMS_MAX);
}

#[test]
fn metropolis_chain_accepts_most_trajectories() {
    let cfg = RunConfig {
        nsteps: 20,
        mode: TrajectoryMode::Metropolis,
        ..small(8, 4)
    };
    let accepted = on_root(&cfg, |sim| {
        let mut accepted = 0;
        for _ in 0..20 {
            if sim.run_trajectory()?.kept() {
                accepted += 1;
            }
        }
        Ok(accepted)
    });
    let rate = f64::from(accepted) / 20.0;
    assert!(rate > HMC_ACCEPTANCE_MIN, "acceptance {rate}");
}
