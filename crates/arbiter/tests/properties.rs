//! Ledger properties that must hold across every arbiter operation.

use banker_arbiter::client::random_request;
use banker_arbiter::{
    bootstrap, is_safe, run_clients, Arbiter, BootstrapConfig, ClientConfig, ClientEvent,
    Decision, Denial, EventKind,
};
use banker_core::{Ledger, Matrix};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use smallvec::smallvec;

fn ledger(total: &[u32], max: &[&[u32]]) -> Ledger {
    Ledger::new(total.into(), Matrix::from_rows(max).unwrap()).unwrap()
}

// ---------------------------------------------------------------------------
// Single-threaded random walks
// ---------------------------------------------------------------------------

#[test]
fn invariants_hold_after_every_call() {
    for seed in 0..20u64 {
        let cfg = BootstrapConfig {
            seed: Some(seed),
            ..BootstrapConfig::new(6, 4)
        };
        let arbiter = Arbiter::new(bootstrap(&cfg).unwrap());
        let mut rng = Pcg64::seed_from_u64(seed);

        for _ in 0..400 {
            let client = rng.gen_range(0..arbiter.clients());
            let need = arbiter.need_of(client).unwrap();
            let request = random_request(&need, &mut rng);
            let before = arbiter.snapshot();

            let ruling = arbiter.request(client, &request).unwrap();
            let after = arbiter.snapshot();
            after.check_invariants().unwrap();
            assert!(is_safe(&after), "seed {seed}: committed state unsafe");

            if !ruling.decision.is_granted() {
                assert_eq!(before, after, "seed {seed}: denial changed the ledger");
            }

            if arbiter.is_satisfied(client).unwrap() {
                arbiter.release(client).unwrap();
                arbiter.snapshot().check_invariants().unwrap();
            }
        }
    }
}

#[test]
fn over_need_requests_always_denied_and_leave_ledger_alone() {
    let arbiter = Arbiter::new(ledger(&[10, 10], &[&[2, 3], &[4, 4]]));
    arbiter.request(0, &[1, 1]).unwrap();

    for request in [[2, 0], [0, 3], [5, 5], [2, 2]] {
        let before = arbiter.snapshot();
        let ruling = arbiter.request(0, &request).unwrap();
        assert!(
            matches!(ruling.decision, Decision::Denied(Denial::ExceedsNeed { .. })),
            "{request:?}"
        );
        assert_eq!(arbiter.snapshot(), before);
    }
}

// ---------------------------------------------------------------------------
// Safety checker properties
// ---------------------------------------------------------------------------

/// Three clients each claiming 4 of 6 units, two of them holding 2: any
/// further grant without a release keeps the state unsafe.
#[test]
fn unsafe_state_stays_unsafe_under_further_grants() {
    let mut state = ledger(&[6], &[&[4], &[4], &[4]]);
    state.apply_delta(0, &[2]);
    state.apply_delta(1, &[2]);
    state.apply_delta(2, &[1]);
    assert!(!is_safe(&state));

    let mut frontier = vec![state];
    while let Some(s) = frontier.pop() {
        for client in 0..s.clients() {
            let cap = s.need_of(client)[0].min(s.available()[0]);
            for units in 1..=cap {
                let mut next = s.clone();
                next.apply_delta(client, &[units]);
                assert!(!is_safe(&next), "grant of {units} to {client} made it safe");
                frontier.push(next);
            }
        }
    }
}

#[test]
fn safety_evaluation_is_idempotent() {
    let cfg = BootstrapConfig {
        seed: Some(99),
        ..BootstrapConfig::new(10, 5)
    };
    let mut state = bootstrap(&cfg).unwrap();
    let mut rng = Pcg64::seed_from_u64(99);

    for _ in 0..50 {
        let client = rng.gen_range(0..state.clients());
        let request: Vec<u32> = state
            .need_of(client)
            .iter()
            .zip(state.available())
            .map(|(&n, &a)| rng.gen_range(0..=n.min(a)))
            .collect();
        state.apply_delta(client, &request);

        let snapshot = state.clone();
        let first = is_safe(&state);
        assert_eq!(first, is_safe(&state));
        assert_eq!(state, snapshot);
    }
}

// ---------------------------------------------------------------------------
// Concrete scenarios
// ---------------------------------------------------------------------------

#[test]
fn contention_scenario_resolves_after_release() {
    let arbiter = Arbiter::new(ledger(&[5], &[&[3], &[4]])).with_verification(true);

    assert!(arbiter.request(0, &[3]).unwrap().decision.is_granted());
    assert_eq!(arbiter.snapshot().available(), &[2]);

    let before = arbiter.snapshot();
    assert_eq!(
        arbiter.request(1, &[4]).unwrap().decision,
        Decision::Denied(Denial::Unavailable {
            resource: 0,
            requested: 4,
            available: 2
        })
    );
    assert_eq!(arbiter.snapshot(), before);

    let release = arbiter.release(0).unwrap();
    assert_eq!(release.returned.as_slice(), &[3]);
    assert_eq!(arbiter.snapshot().available(), &[5]);

    assert!(arbiter.request(1, &[4]).unwrap().decision.is_granted());
    arbiter.release(1).unwrap();
    assert_eq!(arbiter.into_ledger().available(), &[5]);
}

#[test]
fn unsafe_request_rolls_back_exactly() {
    let arbiter = Arbiter::new(ledger(&[6, 3], &[&[4, 1], &[4, 2], &[4, 3]]));
    assert!(arbiter.request(0, &[2, 1]).unwrap().decision.is_granted());
    assert!(arbiter.request(1, &[2, 0]).unwrap().decision.is_granted());

    let before = arbiter.snapshot();
    let ruling = arbiter.request(2, &[1, 0]).unwrap();
    assert_eq!(ruling.decision, Decision::Denied(Denial::Unsafe));

    let after = arbiter.snapshot();
    assert_eq!(after.available(), before.available());
    assert_eq!(after.max(), before.max());
    assert_eq!(after.allocation(), before.allocation());
    assert_eq!(after.need(), before.need());
}

// ---------------------------------------------------------------------------
// Concurrent runs
// ---------------------------------------------------------------------------

#[test]
fn ample_supply_every_client_finishes_and_pool_refills() {
    let max = Matrix::from_rows(&[[2, 1, 3], [1, 1, 1], [3, 0, 2], [2, 2, 2]]).unwrap();
    let arbiter = Arbiter::new(Ledger::new(smallvec![8, 4, 8], max).unwrap())
        .with_verification(true);
    let cfg = ClientConfig {
        seed: Some(1),
        ..Default::default()
    };

    let sim = run_clients(&arbiter, &cfg, &|_: &ClientEvent| {}).unwrap();

    assert!(sim.summaries.iter().all(|s| s.finished));
    // Supply covers every claim at once, so nothing is ever unsafe.
    assert!(sim.summaries.iter().all(|s| s.unsafe_ == 0));

    let end = arbiter.into_ledger();
    assert_eq!(end.available(), end.total());
    assert!(end.allocation().iter_rows().all(|row| row.iter().all(|&a| a == 0)));
}

#[test]
fn contended_random_runs_terminate_with_full_pool() {
    for seed in [3u64, 17, 2024] {
        let cfg = BootstrapConfig {
            seed: Some(seed),
            ..BootstrapConfig::new(12, 3)
        };
        let arbiter = Arbiter::new(bootstrap(&cfg).unwrap()).with_verification(true);
        let client_cfg = ClientConfig {
            seed: Some(seed),
            ..Default::default()
        };

        let sim = run_clients(&arbiter, &client_cfg, &|event: &ClientEvent| {
            if let EventKind::Denied { reason, .. } = &event.kind {
                assert!(!matches!(reason, Denial::ExceedsNeed { .. }));
            }
        })
        .unwrap();

        assert_eq!(sim.summaries.len(), 12);
        assert!(sim.summaries.iter().all(|s| s.finished), "seed {seed}");
        assert!(sim.events.windows(2).all(|w| w[0].seq < w[1].seq));

        let end = arbiter.snapshot();
        end.check_invariants().unwrap();
        assert_eq!(end.available(), end.total(), "seed {seed}");
    }
}

#[test]
fn snapshots_taken_mid_run_are_consistent() {
    let cfg = BootstrapConfig {
        seed: Some(5),
        ..BootstrapConfig::new(8, 4)
    };
    let arbiter = Arbiter::new(bootstrap(&cfg).unwrap());
    let client_cfg = ClientConfig {
        seed: Some(5),
        ..Default::default()
    };

    run_clients(&arbiter, &client_cfg, &|_: &ClientEvent| {
        let snap = arbiter.snapshot();
        snap.check_invariants().unwrap();
        assert!(is_safe(&snap));
    })
    .unwrap();
}
