use banker_arbiter::client::random_request;
use banker_arbiter::{bootstrap, is_safe, Arbiter, BootstrapConfig};
use banker_core::Ledger;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A bootstrapped ledger pushed forward by a few hundred granted requests so
/// the safety check has real allocations to chew on.
fn busy_ledger(clients: usize, resources: usize) -> Ledger {
    let cfg = BootstrapConfig {
        seed: Some(7),
        max_limit: 50,
        ..BootstrapConfig::new(clients, resources)
    };
    let arbiter = Arbiter::new(bootstrap(&cfg).unwrap());
    let mut rng = Pcg64::seed_from_u64(7);
    for _ in 0..clients * 4 {
        let client = rng.gen_range(0..clients);
        let need = arbiter.need_of(client).unwrap();
        let _ = arbiter.request(client, &random_request(&need, &mut rng));
    }
    arbiter.into_ledger()
}

// ---------------------------------------------------------------------------
// Benchmark: safety check
// ---------------------------------------------------------------------------

fn bench_is_safe(c: &mut Criterion) {
    let mut group = c.benchmark_group("is_safe");
    for (clients, resources) in [(5, 3), (20, 8), (100, 10), (100, 100)] {
        let ledger = busy_ledger(clients, resources);
        group.bench_with_input(
            BenchmarkId::new(format!("{}x{}", clients, resources), clients),
            &ledger,
            |b, ledger| {
                b.iter(|| black_box(is_safe(ledger)));
            },
        );
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: request path (lock + checks + safety + maybe rollback)
// ---------------------------------------------------------------------------

fn bench_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("request");
    for clients in [10, 50, 100] {
        let ledger = busy_ledger(clients, 5);
        group.bench_with_input(BenchmarkId::from_parameter(clients), &ledger, |b, ledger| {
            let arbiter = Arbiter::new(ledger.clone());
            let mut rng = Pcg64::seed_from_u64(1);
            b.iter(|| {
                let client = rng.gen_range(0..clients);
                let need = arbiter.need_of(client).unwrap();
                let ruling = arbiter.request(client, &random_request(&need, &mut rng)).unwrap();
                if arbiter.is_satisfied(client).unwrap() {
                    arbiter.release(client).unwrap();
                }
                black_box(ruling)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_is_safe, bench_request);
criterion_main!(benches);
