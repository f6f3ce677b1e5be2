use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::Utc;
use tallerpos_catalog::Product;
use tallerpos_core::ProductId;
use tallerpos_engine::{NullNotifier, StockLedger};
use tallerpos_ledger::{LineItem, MovementContext, MovementKind};
use tallerpos_store::{InMemoryStore, LedgerStore};

fn seeded_store(products: usize) -> (InMemoryStore, Vec<ProductId>) {
    let store = InMemoryStore::new();
    let mut ids = Vec::with_capacity(products);
    for i in 0..products {
        let product = Product::new(
            ProductId::new(),
            format!("BEN-{i:04}"),
            format!("bench part {i}"),
            100,
            250,
            2,
            Utc::now(),
        )
        .unwrap();
        ids.push(product.id);
        store.insert(product).unwrap();
    }
    (store, ids)
}

fn bench_movement_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("movement_latency");
    group.sample_size(1000);

    // Inbound only, so the product never runs dry mid-benchmark.
    group.bench_function("apply_inbound", |b| {
        let (store, ids) = seeded_store(1);
        let ledger = StockLedger::new(&store, NullNotifier);
        let ctx = MovementContext::new("bench", Utc::now());
        b.iter(|| {
            ledger
                .apply_movement(ids[0], MovementKind::Inbound, black_box(1), &ctx)
                .unwrap();
        });
    });

    // Growing history: every iteration replays a longer movement list on read.
    group.bench_function("apply_inbound_deep_history", |b| {
        let (store, ids) = seeded_store(1);
        let ledger = StockLedger::new(&store, NullNotifier);
        let ctx = MovementContext::new("bench", Utc::now());
        for _ in 0..10_000 {
            ledger
                .apply_movement(ids[0], MovementKind::Inbound, 1, &ctx)
                .unwrap();
        }
        b.iter(|| {
            ledger
                .apply_movement(ids[0], MovementKind::Inbound, black_box(1), &ctx)
                .unwrap();
        });
    });

    group.finish();
}

fn bench_batch_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_throughput");

    for batch_size in [1usize, 10, 100].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("inbound_batch", batch_size),
            batch_size,
            |b, &size| {
                let (store, ids) = seeded_store(size);
                let ledger = StockLedger::new(&store, NullNotifier);
                let ctx = MovementContext::new("bench", Utc::now());
                let items: Vec<LineItem> = ids
                    .iter()
                    .map(|id| LineItem::inventory(*id, 1))
                    .collect();
                b.iter(|| {
                    ledger
                        .apply_batch(black_box(&items), MovementKind::Inbound, &ctx)
                        .unwrap();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_movement_latency, bench_batch_throughput);
criterion_main!(benches);
