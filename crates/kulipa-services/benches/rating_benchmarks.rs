//! Benchmarks for charge rating
//!
//! Run with: cargo bench --package kulipa-services
//!
//! Measures the pure rating math over large unbilled sets, and one full
//! rating pass through the engine on the in-memory store.

use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kulipa_core::models::{
    ChargeBreakdown, Customer, NewUsageRecord, Plan, UsageAmounts, UsageRecord, UsageType,
};
use kulipa_core::traits::UsageRepository;
use kulipa_core::BillingConfig;
use kulipa_db::MemoryStore;
use kulipa_services::{BillingEngine, TracingEventSink};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn plan() -> Plan {
    Plan {
        id: 1,
        name: "Bench".to_string(),
        base_price: dec!(10),
        allowance: UsageAmounts::new(dec!(100), dec!(100), dec!(1024)),
        overage_rate: UsageAmounts::new(dec!(0.1), dec!(0.05), dec!(0.01)),
        ..Default::default()
    }
}

fn mock_usage(count: i64) -> Vec<UsageRecord> {
    let start = Utc::now() - Duration::days(30);
    (0..count)
        .map(|i| UsageRecord {
            id: i,
            customer_id: 1,
            plan_id: 1,
            usage_type: UsageType::ALL[(i % 3) as usize],
            quantity: Decimal::new(i % 500 + 1, 1),
            recorded_at: start + Duration::seconds(i),
            billed: false,
            bill_id: None,
        })
        .collect()
}

fn bench_compute_breakdown(c: &mut Criterion) {
    let plan = plan();
    let mut group = c.benchmark_group("compute_breakdown");

    for size in [100, 1_000, 10_000].iter() {
        let usage = mock_usage(*size);

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| ChargeBreakdown::compute(black_box(&plan), black_box(&usage), dec!(0.16)));
        });
    }

    group.finish();
}

fn bench_engine_compute_charges(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let store = MemoryStore::new();
    store.put_plan(plan());
    store.put_customer(Customer {
        id: 1,
        name: "Bench".to_string(),
        plan_id: Some(1),
        ..Default::default()
    });
    runtime.block_on(async {
        for record in mock_usage(5_000) {
            store
                .append_usage(&NewUsageRecord::new(
                    1,
                    1,
                    record.usage_type,
                    record.quantity,
                ))
                .await
                .unwrap();
        }
    });

    let engine: BillingEngine<MemoryStore> = BillingEngine::new(
        Arc::new(store),
        None,
        BillingConfig::default(),
        Arc::new(TracingEventSink),
    );

    c.bench_function("engine_compute_charges_5000", |b| {
        b.iter(|| runtime.block_on(engine.compute_charges(black_box(1))).unwrap());
    });
}

criterion_group!(benches, bench_compute_breakdown, bench_engine_compute_charges);
criterion_main!(benches);
