use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use std::sync::Arc;

use tagstore::definition::{ConfigValidator, StructuralValidator};
use tagstore::storage::MemoryDatastore;
use tagstore::validator::is_valid_name;
use tagstore::{EngineConfig, TagStore};

fn create_test_config(rules: usize) -> EngineConfig {
    let rules: serde_json::Map<String, serde_json::Value> = (0..rules)
        .map(|i| (format!("rule{i}"), json!({"when": format!("amount > {}", i * 100)})))
        .collect();

    EngineConfig::new(json!({
        "fields": {"amount": "number", "country": "string"},
        "rules": rules,
    }))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap()
}

/// Store holding one engine with `tags` enabled tags, the first being the default.
fn populated_store(rt: &tokio::runtime::Runtime, tags: usize) -> TagStore {
    let store = TagStore::new(Arc::new(MemoryDatastore::new()));
    let config = create_test_config(10);

    rt.block_on(async {
        for i in 0..tags {
            let tag = format!("v{i}");
            store
                .create_tagged_config("billing", &tag, &config)
                .await
                .unwrap();
            store.enable_tag("billing", &tag).await.unwrap();
        }
        store.set_default_tag("billing", "v0").await.unwrap();
    });

    store
}

fn bench_name_validation(c: &mut Criterion) {
    c.bench_function("validate_name", |b| {
        b.iter(|| is_valid_name(black_box("billingEngine2024")))
    });
}

fn bench_config_validation(c: &mut Criterion) {
    let validator = StructuralValidator::new();
    let config = create_test_config(50);

    c.bench_function("validate_config_50_rules", |b| {
        b.iter(|| validator.validate(black_box(&config)))
    });
}

fn bench_create_tagged_config(c: &mut Criterion) {
    let store = TagStore::new(Arc::new(MemoryDatastore::new()));
    let config = create_test_config(10);

    c.bench_function("create_tagged_config_new_engine", |b| {
        let mut i = 0u64;
        b.to_async(runtime()).iter(|| {
            i += 1;
            let name = format!("engine{i}");
            let store = &store;
            let config = &config;
            async move { store.create_tagged_config(&name, "v1", config).await }
        })
    });
}

fn bench_toggle_tag(c: &mut Criterion) {
    let rt = runtime();
    let store = populated_store(&rt, 8);

    c.bench_function("disable_enable_tag", |b| {
        b.to_async(&rt).iter(|| async {
            store.disable_tag("billing", "v3").await.unwrap();
            store.enable_tag("billing", "v3").await.unwrap();
        })
    });
}

fn bench_get_complete(c: &mut Criterion) {
    let rt = runtime();

    for tags in [1, 8, 32] {
        let store = populated_store(&rt, tags);

        c.bench_function(&format!("get_complete_rule_engine_{tags}_tags"), |b| {
            b.to_async(&rt)
                .iter(|| async { store.get_complete_rule_engine(black_box("billing")).await })
        });
    }
}

criterion_group!(
    benches,
    bench_name_validation,
    bench_config_validation,
    bench_create_tagged_config,
    bench_toggle_tag,
    bench_get_complete,
);

criterion_main!(benches);
