use std::hint::black_box;

use cairn::{FieldRule, Filter, Model, Schema, Store};
use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::json;
use tempfile::tempdir;

async fn setup_model(documents: usize) -> (Model, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let store = Store::new();
    let users = store
        .model(
            "User",
            Schema::new()
                .field("username", FieldRule::string().required())
                .field("group", FieldRule::number())
                .field("active", FieldRule::boolean().default_value(true)),
        )
        .await
        .unwrap();
    store.connect(temp_dir.path()).await.unwrap();
    for i in 0 .. documents {
        users
            .create(json!({"_id": format!("user-{}", i), "username": format!("user{}", i), "group": i % 10}))
            .await
            .unwrap();
    }
    (users, temp_dir)
}

fn bench_create(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("model_create", |b| {
        b.iter_batched(
            || rt.block_on(setup_model(0)),
            |(users, _temp_dir)| {
                rt.block_on(async move {
                    let doc = json!({"username": "bench", "group": black_box(3)});
                    black_box(users.create(doc).await.unwrap());
                })
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_save_into_large_collection(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("model_save_1k", |b| {
        b.iter_batched(
            || rt.block_on(setup_model(1000)),
            |(users, _temp_dir)| {
                rt.block_on(async move {
                    let mut user = users.find_by_id("user-500").await.unwrap().unwrap();
                    user.set("group", black_box(42)).unwrap();
                    user.save().await.unwrap();
                })
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_find_by_id(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (users, _temp_dir) = rt.block_on(setup_model(1000));

    c.bench_function("model_find_by_id_1k", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(users.find_by_id(black_box("user-999")).await.unwrap());
            })
        })
    });
}

fn bench_find(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (users, _temp_dir) = rt.block_on(setup_model(1000));

    c.bench_function("model_find_1k", |b| {
        b.iter(|| {
            rt.block_on(async {
                let filter = Filter::new().equals("group", black_box(7));
                black_box(users.find(filter).await.unwrap());
            })
        })
    });
}

criterion_group!(
    benches,
    bench_create,
    bench_save_into_large_collection,
    bench_find_by_id,
    bench_find
);
criterion_main!(benches);
