use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use ppersist::{
    Array, DataFrame, Document, Persister, Series, StructuralValidator, Trust, Value,
};

fn table(rows: usize) -> DataFrame {
    let ids: Vec<Value> = (0..rows).map(|i| Value::Int(i as i64)).collect();
    let prices: Vec<Value> = (0..rows).map(|i| Value::Float(i as f64 * 0.25)).collect();
    let labels: Vec<Value> = (0..rows).map(|i| Value::from(format!("row{i}"))).collect();
    DataFrame::new([("id", ids), ("price", prices), ("label", labels)])
}

fn sample_document(size: usize) -> Document {
    let nested = Value::List(
        (0..size)
            .map(|i| Value::dict([("k", Value::Int(i as i64)), ("v", Value::tuple([1.0, 2.0]))]))
            .collect(),
    );
    Document::new()
        .with("nested", nested)
        .expect("doc")
        .with(
            "matrix",
            Array::from_f64((0..size * 4).map(|i| i as f64)).reshape(vec![size as u64, 4]),
        )
        .expect("doc")
        .with("series", Series::new((0..size).map(|i| i as i64)))
        .expect("doc")
        .with("table", table(size))
        .expect("doc")
}

fn bench_validate(c: &mut Criterion) {
    let validator = StructuralValidator::standard();
    let mut group = c.benchmark_group("validate");
    for size in [10usize, 100, 1000] {
        let document = sample_document(size);
        group.bench_function(format!("values_{size}"), |b| {
            b.iter(|| {
                for (name, value) in document.iter() {
                    validator.validate_named(name, value).expect("valid");
                }
            })
        });
    }
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let persister = Persister::standard();
    let document = sample_document(1000);
    c.bench_function("encode_checked", |b| {
        b.iter(|| persister.encode(&document).expect("encode"))
    });
}

fn bench_decode(c: &mut Criterion) {
    let persister = Persister::standard();
    let bytes = persister.encode(&sample_document(1000)).expect("encode");
    let mut group = c.benchmark_group("decode");
    for trust in [Trust::Gated, Trust::Trusted] {
        group.bench_function(format!("{trust:?}"), |b| {
            b.iter_batched(
                || bytes.clone(),
                |bytes| persister.decode(&bytes, trust).expect("decode"),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(core_benches, bench_validate, bench_encode, bench_decode);
criterion_main!(core_benches);
