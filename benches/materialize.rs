use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hyper::header::HeaderMap;
use wiretap::body::{is_probably_utf8, Materializer};
use wiretap::config::CaptureConfig;

fn bench_materialize_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("materialize");
    let materializer = Materializer::new(&CaptureConfig::default());
    let headers = HeaderMap::new();

    for size in [100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let body = "{\"status\":\"ok\"}".repeat(size / 15 + 1).into_bytes();

            b.iter(|| materializer.response(black_box(&headers), black_box(&body)));
        });
    }

    group.finish();
}

fn bench_probe(c: &mut Criterion) {
    c.bench_function("is_probably_utf8", |b| {
        let body = "{\"status\":\"ok\"}".repeat(64);

        b.iter(|| is_probably_utf8(black_box(body.as_bytes()), black_box(64)));
    });
}

criterion_group!(benches, bench_materialize_sizes, bench_probe);
criterion_main!(benches);
