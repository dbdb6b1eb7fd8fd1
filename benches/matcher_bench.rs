//! Benchmarks for hostname matching.
//!
//! Measures exact, wildcard and miss lookups against a realistic table.

use criterion::{BenchmarkId, Criterion, Throughput, black_box};

use wildmask_dns::Mapping;
use wildmask_dns::matcher::DomainMatcher;

fn build_matcher() -> DomainMatcher {
    let mut mappings: Vec<Mapping> = (0..50)
        .map(|i| Mapping::new(i.to_string(), format!("service-{i}"), "127.0.0.1", 3000 + i))
        .collect();
    mappings.push(Mapping::new("cdn", "*.cdn", "127.0.0.1", 8080));
    mappings.push(Mapping::new("img", "img-*.assets", "127.0.0.1", 8081));

    DomainMatcher::new(&mappings, "test")
}

fn bench_match_host(c: &mut Criterion) {
    let matcher = build_matcher();

    let mut group = c.benchmark_group("matcher");
    group.throughput(Throughput::Elements(1));

    group.bench_function(BenchmarkId::new("match_host", "exact"), |b| {
        b.iter(|| matcher.match_host(black_box("service-42.test.")))
    });

    group.bench_function(BenchmarkId::new("match_host", "wildcard"), |b| {
        b.iter(|| matcher.match_host(black_box("a.b.cdn.test.")))
    });

    group.bench_function(BenchmarkId::new("match_host", "miss"), |b| {
        b.iter(|| matcher.match_host(black_box("unknown.test.")))
    });

    group.bench_function(BenchmarkId::new("match_host", "other_domain"), |b| {
        b.iter(|| matcher.match_host(black_box("www.example.com.")))
    });

    group.finish();
}

fn main() {
    let mut criterion = Criterion::default().configure_from_args();
    bench_match_host(&mut criterion);
    criterion.final_summary();
}
