#![allow(
    clippy::unwrap_used,
    clippy::tests_outside_test_module,
    reason = "benchmark"
)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use urilate::{Context, Template, UrilateEngine};

fn urilate_benchmark(c: &mut Criterion) {
    let template_str = "https://example.com/search/{term}{/path*}{?q,limit,list*}{#frag}";
    let template = Template::new(template_str).unwrap();

    let mut context = Context::new();
    context.insert("term", "rust");
    context.insert("path", vec!["a", "b", "c"]);
    context.insert("q", "uri templates");
    context.insert("limit", "20");
    context.insert("list", vec!["x", "y"]);
    context.insert("frag", "results");

    let mut group = c.benchmark_group("urilate");

    group.bench_function("parse", |b| {
        b.iter(|| black_box(Template::new(black_box(template_str)).unwrap()));
    });

    group.bench_function("expand", |b| {
        b.iter(|| black_box(template.expand(black_box(&context))));
    });

    let uri = template.expand(&context);
    group.bench_function("extract_strict", |b| {
        b.iter(|| black_box(template.extract(black_box(&uri), true).unwrap()));
    });

    let engine = UrilateEngine::new().with_base_uri("https://example.com");
    group.bench_function("expand_fast_path", |b| {
        b.iter(|| black_box(engine.expand(black_box("/plain/literal/path"), &context).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, urilate_benchmark);
criterion_main!(benches);
