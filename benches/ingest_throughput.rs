use std::sync::Arc;

use betrace::config::EngineConfig;
use betrace::dsl;
use betrace::engine::RuleEngine;
use betrace::rule::{Rule, Severity};
use betrace::span::{Span, SpanKind, StatusCode};
use criterion::{criterion_group, criterion_main, Criterion};

fn compiled_rule(id: &str, source: &str) -> Rule {
    let ast = dsl::compile(source).unwrap();
    let mut rule = Rule::new(id, id, source, Severity::Medium, "", 0);
    rule.ast = Some(ast);
    rule.enabled = true;
    rule
}

fn span(i: u64) -> Span {
    Span::new(
        [1; 16],
        [(i % 255) as u8; 8],
        None,
        "checkout",
        "svc",
        SpanKind::Server,
        StatusCode::Ok,
        0,
        500_000,
    )
}

fn bench_ingest(c: &mut Criterion) {
    let engine = RuleEngine::new(EngineConfig::default());
    engine.load_or_replace(compiled_rule(
        "r1",
        r#"when { checkout.where(span.duration > 1000000000) } always { span.status == "OK" }"#,
    ));

    let mut i = 0u64;
    c.bench_function("ingest_throughput/submit_span", |b| {
        b.iter(|| {
            engine.submit(span(i));
            i += 1;
        })
    });
    engine.shutdown();
}

criterion_group!(benches, bench_ingest);
criterion_main!(benches);
