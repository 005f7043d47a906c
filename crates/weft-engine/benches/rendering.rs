//! Benchmarks for template rendering throughput.

#![allow(clippy::format_push_string)] // Benchmark setup code, performance not critical

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::{Value, json};
use weft_engine::{Engine, RenderContext};

const ROW: &str = r#"<for-each data="${rows}" loop-var="row" index-var="i"><tr class="${i % 2 == 0 ? 'even' : 'odd'}"><if test="${row.active}"><td>${row.name}</td></if><else><td class="muted">${row.name}</td></else></tr></for-each>"#;

/// Generate a definitions document with `count` small templates.
fn generate_definitions(count: usize) -> String {
    let mut defs = String::from("<definitions>\n");
    for i in 0..count {
        defs.push_str(&format!(
            "<template name=\"t{i}\"><p id=\"p{i}\">${{title}} {i}</p></template>\n"
        ));
    }
    defs.push_str("</definitions>");
    defs
}

fn rows(count: usize) -> Value {
    Value::Array(
        (0..count)
            .map(|i| json!({"name": format!("row {i}"), "active": i % 3 != 0}))
            .collect(),
    )
}

fn bench_render_text(c: &mut Criterion) {
    let engine = Engine::new();
    engine
        .register_template("greeting", "<p>Hello ${user.name}, you have ${count} messages</p>")
        .unwrap();

    c.bench_function("render_interpolated_text", |b| {
        b.iter(|| {
            let ctx = RenderContext::new()
                .with_var("user", json!({"name": "Ann"}))
                .with_var("count", json!(3));
            engine.render("greeting", ctx)
        });
    });
}

fn bench_render_table(c: &mut Criterion) {
    let engine = Engine::new();
    engine
        .register_template("table", &format!("<table>{ROW}</table>"))
        .unwrap();

    let mut group = c.benchmark_group("render_table");
    for count in [10, 100, 1000] {
        let data = rows(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("rows", count), &data, |b, data| {
            b.iter(|| {
                let ctx = RenderContext::new().with_var("rows", data.clone());
                engine.render("table", ctx)
            });
        });
    }
    group.finish();
}

fn bench_load_definitions(c: &mut Criterion) {
    let defs = generate_definitions(200);

    c.bench_function("load_200_templates", |b| {
        b.iter(|| Engine::new().load_definitions(&defs));
    });
}

criterion_group!(
    benches,
    bench_render_text,
    bench_render_table,
    bench_load_definitions
);
criterion_main!(benches);
