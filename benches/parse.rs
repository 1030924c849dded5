use criterion::{criterion_group, criterion_main, Criterion};
use mmdbuild::config::Config;
use std::fmt::Write;
use std::path::Path;

/// A chain of `n` tasks, each reading the previous task's output.
fn pipeline(n: usize) -> String {
    let mut text = String::from("graph TD\nI0[BWV000.ly<br/>Score] --> T0[step_0]\n");
    for i in 0..n {
        writeln!(text, "T{i} --> R{i}[cp BWV000_{i}.in BWV000_{i}.out]").unwrap();
        writeln!(text, "R{i} --> O{i}[BWV000_{i}.out<br/>Step {i} output]").unwrap();
        if i + 1 < n {
            writeln!(text, "O{i} --> T{}[step_{}]", i + 1, i + 1).unwrap();
        }
    }
    writeln!(text, "R{} --> E0[BWV000.pdf]", n - 1).unwrap();
    text
}

pub fn bench_parse(c: &mut Criterion) {
    let text = pipeline(200);
    c.bench_function("parse", |b| {
        b.iter(|| mmdbuild::parse::parse(Path::new("bench.mmd"), &text).unwrap())
    });
}

pub fn bench_generate(c: &mut Criterion) {
    let text = pipeline(200);
    let config = Config::default();
    c.bench_function("generate", |b| {
        b.iter(|| {
            let diagram = mmdbuild::parse::parse(Path::new("bench.mmd"), &text).unwrap();
            let doc = mmdbuild::extract::extract(diagram);
            mmdbuild::generate::generate(&doc, "bench.mmd", &config)
        })
    });
}

criterion_group!(benches, bench_parse, bench_generate);
criterion_main!(benches);
