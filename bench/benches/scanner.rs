use criterion::{criterion_group, criterion_main, Criterion};
use procc::{scanner::Scanner, token::Token, util::BreakableIteratorExt};
use std::hint::black_box;

static INPUTS: [(&str, &str); 3] = [
    ("arithmetic", include_str!("../../demos/arithmetic.src")),
    ("procedures", include_str!("../../demos/procedures.src")),
    ("control_flow", include_str!("../../demos/control_flow.src")),
];

fn scan(input: &str) -> usize {
    Scanner::new(input).up_to(Token::is_eof).count()
}

fn criterion_benchmark(c: &mut Criterion) {
    for (name, input) in INPUTS {
        c.bench_function(&format!("scanner/{name}"), |b| {
            b.iter(|| black_box(scan(black_box(input))));
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
