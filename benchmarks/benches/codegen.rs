use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use minic::compiler::core::compile;
use minic::lexer::core::lex;
use minic::parser::core::parse;

fn program_with_declarations(count: usize) -> String {
    let mut src = String::new();
    for i in 0..count {
        src.push_str(&format!("int v{i} = {} + {};\n", i, i + 1));
    }
    src
}

fn bench_compile(c: &mut Criterion) {
    let src = program_with_declarations(200);
    let tokens = lex("bench.mc", &src).unwrap();
    let ast = parse("bench.mc", &src, &tokens).unwrap();

    c.bench_function("compile_200_declarations", |b| {
        b.iter(|| compile(black_box(&ast)).unwrap())
    });
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
