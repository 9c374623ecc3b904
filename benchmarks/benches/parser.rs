use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use minic::lexer::core::lex;
use minic::parser::core::parse;

fn generate_expression_source(terms: usize) -> String {
    let mut src = String::from("1");
    for i in 0..terms {
        let op = match i % 3 {
            0 => " + ",
            1 => " * ",
            _ => " - ",
        };
        src.push_str(op);
        src.push_str(&(i % 100).to_string());
    }
    src
}

fn generate_declaration_source(count: usize) -> String {
    let mut src = String::new();
    for i in 0..count {
        src.push_str(&format!("int v{i} = {i} + {i};\n"));
    }
    src
}

fn bench_lexer(c: &mut Criterion) {
    let src = generate_expression_source(1000);
    c.bench_function("lex_1000_terms", |b| {
        b.iter(|| lex("bench.mc", black_box(&src)).unwrap())
    });
}

fn bench_parser(c: &mut Criterion) {
    let src = generate_expression_source(1000);
    let tokens = lex("bench.mc", &src).unwrap();
    c.bench_function("parse_1000_terms", |b| {
        b.iter(|| parse("bench.mc", &src, black_box(&tokens)).unwrap())
    });

    let decl_src = generate_declaration_source(500);
    let decl_tokens = lex("bench.mc", &decl_src).unwrap();
    c.bench_function("parse_500_declarations", |b| {
        b.iter(|| parse("bench.mc", &decl_src, black_box(&decl_tokens)).unwrap())
    });
}

criterion_group!(benches, bench_lexer, bench_parser);
criterion_main!(benches);
