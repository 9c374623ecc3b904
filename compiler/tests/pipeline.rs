//! End-to-end runs of the full pipeline: lex, parse, analyze, generate.

use minic::compiler::core::compile;
use minic::lexer::core::lex;
use minic::parser::core::parse;

fn compile_source(src: &str) -> miette::Result<String> {
    let tokens = lex("pipeline.mc", src)?;
    let ast = parse("pipeline.mc", src, &tokens)?;
    compile(&ast)
}

#[test]
fn single_literal_compiles_to_the_skeleton() {
    let asm = compile_source("42").expect("compilation should succeed");
    assert!(asm.starts_with("    .section .data\n    .section .text\n"));
    assert!(asm.contains(".global _main"));
    assert!(asm.contains("_main:"));
    assert!(asm.contains("mov     rax, 42"));
    assert!(asm.trim_end().ends_with("ret"));
}

#[test]
fn arithmetic_program_round_trips() {
    let asm = compile_source("(1 + 2) * 3 - 4").expect("compilation should succeed");
    assert!(asm.contains("add     rax, rbx"));
    assert!(asm.contains("imul    rax, rbx"));
    assert!(asm.contains("sub     rbx, rax"));
}

#[test]
fn declarations_and_uses_compile_together() {
    let src = "int x = 5;\nint y = 7;\nx + y\n";
    let asm = compile_source(src).expect("compilation should succeed");
    assert!(asm.contains("sub     rsp, 8"));
    assert!(asm.contains("mov     [rbp-8], rax"));
    assert!(asm.contains("mov     [rbp-16], rax"));
    assert!(asm.contains("mov     rax, [rbp-8]"));
    assert!(asm.contains("mov     rax, [rbp-16]"));
}

#[test]
fn lexical_errors_surface_from_lex() {
    assert!(lex("pipeline.mc", "\"unterminated").is_err());
}

#[test]
fn syntax_errors_surface_from_parse() {
    let src = "(1 + 2";
    let tokens = lex("pipeline.mc", src).unwrap();
    assert!(parse("pipeline.mc", src, &tokens).is_err());
}

#[test]
fn semantic_errors_stop_the_pipeline() {
    assert!(compile_source("undeclared + 1").is_err());
    assert!(compile_source("int x = 1.5;").is_err());
}

#[test]
fn codegen_errors_stop_the_pipeline() {
    // Division parses and type-checks but the generator rejects it.
    assert!(compile_source("8 / 2").is_err());
}
