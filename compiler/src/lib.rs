//! minic: a single-pass compiler for a small C-like teaching language.
//!
//! The pipeline is strictly sequential: [`lexer`] turns source text into
//! tokens, [`parser`] builds an abstract syntax tree with precedence
//! climbing, [`compiler::semantics`] runs scoped type checking, and
//! [`compiler::codegen`] lowers the checked tree to x86-64 assembly text.

pub mod compiler;
pub mod lexer;
pub mod parser;
pub mod utils;
