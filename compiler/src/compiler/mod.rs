pub mod ast;
pub mod codegen;
pub mod core;
pub mod error;
pub mod semantics;
