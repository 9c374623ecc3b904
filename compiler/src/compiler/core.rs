use miette::{IntoDiagnostic, Result};
use tracing::debug;

use crate::compiler::ast::Ast;
use crate::compiler::codegen::CodeGenerator;
use crate::compiler::semantics::Analyzer;

/// Run semantic analysis and code generation over a parsed program,
/// returning the assembly text.
pub fn compile(program: &Ast) -> Result<String> {
    let mut analyzer = Analyzer::new();
    if !analyzer.analyze(program) {
        return match analyzer.take_error() {
            Some(err) => Err(err.into()),
            None => Err(miette::miette!("semantic analysis failed")),
        };
    }
    debug!("semantic analysis passed");

    let mut buffer = Vec::new();
    let mut generator = CodeGenerator::new(&analyzer, &mut buffer);
    generator.generate(program)?;

    String::from_utf8(buffer).into_diagnostic()
}
