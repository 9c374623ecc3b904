use miette::Diagnostic;
use thiserror::Error;

/// Type and scope violations reported by the analyzer. Positions are plain
/// line/column pairs; by the time the analyzer runs, the source text has
/// already been dropped in favour of the tree.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum SemanticError {
    #[error("unknown identifier `{name}` at {line}:{column}")]
    #[diagnostic(code(minic::semantic::unknown_identifier))]
    UnknownIdentifier {
        name: String,
        line: usize,
        column: usize,
    },

    #[error("invalid operands to `{op}` ({lhs} and {rhs}) at {line}:{column}")]
    #[diagnostic(code(minic::semantic::invalid_operands))]
    InvalidOperands {
        op: String,
        lhs: String,
        rhs: String,
        line: usize,
        column: usize,
    },

    #[error("invalid operand to unary `{op}` ({operand}) at {line}:{column}")]
    #[diagnostic(code(minic::semantic::invalid_unary_operand))]
    InvalidUnaryOperand {
        op: String,
        operand: String,
        line: usize,
        column: usize,
    },

    #[error("cannot initialize `{name}` of type {declared} with a {found} value at {line}:{column}")]
    #[diagnostic(code(minic::semantic::initializer_mismatch))]
    InitializerMismatch {
        name: String,
        declared: String,
        found: String,
        line: usize,
        column: usize,
    },

    #[error("malformed tree: analysis reached an error node")]
    #[diagnostic(code(minic::semantic::error_node))]
    ErrorNode,
}

/// Failures while lowering the checked tree to assembly.
#[derive(Error, Debug, Diagnostic)]
pub enum CodegenError {
    #[error("unsupported node kind `{what}` in code generation")]
    #[diagnostic(code(minic::codegen::unsupported_node))]
    UnsupportedNode { what: String },

    #[error("operator `{op}` is not supported by the code generator")]
    #[diagnostic(code(minic::codegen::unsupported_operator))]
    UnsupportedOperator { op: String },

    #[error("symbol `{name}` not found during code generation")]
    #[diagnostic(code(minic::codegen::symbol_not_found))]
    SymbolNotFound { name: String },

    #[error("register pool exhausted")]
    #[diagnostic(code(minic::codegen::register_exhausted))]
    RegisterExhausted,

    #[error("failed to write assembly output")]
    #[diagnostic(code(minic::codegen::io))]
    Io(#[from] std::io::Error),
}
