//! Scope-based type inference and checking.
//!
//! The analyzer keeps a stack of scopes (innermost last) rather than
//! parent back-pointers; entering a scope pushes, exiting pops, and name
//! resolution walks the stack from the top down.

use miette::Result;
use std::fmt;
use tracing::debug;

use crate::compiler::ast::{Ast, BinaryNode, LiteralValue, UnaryNode, UnaryOp, VarDeclNode};
use crate::compiler::error::SemanticError;
use crate::lexer::tokens::TokenKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Int,
    Float,
    Str,
    Char,
    Bool,
    Void,
    Unknown,
    Error,
}

impl DataType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "int" => DataType::Int,
            "float" => DataType::Float,
            "string" => DataType::Str,
            "char" => DataType::Char,
            "bool" => DataType::Bool,
            "void" => DataType::Void,
            _ => DataType::Unknown,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int | DataType::Float)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Str => "string",
            DataType::Char => "char",
            DataType::Bool => "bool",
            DataType::Void => "void",
            DataType::Unknown => "unknown",
            DataType::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    Parameter,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub type_name: String,
    pub mutable: bool,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Default)]
pub struct Scope {
    symbols: Vec<Symbol>,
}

/// Walks a parsed tree, resolving names against the scope stack and
/// checking operand types. Errors are sticky: the walk continues so the
/// caller gets the last diagnostic, and `analyze` reports overall
/// success or failure.
pub struct Analyzer {
    scopes: Vec<Scope>,
    had_error: bool,
    last_error: Option<SemanticError>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
            had_error: false,
            last_error: None,
        }
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn last_error(&self) -> Option<&SemanticError> {
        self.last_error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<SemanticError> {
        self.last_error.take()
    }

    /// Current nesting depth; 1 is the outermost scope.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Pops the innermost scope, dropping every symbol declared in it.
    /// Guarded no-op at the outermost scope.
    pub fn exit_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Append to the current scope. Same-scope redeclaration is allowed
    /// and simply shadows on lookup.
    pub fn declare(&mut self, symbol: Symbol) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.symbols.push(symbol);
        }
    }

    /// Resolve a name innermost-first along the scope stack.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.symbols.iter().rev().find(|s| s.name == name))
    }

    /// Infer the type of an expression without reporting errors.
    ///
    /// Literals map by token kind: `true`/`false` parse to integer 1/0 but
    /// their tokens keep them `bool`. Unresolved identifiers are `Unknown`,
    /// ill-typed operations are `Error`.
    pub fn type_of(&self, node: &Ast) -> DataType {
        match node {
            Ast::Program(_) | Ast::VarDecl(_) => DataType::Void,
            Ast::Error(_) => DataType::Error,
            Ast::Literal(lit) => {
                if let Some(token) = &lit.token {
                    if matches!(token.kind, TokenKind::True | TokenKind::False) {
                        return DataType::Bool;
                    }
                }
                match lit.value {
                    LiteralValue::Int(_) => DataType::Int,
                    LiteralValue::Float(_) => DataType::Float,
                    LiteralValue::Str(_) => DataType::Str,
                    LiteralValue::Char(_) => DataType::Char,
                }
            }
            Ast::Identifier(ident) => match self.lookup(&ident.name) {
                Some(symbol) => DataType::from_name(&symbol.type_name),
                None => DataType::Unknown,
            },
            Ast::Binary(binary) => self.binary_type(binary),
            Ast::Unary(unary) => self.unary_type(unary),
        }
    }

    /// One rule set for binary operations, shared by inference and the
    /// checking walk: comparisons are always bool, logical operators
    /// require bool operands, arithmetic requires identical numeric
    /// operand types, bitwise and shift require ints.
    fn binary_type(&self, binary: &BinaryNode) -> DataType {
        let lhs = self.type_of(&binary.lhs);
        let rhs = self.type_of(&binary.rhs);

        if binary.op.is_comparison() {
            return DataType::Bool;
        }
        if binary.op.is_logical() {
            return if lhs == DataType::Bool && rhs == DataType::Bool {
                DataType::Bool
            } else {
                DataType::Error
            };
        }
        if binary.op.is_bitwise() {
            return if lhs == DataType::Int && rhs == DataType::Int {
                DataType::Int
            } else {
                DataType::Error
            };
        }
        // Arithmetic.
        if lhs == rhs && lhs.is_numeric() {
            lhs
        } else {
            DataType::Error
        }
    }

    fn unary_type(&self, unary: &UnaryNode) -> DataType {
        let operand = self.type_of(&unary.operand);
        match unary.op {
            UnaryOp::Neg if operand.is_numeric() => operand,
            UnaryOp::Not if operand == DataType::Bool => DataType::Bool,
            UnaryOp::BitNot if operand == DataType::Int => DataType::Int,
            _ => DataType::Error,
        }
    }

    /// Walk the tree, declaring symbols and checking every expression.
    /// Returns overall success; the sticky flag and `last_error` hold the
    /// most recent diagnostic.
    pub fn analyze(&mut self, root: &Ast) -> bool {
        self.visit(root);
        !self.had_error
    }

    fn report(&mut self, error: SemanticError) {
        self.had_error = true;
        self.last_error = Some(error);
    }

    fn visit(&mut self, node: &Ast) {
        match node {
            Ast::Program(statements) => {
                for statement in statements {
                    self.visit(statement);
                }
            }
            Ast::VarDecl(decl) => self.visit_declaration(decl),
            Ast::Binary(binary) => {
                self.visit(&binary.lhs);
                self.visit(&binary.rhs);
                let lhs = self.type_of(&binary.lhs);
                let rhs = self.type_of(&binary.rhs);
                // An Unknown or Error operand was already reported deeper in
                // the tree; keep that diagnostic.
                let poisoned = matches!(lhs, DataType::Unknown | DataType::Error)
                    || matches!(rhs, DataType::Unknown | DataType::Error);
                if !poisoned && self.binary_type(binary) == DataType::Error {
                    let (line, column) = node.position().unwrap_or((0, 0));
                    self.report(SemanticError::InvalidOperands {
                        op: binary.op.symbol().to_owned(),
                        lhs: lhs.to_string(),
                        rhs: rhs.to_string(),
                        line,
                        column,
                    });
                }
            }
            Ast::Unary(unary) => {
                self.visit(&unary.operand);
                let operand = self.type_of(&unary.operand);
                let poisoned = matches!(operand, DataType::Unknown | DataType::Error);
                if !poisoned && self.unary_type(unary) == DataType::Error {
                    let (line, column) = node.position().unwrap_or((0, 0));
                    self.report(SemanticError::InvalidUnaryOperand {
                        op: unary.op.symbol().to_owned(),
                        operand: operand.to_string(),
                        line,
                        column,
                    });
                }
            }
            Ast::Identifier(ident) => {
                if self.lookup(&ident.name).is_none() {
                    let (line, column) = node.position().unwrap_or((0, 0));
                    self.report(SemanticError::UnknownIdentifier {
                        name: ident.name.clone(),
                        line,
                        column,
                    });
                }
            }
            Ast::Literal(_) => {}
            Ast::Error(_) => self.report(SemanticError::ErrorNode),
        }
    }

    fn visit_declaration(&mut self, decl: &VarDeclNode) {
        if let Some(init) = &decl.init {
            self.visit(init);

            let declared = DataType::from_name(&decl.type_name);
            let found = self.type_of(init);
            let compatible = match (declared, found) {
                (_, DataType::Unknown | DataType::Error) => true, // already reported
                // A bool variable may hold the lowered 1/0 of true/false.
                (DataType::Bool, DataType::Bool | DataType::Int) => true,
                (declared, found) => declared == found,
            };
            if !compatible {
                let (line, column) = decl
                    .token
                    .as_ref()
                    .map(|t| (t.line, t.column))
                    .unwrap_or((0, 0));
                self.report(SemanticError::InitializerMismatch {
                    name: decl.name.clone(),
                    declared: declared.to_string(),
                    found: found.to_string(),
                    line,
                    column,
                });
            }
        }

        let (line, column) = decl
            .token
            .as_ref()
            .map(|t| (t.line, t.column))
            .unwrap_or((0, 0));
        self.declare(Symbol {
            name: decl.name.clone(),
            kind: SymbolKind::Variable,
            type_name: decl.type_name.clone(),
            mutable: decl.mutable,
            line,
            column,
        });
    }
}

/// Run the analyzer over a tree, discarding the scope state afterwards.
pub fn check(root: &Ast) -> Result<()> {
    let mut analyzer = Analyzer::new();
    if analyzer.analyze(root) {
        debug!("semantic analysis passed");
        Ok(())
    } else {
        match analyzer.take_error() {
            Some(err) => Err(err.into()),
            None => Err(miette::miette!("semantic analysis failed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::core::lex;
    use crate::parser::core::Parser;

    fn parse_expr(src: &str) -> Ast {
        let tokens = lex("test.mc", src).unwrap();
        let mut parser = Parser::new("test.mc", src, &tokens);
        let ast = parser.parse();
        assert!(!parser.had_error(), "parse failed for {src:?}");
        ast
    }

    fn variable(name: &str, type_name: &str) -> Symbol {
        Symbol {
            name: name.into(),
            kind: SymbolKind::Variable,
            type_name: type_name.into(),
            mutable: true,
            line: 1,
            column: 1,
        }
    }

    #[test]
    fn literal_types_map_by_token_kind() {
        let analyzer = Analyzer::new();
        assert_eq!(analyzer.type_of(&parse_expr("42")), DataType::Int);
        assert_eq!(analyzer.type_of(&parse_expr("3.5")), DataType::Float);
        assert_eq!(analyzer.type_of(&parse_expr("\"hi\"")), DataType::Str);
        // true parses to integer 1 but its token keeps it bool.
        assert_eq!(analyzer.type_of(&parse_expr("true")), DataType::Bool);
        assert_eq!(analyzer.type_of(&parse_expr("false")), DataType::Bool);
    }

    #[test]
    fn arithmetic_requires_identical_numeric_types() {
        let analyzer = Analyzer::new();
        assert_eq!(analyzer.type_of(&parse_expr("1 + 2")), DataType::Int);
        assert_eq!(analyzer.type_of(&parse_expr("1.0 * 2.0")), DataType::Float);
        assert_eq!(analyzer.type_of(&parse_expr("1 + 2.0")), DataType::Error);
        assert_eq!(analyzer.type_of(&parse_expr("\"a\" + \"b\"")), DataType::Error);
    }

    #[test]
    fn comparisons_always_yield_bool() {
        let analyzer = Analyzer::new();
        assert_eq!(analyzer.type_of(&parse_expr("1 < 2")), DataType::Bool);
        assert_eq!(analyzer.type_of(&parse_expr("1.0 == 2")), DataType::Bool);
        assert_eq!(analyzer.type_of(&parse_expr("\"a\" != \"b\"")), DataType::Bool);
    }

    #[test]
    fn logical_operators_require_bool_operands() {
        let analyzer = Analyzer::new();
        assert_eq!(analyzer.type_of(&parse_expr("true && false")), DataType::Bool);
        assert_eq!(analyzer.type_of(&parse_expr("1 < 2 || 3 < 4")), DataType::Bool);
        assert_eq!(analyzer.type_of(&parse_expr("1 && 2")), DataType::Error);

        let mut analyzer = Analyzer::new();
        assert!(!analyzer.analyze(&parse_expr("1 && 2")));
        assert!(matches!(
            analyzer.last_error(),
            Some(SemanticError::InvalidOperands { .. })
        ));
    }

    #[test]
    fn identifiers_resolve_through_the_scope_chain() {
        let mut analyzer = Analyzer::new();
        analyzer.declare(variable("x", "int"));
        analyzer.enter_scope();
        assert_eq!(analyzer.type_of(&parse_expr("x")), DataType::Int);
        analyzer.declare(variable("x", "float"));
        // The inner declaration shadows the outer one.
        assert_eq!(analyzer.type_of(&parse_expr("x")), DataType::Float);
        analyzer.exit_scope();
        assert_eq!(analyzer.type_of(&parse_expr("x")), DataType::Int);
    }

    #[test]
    fn exiting_a_scope_invalidates_its_symbols() {
        let mut analyzer = Analyzer::new();
        analyzer.enter_scope();
        analyzer.declare(variable("tmp", "int"));
        assert!(analyzer.lookup("tmp").is_some());
        analyzer.exit_scope();
        assert!(analyzer.lookup("tmp").is_none());
        assert_eq!(analyzer.type_of(&parse_expr("tmp")), DataType::Unknown);
    }

    #[test]
    fn exit_scope_is_guarded_at_the_outermost_scope() {
        let mut analyzer = Analyzer::new();
        analyzer.exit_scope();
        analyzer.exit_scope();
        assert_eq!(analyzer.depth(), 1);
        analyzer.declare(variable("x", "int"));
        assert!(analyzer.lookup("x").is_some());
    }

    #[test]
    fn scope_depth_tracks_nesting() {
        let mut analyzer = Analyzer::new();
        assert_eq!(analyzer.depth(), 1);
        analyzer.enter_scope();
        analyzer.enter_scope();
        assert_eq!(analyzer.depth(), 3);
        analyzer.exit_scope();
        assert_eq!(analyzer.depth(), 2);
    }

    #[test]
    fn unknown_identifier_is_reported_by_analyze() {
        let mut analyzer = Analyzer::new();
        assert!(!analyzer.analyze(&parse_expr("nope + 1")));
        assert!(matches!(
            analyzer.last_error(),
            Some(SemanticError::UnknownIdentifier { name, .. }) if name == "nope"
        ));
    }

    #[test]
    fn declarations_introduce_symbols() {
        let src = "int x = 1;\nx + 2\n";
        let tokens = lex("test.mc", src).unwrap();
        let mut parser = Parser::new("test.mc", src, &tokens);
        let program = parser.parse_program();
        let mut analyzer = Analyzer::new();
        assert!(analyzer.analyze(&program));
        assert_eq!(analyzer.lookup("x").unwrap().type_name, "int");
    }

    #[test]
    fn initializer_type_must_match_declaration() {
        let src = "int x = 1.5;";
        let tokens = lex("test.mc", src).unwrap();
        let mut parser = Parser::new("test.mc", src, &tokens);
        let program = parser.parse();
        let mut analyzer = Analyzer::new();
        assert!(!analyzer.analyze(&program));
        assert!(matches!(
            analyzer.last_error(),
            Some(SemanticError::InitializerMismatch { .. })
        ));
    }

    #[test]
    fn same_scope_redeclaration_is_permitted() {
        let mut analyzer = Analyzer::new();
        analyzer.declare(variable("x", "int"));
        analyzer.declare(variable("x", "float"));
        // Later declaration wins on lookup.
        assert_eq!(analyzer.lookup("x").unwrap().type_name, "float");
    }
}
