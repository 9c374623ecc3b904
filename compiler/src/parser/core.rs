use miette::Result;
use std::iter::Peekable;
use std::slice::Iter;
use tracing::debug;

use crate::compiler::ast::*;
use crate::lexer::tokens::{Token, TokenKind};
use crate::parser::error::ParseError;
use crate::utils::loc::span_at;

/// Parse a whole token stream into a `Program` node, surfacing the sticky
/// parse error if one was recorded along the way.
pub fn parse(filename: &str, source: &str, tokens: &[Token]) -> Result<Ast> {
    let mut parser = Parser::new(filename, source, tokens);
    let program = parser.parse_program();

    if let Some(err) = parser.take_error() {
        return Err(err.into());
    }

    debug!("parsed {filename}");
    Ok(program)
}

/// Precedence-climbing parser with single-token lookahead.
///
/// Parse failures never abort: the offending construct becomes an
/// [`Ast::Error`] node and the sticky `had_error` flag plus `last_error`
/// record carry the diagnostic. Callers must check the flag before
/// trusting the tree.
pub struct Parser<'t> {
    filename: &'t str,
    source: &'t str,
    iter: Peekable<Iter<'t, Token>>,
    had_error: bool,
    last_error: Option<ParseError>,
}

/// Binding strength for binary operators, low to high. Assignment occupies
/// the lowest slot of the table but is not folded as a binary expression.
fn precedence(op: BinOp) -> u8 {
    match op {
        BinOp::Or => 2,
        BinOp::And => 3,
        BinOp::Eq | BinOp::Ne => 4,
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 5,
        BinOp::Add | BinOp::Sub => 6,
        BinOp::Mul | BinOp::Div | BinOp::Mod => 7,
        BinOp::Shl | BinOp::Shr => 8,
        BinOp::BitAnd => 9,
        BinOp::BitXor => 10,
        BinOp::BitOr => 11,
    }
}

const LOWEST_PRECEDENCE: u8 = 1;

impl<'t> Parser<'t> {
    pub fn new(filename: &'t str, source: &'t str, tokens: &'t [Token]) -> Self {
        Self {
            filename,
            source,
            iter: tokens.iter().peekable(),
            had_error: false,
            last_error: None,
        }
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn last_error(&self) -> Option<&ParseError> {
        self.last_error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<ParseError> {
        self.last_error.take()
    }

    /// Parse one complete expression or declaration.
    pub fn parse(&mut self) -> Ast {
        match self.peek() {
            None | Some(TokenKind::Eof) => {
                self.record_error_at_end("unexpected end of input");
                Ast::Error(ErrorNode {
                    message: "unexpected end of input".into(),
                    token: None,
                })
            }
            _ => self.statement(),
        }
    }

    /// Parse every statement up to `Eof` into a `Program` node.
    pub fn parse_program(&mut self) -> Ast {
        let mut statements = Vec::new();

        loop {
            while matches!(
                self.peek(),
                Some(TokenKind::Newline | TokenKind::Semicolon)
            ) {
                self.next();
            }
            if matches!(self.peek(), None | Some(TokenKind::Eof)) {
                break;
            }

            let statement = self.statement();
            let failed = statement.is_error();
            statements.push(statement);
            if failed {
                self.synchronize();
            }
        }

        Ast::Program(statements)
    }

    fn peek(&mut self) -> Option<&'t TokenKind> {
        self.iter.peek().map(|t| &t.kind)
    }

    fn peek_token(&mut self) -> Option<&'t Token> {
        self.iter.peek().copied()
    }

    fn next(&mut self) -> Option<&'t Token> {
        self.iter.next()
    }

    /// Skip to the next statement boundary after a parse failure.
    fn synchronize(&mut self) {
        while let Some(kind) = self.peek() {
            if matches!(
                kind,
                TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof
            ) {
                break;
            }
            self.next();
        }
    }

    fn record_error(&mut self, token: Option<&Token>, message: impl Into<String>) {
        let message = message.into();
        let span = match token {
            Some(t) => span_at(self.source, t.line, t.column, t.lexeme.len().max(1)),
            None => (self.source.len(), 0).into(),
        };
        self.had_error = true;
        self.last_error = Some(ParseError::new(
            self.filename,
            self.source,
            span,
            "here",
            message,
        ));
    }

    fn record_error_at_end(&mut self, message: &str) {
        self.record_error(None, message);
    }

    fn error_node(&mut self, token: Option<&Token>, message: impl Into<String>) -> Ast {
        let message = message.into();
        self.record_error(token, message.clone());
        Ast::Error(ErrorNode {
            message,
            token: token.cloned(),
        })
    }

    fn statement(&mut self) -> Ast {
        match self.peek() {
            Some(
                TokenKind::KwInt | TokenKind::KwFloat | TokenKind::KwChar | TokenKind::KwBool,
            ) => self.declaration(),
            _ => self.expression(),
        }
    }

    /// `type-name identifier (= expression)? terminator` — a plain grammar
    /// rule, no precedence involved.
    fn declaration(&mut self) -> Ast {
        let type_token = match self.next() {
            Some(t) => t,
            None => {
                return self.error_node(None, "expected type name");
            }
        };
        let type_name = type_token.lexeme.clone();

        let name = match self.peek_token() {
            Some(t) => match &t.kind {
                TokenKind::Identifier(name) => {
                    self.next();
                    name.clone()
                }
                other => {
                    let message = format!("expected variable name, found `{other}`");
                    return self.error_node(Some(t), message);
                }
            },
            None => return self.error_node(None, "expected variable name"),
        };

        let init = if matches!(self.peek(), Some(TokenKind::Assign)) {
            self.next();
            let value = self.expression();
            if value.is_error() {
                return value;
            }
            Some(value)
        } else {
            None
        };

        match self.peek() {
            None | Some(TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof) => {
                if matches!(
                    self.peek(),
                    Some(TokenKind::Newline | TokenKind::Semicolon)
                ) {
                    self.next();
                }
            }
            Some(other) => {
                let message = format!("expected `;` or newline after declaration, found `{other}`");
                let token = self.peek_token();
                self.record_error(token, message);
            }
        }

        Ast::VarDecl(Box::new(VarDeclNode {
            type_name,
            name,
            init,
            mutable: true,
            token: Some(type_token.clone()),
        }))
    }

    fn expression(&mut self) -> Ast {
        self.binary_expr(LOWEST_PRECEDENCE)
    }

    /// Precedence climbing: fold binary operators of precedence >= `min_prec`,
    /// parsing each right operand one level tighter for left associativity.
    fn binary_expr(&mut self, min_prec: u8) -> Ast {
        let mut left = self.primary();
        if left.is_error() {
            return left;
        }

        while let Some(token) = self.peek_token() {
            let Some(op) = BinOp::from_token(&token.kind) else {
                break;
            };
            let prec = precedence(op);
            if prec < min_prec {
                break;
            }

            let op_token = self.next().cloned();
            let rhs = self.binary_expr(prec + 1);
            if rhs.is_error() {
                return rhs;
            }

            left = Ast::Binary(Box::new(BinaryNode {
                op,
                lhs: left,
                rhs,
                token: op_token,
            }));
        }

        left
    }

    fn primary(&mut self) -> Ast {
        let Some(token) = self.peek_token() else {
            return self.error_node(None, "unexpected end of input");
        };

        match &token.kind {
            TokenKind::Int(v) => {
                self.next();
                Ast::Literal(LiteralNode {
                    value: LiteralValue::Int(*v),
                    token: Some(token.clone()),
                })
            }
            TokenKind::Float(v) => {
                self.next();
                Ast::Literal(LiteralNode {
                    value: LiteralValue::Float(*v),
                    token: Some(token.clone()),
                })
            }
            TokenKind::Str(v) => {
                self.next();
                Ast::Literal(LiteralNode {
                    value: LiteralValue::Str(v.clone()),
                    token: Some(token.clone()),
                })
            }
            TokenKind::Char(v) => {
                self.next();
                Ast::Literal(LiteralNode {
                    value: LiteralValue::Char(*v),
                    token: Some(token.clone()),
                })
            }
            TokenKind::Identifier(name) => {
                self.next();
                Ast::Identifier(IdentifierNode {
                    name: name.clone(),
                    token: Some(token.clone()),
                })
            }
            // `true`/`false` lower to 1/0; the retained token still marks
            // them as bool for the analyzer.
            TokenKind::True => {
                self.next();
                Ast::Literal(LiteralNode {
                    value: LiteralValue::Int(1),
                    token: Some(token.clone()),
                })
            }
            TokenKind::False => {
                self.next();
                Ast::Literal(LiteralNode {
                    value: LiteralValue::Int(0),
                    token: Some(token.clone()),
                })
            }
            TokenKind::LParen => {
                self.next();
                let inner = self.binary_expr(LOWEST_PRECEDENCE);
                if inner.is_error() {
                    return inner;
                }
                match self.peek_token() {
                    Some(t) if t.kind == TokenKind::RParen => {
                        self.next();
                        inner
                    }
                    other => self.error_node(other, "expected closing parenthesis"),
                }
            }
            TokenKind::Minus | TokenKind::Not | TokenKind::Tilde => {
                let op = match token.kind {
                    TokenKind::Minus => UnaryOp::Neg,
                    TokenKind::Not => UnaryOp::Not,
                    _ => UnaryOp::BitNot,
                };
                self.next();
                let operand = self.primary();
                if operand.is_error() {
                    return operand;
                }
                Ast::Unary(Box::new(UnaryNode {
                    op,
                    operand,
                    token: Some(token.clone()),
                }))
            }
            other => {
                let message = format!("unexpected token `{other}` in expression");
                self.error_node(Some(token), message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::core::lex;

    fn parse_one(src: &str) -> (Ast, bool) {
        let tokens = lex("test.mc", src).expect("lexing should succeed");
        let mut parser = Parser::new("test.mc", src, &tokens);
        let ast = parser.parse();
        (ast, parser.had_error())
    }

    fn int_of(ast: &Ast) -> i64 {
        match ast {
            Ast::Literal(LiteralNode {
                value: LiteralValue::Int(v),
                ..
            }) => *v,
            other => panic!("expected int literal, got {other:?}"),
        }
    }

    fn binary_of(ast: &Ast) -> &BinaryNode {
        match ast {
            Ast::Binary(b) => b,
            other => panic!("expected binary expression, got {other:?}"),
        }
    }

    #[test]
    fn integer_literal() {
        let (ast, err) = parse_one("12345");
        assert!(!err);
        assert_eq!(int_of(&ast), 12345);
    }

    #[test]
    fn simple_binary_operators() {
        for (src, op) in [("1 + 2", BinOp::Add), ("1 - 2", BinOp::Sub), ("1 * 2", BinOp::Mul)] {
            let (ast, err) = parse_one(src);
            assert!(!err);
            let b = binary_of(&ast);
            assert_eq!(b.op, op);
            assert_eq!(int_of(&b.lhs), 1);
            assert_eq!(int_of(&b.rhs), 2);
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        // 1 + 2 * 3  =>  +(1, *(2, 3))
        let (ast, _) = parse_one("1 + 2 * 3");
        let root = binary_of(&ast);
        assert_eq!(root.op, BinOp::Add);
        assert_eq!(int_of(&root.lhs), 1);
        let rhs = binary_of(&root.rhs);
        assert_eq!(rhs.op, BinOp::Mul);
        assert_eq!(int_of(&rhs.lhs), 2);
        assert_eq!(int_of(&rhs.rhs), 3);

        // 1 * 2 + 3  =>  +(*(1, 2), 3)
        let (ast, _) = parse_one("1 * 2 + 3");
        let root = binary_of(&ast);
        assert_eq!(root.op, BinOp::Add);
        let lhs = binary_of(&root.lhs);
        assert_eq!(lhs.op, BinOp::Mul);
        assert_eq!(int_of(&root.rhs), 3);
    }

    #[test]
    fn addition_is_left_associative() {
        // 1 + 2 + 3  =>  +(+(1, 2), 3)
        let (ast, _) = parse_one("1 + 2 + 3");
        let root = binary_of(&ast);
        assert_eq!(root.op, BinOp::Add);
        assert_eq!(int_of(&root.rhs), 3);
        let lhs = binary_of(&root.lhs);
        assert_eq!(int_of(&lhs.lhs), 1);
        assert_eq!(int_of(&lhs.rhs), 2);

        let (ast, _) = parse_one("2 * 3 * 4");
        let root = binary_of(&ast);
        assert_eq!(root.op, BinOp::Mul);
        assert_eq!(int_of(&root.rhs), 4);
    }

    #[test]
    fn parentheses_override_precedence() {
        // (1 + 2) * 3  =>  *(+(1, 2), 3)
        let (ast, err) = parse_one("(1 + 2) * 3");
        assert!(!err);
        let root = binary_of(&ast);
        assert_eq!(root.op, BinOp::Mul);
        assert_eq!(int_of(&root.rhs), 3);
        let lhs = binary_of(&root.lhs);
        assert_eq!(lhs.op, BinOp::Add);
    }

    #[test]
    fn missing_close_paren_is_a_syntax_error() {
        let (ast, err) = parse_one("(1 + 2");
        assert!(err);
        assert!(ast.is_error());
    }

    #[test]
    fn leading_binary_operator_yields_error_node() {
        for src in ["+", "*", "+ 1"] {
            let (ast, err) = parse_one(src);
            assert!(err, "{src:?} should set the error flag");
            assert!(ast.is_error(), "{src:?} should produce an error node");
        }
    }

    #[test]
    fn true_false_lower_to_one_and_zero() {
        let (ast, _) = parse_one("true");
        assert_eq!(int_of(&ast), 1);
        let (ast, _) = parse_one("false");
        assert_eq!(int_of(&ast), 0);
    }

    #[test]
    fn unary_minus() {
        let (ast, err) = parse_one("-5");
        assert!(!err);
        match ast {
            Ast::Unary(u) => {
                assert_eq!(u.op, UnaryOp::Neg);
                assert_eq!(int_of(&u.operand), 5);
            }
            other => panic!("expected unary, got {other:?}"),
        }
    }

    #[test]
    fn comparison_and_logical_precedence() {
        // 1 < 2 && 3 < 4  =>  &&(<(1,2), <(3,4))
        let (ast, _) = parse_one("1 < 2 && 3 < 4");
        let root = binary_of(&ast);
        assert_eq!(root.op, BinOp::And);
        assert_eq!(binary_of(&root.lhs).op, BinOp::Lt);
        assert_eq!(binary_of(&root.rhs).op, BinOp::Lt);
    }

    #[test]
    fn variable_declaration_with_initializer() {
        let (ast, err) = parse_one("int x = 1 + 2;");
        assert!(!err);
        match ast {
            Ast::VarDecl(d) => {
                assert_eq!(d.type_name, "int");
                assert_eq!(d.name, "x");
                assert_eq!(binary_of(d.init.as_ref().unwrap()).op, BinOp::Add);
            }
            other => panic!("expected declaration, got {other:?}"),
        }
    }

    #[test]
    fn declaration_without_initializer() {
        let (ast, err) = parse_one("float y;");
        assert!(!err);
        match ast {
            Ast::VarDecl(d) => {
                assert_eq!(d.type_name, "float");
                assert!(d.init.is_none());
            }
            other => panic!("expected declaration, got {other:?}"),
        }
    }

    #[test]
    fn program_collects_statements_across_terminators() {
        let src = "int x = 1;\n\nx + 2\n";
        let tokens = lex("test.mc", src).unwrap();
        let mut parser = Parser::new("test.mc", src, &tokens);
        let program = parser.parse_program();
        assert!(!parser.had_error());
        match program {
            Ast::Program(stmts) => assert_eq!(stmts.len(), 2),
            other => panic!("expected program, got {other:?}"),
        }
    }

    #[test]
    fn program_recovers_at_statement_boundary() {
        let src = "? ?\n1 + 2\n";
        let tokens = lex("test.mc", src).unwrap();
        let mut parser = Parser::new("test.mc", src, &tokens);
        let program = parser.parse_program();
        assert!(parser.had_error());
        match program {
            Ast::Program(stmts) => {
                assert_eq!(stmts.len(), 2);
                assert!(stmts[0].is_error());
                assert!(!stmts[1].is_error());
            }
            other => panic!("expected program, got {other:?}"),
        }
    }
}
