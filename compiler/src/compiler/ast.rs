//! The abstract syntax tree produced by the parser.
//!
//! Nodes own their children outright (`Box` for the recursive cases), so a
//! subtree is dropped exactly once with its root. Most nodes keep the token
//! they were built from so later stages can point diagnostics at source.

use serde::Serialize;
use std::fmt;

use crate::lexer::tokens::{Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Ast {
    Program(Vec<Ast>),
    Literal(LiteralNode),
    Identifier(IdentifierNode),
    Binary(Box<BinaryNode>),
    Unary(Box<UnaryNode>),
    VarDecl(Box<VarDeclNode>),
    /// Sentinel produced on parse failure; the sticky error flag carries
    /// the actual diagnostic.
    Error(ErrorNode),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiteralNode {
    pub value: LiteralValue,
    pub token: Option<Token>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LiteralValue {
    Int(i64),
    Float(f64),
    Str(String),
    Char(char),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentifierNode {
    pub name: String,
    pub token: Option<Token>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinaryNode {
    pub op: BinOp,
    pub lhs: Ast,
    pub rhs: Ast,
    pub token: Option<Token>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnaryNode {
    pub op: UnaryOp,
    pub operand: Ast,
    pub token: Option<Token>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarDeclNode {
    pub type_name: String,
    pub name: String,
    pub init: Option<Ast>,
    pub mutable: bool,
    pub token: Option<Token>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorNode {
    pub message: String,
    pub token: Option<Token>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Neg,    // -
    Not,    // !
    BitNot, // ~
}

impl Ast {
    /// Position of the token this node was built from, if any.
    pub fn position(&self) -> Option<(usize, usize)> {
        let token = match self {
            Ast::Program(_) => None,
            Ast::Literal(n) => n.token.as_ref(),
            Ast::Identifier(n) => n.token.as_ref(),
            Ast::Binary(n) => n.token.as_ref(),
            Ast::Unary(n) => n.token.as_ref(),
            Ast::VarDecl(n) => n.token.as_ref(),
            Ast::Error(n) => n.token.as_ref(),
        };
        token.map(|t| (t.line, t.column))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Ast::Error(_))
    }
}

impl BinOp {
    pub fn from_token(kind: &TokenKind) -> Option<Self> {
        let op = match kind {
            TokenKind::Plus => BinOp::Add,
            TokenKind::Minus => BinOp::Sub,
            TokenKind::Star => BinOp::Mul,
            TokenKind::Slash => BinOp::Div,
            TokenKind::Percent => BinOp::Mod,
            TokenKind::EqEq => BinOp::Eq,
            TokenKind::NotEq => BinOp::Ne,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::Le => BinOp::Le,
            TokenKind::Gt => BinOp::Gt,
            TokenKind::Ge => BinOp::Ge,
            TokenKind::AndAnd => BinOp::And,
            TokenKind::OrOr => BinOp::Or,
            TokenKind::Amp => BinOp::BitAnd,
            TokenKind::Pipe => BinOp::BitOr,
            TokenKind::Caret => BinOp::BitXor,
            TokenKind::Shl => BinOp::Shl,
            TokenKind::Shr => BinOp::Shr,
            _ => return None,
        };
        Some(op)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    pub fn is_bitwise(&self) -> bool {
        matches!(
            self,
            BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
        }
    }
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
