//! Stack-machine code generation for x86-64 (Intel syntax).
//!
//! Every expression leaves its result in `rax`. Binary expressions push
//! the left value, evaluate the right, pop into a scratch register, and
//! combine. Locals live at fixed `rbp`-relative offsets carved out with
//! `sub rsp`; there is no spilling and no instruction scheduling.

use std::collections::HashMap;
use std::io::Write;
use tracing::debug;

use crate::compiler::ast::{Ast, BinOp, BinaryNode, LiteralValue, UnaryNode, UnaryOp, VarDeclNode};
use crate::compiler::error::CodegenError;
use crate::compiler::semantics::Analyzer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Register {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
    Rbp,
    Rsp,
}

impl Register {
    pub const COUNT: usize = 16;

    /// Registers the allocator may hand out: everything before the frame
    /// and stack pointers.
    const GENERAL: [Register; 14] = [
        Register::Rax,
        Register::Rbx,
        Register::Rcx,
        Register::Rdx,
        Register::Rsi,
        Register::Rdi,
        Register::R8,
        Register::R9,
        Register::R10,
        Register::R11,
        Register::R12,
        Register::R13,
        Register::R14,
        Register::R15,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Register::Rax => "rax",
            Register::Rbx => "rbx",
            Register::Rcx => "rcx",
            Register::Rdx => "rdx",
            Register::Rsi => "rsi",
            Register::Rdi => "rdi",
            Register::R8 => "r8",
            Register::R9 => "r9",
            Register::R10 => "r10",
            Register::R11 => "r11",
            Register::R12 => "r12",
            Register::R13 => "r13",
            Register::R14 => "r14",
            Register::R15 => "r15",
            Register::Rbp => "rbp",
            Register::Rsp => "rsp",
        }
    }
}

/// The accumulator every expression evaluates into.
const ACCUMULATOR: Register = Register::Rax;

/// Size of every local slot. All supported types occupy one quadword.
const SLOT_SIZE: i64 = 8;

/// Emits one assembly program into `sink`, borrowing the analyzer's symbol
/// information. Register flags, the stack offset, and the locals map grow
/// monotonically during a pass; build a fresh generator per program.
pub struct CodeGenerator<'a, W: Write> {
    symbols: &'a Analyzer,
    sink: W,
    in_use: [bool; Register::COUNT],
    stack_offset: i64,
    label_counter: usize,
    locals: HashMap<String, i64>,
    had_error: bool,
    last_error: String,
}

impl<'a, W: Write> CodeGenerator<'a, W> {
    pub fn new(symbols: &'a Analyzer, sink: W) -> Self {
        let mut in_use = [false; Register::COUNT];
        // The accumulator is never handed out as scratch.
        in_use[ACCUMULATOR as usize] = true;
        Self {
            symbols,
            sink,
            in_use,
            stack_offset: 0,
            label_counter: 0,
            locals: HashMap::new(),
            had_error: false,
            last_error: String::new(),
        }
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    /// First-free scan over the general-purpose pool. No spilling: `None`
    /// means the expression needed more live registers than exist.
    pub fn allocate_register(&mut self) -> Option<Register> {
        for reg in Register::GENERAL {
            if !self.in_use[reg as usize] {
                self.in_use[reg as usize] = true;
                return Some(reg);
            }
        }
        None
    }

    pub fn release_register(&mut self, reg: Register) {
        self.in_use[reg as usize] = false;
    }

    /// Fresh local label. Unused by expression lowering today; control
    /// flow constructs will need it.
    pub fn next_label(&mut self, stem: &str) -> String {
        let label = format!(".L{stem}{}", self.label_counter);
        self.label_counter += 1;
        label
    }

    /// Emit the whole program: prologue, statements, epilogue.
    pub fn generate(&mut self, root: &Ast) -> Result<(), CodegenError> {
        let result = self.generate_inner(root);
        if let Err(err) = &result {
            self.had_error = true;
            self.last_error = err.to_string();
        } else {
            debug!("code generation finished");
        }
        result
    }

    fn generate_inner(&mut self, root: &Ast) -> Result<(), CodegenError> {
        self.emit_prologue()?;

        match root {
            Ast::Program(statements) => {
                for statement in statements {
                    self.statement(statement)?;
                }
            }
            // A bare expression compiles as the whole body.
            other => self.statement(other)?,
        }

        self.emit_epilogue()?;
        self.sink.flush()?;
        Ok(())
    }

    fn statement(&mut self, node: &Ast) -> Result<(), CodegenError> {
        match node {
            Ast::VarDecl(decl) => self.var_decl(decl),
            Ast::Literal(_) | Ast::Identifier(_) | Ast::Binary(_) | Ast::Unary(_) => {
                self.expression(node)
            }
            Ast::Program(_) => Err(CodegenError::UnsupportedNode {
                what: "nested program".into(),
            }),
            Ast::Error(_) => Err(CodegenError::UnsupportedNode {
                what: "error node".into(),
            }),
        }
    }

    /// Evaluate an expression into the accumulator.
    fn expression(&mut self, node: &Ast) -> Result<(), CodegenError> {
        match node {
            Ast::Literal(lit) => match &lit.value {
                LiteralValue::Int(v) => self.emit("mov", &format!("rax, {v}")),
                other => Err(CodegenError::UnsupportedNode {
                    what: format!("{other:?} literal"),
                }),
            },
            Ast::Identifier(ident) => {
                let offset = self
                    .locals
                    .get(&ident.name)
                    .copied()
                    .ok_or_else(|| CodegenError::SymbolNotFound {
                        name: ident.name.clone(),
                    })?;
                self.emit("mov", &format!("rax, [rbp-{offset}]"))
            }
            Ast::Binary(binary) => self.binary(binary),
            Ast::Unary(unary) => self.unary(unary),
            other => Err(CodegenError::UnsupportedNode {
                what: format!("{other:?}"),
            }),
        }
    }

    /// Left value goes through the machine stack so the right-hand
    /// evaluation is free to clobber the accumulator.
    fn binary(&mut self, binary: &BinaryNode) -> Result<(), CodegenError> {
        self.expression(&binary.lhs)?;
        self.emit("push", "rax")?;
        self.expression(&binary.rhs)?;

        let scratch = self
            .allocate_register()
            .ok_or(CodegenError::RegisterExhausted)?;
        let name = scratch.name();
        self.emit("pop", name)?;

        let result = match binary.op {
            BinOp::Add => self.emit("add", &format!("rax, {name}")),
            BinOp::Sub => {
                // Left minus right: the left value sits in the scratch
                // register, the right in the accumulator.
                self.emit("sub", &format!("{name}, rax"))?;
                self.emit("mov", &format!("rax, {name}"))
            }
            BinOp::Mul => self.emit("imul", &format!("rax, {name}")),
            other => Err(CodegenError::UnsupportedOperator {
                op: other.symbol().into(),
            }),
        };

        self.release_register(scratch);
        result
    }

    fn unary(&mut self, unary: &UnaryNode) -> Result<(), CodegenError> {
        self.expression(&unary.operand)?;
        match unary.op {
            UnaryOp::Neg => self.emit("neg", "rax"),
            UnaryOp::BitNot => self.emit("not", "rax"),
            UnaryOp::Not => {
                self.emit("cmp", "rax, 0")?;
                self.emit("sete", "al")?;
                self.emit("movzx", "rax, al")
            }
        }
    }

    fn var_decl(&mut self, decl: &VarDeclNode) -> Result<(), CodegenError> {
        // Analyzed declarations are always resolvable; a miss means the
        // tree was never checked.
        if self.symbols.lookup(&decl.name).is_none() {
            return Err(CodegenError::SymbolNotFound {
                name: decl.name.clone(),
            });
        }

        self.stack_offset += SLOT_SIZE;
        let offset = self.stack_offset;
        self.emit("sub", &format!("rsp, {SLOT_SIZE}"))?;
        self.locals.insert(decl.name.clone(), offset);

        if let Some(init) = &decl.init {
            self.expression(init)?;
            self.emit("mov", &format!("[rbp-{offset}], rax"))?;
        }
        Ok(())
    }

    fn emit(&mut self, mnemonic: &str, operands: &str) -> Result<(), CodegenError> {
        if operands.is_empty() {
            writeln!(self.sink, "    {mnemonic}")?;
        } else {
            writeln!(self.sink, "    {mnemonic:<7} {operands}")?;
        }
        Ok(())
    }

    fn emit_label(&mut self, label: &str) -> Result<(), CodegenError> {
        writeln!(self.sink, "{label}:")?;
        Ok(())
    }

    fn emit_prologue(&mut self) -> Result<(), CodegenError> {
        writeln!(self.sink, "    .section .data")?;
        writeln!(self.sink, "    .section .text")?;
        writeln!(self.sink, "    .global _main")?;
        self.emit_label("_main")?;
        self.emit("push", "rbp")?;
        self.emit("mov", "rbp, rsp")?;
        Ok(())
    }

    fn emit_epilogue(&mut self) -> Result<(), CodegenError> {
        self.emit("mov", "rsp, rbp")?;
        self.emit("pop", "rbp")?;
        self.emit("ret", "")?;
        Ok(())
    }
}
