use std::fmt;

use crate::error::SyntaxError;

/// Widest value a Hack A-instruction can load.
pub const MAX_LITERAL: u16 = 32767;
/// `call` loads `numArgs + 5`, which must itself fit a literal.
pub const MAX_CALL_ARGS: u16 = MAX_LITERAL - 5;
/// Reserved for generated labels; VM names may not contain it.
pub const SCOPE_SEPARATOR: char = '$';

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Segment {
    Constant,
    Local,
    Static,
    Argument,
    This,
    That,
    Pointer,
    Temp,
}

impl Segment {
    pub fn name(&self) -> &'static str {
        match self {
            Segment::Constant => "constant",
            Segment::Local => "local",
            Segment::Static => "static",
            Segment::Argument => "argument",
            Segment::This => "this",
            Segment::That => "that",
            Segment::Pointer => "pointer",
            Segment::Temp => "temp",
        }
    }

    /// Largest index the segment accepts, if it is narrower than `u16`.
    pub fn max_index(&self) -> Option<u16> {
        match self {
            Segment::Constant => Some(MAX_LITERAL),
            Segment::Temp => Some(7),
            Segment::Pointer => Some(1),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ArithOp {
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
}

impl ArithOp {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Neg => "neg",
            ArithOp::Eq => "eq",
            ArithOp::Gt => "gt",
            ArithOp::Lt => "lt",
            ArithOp::And => "and",
            ArithOp::Or => "or",
            ArithOp::Not => "not",
        }
    }
}

/// Command family, as selected by the first token of a line.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CommandKind {
    Arithmetic,
    Push,
    Pop,
    Label,
    Goto,
    If,
    Function,
    Call,
    Return,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Arithmetic => "arithmetic",
            CommandKind::Push => "push",
            CommandKind::Pop => "pop",
            CommandKind::Label => "label",
            CommandKind::Goto => "goto",
            CommandKind::If => "if-goto",
            CommandKind::Function => "function",
            CommandKind::Call => "call",
            CommandKind::Return => "return",
        };
        f.write_str(name)
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Command {
    // Stack Basics
    Arithmetic(ArithOp),
    Push(Segment, u16),
    Pop(Segment, u16),

    // Control
    Label(String),
    Goto(String),
    IfGoto(String),

    // Functions
    Function(String, u16),
    Call(String, u16),
    Return,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Arithmetic(_) => CommandKind::Arithmetic,
            Command::Push(..) => CommandKind::Push,
            Command::Pop(..) => CommandKind::Pop,
            Command::Label(_) => CommandKind::Label,
            Command::Goto(_) => CommandKind::Goto,
            Command::IfGoto(_) => CommandKind::If,
            Command::Function(..) => CommandKind::Function,
            Command::Call(..) => CommandKind::Call,
            Command::Return => CommandKind::Return,
        }
    }

    /// First argument: the mnemonic itself for arithmetic, the segment name
    /// for push/pop, the symbol for everything else that takes one.
    pub fn arg1(&self) -> Result<&str, SyntaxError> {
        match self {
            Command::Arithmetic(op) => Ok(op.mnemonic()),
            Command::Push(seg, _) | Command::Pop(seg, _) => Ok(seg.name()),
            Command::Label(sym)
            | Command::Goto(sym)
            | Command::IfGoto(sym)
            | Command::Function(sym, _)
            | Command::Call(sym, _) => Ok(sym),
            Command::Return => Err(SyntaxError::ArgumentNotApplicable(self.kind())),
        }
    }

    /// Checks the rules a `Command` value can break when built by hand
    /// rather than parsed: segment/index ranges, count limits, and names
    /// that would clash with generated labels.
    pub fn validate(&self) -> Result<(), SyntaxError> {
        match self {
            Command::Pop(Segment::Constant, _) => Err(SyntaxError::InvalidSegment {
                segment: Segment::Constant.name().to_string(),
                kind: CommandKind::Pop,
            }),
            Command::Push(seg, n) | Command::Pop(seg, n)
                if seg.max_index().map_or(false, |max| *n > max) =>
            {
                Err(SyntaxError::InvalidIndex(n.to_string()))
            }
            Command::Label(sym) | Command::Goto(sym) | Command::IfGoto(sym)
                if sym.contains(SCOPE_SEPARATOR) =>
            {
                Err(SyntaxError::InvalidSymbol(sym.clone()))
            }
            Command::Function(name, _) | Command::Call(name, _) if name.contains(SCOPE_SEPARATOR) => {
                Err(SyntaxError::InvalidSymbol(name.clone()))
            }
            Command::Function(_, n) if *n > MAX_LITERAL => Err(SyntaxError::InvalidIndex(n.to_string())),
            Command::Call(_, n) if *n > MAX_CALL_ARGS => Err(SyntaxError::InvalidIndex(n.to_string())),
            _ => Ok(()),
        }
    }

    pub fn arg2(&self) -> Result<u16, SyntaxError> {
        match self {
            Command::Push(_, n) | Command::Pop(_, n) | Command::Function(_, n) | Command::Call(_, n) => {
                Ok(*n)
            }
            _ => Err(SyntaxError::ArgumentNotApplicable(self.kind())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Arithmetic(op) => f.write_str(op.mnemonic()),
            Command::Push(seg, n) => write!(f, "push {} {}", seg.name(), n),
            Command::Pop(seg, n) => write!(f, "pop {} {}", seg.name(), n),
            Command::Label(sym) => write!(f, "label {}", sym),
            Command::Goto(sym) => write!(f, "goto {}", sym),
            Command::IfGoto(sym) => write!(f, "if-goto {}", sym),
            Command::Function(name, n) => write!(f, "function {} {}", name, n),
            Command::Call(name, n) => write!(f, "call {} {}", name, n),
            Command::Return => f.write_str("return"),
        }
    }
}
