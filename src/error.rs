use std::io;

use thiserror::Error;

use crate::ast::CommandKind;

pub type Result<T> = std::result::Result<T, Error>;

/// What is wrong with a single line of VM source.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum SyntaxError {
    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    #[error("`{0}` requires more arguments")]
    MissingArgument(CommandKind),

    #[error("invalid index `{0}`")]
    InvalidIndex(String),

    #[error("`{segment}` is not a valid segment for {kind}")]
    InvalidSegment { segment: String, kind: CommandKind },

    #[error("`{0}` has no such argument")]
    ArgumentNotApplicable(CommandKind),

    #[error("invalid symbol `{0}`")]
    InvalidSymbol(String),

    #[error("unexpected trailing input `{0}`")]
    TrailingInput(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("line {line}: {kind}\n    | {text}")]
    Syntax {
        line: usize,
        text: String,
        kind: SyntaxError,
    },

    #[error("cannot lower `{command}`: {kind}")]
    Command {
        command: String,
        kind: SyntaxError,
    },

    #[error("failed to read source")]
    Read(#[source] io::Error),

    #[error("failed to write assembly")]
    Write(#[source] io::Error),
}

impl Error {
    /// The line-level error, if this is one.
    pub fn syntax(&self) -> Option<&SyntaxError> {
        match self {
            Error::Syntax { kind, .. } | Error::Command { kind, .. } => Some(kind),
            _ => None,
        }
    }
}
