//! Translates stack VM code into Hack assembly.
//!
//! - `parser` turns source lines into typed [`ast::Command`]s, lazily.
//! - `translator` lowers each command to assembly, keeping the label counters
//!   and scope names that must stay consistent across a whole program.
//! - `error` holds the error types shared by both.

pub mod ast;
pub mod error;
pub mod parser;
pub mod translator;

use std::io::{BufRead, Write};

pub use error::{Error, Result, SyntaxError};
pub use parser::Parser;
pub use translator::{Options, Translator};

/// Streams one unit through `translator` into `out`, returning the number of
/// commands lowered. Lines already written stay written if a later line fails.
pub fn translate_unit<R: BufRead, W: Write>(
    translator: &mut Translator,
    unit: &str,
    input: R,
    out: &mut W,
) -> Result<usize> {
    translator.set_unit(unit);

    let mut count = 0;
    for command in Parser::new(input) {
        translator.write_command(&command?, out)?;
        count += 1;
    }
    Ok(count)
}

/// Translates in-memory `(unit name, source)` pairs, in order, into one program.
pub fn translate_program(units: &[(&str, &str)], options: &Options) -> Result<String> {
    let mut translator = Translator::new(options);
    let mut out = Vec::new();

    translator.write_bootstrap(&mut out)?;
    for (unit, source) in units {
        translate_unit(&mut translator, unit, source.as_bytes(), &mut out)?;
    }

    Ok(String::from_utf8_lossy(&out).into_owned())
}
