use std::io::{BufRead, Lines};

use nom::{
    branch::alt,
    bytes::complete::{is_a, tag},
    character::{complete::digit1, is_digit},
    combinator::{all_consuming, map, map_res, value, verify},
    IResult,
};

use crate::ast::{ArithOp, Command::*, CommandKind, Segment::*, *};
use crate::error::{Error, Result, SyntaxError};

fn integer(input: &str) -> IResult<&str, u16> {
    map_res(digit1, |c: &str| c.parse())(input)
}

#[test]
fn test_integer() {
    assert_eq!(integer("32"), Ok(("", 32)));
    assert!(integer("x1").is_err());
    assert!(integer("70000").is_err());
}

fn segment(input: &str) -> IResult<&str, Segment> {
    alt((
        value(Constant, tag("constant")),
        value(Local, tag("local")),
        value(Static, tag("static")),
        value(Argument, tag("argument")),
        value(This, tag("this")),
        value(That, tag("that")),
        value(Pointer, tag("pointer")),
        value(Temp, tag("temp")),
    ))(input)
}

fn arith_op(input: &str) -> IResult<&str, ArithOp> {
    alt((
        value(ArithOp::Add, tag("add")),
        value(ArithOp::Sub, tag("sub")),
        value(ArithOp::Neg, tag("neg")),
        value(ArithOp::Eq, tag("eq")),
        value(ArithOp::Gt, tag("gt")),
        value(ArithOp::Lt, tag("lt")),
        value(ArithOp::And, tag("and")),
        value(ArithOp::Or, tag("or")),
        value(ArithOp::Not, tag("not")),
    ))(input)
}

#[test]
fn test_arith_op() {
    assert_eq!(arith_op("neg"), Ok(("", ArithOp::Neg)));
}

fn keyword(input: &str) -> IResult<&str, CommandKind> {
    alt((
        value(CommandKind::Push, tag("push")),
        value(CommandKind::Pop, tag("pop")),
        value(CommandKind::Label, tag("label")),
        value(CommandKind::Goto, tag("goto")),
        value(CommandKind::If, tag("if-goto")),
        value(CommandKind::Function, tag("function")),
        value(CommandKind::Call, tag("call")),
        value(CommandKind::Return, tag("return")),
    ))(input)
}

fn symbol(input: &str) -> IResult<&str, String> {
    map(
        verify(
            is_a("abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_.$:0123456789"),
            |c: &str| !is_digit(c.as_bytes()[0]),
        ),
        |sym: &str| sym.to_string(),
    )(input)
}

#[test]
fn test_symbol() {
    assert_eq!(symbol("Main.fib:LOOP_1"), Ok(("", "Main.fib:LOOP_1".to_string())));
    assert!(symbol("1LOOP").is_err());
}

/// Runs `parser` over a whole token, failing if anything is left over.
fn whole<'a, O>(parser: impl FnMut(&'a str) -> IResult<&'a str, O>, token: &'a str) -> Option<O> {
    all_consuming(parser)(token).ok().map(|(_, out)| out)
}

fn index_arg(token: Option<&str>, kind: CommandKind) -> std::result::Result<u16, SyntaxError> {
    let token = token.ok_or(SyntaxError::MissingArgument(kind))?;
    whole(integer, token).ok_or_else(|| SyntaxError::InvalidIndex(token.to_string()))
}

fn symbol_arg(token: Option<&str>, kind: CommandKind) -> std::result::Result<String, SyntaxError> {
    let token = token.ok_or(SyntaxError::MissingArgument(kind))?;
    whole(symbol, token).ok_or_else(|| SyntaxError::InvalidSymbol(token.to_string()))
}

fn push_pop<'a>(
    kind: CommandKind,
    tokens: &mut impl Iterator<Item = &'a str>,
) -> std::result::Result<Command, SyntaxError> {
    let seg_token = tokens.next().ok_or(SyntaxError::MissingArgument(kind))?;
    let seg = whole(segment, seg_token).ok_or_else(|| SyntaxError::InvalidSegment {
        segment: seg_token.to_string(),
        kind,
    })?;
    let index = index_arg(tokens.next(), kind)?;

    Ok(match kind {
        CommandKind::Pop => Pop(seg, index),
        _ => Push(seg, index),
    })
}

/// Parses one physical line. Blank and comment-only lines yield `None`.
pub fn parse_line(line: &str) -> std::result::Result<Option<Command>, SyntaxError> {
    let code = line.split_once("//").map(|(s, _)| s).unwrap_or(line);
    let mut tokens = code.split_whitespace();
    let first = match tokens.next() {
        Some(first) => first,
        None => return Ok(None),
    };

    let command = match whole(arith_op, first) {
        Some(op) => Arithmetic(op),
        None => {
            let kind = whole(keyword, first)
                .ok_or_else(|| SyntaxError::UnknownCommand(first.to_string()))?;
            match kind {
                CommandKind::Push | CommandKind::Pop => push_pop(kind, &mut tokens)?,
                CommandKind::Label => Label(symbol_arg(tokens.next(), kind)?),
                CommandKind::Goto => Goto(symbol_arg(tokens.next(), kind)?),
                CommandKind::If => IfGoto(symbol_arg(tokens.next(), kind)?),
                CommandKind::Function => {
                    let name = symbol_arg(tokens.next(), kind)?;
                    Function(name, index_arg(tokens.next(), kind)?)
                }
                CommandKind::Call => {
                    let name = symbol_arg(tokens.next(), kind)?;
                    Call(name, index_arg(tokens.next(), kind)?)
                }
                CommandKind::Return => Return,
                CommandKind::Arithmetic => unreachable!("arithmetic mnemonics are matched first"),
            }
        }
    };
    command.validate()?;

    let rest: Vec<&str> = tokens.collect();
    if !rest.is_empty() {
        return Err(SyntaxError::TrailingInput(rest.join(" ")));
    }

    Ok(Some(command))
}

#[test]
fn test_push() {
    assert_eq!(parse_line("push  pointer  1"), Ok(Some(Push(Pointer, 1))));
    assert_eq!(parse_line("\tpush constant 7\t\t// seven"), Ok(Some(Push(Constant, 7))));
}

#[test]
fn test_pop() {
    assert_eq!(parse_line("pop temp 7"), Ok(Some(Pop(Temp, 7))));
    assert_eq!(
        parse_line("pop constant 3"),
        Err(SyntaxError::InvalidSegment {
            segment: "constant".into(),
            kind: CommandKind::Pop
        })
    );
}

#[test]
fn test_skipped_lines() {
    assert_eq!(parse_line(""), Ok(None));
    assert_eq!(parse_line("   \t "), Ok(None));
    assert_eq!(parse_line("  // push constant 1"), Ok(None));
}

#[test]
fn test_functions() {
    assert_eq!(parse_line("function Main.fib 2"), Ok(Some(Function("Main.fib".into(), 2))));
    assert_eq!(parse_line("call Math.multiply 2"), Ok(Some(Call("Math.multiply".into(), 2))));
    assert_eq!(parse_line("return"), Ok(Some(Return)));
    assert_eq!(parse_line("if-goto IF_TRUE0"), Ok(Some(IfGoto("IF_TRUE0".into()))));
}

#[test]
fn test_errors() {
    assert_eq!(parse_line("mul"), Err(SyntaxError::UnknownCommand("mul".into())));
    assert_eq!(parse_line("addx"), Err(SyntaxError::UnknownCommand("addx".into())));
    assert_eq!(parse_line("push"), Err(SyntaxError::MissingArgument(CommandKind::Push)));
    assert_eq!(parse_line("push local"), Err(SyntaxError::MissingArgument(CommandKind::Push)));
    assert_eq!(parse_line("goto"), Err(SyntaxError::MissingArgument(CommandKind::Goto)));
    assert_eq!(parse_line("call Foo.bar"), Err(SyntaxError::MissingArgument(CommandKind::Call)));
    assert_eq!(parse_line("push local x"), Err(SyntaxError::InvalidIndex("x".into())));
    assert_eq!(parse_line("push temp 8"), Err(SyntaxError::InvalidIndex("8".into())));
    assert_eq!(parse_line("pop pointer 2"), Err(SyntaxError::InvalidIndex("2".into())));
    assert_eq!(parse_line("push constant 32768"), Err(SyntaxError::InvalidIndex("32768".into())));
    assert_eq!(
        parse_line("push heap 0"),
        Err(SyntaxError::InvalidSegment {
            segment: "heap".into(),
            kind: CommandKind::Push
        })
    );
    assert_eq!(parse_line("label 9LIVES"), Err(SyntaxError::InvalidSymbol("9LIVES".into())));
    assert_eq!(parse_line("add 1 2"), Err(SyntaxError::TrailingInput("1 2".into())));
}

#[test]
fn test_count_limits() {
    assert_eq!(parse_line("call Foo 32762"), Ok(Some(Call("Foo".into(), 32762))));
    assert_eq!(parse_line("call Foo 32767"), Err(SyntaxError::InvalidIndex("32767".into())));
    assert_eq!(parse_line("function Foo 32768"), Err(SyntaxError::InvalidIndex("32768".into())));
}

#[test]
fn test_reserved_separator() {
    assert_eq!(parse_line("label ret.0"), Ok(Some(Label("ret.0".into()))));
    assert_eq!(parse_line("label Foo$ret.0"), Err(SyntaxError::InvalidSymbol("Foo$ret.0".into())));
    assert_eq!(parse_line("function $top 0"), Err(SyntaxError::InvalidSymbol("$top".into())));
    assert_eq!(parse_line("call $cmp.true.0 0"), Err(SyntaxError::InvalidSymbol("$cmp.true.0".into())));
}

/// Lazy command stream over VM source, one physical line at a time.
///
/// Stops after the first error; nothing is yielded once it has been returned.
pub struct Parser<R> {
    lines: Lines<R>,
    line: usize,
    done: bool,
}

impl<R: BufRead> Parser<R> {
    pub fn new(input: R) -> Self {
        Parser {
            lines: input.lines(),
            line: 0,
            done: false,
        }
    }

    /// 1-based number of the last line read.
    pub fn line(&self) -> usize {
        self.line
    }
}

impl<R: BufRead> Iterator for Parser<R> {
    type Item = Result<Command>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(err) => {
                    self.done = true;
                    return Some(Err(Error::Read(err)));
                }
            };
            self.line += 1;

            match parse_line(&text) {
                Ok(Some(command)) => return Some(Ok(command)),
                Ok(None) => continue,
                Err(kind) => {
                    self.done = true;
                    return Some(Err(Error::Syntax {
                        line: self.line,
                        text,
                        kind,
                    }));
                }
            }
        }
    }
}

/// Parses a whole source string eagerly.
pub fn parse(input: &str) -> Result<Vec<Command>> {
    Parser::new(input.as_bytes()).collect()
}

#[test]
fn test_parser_stream() {
    let source = "// header\n\npush constant 7\n  \npush constant 8\nadd\n";
    let mut parser = Parser::new(source.as_bytes());
    assert_eq!(parser.next().unwrap().unwrap(), Push(Constant, 7));
    assert_eq!(parser.line(), 3);
    assert_eq!(parser.next().unwrap().unwrap(), Push(Constant, 8));
    assert_eq!(parser.next().unwrap().unwrap(), Arithmetic(ArithOp::Add));
    assert!(parser.next().is_none());
    assert!(parser.next().is_none());
}

#[test]
fn test_parser_error_location() {
    let source = "push constant 1\n\nfrobnicate\npush constant 2\n";
    let mut parser = Parser::new(source.as_bytes());
    assert!(parser.next().unwrap().is_ok());
    match parser.next() {
        Some(Err(Error::Syntax { line, text, kind })) => {
            assert_eq!(line, 3);
            assert_eq!(text, "frobnicate");
            assert_eq!(kind, SyntaxError::UnknownCommand("frobnicate".into()));
        }
        other => panic!("expected syntax error, got {:?}", other),
    }
    assert!(parser.next().is_none());
}
