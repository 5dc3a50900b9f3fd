use std::io::Write;

use crate::ast::{ArithOp, Command::*, Segment::*, *};
use crate::error::{Error, Result};

/// Address the stack starts at after bootstrap.
pub const STACK_BASE: u16 = 256;
/// Function scope used for labels that appear before any `function`.
///
/// Every label the translator invents contains `$`, which VM names may not,
/// so none of them can collide with a function or a user label.
pub const TOP_LEVEL_SCOPE: &str = "$top";

const SAVED_FRAME: [&str; 4] = ["LCL", "ARG", "THIS", "THAT"];

macro_rules! svec {
    ($($x:expr),* $(,)?) => (vec![$($x.to_string()),*]);
}

fn at_c(arg: u16) -> String {
    format!("@{arg}", arg = arg)
}

fn at_s(arg: &str) -> String {
    format!("@{arg}", arg = arg)
}

fn pointer_arg(arg: u16) -> &'static str {
    match arg {
        0 => "THIS",
        _ => "THAT",
    }
}

/// Writes D to the top of the stack and bumps SP.
fn push_d() -> Vec<String> {
    svec![
        "@SP",
        "M=M+1",
        "A=M-1", // Don't need to refetch SP; this is safe
        "M=D"
    ]
}

/// Push microcode for the four base segments
fn seg_push(seg: &str, arg: u16) -> Vec<String> {
    let mut code = svec![
        at_s(seg),
        "D=M",
        at_c(arg),
        "A=D+A", // A = SEG+arg
        "D=M"    // D = value to push
    ];
    code.extend(push_d());
    code
}

fn seg_push_direct(label: &str) -> Vec<String> {
    let mut code = svec![at_s(label), "D=M"];
    code.extend(push_d());
    code
}

fn seg_pop(seg: &str, arg: u16) -> Vec<String> {
    svec![
        at_s(seg),
        "D=M",
        at_c(arg),
        "D=D+A", // D = SEG+arg
        "@R13",
        "M=D", // Store target addr in R13
        "@SP",
        "AM=M-1", // SP--, A <- new SP (val to be popped)
        "D=M",
        "@R13",
        "A=M", // At the target address...
        "M=D"  // ... store the popped val
    ]
}

fn seg_pop_direct(label: &str) -> Vec<String> {
    svec!["@SP", "AM=M-1", "D=M", at_s(label), "M=D"]
}

fn simple_un_op(op: char) -> Vec<String> {
    svec!["@SP", "A=M-1", format!("M={}M", op)]
}

// i.e. no conditions or jumps, just pop and run
fn simple_bin_op(comp: &str) -> Vec<String> {
    svec![
        "@SP",
        "AM=M-1",             // SP--, looking at top of stack now
        "D=M",                // Right arg in D
        "A=A-1",              // Looking at left arg, will overwrite
        format!("M={}", comp) // Op and overwrite left arg
    ]
}

/// Generator knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Emit the SP setup and `call Sys.init 0` prologue.
    pub bootstrap: bool,
    /// Emit a `// <command>` line ahead of each command's code.
    pub annotate: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            bootstrap: true,
            annotate: true,
        }
    }
}

/// Lowers VM commands to Hack assembly.
///
/// One instance is meant to live for a whole run: the comparison and call
/// counters keep growing across units so every generated label stays unique
/// in the linked program.
pub struct Translator {
    unit: String,
    function: Option<String>,
    comp_counter: usize,
    call_counter: usize,
    options: Options,
    // set right after a `function` with no locals, cleared by anything else
    empty_frame: bool,
}

impl Translator {
    pub fn new(options: &Options) -> Self {
        Translator {
            unit: String::new(),
            function: None,
            comp_counter: 0,
            call_counter: 0,
            options: *options,
            empty_frame: false,
        }
    }

    /// Switches the unit that owns `static` variables from here on.
    pub fn set_unit(&mut self, unit: &str) {
        log::debug!("translating unit {}", unit);
        self.unit = unit.to_string();
    }

    fn next_comp(&mut self) -> usize {
        let tmp = self.comp_counter;
        self.comp_counter += 1;
        tmp
    }

    fn next_call(&mut self) -> usize {
        let tmp = self.call_counter;
        self.call_counter += 1;
        tmp
    }

    fn static_sym(&self, arg: u16) -> String {
        format!("{}.{}", self.unit, arg)
    }

    fn push(&self, segment: Segment, arg: u16) -> Vec<String> {
        match segment {
            Constant => svec![at_c(arg), "D=A", "@SP", "A=M", "M=D", "@SP", "M=M+1"],
            Local => seg_push("LCL", arg),
            Argument => seg_push("ARG", arg),
            This => seg_push("THIS", arg),
            That => seg_push("THAT", arg),
            Static => seg_push_direct(&self.static_sym(arg)),
            Temp => seg_push_direct(&format!("R{}", arg + 5)),
            Pointer => seg_push_direct(pointer_arg(arg)),
        }
    }

    fn pop(&self, segment: Segment, arg: u16) -> Vec<String> {
        match segment {
            Constant => unreachable!("rejected by Command::validate"),
            Local => seg_pop("LCL", arg),
            Argument => seg_pop("ARG", arg),
            This => seg_pop("THIS", arg),
            That => seg_pop("THAT", arg),
            Static => seg_pop_direct(&self.static_sym(arg)),
            Temp => seg_pop_direct(&format!("R{}", arg + 5)),
            Pointer => seg_pop_direct(pointer_arg(arg)),
        }
    }

    fn compare(&mut self, jump: &str) -> Vec<String> {
        let sym = self.next_comp();
        let true_sym = format!("$cmp.true.{}", sym);
        let false_sym = format!("$cmp.false.{}", sym);
        let end_sym = format!("$cmp.end.{}", sym);
        svec![
            "@SP",
            "AM=M-1", // SP--, looking at top of stack now
            "D=M",    // Right arg in D
            "A=A-1",  // Looking at left arg, will overwrite
            "D=M-D",
            at_s(&true_sym),
            format!("D;J{}", jump),
            format!("({})", false_sym),
            "D=0",
            at_s(&end_sym),
            "0;JMP",
            format!("({})", true_sym),
            "D=-1",
            format!("({})", end_sym),
            "@SP",
            "A=M-1",
            "M=D"
        ]
    }

    fn arithmetic(&mut self, op: ArithOp) -> Vec<String> {
        match op {
            ArithOp::Not => simple_un_op('!'),
            ArithOp::Neg => simple_un_op('-'),
            ArithOp::Add => simple_bin_op("D+M"),
            ArithOp::Sub => simple_bin_op("M-D"),
            ArithOp::And => simple_bin_op("D&M"),
            ArithOp::Or => simple_bin_op("D|M"),
            ArithOp::Eq => self.compare("EQ"),
            ArithOp::Gt => self.compare("GT"),
            ArithOp::Lt => self.compare("LT"),
        }
    }

    /// Convert VM label to Hack ASM symbol - for consistency across instructions
    fn label_to_sym(&self, label: &str) -> String {
        let scope = self.function.as_deref().unwrap_or(TOP_LEVEL_SCOPE);
        format!("{}${}", scope, label)
    }

    fn label(&self, label: &str) -> Vec<String> {
        svec![format!("({})", self.label_to_sym(label))]
    }

    fn goto(&self, label: &str) -> Vec<String> {
        svec![
            at_s(&self.label_to_sym(label)),
            "0;JMP" // Unconditional jump
        ]
    }

    fn if_goto(&self, label: &str) -> Vec<String> {
        svec![
            "@SP",
            "AM=M-1",
            "D=M", // Stack popped into D
            at_s(&self.label_to_sym(label)),
            "D;JNE" // False is 0
        ]
    }

    fn function(&mut self, name: &str, locals: u16) -> Vec<String> {
        log::debug!("entering function {} with {} locals", name, locals);
        self.function = Some(name.to_string());

        let mut code = svec![format!("({})", name)];
        for _ in 0..locals {
            code.extend(svec!["@SP", "M=M+1", "A=M-1", "M=0"]);
        }
        code
    }

    fn call(&mut self, name: &str, args: u16) -> Vec<String> {
        let ret_sym = format!("{}$$ret.{}", name, self.next_call());

        let mut code = svec![at_s(&ret_sym), "D=A"];
        code.extend(push_d());
        for reg in SAVED_FRAME {
            code.extend(svec![at_s(reg), "D=M"]);
            code.extend(push_d());
        }
        code.extend(svec![
            // ARG = SP - args - 5
            "@SP",
            "D=M",
            format!("@{}", u32::from(args) + 5),
            "D=D-A",
            "@ARG",
            "M=D",
            // LCL = SP
            "@SP",
            "D=M",
            "@LCL",
            "M=D",
            at_s(name),
            "0;JMP",
            format!("({})", ret_sym)
        ]);
        code
    }

    fn ret(&self) -> Vec<String> {
        if self.empty_frame {
            log::warn!(
                "`return` in {} has no value on the stack",
                self.function.as_deref().unwrap_or(TOP_LEVEL_SCOPE)
            );
        }

        let mut code = svec![
            // frame = LCL
            "@LCL",
            "D=M",
            "@R13",
            "M=D",
            // Return address must be saved before *ARG is overwritten;
            // with no arguments they share a slot.
            "@5",
            "A=D-A",
            "D=M",
            "@R14",
            "M=D",
            // *ARG = pop()
            "@SP",
            "AM=M-1",
            "D=M",
            "@ARG",
            "A=M",
            "M=D",
            // SP = ARG + 1
            "@ARG",
            "D=M+1",
            "@SP",
            "M=D"
        ];
        for reg in SAVED_FRAME.iter().rev() {
            code.extend(svec!["@R13", "AM=M-1", "D=M", at_s(reg), "M=D"]);
        }
        code.extend(svec!["@R14", "A=M", "0;JMP"]);
        code
    }

    /// SP setup followed by the entry call into `Sys.init`.
    pub fn bootstrap(&mut self) -> Vec<String> {
        let mut code = vec![];
        if self.options.annotate {
            code.push("// bootstrap".to_string());
        }
        code.extend(svec![at_c(STACK_BASE), "D=A", "@SP", "M=D"]);
        code.extend(self.call("Sys.init", 0));
        code
    }

    pub fn translate_command(&mut self, command: &Command) -> Result<Vec<String>> {
        log::trace!("lowering {}", command);
        command.validate().map_err(|kind| Error::Command {
            command: command.to_string(),
            kind,
        })?;

        let mut code = vec![];
        if self.options.annotate {
            code.push(format!("// {}", command));
        }

        code.extend(match command {
            Arithmetic(op) => self.arithmetic(*op),
            Push(seg, arg) => self.push(*seg, *arg),
            Pop(seg, arg) => self.pop(*seg, *arg),
            Label(sym) => self.label(sym),
            Goto(sym) => self.goto(sym),
            IfGoto(sym) => self.if_goto(sym),
            Function(name, locals) => self.function(name, *locals),
            Call(name, args) => self.call(name, *args),
            Return => self.ret(),
        });

        self.empty_frame = matches!(command, Function(_, 0));
        Ok(code)
    }

    /// Lowers one command straight into `out`.
    pub fn write_command<W: Write>(&mut self, command: &Command, out: &mut W) -> Result<()> {
        let code = self.translate_command(command)?;
        write_lines(out, &code)
    }

    /// Writes the bootstrap, unless the options turned it off.
    pub fn write_bootstrap<W: Write>(&mut self, out: &mut W) -> Result<()> {
        if !self.options.bootstrap {
            return Ok(());
        }
        let code = self.bootstrap();
        write_lines(out, &code)
    }

    pub fn translate(&mut self, commands: &[Command]) -> Result<Vec<String>> {
        let mut instructions: Vec<String> = vec![];

        for command in commands {
            instructions.extend(self.translate_command(command)?);
        }

        Ok(instructions)
    }
}

fn write_lines<W: Write>(out: &mut W, lines: &[String]) -> Result<()> {
    for line in lines {
        writeln!(out, "{}", line).map_err(Error::Write)?;
    }
    Ok(())
}
