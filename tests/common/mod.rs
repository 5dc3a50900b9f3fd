//! A small Hack CPU interpreter that runs assembly text directly.
//!
//! Only the standard Hack computation table is accepted and label
//! redefinition is a hard error, so running a program also checks that the
//! translator emitted valid, collision-free assembly.

#![allow(dead_code)]

use std::collections::HashMap;

use vm_translator::{translate_program, Options};

pub const RAM_SIZE: usize = 32768;

#[derive(Debug, Clone)]
enum Inst {
    At(i16),
    C {
        dest: String,
        comp: String,
        jump: Option<String>,
    },
}

pub struct Hack {
    pub ram: Vec<i16>,
    rom: Vec<Inst>,
    labels: HashMap<String, usize>,
    pc: usize,
    a: i16,
    d: i16,
}

fn predefined(symbol: &str) -> Option<i16> {
    let addr = match symbol {
        "SP" => 0,
        "LCL" => 1,
        "ARG" => 2,
        "THIS" => 3,
        "THAT" => 4,
        "SCREEN" => 16384,
        "KBD" => 24576,
        _ => {
            let n: i16 = symbol.strip_prefix('R')?.parse().ok()?;
            if (0..16).contains(&n) {
                n
            } else {
                return None;
            }
        }
    };
    Some(addr)
}

impl Hack {
    /// Two-pass assembly of `source` into the interpreter's ROM.
    pub fn load(source: &str) -> Self {
        let lines: Vec<&str> = source
            .lines()
            .map(|line| line.split_once("//").map(|(s, _)| s).unwrap_or(line).trim())
            .filter(|line| !line.is_empty())
            .collect();

        let mut labels = HashMap::new();
        let mut rom_len = 0;
        for line in &lines {
            if let Some(label) = line.strip_prefix('(').and_then(|l| l.strip_suffix(')')) {
                let previous = labels.insert(label.to_string(), rom_len);
                assert!(previous.is_none(), "label ({}) defined twice", label);
            } else {
                rom_len += 1;
            }
        }

        let mut variables: HashMap<String, i16> = HashMap::new();
        let mut rom = Vec::with_capacity(rom_len);
        for line in lines {
            if line.starts_with('(') {
                continue;
            }
            if let Some(value) = line.strip_prefix('@') {
                let addr = if let Ok(n) = value.parse::<i16>() {
                    assert!(n >= 0, "negative literal @{}", value);
                    n
                } else if let Some(n) = predefined(value) {
                    n
                } else if let Some(&n) = labels.get(value) {
                    n as i16
                } else {
                    let next = 16 + variables.len() as i16;
                    *variables.entry(value.to_string()).or_insert(next)
                };
                rom.push(Inst::At(addr));
                continue;
            }

            let (rest, jump) = match line.split_once(';') {
                Some((rest, jump)) => (rest, Some(jump.to_string())),
                None => (line, None),
            };
            let (dest, comp) = match rest.split_once('=') {
                Some((dest, comp)) => (dest.to_string(), comp.to_string()),
                None => (String::new(), rest.to_string()),
            };
            rom.push(Inst::C { dest, comp, jump });
        }

        Hack {
            ram: vec![0; RAM_SIZE],
            rom,
            labels,
            pc: 0,
            a: 0,
            d: 0,
        }
    }

    pub fn label(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    fn addr(&self) -> usize {
        let addr = self.a as u16 as usize;
        assert!(addr < RAM_SIZE, "memory access out of range: {}", addr);
        addr
    }

    fn compute(&self, comp: &str) -> i16 {
        let m = if comp.contains('M') { self.ram[self.addr()] } else { 0 };
        let (a, d) = (self.a, self.d);
        match comp {
            "0" => 0,
            "1" => 1,
            "-1" => -1,
            "D" => d,
            "A" => a,
            "M" => m,
            "!D" => !d,
            "!A" => !a,
            "!M" => !m,
            "-D" => d.wrapping_neg(),
            "-A" => a.wrapping_neg(),
            "-M" => m.wrapping_neg(),
            "D+1" => d.wrapping_add(1),
            "A+1" => a.wrapping_add(1),
            "M+1" => m.wrapping_add(1),
            "D-1" => d.wrapping_sub(1),
            "A-1" => a.wrapping_sub(1),
            "M-1" => m.wrapping_sub(1),
            "D+A" => d.wrapping_add(a),
            "D+M" => d.wrapping_add(m),
            "D-A" => d.wrapping_sub(a),
            "D-M" => d.wrapping_sub(m),
            "A-D" => a.wrapping_sub(d),
            "M-D" => m.wrapping_sub(d),
            "D&A" => d & a,
            "D&M" => d & m,
            "D|A" => d | a,
            "D|M" => d | m,
            other => panic!("not a Hack computation: {}", other),
        }
    }

    /// Executes one instruction. Returns false once the program has halted,
    /// either by running off the end of ROM or by an `@X; 0;JMP` self loop.
    pub fn step(&mut self) -> bool {
        let inst = match self.rom.get(self.pc) {
            Some(inst) => inst.clone(),
            None => return false,
        };

        match inst {
            Inst::At(value) => {
                self.a = value;
                self.pc += 1;
            }
            Inst::C { dest, comp, jump } => {
                let value = self.compute(&comp);
                let target = self.a;
                if dest.contains('M') {
                    let addr = self.addr();
                    self.ram[addr] = value;
                }
                if dest.contains('A') {
                    self.a = value;
                }
                if dest.contains('D') {
                    self.d = value;
                }

                let taken = match jump.as_deref() {
                    None => false,
                    Some("JGT") => value > 0,
                    Some("JEQ") => value == 0,
                    Some("JGE") => value >= 0,
                    Some("JLT") => value < 0,
                    Some("JNE") => value != 0,
                    Some("JLE") => value <= 0,
                    Some("JMP") => true,
                    Some(other) => panic!("not a Hack jump: {}", other),
                };
                if taken {
                    let target = target as u16 as usize;
                    if jump.as_deref() == Some("JMP") && target + 1 == self.pc {
                        return false;
                    }
                    self.pc = target;
                } else {
                    self.pc += 1;
                }
            }
        }
        true
    }

    /// Runs until halt; panics if that takes more than `max_steps`.
    pub fn run(&mut self, max_steps: usize) -> usize {
        for steps in 0..max_steps {
            if !self.step() {
                return steps;
            }
        }
        panic!("program did not halt within {} steps", max_steps);
    }

    pub fn sp(&self) -> i16 {
        self.ram[0]
    }
}

/// Translates units without the bootstrap and primes the segment pointers
/// the way single-file test programs expect.
pub fn run_bare(units: &[(&str, &str)]) -> Hack {
    let options = Options {
        bootstrap: false,
        annotate: true,
    };
    let asm = translate_program(units, &options).unwrap();
    let mut hack = Hack::load(&asm);
    hack.ram[0] = 256;
    hack.ram[1] = 300;
    hack.ram[2] = 400;
    hack.ram[3] = 3000;
    hack.ram[4] = 3010;
    hack.run(100_000);
    hack
}

/// Translates units behind the bootstrap and runs until `Sys.init` halts.
pub fn run_program(units: &[(&str, &str)]) -> Hack {
    let asm = translate_program(units, &Options::default()).unwrap();
    let mut hack = Hack::load(&asm);
    hack.run(2_000_000);
    hack
}
