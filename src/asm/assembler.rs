//! Two-pass assembler for Ternuino programs.
//!
//! Syntax:
//! ```text
//! # Comment (';' works too)
//! .data
//! counter:
//!     .word 5         # one data cell
//!     .zero 3         # three zeroed cells
//! .text
//! loop:
//!     LD A, counter   # data labels become addresses
//!     TJZ A, done
//!     JMP loop        # code labels become slot numbers
//! done:
//!     HLT
//! ```
//!
//! Pass one tokenizes, records labels, and emits instructions with
//! placeholders for unresolved names; pass two patches the placeholders
//! and checks every instruction shape.

use crate::cpu::isa::{Instruction, Opcode, Operand, Register, ShapeError};
use crate::cpu::memory::{DMEM_CAPACITY, IMEM_SIZE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Which section a label was defined in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Section {
    Text,
    Data,
}

/// A resolved label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Instruction slot for text labels, data cell for data labels.
    pub address: i32,
    pub section: Section,
}

/// A fully assembled program, ready for the loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    pub data: Vec<i32>,
    pub symbols: HashMap<String, Symbol>,
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, Error)]
pub enum AsmError {
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("unknown instruction '{mnemonic}' on line {line}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("'{mnemonic}' expects {expected} operand(s), found {found} on line {line}")]
    OperandCount {
        line: usize,
        mnemonic: String,
        expected: u8,
        found: usize,
    },

    #[error("duplicate label '{label}' on line {line}")]
    DuplicateLabel { line: usize, label: String },

    #[error("undefined label '{label}' on line {line}")]
    UndefinedLabel { line: usize, label: String },

    #[error("line {line}: {source}")]
    BadShape {
        line: usize,
        #[source]
        source: ShapeError,
    },

    #[error("too many instructions on line {line} (instruction memory holds {capacity})")]
    ProgramTooLarge { line: usize, capacity: usize },

    #[error("data image overflow on line {line} (data memory holds {capacity})")]
    DataOverflow { line: usize, capacity: usize },
}

/// Assemble source text into a [`Program`].
pub fn assemble(source: &str) -> Result<Program, AsmError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// An operand as pass one sees it: resolved, or a name for pass two.
enum ParsedOp {
    Ready(Operand),
    Label(String),
}

/// A placeholder operand waiting for a label address.
struct Fixup {
    index: usize,
    slot: u8,
    label: String,
    line: usize,
}

/// The assembler state.
struct Assembler {
    in_data: bool,
    symbols: HashMap<String, Symbol>,
    fixups: Vec<Fixup>,
    instructions: Vec<Instruction>,
    /// Source line of each emitted instruction, for diagnostics.
    lines: Vec<usize>,
    data: Vec<i32>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            in_data: false,
            symbols: HashMap::new(),
            fixups: Vec::new(),
            instructions: Vec::new(),
            lines: Vec::new(),
            data: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Program, AsmError> {
        // Pass 1: collect labels, emit instructions and data
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: patch label references, then check shapes
        self.resolve_fixups()?;
        self.check_shapes()?;

        Ok(Program {
            instructions: std::mem::take(&mut self.instructions),
            data: std::mem::take(&mut self.data),
            symbols: std::mem::take(&mut self.symbols),
        })
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AsmError> {
        // Strip comments; '#' and ';' both start one
        let line = match line.find(['#', ';']) {
            Some(idx) => &line[..idx],
            None => line,
        };
        let mut line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        // Peel off leading labels; several may share a line
        while let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim();
            if label.is_empty() {
                return Err(AsmError::Syntax {
                    line: line_num,
                    message: "empty label name".into(),
                });
            }
            self.define_label(label, line_num)?;
            line = line[colon_idx + 1..].trim();
        }
        if line.is_empty() {
            return Ok(());
        }

        if line.starts_with('.') {
            return self.process_directive(line, line_num);
        }

        self.process_instruction(line, line_num)
    }

    fn define_label(&mut self, label: &str, line_num: usize) -> Result<(), AsmError> {
        let symbol = if self.in_data {
            Symbol {
                address: self.data.len() as i32,
                section: Section::Data,
            }
        } else {
            Symbol {
                address: self.instructions.len() as i32,
                section: Section::Text,
            }
        };
        if self.symbols.insert(label.to_string(), symbol).is_some() {
            return Err(AsmError::DuplicateLabel {
                line: line_num,
                label: label.to_string(),
            });
        }
        Ok(())
    }

    fn process_directive(&mut self, line: &str, line_num: usize) -> Result<(), AsmError> {
        let (name, args) = match line.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (line, ""),
        };

        match name.to_ascii_lowercase().as_str() {
            ".data" | ".text" if !args.is_empty() => Err(AsmError::Syntax {
                line: line_num,
                message: format!("'{}' takes no arguments", name),
            }),
            ".data" => {
                self.in_data = true;
                Ok(())
            }
            ".text" => {
                self.in_data = false;
                Ok(())
            }
            ".word" if self.in_data => {
                let value: i32 = args.parse().map_err(|_| AsmError::Syntax {
                    line: line_num,
                    message: format!("'.word' expects an integer, found '{}'", args),
                })?;
                self.push_data(value, line_num)
            }
            ".zero" if self.in_data => {
                let count: usize = args.parse().map_err(|_| AsmError::Syntax {
                    line: line_num,
                    message: format!("'.zero' expects a non-negative count, found '{}'", args),
                })?;
                for _ in 0..count {
                    self.push_data(0, line_num)?;
                }
                Ok(())
            }
            ".word" | ".zero" => Err(AsmError::Syntax {
                line: line_num,
                message: format!("'{}' is only valid inside .data", name),
            }),
            _ => Err(AsmError::Syntax {
                line: line_num,
                message: format!("unknown directive '{}'", name),
            }),
        }
    }

    fn push_data(&mut self, value: i32, line_num: usize) -> Result<(), AsmError> {
        if self.data.len() >= DMEM_CAPACITY {
            return Err(AsmError::DataOverflow {
                line: line_num,
                capacity: DMEM_CAPACITY,
            });
        }
        self.data.push(value);
        Ok(())
    }

    fn process_instruction(&mut self, line: &str, line_num: usize) -> Result<(), AsmError> {
        // Comma and whitespace both separate tokens
        let tokens: Vec<&str> = line
            .split([',', ' ', '\t'])
            .filter(|t| !t.is_empty())
            .collect();
        let mnemonic = tokens[0];

        let opcode = Opcode::from_mnemonic(mnemonic).ok_or_else(|| AsmError::UnknownMnemonic {
            line: line_num,
            mnemonic: mnemonic.to_string(),
        })?;

        let expected = opcode.arity();
        let found = tokens.len() - 1;
        if found != expected as usize {
            return Err(AsmError::OperandCount {
                line: line_num,
                mnemonic: opcode.mnemonic().to_string(),
                expected,
                found,
            });
        }

        let index = self.instructions.len();
        if index >= IMEM_SIZE {
            return Err(AsmError::ProgramTooLarge {
                line: line_num,
                capacity: IMEM_SIZE,
            });
        }

        let instr = match expected {
            0 => Instruction::nullary(opcode),
            1 => {
                let op1 = self.operand(tokens[1], index, 1, line_num)?;
                Instruction::unary(opcode, op1)
            }
            _ => {
                let op1 = self.operand(tokens[1], index, 1, line_num)?;
                let op2 = self.operand(tokens[2], index, 2, line_num)?;
                Instruction::binary(opcode, op1, op2)
            }
        };

        self.instructions.push(instr);
        self.lines.push(line_num);
        Ok(())
    }

    /// Turn one operand token into an operand, leaving a placeholder and
    /// a fixup when it names a label.
    fn operand(
        &mut self,
        token: &str,
        index: usize,
        slot: u8,
        line_num: usize,
    ) -> Result<Operand, AsmError> {
        match parse_operand(token) {
            Some(ParsedOp::Ready(op)) => Ok(op),
            Some(ParsedOp::Label(label)) => {
                self.fixups.push(Fixup {
                    index,
                    slot,
                    label,
                    line: line_num,
                });
                Ok(Operand::Immediate(0))
            }
            None => Err(AsmError::Syntax {
                line: line_num,
                message: format!("malformed operand '{}'", token),
            }),
        }
    }

    fn resolve_fixups(&mut self) -> Result<(), AsmError> {
        for fixup in &self.fixups {
            let symbol = self.symbols.get(&fixup.label).ok_or_else(|| {
                AsmError::UndefinedLabel {
                    line: fixup.line,
                    label: fixup.label.clone(),
                }
            })?;
            // Code labels are exact slot numbers; data labels are
            // addresses, wrapped like any other at run time
            let operand = match symbol.section {
                Section::Text => Operand::Immediate(symbol.address),
                Section::Data => Operand::Direct(symbol.address),
            };

            let old = self.instructions[fixup.index];
            let patched = match fixup.slot {
                1 => match old.operand2() {
                    Some(op2) => Instruction::binary(old.opcode(), operand, op2),
                    None => Instruction::unary(old.opcode(), operand),
                },
                _ => match old.operand1() {
                    Some(op1) => Instruction::binary(old.opcode(), op1, operand),
                    None => old,
                },
            };
            self.instructions[fixup.index] = patched;
        }
        Ok(())
    }

    fn check_shapes(&self) -> Result<(), AsmError> {
        for (instr, &line) in self.instructions.iter().zip(&self.lines) {
            instr
                .check_shape()
                .map_err(|source| AsmError::BadShape { line, source })?;

            // The machine would accept this and fail at run time; the
            // front end catches it early instead
            if instr.opcode() == Opcode::Tread
                && !matches!(instr.operand2(), Some(Operand::Register(_)))
            {
                return Err(AsmError::Syntax {
                    line,
                    message: "TREAD target must be a register".into(),
                });
            }
        }
        Ok(())
    }
}

/// Parse one operand token; `None` means malformed (e.g. `[5]`).
fn parse_operand(token: &str) -> Option<ParsedOp> {
    // Indirect: a register in brackets
    if let Some(inner) = token.strip_prefix('[') {
        let name = inner.strip_suffix(']')?;
        let reg = Register::from_name(name)?;
        return Some(ParsedOp::Ready(Operand::Indirect(reg)));
    }

    if let Some(reg) = Register::from_name(token) {
        return Some(ParsedOp::Ready(Operand::Register(reg)));
    }

    if let Ok(value) = token.parse::<i32>() {
        return Some(ParsedOp::Ready(Operand::Immediate(value)));
    }

    // Anything else is a label for pass two
    Some(ParsedOp::Label(token.to_string()))
}
