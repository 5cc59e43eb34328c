//! Instruction set for the Ternuino.
//!
//! Programs arrive already decoded: an instruction is an opcode plus up
//! to two operands, each tagged with its addressing mode. There is no
//! binary encoding; the assembler emits these structures directly and
//! the loader checks their shapes before execution begins.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One of the three general-purpose registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Register {
    A,
    B,
    C,
}

impl Register {
    /// All registers, in file order.
    pub const ALL: [Register; 3] = [Register::A, Register::B, Register::C];

    /// Parse a register name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Register> {
        match name.to_ascii_uppercase().as_str() {
            "A" => Some(Register::A),
            "B" => Some(Register::B),
            "C" => Some(Register::C),
            _ => None,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::A => write!(f, "A"),
            Register::B => write!(f, "B"),
            Register::C => write!(f, "C"),
        }
    }
}

/// An operand together with its addressing mode.
///
/// Direct and Indirect name data-memory addresses and resolve modulo the
/// data-memory size; Immediate and Register resolve to plain values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// Literal value, read-only.
    Immediate(i32),
    /// Register contents, or the register itself as a write target.
    Register(Register),
    /// Data-memory address, reduced mod the data-memory size.
    Direct(i32),
    /// Register whose contents are a data-memory address.
    Indirect(Register),
}

impl Operand {
    /// True for the Register mode specifically (not Indirect).
    pub fn is_register(&self) -> bool {
        matches!(self, Operand::Register(_))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Immediate(v) => write!(f, "{}", v),
            Operand::Register(r) => write!(f, "{}", r),
            Operand::Direct(a) => write!(f, "{}", a),
            Operand::Indirect(r) => write!(f, "[{}]", r),
        }
    }
}

/// Ternuino opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // ==================== Data movement ====================
    Nop,
    Mov,
    Lea,
    Ld,
    St,

    // ==================== Arithmetic ====================
    Add,
    Sub,
    Mul,
    Div,

    // ==================== Ternary logic / arithmetic ====================
    Tand,
    Tor,
    Tnot,
    Neg,
    Tsign,
    Tabs,
    Tshl3,
    Tshr3,
    Tcmpr,

    // ==================== Control flow ====================
    Jmp,
    Tjz,
    Tjn,
    Tjp,
    Hlt,

    // ==================== Device I/O ====================
    Topen,
    Tread,
    Twrite,
    Tclose,

    // ==================== Interrupt control ====================
    Ei,
    Di,
    Irq,
    Iret,
}

impl Opcode {
    /// Assembly mnemonic.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Nop => "NOP",
            Opcode::Mov => "MOV",
            Opcode::Lea => "LEA",
            Opcode::Ld => "LD",
            Opcode::St => "ST",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Tand => "TAND",
            Opcode::Tor => "TOR",
            Opcode::Tnot => "TNOT",
            Opcode::Neg => "NEG",
            Opcode::Tsign => "TSIGN",
            Opcode::Tabs => "TABS",
            Opcode::Tshl3 => "TSHL3",
            Opcode::Tshr3 => "TSHR3",
            Opcode::Tcmpr => "TCMPR",
            Opcode::Jmp => "JMP",
            Opcode::Tjz => "TJZ",
            Opcode::Tjn => "TJN",
            Opcode::Tjp => "TJP",
            Opcode::Hlt => "HLT",
            Opcode::Topen => "TOPEN",
            Opcode::Tread => "TREAD",
            Opcode::Twrite => "TWRITE",
            Opcode::Tclose => "TCLOSE",
            Opcode::Ei => "EI",
            Opcode::Di => "DI",
            Opcode::Irq => "IRQ",
            Opcode::Iret => "IRET",
        }
    }

    /// Look up an opcode by mnemonic (case-insensitive).
    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        const TABLE: [Opcode; 31] = [
            Opcode::Nop,
            Opcode::Mov,
            Opcode::Lea,
            Opcode::Ld,
            Opcode::St,
            Opcode::Add,
            Opcode::Sub,
            Opcode::Mul,
            Opcode::Div,
            Opcode::Tand,
            Opcode::Tor,
            Opcode::Tnot,
            Opcode::Neg,
            Opcode::Tsign,
            Opcode::Tabs,
            Opcode::Tshl3,
            Opcode::Tshr3,
            Opcode::Tcmpr,
            Opcode::Jmp,
            Opcode::Tjz,
            Opcode::Tjn,
            Opcode::Tjp,
            Opcode::Hlt,
            Opcode::Topen,
            Opcode::Tread,
            Opcode::Twrite,
            Opcode::Tclose,
            Opcode::Ei,
            Opcode::Di,
            Opcode::Irq,
            Opcode::Iret,
        ];
        let upper = name.to_ascii_uppercase();
        TABLE.into_iter().find(|op| op.mnemonic() == upper)
    }

    /// Number of operands this opcode takes.
    pub fn arity(&self) -> u8 {
        match self {
            Opcode::Nop | Opcode::Hlt | Opcode::Ei | Opcode::Di | Opcode::Iret => 0,

            Opcode::Tnot
            | Opcode::Neg
            | Opcode::Tsign
            | Opcode::Tabs
            | Opcode::Tshl3
            | Opcode::Tshr3
            | Opcode::Jmp
            | Opcode::Tclose
            | Opcode::Irq => 1,

            Opcode::Mov
            | Opcode::Lea
            | Opcode::Ld
            | Opcode::St
            | Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Tand
            | Opcode::Tor
            | Opcode::Tcmpr
            | Opcode::Tjz
            | Opcode::Tjn
            | Opcode::Tjp
            | Opcode::Topen
            | Opcode::Tread
            | Opcode::Twrite => 2,
        }
    }

    /// True if operand 1 must be a plain register.
    fn requires_register_op1(&self) -> bool {
        matches!(
            self,
            Opcode::Mov
                | Opcode::Lea
                | Opcode::Ld
                | Opcode::St
                | Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::Div
                | Opcode::Tand
                | Opcode::Tor
                | Opcode::Tnot
                | Opcode::Neg
                | Opcode::Tsign
                | Opcode::Tabs
                | Opcode::Tshl3
                | Opcode::Tshr3
                | Opcode::Tcmpr
                | Opcode::Tjz
                | Opcode::Tjn
                | Opcode::Tjp
        )
    }

    /// True if operand 2 must be a plain register.
    fn requires_register_op2(&self) -> bool {
        matches!(
            self,
            Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::Div
                | Opcode::Tand
                | Opcode::Tor
                | Opcode::Tcmpr
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// An instruction whose operand shapes the loader rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("{opcode} takes {expected} operand(s), found {found}")]
    Arity {
        opcode: Opcode,
        expected: u8,
        found: u8,
    },

    #[error("{opcode} requires a register as operand {index}")]
    RegisterRequired { opcode: Opcode, index: u8 },

    #[error("{opcode} does not accept a register as operand 2")]
    RegisterNotAccepted { opcode: Opcode },
}

/// A decoded instruction: opcode plus up to two operands.
///
/// Operand 2 can only be present when operand 1 is; the constructors are
/// the only way to build one, so the invariant holds everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    opcode: Opcode,
    op1: Option<Operand>,
    op2: Option<Operand>,
}

impl Instruction {
    /// An instruction with no operands.
    pub fn nullary(opcode: Opcode) -> Self {
        Self {
            opcode,
            op1: None,
            op2: None,
        }
    }

    /// An instruction with one operand.
    pub fn unary(opcode: Opcode, op1: Operand) -> Self {
        Self {
            opcode,
            op1: Some(op1),
            op2: None,
        }
    }

    /// An instruction with two operands.
    pub fn binary(opcode: Opcode, op1: Operand, op2: Operand) -> Self {
        Self {
            opcode,
            op1: Some(op1),
            op2: Some(op2),
        }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn operand1(&self) -> Option<Operand> {
        self.op1
    }

    pub fn operand2(&self) -> Option<Operand> {
        self.op2
    }

    /// Check arity and per-opcode operand modes.
    ///
    /// Shapes the machine leaves undefined (an immediate where an opcode
    /// hard-assumes a register) are rejected here so execution never sees
    /// them. LEA keeps its one defined permissive case: an Indirect
    /// operand 2 loads fine and executes as a no-op.
    pub fn check_shape(&self) -> Result<(), ShapeError> {
        let found = match (self.op1, self.op2) {
            (None, None) => 0,
            (Some(_), None) => 1,
            (Some(_), Some(_)) => 2,
            // Unreachable through the constructors
            (None, Some(_)) => 2,
        };
        let expected = self.opcode.arity();
        if found != expected {
            return Err(ShapeError::Arity {
                opcode: self.opcode,
                expected,
                found,
            });
        }

        if self.opcode.requires_register_op1() {
            if let Some(op) = self.op1 {
                if !op.is_register() {
                    return Err(ShapeError::RegisterRequired {
                        opcode: self.opcode,
                        index: 1,
                    });
                }
            }
        }
        if self.opcode.requires_register_op2() {
            if let Some(op) = self.op2 {
                if !op.is_register() {
                    return Err(ShapeError::RegisterRequired {
                        opcode: self.opcode,
                        index: 2,
                    });
                }
            }
        }
        // LEA takes an address expression; a plain register is neither an
        // address nor the defined Indirect no-op, so it stays rejected
        if self.opcode == Opcode::Lea {
            if let Some(op) = self.op2 {
                if op.is_register() {
                    return Err(ShapeError::RegisterNotAccepted {
                        opcode: self.opcode,
                    });
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        if let Some(op1) = self.op1 {
            write!(f, " {}", op1)?;
            if let Some(op2) = self.op2 {
                write!(f, ", {}", op2)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mnemonic_round_trip() {
        for name in ["MOV", "tshl3", "Iret", "TCMPR"] {
            let op = Opcode::from_mnemonic(name).unwrap();
            assert_eq!(op.mnemonic(), name.to_ascii_uppercase());
        }
        assert_eq!(Opcode::from_mnemonic("FROB"), None);
    }

    #[test]
    fn test_arity_enforced() {
        let err = Instruction::unary(Opcode::Hlt, Operand::Immediate(1))
            .check_shape()
            .unwrap_err();
        assert_eq!(
            err,
            ShapeError::Arity {
                opcode: Opcode::Hlt,
                expected: 0,
                found: 1
            }
        );

        let err = Instruction::unary(Opcode::Mov, Operand::Register(Register::A))
            .check_shape()
            .unwrap_err();
        assert!(matches!(err, ShapeError::Arity { .. }));
    }

    #[test]
    fn test_alu_operands_must_be_registers() {
        let ok = Instruction::binary(
            Opcode::Add,
            Operand::Register(Register::A),
            Operand::Register(Register::B),
        );
        assert!(ok.check_shape().is_ok());

        let bad = Instruction::binary(
            Opcode::Add,
            Operand::Register(Register::A),
            Operand::Immediate(5),
        );
        assert_eq!(
            bad.check_shape().unwrap_err(),
            ShapeError::RegisterRequired {
                opcode: Opcode::Add,
                index: 2
            }
        );

        let bad = Instruction::binary(
            Opcode::Div,
            Operand::Immediate(1),
            Operand::Register(Register::B),
        );
        assert_eq!(
            bad.check_shape().unwrap_err(),
            ShapeError::RegisterRequired {
                opcode: Opcode::Div,
                index: 1
            }
        );
    }

    #[test]
    fn test_lea_shapes() {
        let reg_a = Operand::Register(Register::A);

        // Address expressions are fine, indirect is the defined no-op
        for op2 in [Operand::Immediate(10), Operand::Direct(3), Operand::Indirect(Register::B)] {
            assert!(Instruction::binary(Opcode::Lea, reg_a, op2).check_shape().is_ok());
        }

        // A bare register is not an address
        let bad = Instruction::binary(Opcode::Lea, reg_a, Operand::Register(Register::B));
        assert_eq!(
            bad.check_shape().unwrap_err(),
            ShapeError::RegisterNotAccepted { opcode: Opcode::Lea }
        );
    }

    #[test]
    fn test_io_operands_stay_loose() {
        // Device opcodes resolve their operands generically; any mode loads
        let open = Instruction::binary(Opcode::Topen, Operand::Immediate(0), Operand::Immediate(1));
        assert!(open.check_shape().is_ok());

        // TREAD with a non-register target is a defined runtime failure,
        // not a load error
        let read = Instruction::binary(Opcode::Tread, Operand::Immediate(0), Operand::Immediate(7));
        assert!(read.check_shape().is_ok());
    }

    #[test]
    fn test_display() {
        let mov = Instruction::binary(
            Opcode::Mov,
            Operand::Register(Register::A),
            Operand::Immediate(5),
        );
        assert_eq!(mov.to_string(), "MOV A, 5");

        let ld = Instruction::binary(
            Opcode::Ld,
            Operand::Register(Register::B),
            Operand::Indirect(Register::A),
        );
        assert_eq!(ld.to_string(), "LD B, [A]");

        assert_eq!(Instruction::nullary(Opcode::Hlt).to_string(), "HLT");
    }
}
