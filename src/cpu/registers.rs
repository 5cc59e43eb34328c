//! Ternuino register file.
//!
//! Three general-purpose registers A, B and C plus the program counter.
//! All four are plain `i32`s holding balanced-ternary-valued integers;
//! the program counter is not addressable as an instruction operand.

use crate::cpu::isa::Register;
use serde::{Deserialize, Serialize};

/// The register file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    pub a: i32,
    pub b: i32,
    pub c: i32,

    /// Program counter (instruction-memory index).
    pub pc: i32,
}

impl Registers {
    /// A fresh register file, everything zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all registers and the program counter to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Read a register by name.
    pub fn get(&self, reg: Register) -> i32 {
        match reg {
            Register::A => self.a,
            Register::B => self.b,
            Register::C => self.c,
        }
    }

    /// Write a register by name.
    pub fn set(&mut self, reg: Register, value: i32) {
        match reg {
            Register::A => self.a = value,
            Register::B => self.b = value,
            Register::C => self.c = value,
        }
    }

    /// Move the program counter past the current instruction.
    pub fn advance_pc(&mut self) {
        self.pc += 1;
    }

    /// Set the program counter to an absolute instruction address.
    pub fn jump(&mut self, addr: i32) {
        self.pc = addr;
    }
}
