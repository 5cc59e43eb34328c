//! CPU emulation for the Ternuino computer.
//!
//! This module implements the complete Ternuino architecture:
//! - 27 instruction slots and up to 27 data cells (3³ each)
//! - 3 general-purpose registers (A, B, C) plus the program counter
//! - a 31-opcode instruction set with four addressing modes
//! - an 8-vector interrupt controller and an 8-slot device table

pub mod interrupt;
pub mod isa;
pub mod memory;
pub mod registers;
pub mod execute;

pub use interrupt::{InterruptController, VectorEntry, VECTOR_COUNT};
pub use isa::{Instruction, Opcode, Operand, Register, ShapeError};
pub use memory::{DataMemory, InstructionMemory, LoadError, DMEM_CAPACITY, IMEM_SIZE};
pub use registers::Registers;
pub use execute::{Cpu, CpuState};
