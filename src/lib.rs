//! # Ternuino
//!
//! A virtual balanced ternary computer.
//!
//! The machine is a three-register CPU (A, B, C plus a program counter)
//! with 27 instruction slots, a modular data memory of up to 27 cells,
//! an 8-vector interrupt controller and up to 8 pluggable devices
//! (terminal, ternary file). Values are plain `i32`s interpreted as
//! balanced ternary by convention; the `ternary` module holds the
//! scalar trit-semantics primitives and the digit-string codec.

pub mod asm;
pub mod cpu;
pub mod dev;
pub mod t3;
pub mod ternary;

// Re-export commonly used types
pub use asm::{assemble, AsmError, Program};
pub use cpu::{
    Cpu, CpuState, Instruction, InterruptController, LoadError, Opcode, Operand, Register,
    Registers, DMEM_CAPACITY, IMEM_SIZE, VECTOR_COUNT,
};
pub use dev::{Device, DeviceTable, FileDevice, Terminal, MAX_DEVICES};
pub use t3::{T3Error, T3Reader, T3Writer, T3_EXTENSION};
