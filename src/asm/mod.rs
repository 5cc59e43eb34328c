//! Assembly front end.
//!
//! Turns `.asm` source text into a [`Program`] the CPU loader accepts.

pub mod assembler;

pub use assembler::{assemble, AsmError, Program, Section, Symbol};
