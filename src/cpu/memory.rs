//! Ternuino memory subsystem.
//!
//! Two separate spaces: 27 instruction slots (3 to the 3rd, the machine's
//! architectural constant) and up to 27 data cells. Instruction slots
//! track whether they were ever loaded; data addresses never fault, they
//! wrap modulo the configured size.

use crate::cpu::isa::{Instruction, ShapeError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of instruction-memory slots.
pub const IMEM_SIZE: usize = 27;

/// Largest configurable data-memory size.
pub const DMEM_CAPACITY: usize = 27;

/// Instruction memory: 27 slots, each empty or holding one instruction.
///
/// `None` means "never loaded", which is distinct from a loaded NOP: the
/// engine skips empty slots without executing anything.
#[derive(Clone, Serialize, Deserialize)]
pub struct InstructionMemory {
    slots: [Option<Instruction>; IMEM_SIZE],
}

impl InstructionMemory {
    /// Fresh memory, every slot empty.
    pub fn new() -> Self {
        Self {
            slots: [None; IMEM_SIZE],
        }
    }

    /// Load a program into slots 0..len, validating every instruction's
    /// operand shapes first.
    pub fn load(&mut self, program: &[Instruction]) -> Result<(), LoadError> {
        if program.len() > IMEM_SIZE {
            return Err(LoadError::ProgramTooLarge {
                size: program.len(),
                capacity: IMEM_SIZE,
            });
        }
        for (slot, instr) in program.iter().enumerate() {
            instr
                .check_shape()
                .map_err(|source| LoadError::BadShape { slot, source })?;
        }

        self.slots = [None; IMEM_SIZE];
        for (slot, instr) in program.iter().enumerate() {
            self.slots[slot] = Some(*instr);
        }
        Ok(())
    }

    /// Fetch the instruction at a slot, if one was ever loaded.
    #[inline]
    pub fn get(&self, slot: usize) -> Option<Instruction> {
        self.slots.get(slot).copied().flatten()
    }

    /// All slots in order (for listings).
    pub fn slots(&self) -> &[Option<Instruction>; IMEM_SIZE] {
        &self.slots
    }

    /// Empty every slot.
    pub fn clear(&mut self) {
        self.slots = [None; IMEM_SIZE];
    }
}

impl Default for InstructionMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InstructionMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let loaded = self.slots.iter().filter(|s| s.is_some()).count();
        f.debug_struct("InstructionMemory")
            .field("loaded_slots", &loaded)
            .field("capacity", &IMEM_SIZE)
            .finish()
    }
}

/// Data memory: a fixed backing array with a run-time usable size.
///
/// The size is fixed at construction and acts as the modulus for every
/// address: reads and writes reduce their address with a Euclidean
/// remainder, so negative addresses wrap to the top instead of faulting.
#[derive(Clone, Serialize, Deserialize)]
pub struct DataMemory {
    cells: [i32; DMEM_CAPACITY],
    size: usize,
}

impl DataMemory {
    /// Data memory of the given size, clamped into 1..=27 (a modulus of
    /// zero is meaningless), all cells zeroed.
    pub fn new(size: usize) -> Self {
        Self {
            cells: [0; DMEM_CAPACITY],
            size: size.clamp(1, DMEM_CAPACITY),
        }
    }

    /// Usable cell count; also the address modulus.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Reduce an address into [0, size). Always non-negative, including
    /// for negative register contents used as addresses.
    #[inline]
    pub fn wrap(&self, addr: i32) -> usize {
        addr.rem_euclid(self.size as i32) as usize
    }

    /// Read the cell at a (wrapped) address.
    #[inline]
    pub fn read(&self, addr: i32) -> i32 {
        self.cells[self.wrap(addr)]
    }

    /// Write the cell at a (wrapped) address.
    #[inline]
    pub fn write(&mut self, addr: i32, value: i32) {
        let index = self.wrap(addr);
        self.cells[index] = value;
    }

    /// Copy an initial data image into cells 0..len and zero the rest.
    pub fn load_image(&mut self, data: &[i32]) -> Result<(), LoadError> {
        if data.len() > self.size {
            return Err(LoadError::ImageTooLarge {
                size: data.len(),
                capacity: self.size,
            });
        }
        self.cells = [0; DMEM_CAPACITY];
        self.cells[..data.len()].copy_from_slice(data);
        Ok(())
    }

    /// The usable cells, in order.
    pub fn cells(&self) -> &[i32] {
        &self.cells[..self.size]
    }

    /// Zero every cell.
    pub fn clear(&mut self) {
        self.cells = [0; DMEM_CAPACITY];
    }
}

impl std::fmt::Debug for DataMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells().iter().filter(|&&c| c != 0).count();
        f.debug_struct("DataMemory")
            .field("size", &self.size)
            .field("non_zero_cells", &non_zero)
            .finish()
    }
}

/// Errors that can occur loading a program or data image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("program has {size} instructions, memory holds {capacity}")]
    ProgramTooLarge { size: usize, capacity: usize },

    #[error("data image has {size} values, data memory holds {capacity}")]
    ImageTooLarge { size: usize, capacity: usize },

    #[error("instruction slot {slot}: {source}")]
    BadShape {
        slot: usize,
        #[source]
        source: ShapeError,
    },
}
