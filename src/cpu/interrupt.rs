//! Interrupt controller.
//!
//! Eight vectors, each a handler address plus an enable bit, with a
//! single pending request. A later trigger overwrites an undelivered
//! one (last wins, no queue). Dispatch is suppressed while a handler is
//! running; one level of nesting suppression, ended by IRET.

use serde::{Deserialize, Serialize};

/// Number of interrupt vectors.
pub const VECTOR_COUNT: usize = 8;

/// One vector table entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorEntry {
    /// Instruction address control jumps to on dispatch.
    pub handler: i32,
    /// Dispatch fires only while this is set.
    pub enabled: bool,
}

/// The interrupt controller.
///
/// The engine owns one of these and consults it once per step; the
/// controller never touches the program counter itself, it hands
/// addresses back and the engine moves.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InterruptController {
    vectors: [VectorEntry; VECTOR_COUNT],
    global_enable: bool,
    in_interrupt: bool,
    pending: Option<usize>,
    saved_pc: i32,
}

impl InterruptController {
    /// A fresh controller: no handlers, every vector disabled, global
    /// enable off (programs opt in with EI).
    pub fn new() -> Self {
        Self {
            vectors: [VectorEntry::default(); VECTOR_COUNT],
            global_enable: false,
            in_interrupt: false,
            pending: None,
            saved_pc: 0,
        }
    }

    /// Install a handler address for a vector. Out-of-range vectors are
    /// ignored.
    pub fn set_handler(&mut self, vector: usize, handler: i32) {
        if let Some(entry) = self.vectors.get_mut(vector) {
            entry.handler = handler;
        }
    }

    /// Allow a vector to dispatch.
    pub fn enable(&mut self, vector: usize) {
        if let Some(entry) = self.vectors.get_mut(vector) {
            entry.enabled = true;
        }
    }

    /// Stop a vector from dispatching. A pending request for it stays
    /// pending and delivers if the vector is re-enabled.
    pub fn disable(&mut self, vector: usize) {
        if let Some(entry) = self.vectors.get_mut(vector) {
            entry.enabled = false;
        }
    }

    /// Flip the global interrupt-enable flag (the EI/DI opcodes).
    pub fn set_global_enable(&mut self, enabled: bool) {
        self.global_enable = enabled;
    }

    pub fn global_enabled(&self) -> bool {
        self.global_enable
    }

    pub fn in_interrupt(&self) -> bool {
        self.in_interrupt
    }

    pub fn pending(&self) -> Option<usize> {
        self.pending
    }

    /// The vector table, for listings.
    pub fn vectors(&self) -> &[VectorEntry; VECTOR_COUNT] {
        &self.vectors
    }

    /// Raise a request for a vector, overwriting any undelivered one.
    /// Out-of-range vectors are ignored.
    pub fn trigger(&mut self, vector: usize) {
        if vector < VECTOR_COUNT {
            self.pending = Some(vector);
        }
    }

    /// The per-step dispatch check. Fires only when the global enable is
    /// on, no handler is already running, a request is pending, and that
    /// vector is enabled. On dispatch the current pc is saved and the
    /// handler address returned for the engine to jump to.
    pub fn check_and_dispatch(&mut self, pc: i32) -> Option<i32> {
        if !self.global_enable {
            return None;
        }
        self.dispatch_pending(pc)
    }

    /// Dispatch for the IRQ opcode: skips the global-enable test but
    /// still honors the in-interrupt suppression and the vector's own
    /// enable bit.
    pub fn force_dispatch(&mut self, pc: i32) -> Option<i32> {
        self.dispatch_pending(pc)
    }

    fn dispatch_pending(&mut self, pc: i32) -> Option<i32> {
        if self.in_interrupt {
            return None;
        }
        let vector = self.pending?;
        let entry = self.vectors[vector];
        if !entry.enabled {
            return None;
        }

        self.saved_pc = pc;
        self.in_interrupt = true;
        self.pending = None;
        Some(entry.handler)
    }

    /// Return from an interrupt: hands back the saved pc and clears the
    /// in-interrupt flag. A stray IRET outside a handler returns `None`.
    pub fn ret(&mut self) -> Option<i32> {
        if self.in_interrupt {
            self.in_interrupt = false;
            Some(self.saved_pc)
        } else {
            None
        }
    }

    /// Back to the power-on state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for InterruptController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed() -> InterruptController {
        let mut irq = InterruptController::new();
        irq.set_handler(1, 10);
        irq.enable(1);
        irq.set_global_enable(true);
        irq
    }

    #[test]
    fn test_dispatch_and_return() {
        let mut irq = armed();
        irq.trigger(1);

        assert_eq!(irq.check_and_dispatch(5), Some(10));
        assert!(irq.in_interrupt());
        assert_eq!(irq.pending(), None);

        assert_eq!(irq.ret(), Some(5));
        assert!(!irq.in_interrupt());
    }

    #[test]
    fn test_requires_global_enable() {
        let mut irq = armed();
        irq.set_global_enable(false);
        irq.trigger(1);

        assert_eq!(irq.check_and_dispatch(0), None);
        // The request is not lost
        assert_eq!(irq.pending(), Some(1));
    }

    #[test]
    fn test_requires_vector_enable() {
        let mut irq = armed();
        irq.disable(1);
        irq.trigger(1);

        assert_eq!(irq.check_and_dispatch(0), None);
        assert_eq!(irq.pending(), Some(1));

        // Re-enabling lets the held request deliver
        irq.enable(1);
        assert_eq!(irq.check_and_dispatch(0), Some(10));
    }

    #[test]
    fn test_reentrancy_suppressed_to_one_dispatch() {
        let mut irq = armed();
        irq.trigger(1);
        assert_eq!(irq.check_and_dispatch(3), Some(10));

        // Two triggers while the handler runs collapse into one pending
        irq.trigger(1);
        irq.trigger(1);
        assert_eq!(irq.check_and_dispatch(11), None);
        assert_eq!(irq.check_and_dispatch(12), None);

        assert_eq!(irq.ret(), Some(3));
        assert_eq!(irq.check_and_dispatch(3), Some(10));
        assert_eq!(irq.pending(), None);
    }

    #[test]
    fn test_last_trigger_wins() {
        let mut irq = armed();
        irq.set_handler(2, 20);
        irq.enable(2);

        irq.trigger(1);
        irq.trigger(2);
        assert_eq!(irq.check_and_dispatch(0), Some(20));
    }

    #[test]
    fn test_force_dispatch_skips_global_only() {
        let mut irq = armed();
        irq.set_global_enable(false);

        irq.trigger(1);
        assert_eq!(irq.force_dispatch(7), Some(10));
        assert_eq!(irq.ret(), Some(7));

        // Still suppressed while in a handler
        irq.trigger(1);
        irq.force_dispatch(0);
        irq.trigger(1);
        assert_eq!(irq.force_dispatch(1), None);
    }

    #[test]
    fn test_out_of_range_vector_ignored() {
        let mut irq = armed();
        irq.trigger(VECTOR_COUNT);
        irq.trigger(usize::MAX);
        assert_eq!(irq.pending(), None);
        assert_eq!(irq.check_and_dispatch(0), None);
    }

    #[test]
    fn test_stray_ret_is_noop() {
        let mut irq = armed();
        assert_eq!(irq.ret(), None);
    }
}
