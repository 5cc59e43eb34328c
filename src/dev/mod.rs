//! Device subsystem.
//!
//! Devices implement one capability contract ([`Device`]) and live in a
//! fixed 8-slot registry owned by the engine. A device signals upward
//! only through its status byte; once per step the engine turns a raised
//! IRQ_PENDING bit into an interrupt trigger for the device's vector.

pub mod file;
pub mod terminal;

pub use file::FileDevice;
pub use terminal::{Console, ScriptedConsole, StdioConsole, Terminal};

/// Device is ready for commands.
pub const STATUS_READY: u8 = 0x01;
/// Operation in progress.
pub const STATUS_BUSY: u8 = 0x02;
/// Last operation failed.
pub const STATUS_ERROR: u8 = 0x04;
/// Input is waiting; the engine should raise this device's IRQ vector.
pub const STATUS_IRQ_PENDING: u8 = 0x08;

/// Number of registry slots.
pub const MAX_DEVICES: usize = 8;

/// The capability contract every device variant implements.
///
/// Success and failure map onto the machine's register-A convention:
/// `true`/`Some` becomes 0, `false`/`None` becomes -1. `tick` runs once
/// per engine step whether or not the device is active.
pub trait Device {
    /// Short variant name for listings.
    fn kind(&self) -> &'static str;

    /// Prepare the device. Mode 0 is read, anything else is write for
    /// files; terminals treat 0 and 2 as input-capable.
    fn open(&mut self, mode: i32) -> bool;

    /// Release whatever the device holds. Idempotent.
    fn close(&mut self) -> bool;

    /// Take one value from the device, if it has one.
    fn read(&mut self) -> Option<i32>;

    /// Hand one value to the device.
    fn write(&mut self, value: i32) -> bool;

    /// Per-step polling hook.
    fn tick(&mut self);

    /// Current status byte (READY/BUSY/ERROR/IRQ_PENDING bits).
    fn status(&self) -> u8;

    /// Interrupt vector assigned to this device.
    fn irq_vector(&self) -> usize;

    /// Whether this device may raise interrupts at all.
    fn irq_enabled(&self) -> bool;
}

/// The engine's 8-slot device registry.
///
/// Registration takes the first free slot; the slot index is the device
/// id the TOPEN/TREAD/TWRITE/TCLOSE opcodes use.
pub struct DeviceTable {
    slots: [Option<Box<dyn Device>>; MAX_DEVICES],
}

impl DeviceTable {
    pub fn new() -> Self {
        Self {
            slots: Default::default(),
        }
    }

    /// Put a device into the first free slot, returning its id, or
    /// `None` when all slots are taken.
    pub fn register(&mut self, device: Box<dyn Device>) -> Option<usize> {
        let slot = self.slots.iter().position(|s| s.is_none())?;
        self.slots[slot] = Some(device);
        Some(slot)
    }

    /// Close and drop the device in a slot. Returns false for an empty
    /// or out-of-range slot.
    pub fn unregister(&mut self, id: usize) -> bool {
        match self.slots.get_mut(id) {
            Some(slot) => match slot.take() {
                Some(mut device) => {
                    device.close();
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    /// Borrow the device in a slot.
    pub fn get_mut(&mut self, id: usize) -> Option<&mut dyn Device> {
        match self.slots.get_mut(id)? {
            Some(device) => Some(&mut **device),
            None => None,
        }
    }

    /// Registered devices in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &dyn Device)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_deref().map(|dev| (id, dev)))
    }

    /// Tick every registered device once, in slot order.
    pub fn tick_all(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(device) = slot {
                device.tick();
            }
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DeviceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeviceTable {
    fn drop(&mut self) {
        // Devices release their resources (open files in particular)
        // before the table goes away
        for slot in self.slots.iter_mut() {
            if let Some(device) = slot {
                device.close();
            }
        }
    }
}

impl std::fmt::Debug for DeviceTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<_> = self.iter().map(|(id, dev)| (id, dev.kind())).collect();
        f.debug_struct("DeviceTable").field("slots", &kinds).finish()
    }
}
