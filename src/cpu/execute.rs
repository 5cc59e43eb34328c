//! Execution engine for the Ternuino.
//!
//! Implements the fetch-execute cycle, all instruction behaviors, and
//! the per-step device and interrupt service.

use crate::cpu::interrupt::InterruptController;
use crate::cpu::isa::{Instruction, Opcode, Operand, Register};
use crate::cpu::memory::{DataMemory, InstructionMemory, LoadError, DMEM_CAPACITY, IMEM_SIZE};
use crate::cpu::registers::Registers;
use crate::dev::{Device, DeviceTable, STATUS_IRQ_PENDING};
use crate::ternary::{tabs, tand, tcmpr, tnot, tor, tshl3, tshr3, tsign};
use serde::{Deserialize, Serialize};

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// Executing instructions.
    Running,
    /// Stopped by HLT or by the program counter leaving instruction memory.
    Halted,
}

/// The Ternuino machine: registers, both memories, the interrupt
/// controller, and the device table.
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Instruction memory.
    pub imem: InstructionMemory,
    /// Data memory.
    pub dmem: DataMemory,
    /// Interrupt controller.
    pub irq: InterruptController,
    /// Registered devices.
    pub devices: DeviceTable,
    /// Current execution state.
    pub state: CpuState,
    /// Executed instruction count.
    pub cycles: u64,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a machine with the given usable data-memory size.
    pub fn new(dmem_size: usize) -> Self {
        Self {
            regs: Registers::new(),
            imem: InstructionMemory::new(),
            dmem: DataMemory::new(dmem_size),
            irq: InterruptController::new(),
            devices: DeviceTable::new(),
            state: CpuState::Running,
            cycles: 0,
            last_instr: None,
        }
    }

    /// Reset registers, counters, and interrupt state. The loaded
    /// program, data memory, and devices keep their contents.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.irq.reset();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.last_instr = None;
    }

    /// Load a program into instruction memory, shapes checked up front.
    pub fn load_program(&mut self, program: &[Instruction]) -> Result<(), LoadError> {
        self.imem.load(program)
    }

    /// Load an initial data image; cells beyond it are zeroed.
    pub fn load_data(&mut self, image: &[i32]) -> Result<(), LoadError> {
        self.dmem.load_image(image)
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the machine has halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the machine is still running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }

    /// Resolve an operand to a value.
    ///
    /// Direct and Indirect yield the wrapped *address*, not the cell
    /// content; each opcode decides what the value means.
    pub fn resolve(&self, operand: Operand) -> i32 {
        match operand {
            Operand::Immediate(v) => v,
            Operand::Register(r) => self.regs.get(r),
            Operand::Direct(addr) => self.dmem.wrap(addr) as i32,
            Operand::Indirect(r) => self.dmem.wrap(self.regs.get(r)) as i32,
        }
    }

    /// Execute a single step.
    ///
    /// Returns the instruction that executed, or `None` when the step
    /// skipped an empty slot or the machine is no longer running. After
    /// the instruction, devices tick once and pending interrupts get
    /// their dispatch check.
    pub fn step(&mut self) -> Option<Instruction> {
        if self.state != CpuState::Running {
            return None;
        }

        // A program counter outside instruction memory halts the machine
        if self.regs.pc < 0 || self.regs.pc >= IMEM_SIZE as i32 {
            self.state = CpuState::Halted;
            return None;
        }

        let executed = match self.imem.get(self.regs.pc as usize) {
            Some(instr) => {
                // pc moves past the instruction before it executes, so
                // jump targets and saved return addresses are exact
                self.regs.advance_pc();
                self.execute(instr);
                self.cycles += 1;
                self.last_instr = Some(instr);
                Some(instr)
            }
            None => {
                // Empty slots are skipped; the last one stops the machine
                if self.regs.pc as usize >= IMEM_SIZE - 1 {
                    self.state = CpuState::Halted;
                }
                self.regs.advance_pc();
                None
            }
        };

        if self.state == CpuState::Running {
            self.service_devices();
            if let Some(handler) = self.irq.check_and_dispatch(self.regs.pc) {
                self.regs.jump(handler);
            }
        }

        executed
    }

    /// Run until the machine halts.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self) -> u64 {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step();
        }

        self.cycles - start_cycles
    }

    /// Run for at most `max_cycles` executed instructions.
    pub fn run_limited(&mut self, max_cycles: u64) -> u64 {
        let start_cycles = self.cycles;
        let limit = self.cycles + max_cycles;

        while self.state == CpuState::Running && self.cycles < limit {
            self.step();
        }

        self.cycles - start_cycles
    }

    /// Tick every device, then turn raised IRQ_PENDING bits into
    /// controller triggers, in slot order.
    fn service_devices(&mut self) {
        self.devices.tick_all();
        for (_, dev) in self.devices.iter() {
            if dev.irq_enabled() && dev.status() & STATUS_IRQ_PENDING != 0 {
                self.irq.trigger(dev.irq_vector());
            }
        }
    }

    /// Look up a device by a program-supplied id.
    fn device_mut(&mut self, id: i32) -> Option<&mut dyn Device> {
        usize::try_from(id).ok().and_then(|id| self.devices.get_mut(id))
    }

    // Invalid runtime conditions never trap; each degrades to a defined
    // outcome:
    //
    //   pc outside [0, 27)            halt
    //   empty instruction slot        skip; halt if it was the last slot
    //   DIV with a zero divisor       destination register becomes 0
    //   LEA with an Indirect source   register left unchanged
    //   computed data address         wrapped into [0, dmem_size)
    //   device id outside the table   A = -1
    //   device call refused           A = -1
    //   TREAD into a non-register     value consumed, A = -1
    //   IRQ while gated               stays pending, fires when allowed
    //   IRET outside a handler        no effect
    fn execute(&mut self, instr: Instruction) {
        match instr.opcode() {
            // ==================== Data movement ====================
            Opcode::Nop => {}

            Opcode::Mov => {
                if let (Some(r), Some(op2)) = (reg_op1(&instr), instr.operand2()) {
                    let value = self.resolve(op2);
                    self.regs.set(r, value);
                }
            }

            Opcode::Lea => {
                if let (Some(r), Some(op2)) = (reg_op1(&instr), instr.operand2()) {
                    // Indirect is the defined no-op; anything else is an
                    // address expression
                    if !matches!(op2, Operand::Indirect(_)) {
                        let addr = self.resolve(op2);
                        self.regs.set(r, self.dmem.wrap(addr) as i32);
                    }
                }
            }

            Opcode::Ld => {
                if let (Some(r), Some(op2)) = (reg_op1(&instr), instr.operand2()) {
                    let addr = self.resolve(op2);
                    self.regs.set(r, self.dmem.read(addr));
                }
            }

            Opcode::St => {
                if let (Some(r), Some(op2)) = (reg_op1(&instr), instr.operand2()) {
                    let addr = self.resolve(op2);
                    self.dmem.write(addr, self.regs.get(r));
                }
            }

            // ==================== Arithmetic ====================
            Opcode::Add => {
                if let (Some(r1), Some(r2)) = (reg_op1(&instr), reg_op2(&instr)) {
                    let value = self.regs.get(r1).wrapping_add(self.regs.get(r2));
                    self.regs.set(r1, value);
                }
            }

            Opcode::Sub => {
                if let (Some(r1), Some(r2)) = (reg_op1(&instr), reg_op2(&instr)) {
                    let value = self.regs.get(r1).wrapping_sub(self.regs.get(r2));
                    self.regs.set(r1, value);
                }
            }

            Opcode::Mul => {
                if let (Some(r1), Some(r2)) = (reg_op1(&instr), reg_op2(&instr)) {
                    let value = self.regs.get(r1).wrapping_mul(self.regs.get(r2));
                    self.regs.set(r1, value);
                }
            }

            Opcode::Div => {
                if let (Some(r1), Some(r2)) = (reg_op1(&instr), reg_op2(&instr)) {
                    let divisor = self.regs.get(r2);
                    // A zero divisor zeroes the destination, no fault
                    let value = if divisor == 0 {
                        0
                    } else {
                        self.regs.get(r1).wrapping_div(divisor)
                    };
                    self.regs.set(r1, value);
                }
            }

            // ==================== Ternary logic / arithmetic ====================
            Opcode::Tand => {
                if let (Some(r1), Some(r2)) = (reg_op1(&instr), reg_op2(&instr)) {
                    let value = tand(self.regs.get(r1), self.regs.get(r2));
                    self.regs.set(r1, value);
                }
            }

            Opcode::Tor => {
                if let (Some(r1), Some(r2)) = (reg_op1(&instr), reg_op2(&instr)) {
                    let value = tor(self.regs.get(r1), self.regs.get(r2));
                    self.regs.set(r1, value);
                }
            }

            Opcode::Tnot => {
                if let Some(r) = reg_op1(&instr) {
                    let value = tnot(self.regs.get(r));
                    self.regs.set(r, value);
                }
            }

            Opcode::Neg => {
                if let Some(r) = reg_op1(&instr) {
                    let value = self.regs.get(r).wrapping_neg();
                    self.regs.set(r, value);
                }
            }

            Opcode::Tsign => {
                if let Some(r) = reg_op1(&instr) {
                    let value = tsign(self.regs.get(r));
                    self.regs.set(r, value);
                }
            }

            Opcode::Tabs => {
                if let Some(r) = reg_op1(&instr) {
                    let value = tabs(self.regs.get(r));
                    self.regs.set(r, value);
                }
            }

            Opcode::Tshl3 => {
                if let Some(r) = reg_op1(&instr) {
                    let value = tshl3(self.regs.get(r));
                    self.regs.set(r, value);
                }
            }

            Opcode::Tshr3 => {
                if let Some(r) = reg_op1(&instr) {
                    let value = tshr3(self.regs.get(r));
                    self.regs.set(r, value);
                }
            }

            Opcode::Tcmpr => {
                if let (Some(r1), Some(r2)) = (reg_op1(&instr), reg_op2(&instr)) {
                    let value = tcmpr(self.regs.get(r1), self.regs.get(r2));
                    self.regs.set(r1, value);
                }
            }

            // ==================== Control flow ====================
            Opcode::Jmp => {
                if let Some(op1) = instr.operand1() {
                    // Jump targets are instruction addresses and are not
                    // wrapped; an out-of-range target halts on the next step
                    let target = self.resolve(op1);
                    self.regs.jump(target);
                }
            }

            Opcode::Tjz => {
                if let (Some(r), Some(op2)) = (reg_op1(&instr), instr.operand2()) {
                    let target = self.resolve(op2);
                    if self.regs.get(r) == 0 {
                        self.regs.jump(target);
                    }
                }
            }

            Opcode::Tjn => {
                if let (Some(r), Some(op2)) = (reg_op1(&instr), instr.operand2()) {
                    let target = self.resolve(op2);
                    if self.regs.get(r) < 0 {
                        self.regs.jump(target);
                    }
                }
            }

            Opcode::Tjp => {
                if let (Some(r), Some(op2)) = (reg_op1(&instr), instr.operand2()) {
                    let target = self.resolve(op2);
                    if self.regs.get(r) > 0 {
                        self.regs.jump(target);
                    }
                }
            }

            Opcode::Hlt => {
                self.state = CpuState::Halted;
            }

            // ==================== Device I/O ====================
            Opcode::Topen => {
                if let (Some(op1), Some(op2)) = (instr.operand1(), instr.operand2()) {
                    let id = self.resolve(op1);
                    let mode = self.resolve(op2);
                    let ok = self.device_mut(id).map(|dev| dev.open(mode)).unwrap_or(false);
                    self.regs.set(Register::A, if ok { 0 } else { -1 });
                }
            }

            Opcode::Tread => {
                if let Some(op1) = instr.operand1() {
                    let id = self.resolve(op1);
                    // The device value is consumed before the target is
                    // examined
                    let value = self.device_mut(id).and_then(|dev| dev.read());
                    let result = match (value, instr.operand2()) {
                        (Some(v), Some(Operand::Register(r))) => {
                            self.regs.set(r, v);
                            0
                        }
                        _ => -1,
                    };
                    self.regs.set(Register::A, result);
                }
            }

            Opcode::Twrite => {
                if let (Some(op1), Some(op2)) = (instr.operand1(), instr.operand2()) {
                    let id = self.resolve(op1);
                    let value = self.resolve(op2);
                    let ok = self
                        .device_mut(id)
                        .map(|dev| dev.write(value))
                        .unwrap_or(false);
                    self.regs.set(Register::A, if ok { 0 } else { -1 });
                }
            }

            Opcode::Tclose => {
                if let Some(op1) = instr.operand1() {
                    let id = self.resolve(op1);
                    let ok = self.device_mut(id).map(|dev| dev.close()).unwrap_or(false);
                    self.regs.set(Register::A, if ok { 0 } else { -1 });
                }
            }

            // ==================== Interrupt control ====================
            Opcode::Ei => {
                self.irq.set_global_enable(true);
            }

            Opcode::Di => {
                self.irq.set_global_enable(false);
            }

            Opcode::Irq => {
                if let Some(op1) = instr.operand1() {
                    let vector = self.resolve(op1);
                    if let Ok(vector) = usize::try_from(vector) {
                        self.irq.trigger(vector);
                        // Software interrupts skip the global enable gate
                        if let Some(handler) = self.irq.force_dispatch(self.regs.pc) {
                            self.regs.jump(handler);
                        }
                    }
                }
            }

            Opcode::Iret => {
                if let Some(pc) = self.irq.ret() {
                    self.regs.jump(pc);
                }
            }
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new(DMEM_CAPACITY)
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .field("dmem_size", &self.dmem.size())
            .field("devices", &self.devices.len())
            .finish()
    }
}

/// Operand 1 as a plain register. Loading checks shapes, so a miss here
/// only happens for hand-built instructions and falls through to a no-op.
fn reg_op1(instr: &Instruction) -> Option<Register> {
    match instr.operand1() {
        Some(Operand::Register(r)) => Some(r),
        _ => None,
    }
}

/// Operand 2 as a plain register.
fn reg_op2(instr: &Instruction) -> Option<Register> {
    match instr.operand2() {
        Some(Operand::Register(r)) => Some(r),
        _ => None,
    }
}
