//! Execution engine and task scheduler.
//!
//! One call advances one cycle (c1/c2/c3) of the current task; after c3 the
//! cycle wraps and the click step runs: latches clear, the trap countdown
//! ticks, the click phase advances, and the switch rule picks the next task.
//!
//! All modeled hardware conditions (memory fault, stack over/underflow,
//! IB-empty, page cross) stay inside the trap subsystem. The only host-level
//! failure is executing a reserved encoding, which indicates a corrupted
//! control store or an engine defect.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::similar_names,
    unknown_lints
)]

mod nia;

use thiserror::Error;

use crate::alu::{AluFlags, AluUnit};
use crate::bus::{AluPath, CpConfig, CycleRecord, SchedulerPump, SystemBus};
use crate::decoder::{BusSource, DecodedInstruction, StackOp};
use crate::ib::IbPointer;
use crate::microword::{MicrocodeWord, StatusSource, YFunction};
use crate::state::{ProcessorState, STACK_ENTRIES};
use crate::store::{ControlStore, PortError};
use crate::tasks::{click_phase_task, TaskId, CLICK_PHASES};
use crate::trap::TrapCause;

use nia::{MergeRule, DISPATCH_INDICATOR, PAGE_CROSS_MODIFIER};

/// Host-level engine failures. Everything here is an `InvalidDecode`-class
/// condition: a reserved encoding reached execution, which no modeled trap
/// covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum EngineError {
    /// A reserved plane code or bus-read select was executed.
    #[error("reserved control-word encoding executed at {address:#05x} (code {code:#x})")]
    InvalidDecode {
        /// Control-store address of the offending word.
        address: u16,
        /// The reserved 4-bit code.
        code: u8,
    },
}

/// The microcode execution engine: configuration, processor state, ALU, and
/// control store, advanced one cycle at a time.
#[derive(Debug, Clone)]
pub struct Engine {
    /// Configuration fixed at construction.
    pub config: CpConfig,
    /// All per-processor and per-task mutable state.
    pub state: ProcessorState,
    /// ALU register file and computation unit.
    pub alu: AluUnit,
    /// Control store with its decode cache.
    pub store: ControlStore,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(CpConfig::default())
    }
}

impl Engine {
    /// Creates a powered-on engine: zeroed state, Kernel current, waiting to
    /// be woken.
    #[must_use]
    pub fn new(config: CpConfig) -> Self {
        Self {
            config,
            state: ProcessorState::default(),
            alu: AluUnit::default(),
            store: ControlStore::default(),
        }
    }

    /// Applies power-on reset semantics. The control store is preserved, as
    /// on the hardware.
    pub fn reset(&mut self) {
        self.state.reset();
        self.alu.reset();
    }

    /// Advances up to `cycles` cycles, invoking the scheduler pump once per
    /// cycle.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidDecode`] when a reserved encoding
    /// reaches execution; emulation should not continue past it.
    pub fn advance(
        &mut self,
        cycles: u64,
        bus: &mut dyn SystemBus,
        pump: &mut dyn SchedulerPump,
    ) -> Result<(), EngineError> {
        for _ in 0..cycles {
            pump.pump();
            self.step_cycle(bus)?;
        }
        Ok(())
    }

    /// Advances exactly one cycle and reports what it did.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidDecode`] when a reserved encoding
    /// reaches execution.
    #[allow(clippy::too_many_lines)]
    pub fn step_cycle(&mut self, bus: &mut dyn SystemBus) -> Result<CycleRecord, EngineError> {
        let task = self.state.current_task;
        let tpc = self.state.tasks[task.index()].tpc;

        if self.state.waiting {
            return Ok(CycleRecord {
                executed: false,
                task,
                cycle: self.state.cycle,
                tpc,
                nia: tpc,
                output: 0,
                flags: AluFlags::default(),
            });
        }

        // A link captured last cycle becomes visible before anything reads
        // the link file this cycle.
        if let Some((index, value)) = self.state.pending_link.take() {
            self.state.links[usize::from(index & 0x7)] = value & 0xF;
        }

        let instr = *self.store.fetch(tpc);
        if let Some(code) = instr.reserved_code {
            return Err(EngineError::InvalidDecode { address: tpc, code });
        }
        let cycle = self.state.cycle;

        if instr.error_clear {
            self.state.error.clear();
        }
        if instr.kernel_exit && task == TaskId::Kernel && cycle == 1 {
            self.state.kernel_exit_armed = true;
            self.state.tasks[TaskId::Kernel.index()].wake = false;
        }

        // Resolve the external-bus input.
        let mut ib_empty_peek = false;
        let bus_value = if instr.mem_op && cycle == 3 {
            let (value, valid) = bus.read_data_register(task);
            if !valid {
                self.raise(TrapCause::MemoryFault);
            }
            if instr.ib_load {
                self.state.ib.load(value);
            }
            value
        } else {
            self.resolve_bus_source(&instr, bus, &mut ib_empty_peek)
        };
        if ib_empty_peek {
            self.raise(TrapCause::IbEmpty);
            if cycle == 1 {
                self.state.ib_empty_latched = true;
            }
        }

        // Run the ALU. The toggle register substitutes for carry-in only
        // when the Z plane asks for it and the raw carry bit is already 1.
        let carry_in = if instr.carry_from_toggle {
            self.state.toggle
        } else {
            instr.carry_in
        };
        let address_load = instr.mem_op && cycle == 1;
        let output = match self.config.alu_path {
            AluPath::Accurate => self.alu.execute(&instr, bus_value, carry_in, address_load),
            AluPath::Fast => self.alu.execute_fast(&instr, bus_value, carry_in, address_load),
        };

        if instr.toggle_flip {
            self.state.toggle = !self.state.toggle;
        }
        if instr.toggle_clear {
            self.state.toggle = false;
        }

        // Memory staging for cycles 1 and 2 (cycle 3 resolved above).
        let mut deferred_condition = 0u8;
        if instr.mem_op {
            match cycle {
                1 => {
                    bus.load_address_register(output.value, instr.mapped_address);
                    if instr.mapped_address {
                        let page_cross = output.flags.page_carry ^ instr.function_odd;
                        if page_cross {
                            deferred_condition |= PAGE_CROSS_MODIFIER;
                            self.state.cancel_data_load = true;
                        }
                    }
                }
                2 => {
                    let canceled = (self.state.cancel_data_load && instr.mapped_address)
                        || self.state.ib_empty_latched;
                    if !canceled {
                        bus.load_data_register(output.value);
                    }
                }
                _ => {}
            }
        }

        // Y-plane dispatch: control ops, branch/dispatch evaluation, device
        // writes. Branch bits are live against this cycle's address merge.
        let mut live_modifier = 0u16;
        match instr.y_fn {
            YFunction::SleepSelf => self.state.tasks[task.index()].wake = false,
            YFunction::ZeroBranch if output.flags.zero => live_modifier |= 1,
            YFunction::NegBranch if output.flags.negative => live_modifier |= 1,
            YFunction::CarryBranch if output.flags.carry_out => live_modifier |= 1,
            YFunction::OverflowBranch if output.flags.overflow => live_modifier |= 1,
            YFunction::BusNibbleLow => live_modifier |= bus_value & 0xF,
            YFunction::BusNibbleHigh => live_modifier |= (bus_value >> 4) & 0xF,
            YFunction::DeviceDispatch => live_modifier |= u16::from(bus.device_dispatch() & 0xF),
            YFunction::DiskControl => bus.disk_control((output.value & 0xFF) as u8),
            YFunction::EthernetControl => bus.ethernet_control((output.value & 0xFF) as u8),
            YFunction::DisplayControl => bus.display_control((output.value & 0xFF) as u8),
            YFunction::ByteRegister => {
                self.state.byte_registers[usize::from(instr.rb & 0xF)] =
                    (output.value & 0xFF) as u8;
            }
            _ => {}
        }
        if let Some(target) = instr.wake_task {
            self.state.tasks[target.index()].wake = true;
        }

        // Instruction-buffer dispatch protocol.
        let mut merge_rule = MergeRule::Plain;
        if instr.ib_dispatch {
            if self.state.ib.pointer() == IbPointer::Full || instr.dispatch_override {
                let byte = self.state.ib.consume();
                self.state.toggle = !self.state.toggle;
                merge_rule = MergeRule::IbDispatch(byte);
            } else {
                let index = (usize::from(self.state.ib.is_empty()) << 1)
                    | usize::from(self.state.macro_interrupt);
                merge_rule = MergeRule::RefillTrap(index);
            }
        }

        // Stack operations: the pointer always wraps; wrapping never
        // suppresses the trap.
        let sp = self.state.stack_pointer & 0xF;
        match instr.stack_op {
            StackOp::Push => {
                if sp == STACK_ENTRIES - 1 {
                    self.raise(TrapCause::StackOverUnderflow);
                }
                self.state.stack_pointer = (sp + 1) & 0xF;
            }
            StackOp::Pop => {
                if sp == 0 {
                    self.raise(TrapCause::StackOverUnderflow);
                }
                self.state.stack_pointer = sp.wrapping_sub(1) & 0xF;
            }
            StackOp::PopDoubleTest => {
                if sp <= 1 {
                    self.raise(TrapCause::StackOverUnderflow);
                }
                self.state.stack_pointer = sp.wrapping_sub(1) & 0xF;
            }
            StackOp::Load => {
                self.state.stack_pointer = (output.value & 0xF) as u8;
            }
            StackOp::None => {}
        }

        // SU write lands at the final pointer for stack-addressed forms.
        if instr.su_write_enable {
            let address = if instr.stack_addressed {
                self.state.stack_address()
            } else {
                ProcessorState::u_address(instr.ra, instr.rb)
            };
            self.state.su[address] = output.value;
        }

        // Next-address resolution. A pending error trap forces the plain
        // rule regardless of dispatch activity.
        if self.state.error.pending() {
            merge_rule = MergeRule::Plain;
        }
        let mut modifier = u16::from(self.state.condition & 0xF) | live_modifier;

        // Link read ORs into the modifier before finalizing; link capture is
        // deferred one cycle.
        let mut next = nia::merge(instr.nia, modifier, merge_rule);
        if let Some(link) = instr.link_index {
            if next & DISPATCH_INDICATOR == 0 {
                self.state.pending_link = Some((link, (next & 0xF) as u8));
            } else {
                modifier |= u16::from(self.state.links[usize::from(link & 0x7)]);
                next = nia::merge(instr.nia, modifier, merge_rule);
            }
        }

        self.state.condition = deferred_condition & 0xF;
        self.state.tasks[task.index()].tpc = next;
        self.state.cycle_count += 1;

        if self.state.cycle >= 3 {
            self.state.cycle = 1;
            self.click();
        } else {
            self.state.cycle += 1;
        }

        Ok(CycleRecord {
            executed: true,
            task,
            cycle,
            tpc,
            nia: next,
            output: output.value,
            flags: output.flags,
        })
    }

    fn resolve_bus_source(
        &mut self,
        instr: &DecodedInstruction,
        bus: &mut dyn SystemBus,
        ib_empty_peek: &mut bool,
    ) -> u16 {
        match instr.bus_source {
            BusSource::Idle => 0,
            BusSource::Literal(value) => u16::from(value),
            BusSource::RotateRa => self.alu.register(instr.ra).rotate_left(8),
            BusSource::URegister => {
                self.state.su[ProcessorState::u_address(instr.ra, instr.rb)]
            }
            BusSource::Status(source) => match source {
                StatusSource::DiskStatus => u16::from(bus.disk_status()),
                StatusSource::DiskData => u16::from(bus.disk_data()),
                StatusSource::EthernetStatus => u16::from(bus.ethernet_status()),
                StatusSource::EthernetData => u16::from(bus.ethernet_data()),
                StatusSource::DisplayFifo => u16::from(bus.display_fifo()),
                StatusSource::MemoryStatus => u16::from(bus.memory_status()),
                StatusSource::IopData => u16::from(bus.iop_data()),
                StatusSource::IbFront => {
                    if self.state.ib.is_empty() {
                        *ib_empty_peek = true;
                    }
                    u16::from(self.state.ib.front())
                }
                StatusSource::IbPair => {
                    if self.state.ib.is_empty() {
                        *ib_empty_peek = true;
                    }
                    self.state.ib.pair_word()
                }
                StatusSource::StackTop => self.state.su[self.state.stack_address()],
            },
        }
    }

    /// Raises a modeled trap cause. The countdown arm value depends on the
    /// cycle the cause was observed in: cycle-3 causes land one Emulator
    /// click out, earlier causes two.
    fn raise(&mut self, cause: TrapCause) {
        let clicks = if self.state.cycle == 3 { 1 } else { 2 };
        self.state.error.raise(cause, clicks);
    }

    /// The click step: clears same-click latches, ticks the trap countdown,
    /// advances the phase, and applies the task switch rule.
    fn click(&mut self) {
        self.state.cancel_data_load = false;
        self.state.ib_empty_latched = false;

        if self.state.current_task == TaskId::Emulator && self.state.error.tick_emulator_click() {
            log::debug!("error trap fires: emulator forced to address 0");
            self.state.tasks[TaskId::Emulator.index()].tpc = 0;
        }

        self.state.click_phase = (self.state.click_phase + 1) % CLICK_PHASES as u8;

        let next = self.select_next_task();
        if next != self.state.current_task {
            log::trace!(
                "click {}: task {:?} -> {:?}",
                self.state.click_phase,
                self.state.current_task,
                next
            );
            self.state.switch_to(next);
        }
        self.state.kernel_exit_armed = false;
    }

    /// Switch rule: Kernel holds until it signals exit; a woken Kernel wins;
    /// then the click-mapped task if woken; otherwise the Emulator.
    fn select_next_task(&self) -> TaskId {
        let state = &self.state;
        if state.current_task == TaskId::Kernel && !state.kernel_exit_armed {
            return TaskId::Kernel;
        }
        if state.tasks[TaskId::Kernel.index()].wake {
            return TaskId::Kernel;
        }
        let mapped = click_phase_task(
            usize::from(state.click_phase),
            self.config.display_enabled,
        );
        if state.tasks[mapped.index()].wake {
            mapped
        } else {
            TaskId::Emulator
        }
    }

    // --- Port surface consumed by the external I/O processor ---

    /// Wakes a task. The first wake also releases the power-on latch.
    pub fn wake_task(&mut self, task: TaskId) {
        self.state.tasks[task.index()].wake = true;
        self.state.waiting = false;
    }

    /// Clears a task's wake flag.
    pub const fn sleep_task(&mut self, task: TaskId) {
        self.state.tasks[task.index()].wake = false;
    }

    /// Sets or clears the pending macro-interrupt signal that steers refill
    /// traps.
    pub const fn set_macro_interrupt(&mut self, pending: bool) {
        self.state.macro_interrupt = pending;
    }

    /// The numerically smallest signaled trap cause, if any.
    #[must_use]
    pub fn error_code(&self) -> Option<TrapCause> {
        self.state.error.code()
    }

    /// Writes one byte of a control-store word through the port layout.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] for a bad address or transaction index.
    pub fn write_control_store_byte(
        &mut self,
        address: u16,
        transaction: u8,
        byte: u8,
    ) -> Result<(), PortError> {
        self.store.write_port_byte(address, transaction, byte)
    }

    /// Reads one byte of a control-store word through the port layout.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] for a bad address or transaction index.
    pub fn read_control_store_byte(&self, address: u16, transaction: u8) -> Result<u8, PortError> {
        self.store.read_port_byte(address, transaction)
    }

    /// Verifies stored parity at `address`, signaling `ControlStoreParity`
    /// on mismatch. The pipeline itself never raises this cause.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::AddressOutOfRange`] for addresses ≥ 4096.
    pub fn check_control_parity(&mut self, address: u16) -> Result<bool, PortError> {
        let good = self.store.verify_parity(address)?;
        if !good {
            log::warn!("control-store parity mismatch at {address:#05x}");
            self.raise(TrapCause::ControlStoreParity);
        }
        Ok(good)
    }

    /// Port write of a task's PC high byte (condition nibble + TPC 8..=11).
    pub const fn write_task_pc_high(&mut self, task: TaskId, byte: u8) {
        self.state.tasks[task.index()].load_pc_high(byte);
    }

    /// Port write of a task's PC low byte (TPC 0..=7).
    pub const fn write_task_pc_low(&mut self, task: TaskId, byte: u8) {
        self.state.tasks[task.index()].load_pc_low(byte);
    }

    /// Port read of a task's PC high byte (condition nibble + TPC 8..=11).
    #[must_use]
    pub const fn read_task_pc_high(&self, task: TaskId) -> u8 {
        self.state.tasks[task.index()].read_pc_high()
    }

    /// Port read of a task's PC low byte (TPC 0..=7).
    #[must_use]
    pub const fn read_task_pc_low(&self, task: TaskId) -> u8 {
        self.state.tasks[task.index()].read_pc_low()
    }

    /// Port read of an IOP interchange byte register.
    #[must_use]
    pub const fn byte_register(&self, index: u8) -> u8 {
        self.state.byte_registers[(index & 0xF) as usize]
    }

    /// Convenience for loaders and tests: writes a whole control word.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::AddressOutOfRange`] for addresses ≥ 4096.
    pub fn load_microcode_word(
        &mut self,
        address: u16,
        word: MicrocodeWord,
    ) -> Result<(), PortError> {
        self.store.write_word(address, word)
    }
}

#[cfg(test)]
mod tests {
    use super::{Engine, EngineError};
    use crate::bus::{CpConfig, SystemBus};
    use crate::microword::assemble_word;
    use crate::tasks::TaskId;

    #[derive(Default)]
    struct QuietBus;

    impl SystemBus for QuietBus {
        fn load_address_register(&mut self, _value: u16, _mapped: bool) {}
        fn load_data_register(&mut self, _value: u16) {}
        fn read_data_register(&mut self, _task: TaskId) -> (u16, bool) {
            (0, true)
        }
        fn disk_status(&mut self) -> u8 {
            0
        }
        fn disk_data(&mut self) -> u8 {
            0
        }
        fn ethernet_status(&mut self) -> u8 {
            0
        }
        fn ethernet_data(&mut self) -> u8 {
            0
        }
        fn display_fifo(&mut self) -> u8 {
            0
        }
        fn memory_status(&mut self) -> u8 {
            0
        }
        fn iop_data(&mut self) -> u8 {
            0
        }
        fn device_dispatch(&mut self) -> u8 {
            0
        }
        fn disk_control(&mut self, _value: u8) {}
        fn ethernet_control(&mut self, _value: u8) {}
        fn display_control(&mut self, _value: u8) {}
    }

    #[test]
    fn powered_on_engine_idles_until_woken() {
        let mut engine = Engine::new(CpConfig::default());
        let mut bus = QuietBus;

        let record = engine.step_cycle(&mut bus).expect("no decode error");
        assert!(!record.executed);
        assert_eq!(engine.state.cycle_count, 0);

        engine.wake_task(TaskId::Kernel);
        let record = engine.step_cycle(&mut bus).expect("no decode error");
        assert!(record.executed);
        assert_eq!(record.task, TaskId::Kernel);
        assert_eq!(engine.state.cycle_count, 1);
    }

    #[test]
    fn reserved_encodings_terminate_with_invalid_decode() {
        let mut engine = Engine::new(CpConfig::default());
        let word = assemble_word(0, 0, 0, 0, 1, false, false, false, 0, 0, 0xD, false, 0);
        engine.load_microcode_word(0, word).expect("in range");
        engine.wake_task(TaskId::Kernel);

        let mut bus = QuietBus;
        assert_eq!(
            engine.step_cycle(&mut bus),
            Err(EngineError::InvalidDecode { address: 0, code: 0xD })
        );
    }

    #[test]
    fn cycle_index_wraps_after_three_cycles() {
        let mut engine = Engine::new(CpConfig::default());
        engine.wake_task(TaskId::Kernel);
        let mut bus = QuietBus;

        for expected in [1u8, 2, 3, 1, 2, 3, 1] {
            assert_eq!(engine.state.cycle, expected);
            engine.step_cycle(&mut bus).expect("no decode error");
        }
    }

    #[test]
    fn next_address_follows_the_literal_field() {
        let mut engine = Engine::new(CpConfig::default());
        let word = assemble_word(0, 0, 0, 0, 1, false, false, false, 0, 0, 0, false, 0x123);
        engine.load_microcode_word(0, word).expect("in range");
        engine.wake_task(TaskId::Kernel);

        let mut bus = QuietBus;
        let record = engine.step_cycle(&mut bus).expect("no decode error");
        assert_eq!(record.nia, 0x123);
        assert_eq!(engine.state.tasks[TaskId::Kernel.index()].tpc, 0x123);
    }
}
