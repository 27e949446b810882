//! Error-trap subsystem: stack boundary behavior, cause accumulation, the
//! click-counted deferred jump, and the forced plain address merge.

#![allow(clippy::pedantic, clippy::nursery)]

use cp_core::{
    assemble_word, CpConfig, Engine, SystemBus, TaskId, TrapCause,
};
use log as _;
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

/// Bus whose data-register reads fail on request.
struct FaultableBus {
    valid: bool,
}

impl SystemBus for FaultableBus {
    fn load_address_register(&mut self, _value: u16, _mapped: bool) {}
    fn load_data_register(&mut self, _value: u16) {}
    fn read_data_register(&mut self, _task: TaskId) -> (u16, bool) {
        (0, self.valid)
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

fn good_bus() -> FaultableBus {
    FaultableBus { valid: true }
}

fn emulator_engine(tpc: u16) -> Engine {
    let mut engine = Engine::new(CpConfig::default());
    engine.state.current_task = TaskId::Emulator;
    engine.state.waiting = false;
    engine.write_task_pc_high(TaskId::Emulator, ((tpc >> 8) & 0xF) as u8);
    engine.write_task_pc_low(TaskId::Emulator, (tpc & 0xFF) as u8);
    engine
}

fn noop_to(nia: u16) -> cp_core::MicrocodeWord {
    assemble_word(0, 0, 0, 0, 1, false, false, false, 0, 0, 0, false, nia)
}

fn push_to(nia: u16) -> cp_core::MicrocodeWord {
    assemble_word(0, 0, 0, 0, 1, false, false, false, 1, 0, 0, false, nia)
}

#[test]
fn push_at_pointer_15_traps_and_wraps_to_zero() {
    let mut engine = emulator_engine(0x020);
    engine.state.stack_pointer = 15;
    engine.load_microcode_word(0x020, push_to(0x021)).expect("in range");

    let mut bus = good_bus();
    engine.step_cycle(&mut bus).expect("no decode error");

    assert_eq!(engine.state.stack_pointer, 0);
    assert_eq!(engine.error_code(), Some(TrapCause::StackOverUnderflow));
}

#[test]
fn consecutive_pushes_move_the_pointer_one_step_each() {
    let mut engine = emulator_engine(0x020);
    engine.state.stack_pointer = 10;
    engine.load_microcode_word(0x020, push_to(0x020)).expect("in range");

    let mut bus = good_bus();
    let mut previous = engine.state.stack_pointer;
    for _ in 0..20 {
        engine.step_cycle(&mut bus).expect("no decode error");
        let current = engine.state.stack_pointer;
        assert_eq!(current, (previous + 1) & 0xF);
        previous = current;
    }
}

#[test]
fn pop_at_pointer_zero_traps_and_wraps_to_15() {
    let mut engine = emulator_engine(0x020);
    let pop = assemble_word(0, 0, 0, 0, 1, false, false, false, 2, 0, 0, false, 0x021);
    engine.load_microcode_word(0x020, pop).expect("in range");

    let mut bus = good_bus();
    engine.step_cycle(&mut bus).expect("no decode error");

    assert_eq!(engine.state.stack_pointer, 15);
    assert_eq!(engine.error_code(), Some(TrapCause::StackOverUnderflow));
}

#[test]
fn double_pop_test_traps_one_entry_earlier_than_a_plain_pop() {
    // A plain pop at pointer 1 is fine.
    let mut engine = emulator_engine(0x020);
    engine.state.stack_pointer = 1;
    let pop = assemble_word(0, 0, 0, 0, 1, false, false, false, 2, 0, 0, false, 0x021);
    engine.load_microcode_word(0x020, pop).expect("in range");
    let mut bus = good_bus();
    engine.step_cycle(&mut bus).expect("no decode error");
    assert_eq!(engine.state.stack_pointer, 0);
    assert_eq!(engine.error_code(), None);

    // Both pop encodings together test two entries deep; the delta stays 1.
    let mut engine = emulator_engine(0x020);
    engine.state.stack_pointer = 1;
    let double = assemble_word(0, 0, 0, 0, 1, false, false, false, 2, 0, 1, false, 0x021);
    engine.load_microcode_word(0x020, double).expect("in range");
    engine.step_cycle(&mut bus).expect("no decode error");
    assert_eq!(engine.state.stack_pointer, 0);
    assert_eq!(engine.error_code(), Some(TrapCause::StackOverUnderflow));
}

#[test]
fn memory_fault_on_cycle_3_fires_after_one_emulator_click() {
    let mut engine = emulator_engine(0x020);
    engine.load_microcode_word(0x020, noop_to(0x021)).expect("in range");
    engine.load_microcode_word(0x021, noop_to(0x022)).expect("in range");
    // Cycle 3: memory read that the bus rejects.
    let read = assemble_word(0, 0, 0, 0, 1, false, false, true, 0, 0, 0, false, 0x023);
    engine.load_microcode_word(0x022, read).expect("in range");
    engine.load_microcode_word(0x023, noop_to(0x023)).expect("in range");

    let mut bus = FaultableBus { valid: false };
    for _ in 0..3 {
        engine.step_cycle(&mut bus).expect("no decode error");
    }

    // The click that ended the faulting instruction already fired the jump.
    assert_eq!(engine.error_code(), Some(TrapCause::MemoryFault));
    assert_eq!(engine.state.tasks[TaskId::Emulator.index()].tpc, 0);
}

#[test]
fn cycle_1_trap_fires_after_two_emulator_clicks() {
    let mut engine = emulator_engine(0x020);
    engine.state.stack_pointer = 15;
    engine.load_microcode_word(0x020, push_to(0x021)).expect("in range");
    for address in 0x021u16..=0x026 {
        engine.load_microcode_word(address, noop_to(address + 1)).expect("in range");
    }
    engine.load_microcode_word(0x027, noop_to(0x027)).expect("in range");

    let mut bus = good_bus();
    // First click: trap raised at cycle 1, countdown 2 -> 1.
    for _ in 0..3 {
        engine.step_cycle(&mut bus).expect("no decode error");
    }
    assert_ne!(engine.state.tasks[TaskId::Emulator.index()].tpc, 0);

    // Second click: countdown 1 -> fire.
    for _ in 0..3 {
        engine.step_cycle(&mut bus).expect("no decode error");
    }
    assert_eq!(engine.state.tasks[TaskId::Emulator.index()].tpc, 0);
}

#[test]
fn countdown_only_ticks_while_the_emulator_executes() {
    let mut engine = Engine::new(CpConfig::default());
    engine.wake_task(TaskId::Kernel);
    engine.state.stack_pointer = 15;
    // Kernel loops on a push that traps, never exiting.
    engine.load_microcode_word(0, push_to(0x001)).expect("in range");
    engine.load_microcode_word(1, noop_to(0x001)).expect("in range");

    let mut bus = good_bus();
    for _ in 0..10 * 3 {
        engine.step_cycle(&mut bus).expect("no decode error");
    }
    // Ten Kernel clicks later the trap is still pending and the Emulator
    // was never redirected.
    assert_eq!(engine.error_code(), Some(TrapCause::StackOverUnderflow));
    assert_eq!(engine.state.tasks[TaskId::Emulator.index()].tpc, 0x000);
    assert!(engine.state.error.pending());
}

#[test]
fn smaller_causes_take_over_the_reported_code_and_accumulate() {
    let mut engine = emulator_engine(0x020);
    // Cycle 1: empty-IB peek raises IbEmpty (code 3).
    let peek = assemble_word(7, 0, 5, 0, 1, false, false, false, 0, 0, 7, false, 0x021);
    engine.load_microcode_word(0x020, peek).expect("in range");
    engine.load_microcode_word(0x021, noop_to(0x022)).expect("in range");
    // Cycle 3: invalid memory read raises MemoryFault (code 1).
    let read = assemble_word(0, 0, 0, 0, 1, false, false, true, 0, 0, 0, false, 0x023);
    engine.load_microcode_word(0x022, read).expect("in range");
    engine.load_microcode_word(0x023, noop_to(0x023)).expect("in range");

    let mut bus = FaultableBus { valid: false };
    engine.step_cycle(&mut bus).expect("no decode error");
    assert_eq!(engine.error_code(), Some(TrapCause::IbEmpty));

    engine.step_cycle(&mut bus).expect("no decode error");
    engine.step_cycle(&mut bus).expect("no decode error");
    assert_eq!(engine.error_code(), Some(TrapCause::MemoryFault));
    assert_ne!(
        engine.state.error.signaled_bits() & TrapCause::IbEmpty.bit(),
        0,
        "the earlier cause stays signaled"
    );
}

#[test]
fn error_clear_microinstruction_empties_the_register() {
    let mut engine = emulator_engine(0x020);
    engine.state.stack_pointer = 15;
    engine.load_microcode_word(0x020, push_to(0x021)).expect("in range");
    // fX = ErrorClear.
    let clear = assemble_word(0, 0, 0, 0, 1, false, false, false, 5, 0, 0, false, 0x022);
    engine.load_microcode_word(0x021, clear).expect("in range");
    engine.load_microcode_word(0x022, noop_to(0x022)).expect("in range");

    let mut bus = good_bus();
    engine.step_cycle(&mut bus).expect("no decode error");
    assert_eq!(engine.error_code(), Some(TrapCause::StackOverUnderflow));

    engine.step_cycle(&mut bus).expect("no decode error");
    assert_eq!(engine.error_code(), None);
    assert!(!engine.state.error.pending());
}

#[test]
fn a_pending_trap_forces_the_plain_address_merge() {
    let mut engine = emulator_engine(0x020);
    engine.state.stack_pointer = 15;
    engine.state.ib.load(0xAB00);
    engine.load_microcode_word(0x020, push_to(0x021)).expect("in range");
    // IB dispatch with override would normally splice byte 0xAB in.
    let dispatch = assemble_word(0, 0, 0, 0, 1, false, false, false, 0, 11, 4, false, 0x00F);
    engine.load_microcode_word(0x021, dispatch).expect("in range");

    let mut bus = good_bus();
    engine.step_cycle(&mut bus).expect("no decode error");
    assert!(engine.state.error.pending());

    let record = engine.step_cycle(&mut bus).expect("no decode error");
    assert_eq!(record.nia, 0x00F, "plain OR merge, no dispatch splice");
}
