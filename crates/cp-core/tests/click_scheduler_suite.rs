//! Click scheduler behavior: Kernel retention and exit, the 5-phase task
//! mapping, wake/sleep effects, and condition save/restore across switches.

#![allow(clippy::pedantic, clippy::nursery)]

use cp_core::{
    assemble_word, CpConfig, Engine, IdlePump, SystemBus, TaskId, CLICK_PHASES,
};
use log as _;
use proptest as _;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

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

fn noop_looping_engine(config: CpConfig) -> Engine {
    let mut engine = Engine::new(config);
    // Address 0 decodes as a no-op whose literal NIA is 0: a self-loop.
    engine.wake_task(TaskId::Kernel);
    engine
}

#[test]
fn kernel_retains_the_processor_for_100_clicks_without_exit() {
    let mut engine = noop_looping_engine(CpConfig::default());
    let mut bus = QuietBus;

    for _ in 0..100 * 3 {
        engine.step_cycle(&mut bus).expect("no decode error");
        assert_eq!(engine.state.current_task, TaskId::Kernel);
    }
}

#[test]
fn kernel_exit_on_cycle_1_switches_at_the_very_next_click() {
    let mut engine = noop_looping_engine(CpConfig::default());
    // Word 0: Kernel exit, looping to itself.
    let exit = assemble_word(0, 0, 0, 0, 1, false, false, false, 4, 0, 0, false, 0x000);
    engine.load_microcode_word(0, exit).expect("in range");
    engine.wake_task(TaskId::Disk);

    let mut bus = QuietBus;
    for _ in 0..3 {
        assert_eq!(engine.state.current_task, TaskId::Kernel);
        engine.step_cycle(&mut bus).expect("no decode error");
    }
    // First click after the exit signal: phase 1 maps to Disk, which is
    // woken, so Disk gets the processor.
    assert_eq!(engine.state.current_task, TaskId::Disk);
}

#[test]
fn kernel_exit_falls_back_to_the_emulator_when_nothing_is_woken() {
    let mut engine = noop_looping_engine(CpConfig::default());
    let exit = assemble_word(0, 0, 0, 0, 1, false, false, false, 4, 0, 0, false, 0x000);
    engine.load_microcode_word(0, exit).expect("in range");

    let mut bus = QuietBus;
    for _ in 0..3 {
        engine.step_cycle(&mut bus).expect("no decode error");
    }
    assert_eq!(engine.state.current_task, TaskId::Emulator);
}

#[rstest]
#[case(0, TaskId::Disk)]
#[case(1, TaskId::Ethernet)]
#[case(2, TaskId::Display)]
#[case(3, TaskId::Iop)]
#[case(4, TaskId::Ethernet)]
fn click_phases_map_to_their_fixed_tasks(#[case] lead_clicks: usize, #[case] expected: TaskId) {
    // Phase advances before the switch decision, so a click that starts at
    // phase p hands the processor to the task mapped at phase p+1.
    let mut engine = noop_looping_engine(CpConfig::default());
    let exit = assemble_word(0, 0, 0, 0, 1, false, false, false, 4, 0, 0, false, 0x000);
    engine.load_microcode_word(0, exit).expect("in range");
    for task in [TaskId::Display, TaskId::Ethernet, TaskId::Disk, TaskId::Iop] {
        engine.wake_task(task);
    }
    engine.state.click_phase = (lead_clicks % CLICK_PHASES) as u8;

    let mut bus = QuietBus;
    for _ in 0..3 {
        engine.step_cycle(&mut bus).expect("no decode error");
    }
    assert_eq!(engine.state.current_task, expected);
}

#[test]
fn display_phase_runs_refresh_when_output_is_disabled() {
    let config = CpConfig {
        display_enabled: false,
        ..CpConfig::default()
    };
    let mut engine = noop_looping_engine(config);
    let exit = assemble_word(0, 0, 0, 0, 1, false, false, false, 4, 0, 0, false, 0x000);
    engine.load_microcode_word(0, exit).expect("in range");
    engine.wake_task(TaskId::Display);
    engine.wake_task(TaskId::Refresh);
    engine.state.click_phase = 2; // next click decides at phase 3

    let mut bus = QuietBus;
    for _ in 0..3 {
        engine.step_cycle(&mut bus).expect("no decode error");
    }
    assert_eq!(engine.state.current_task, TaskId::Refresh);
}

#[test]
fn a_woken_kernel_preempts_the_click_mapped_task() {
    let mut engine = noop_looping_engine(CpConfig::default());
    // Run as the Emulator; Kernel was exited beforehand.
    engine.state.current_task = TaskId::Emulator;
    engine.wake_task(TaskId::Disk);
    engine.wake_task(TaskId::Kernel);

    let mut bus = QuietBus;
    for _ in 0..3 {
        engine.step_cycle(&mut bus).expect("no decode error");
    }
    assert_eq!(engine.state.current_task, TaskId::Kernel);
}

#[test]
fn sleep_self_drops_the_task_at_the_next_opportunity() {
    let mut engine = noop_looping_engine(CpConfig::default());
    engine.state.current_task = TaskId::Emulator;
    engine.sleep_task(TaskId::Kernel);
    engine.wake_task(TaskId::Disk);
    // Disk's microcode immediately sleeps itself; address 0 loops.
    let sleep = assemble_word(0, 0, 0, 0, 1, false, false, false, 0, 2, 0, false, 0x000);
    engine.load_microcode_word(0, sleep).expect("in range");

    let mut bus = QuietBus;
    // Click 1: phase 0 -> 1 maps to Disk (woken), Disk runs and sleeps.
    for _ in 0..3 {
        engine.step_cycle(&mut bus).expect("no decode error");
    }
    assert_eq!(engine.state.current_task, TaskId::Disk);
    // Click 2: Disk no longer woken anywhere; Emulator takes over.
    for _ in 0..3 {
        engine.step_cycle(&mut bus).expect("no decode error");
    }
    assert_eq!(engine.state.current_task, TaskId::Emulator);
}

#[test]
fn condition_nibble_is_saved_and_restored_across_switches() {
    let mut engine = noop_looping_engine(CpConfig::default());
    let exit = assemble_word(0, 0, 0, 0, 1, false, false, false, 4, 0, 0, false, 0x000);
    engine.load_microcode_word(0, exit).expect("in range");
    engine.wake_task(TaskId::Disk);
    // Disk's saved context carries a condition nibble from the ports.
    engine.write_task_pc_high(TaskId::Disk, 0xB0);

    let mut bus = QuietBus;
    for _ in 0..3 {
        engine.step_cycle(&mut bus).expect("no decode error");
    }
    assert_eq!(engine.state.current_task, TaskId::Disk);
    assert_eq!(engine.state.condition, 0xB);
}

#[test]
fn advance_pumps_the_scheduler_once_per_cycle() {
    struct CountingPump(u64);
    impl cp_core::SchedulerPump for CountingPump {
        fn pump(&mut self) {
            self.0 += 1;
        }
    }

    let mut engine = noop_looping_engine(CpConfig::default());
    let mut bus = QuietBus;
    let mut pump = CountingPump(0);
    engine.advance(42, &mut bus, &mut pump).expect("no decode error");
    assert_eq!(pump.0, 42);
    assert_eq!(engine.state.cycle_count, 42);

    // The idle pump satisfies the same contract.
    let mut idle = IdlePump;
    engine.advance(3, &mut bus, &mut idle).expect("no decode error");
}
