//! Deterministic state fingerprint generator used by CI cross-host
//! comparison: runs a fixed microcode workload and FNV-hashes the final
//! processor state. Any divergence across hosts or refactors shows up as a
//! different fingerprint.

#![allow(clippy::pedantic, clippy::nursery)]

use cp_core::{assemble_word, CpConfig, Engine, IdlePump, SystemBus, TaskId};
use log as _;
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

/// Bus with deterministic, address-independent responses.
#[derive(Default)]
struct FixedBus;

impl SystemBus for FixedBus {
    fn load_address_register(&mut self, _value: u16, _mapped: bool) {}
    fn load_data_register(&mut self, _value: u16) {}
    fn read_data_register(&mut self, _task: TaskId) -> (u16, bool) {
        (0x5AA5, true)
    }
    fn disk_status(&mut self) -> u8 {
        0x01
    }
    fn disk_data(&mut self) -> u8 {
        0x40
    }
    fn ethernet_status(&mut self) -> u8 {
        0x02
    }
    fn ethernet_data(&mut self) -> u8 {
        0x80
    }
    fn display_fifo(&mut self) -> u8 {
        0x10
    }
    fn memory_status(&mut self) -> u8 {
        0x00
    }
    fn iop_data(&mut self) -> u8 {
        0x21
    }
    fn device_dispatch(&mut self) -> u8 {
        0x3
    }
    fn disk_control(&mut self, _value: u8) {}
    fn ethernet_control(&mut self, _value: u8) {}
    fn display_control(&mut self, _value: u8) {}
}

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

fn fingerprint() -> String {
    let mut engine = Engine::new(CpConfig::default());

    // A small workload touching the ALU, SU file, IB, and dispatch paths.
    let words = [
        assemble_word(0, 1, 1, 0, 3, true, false, false, 1, 0, 0, false, 0x001),
        assemble_word(1, 2, 1, 6, 3, false, true, false, 0, 0, 0, false, 0x002),
        assemble_word(0, 0, 0, 0, 1, false, false, true, 0, 0, 5, false, 0x003),
        assemble_word(2, 3, 0, 0, 5, false, false, false, 0, 11, 4, true, 0x004),
        assemble_word(0, 0, 7, 3, 1, false, false, false, 0, 10, 7, false, 0x000),
    ];
    for (address, word) in words.iter().enumerate() {
        engine
            .load_microcode_word(address as u16, *word)
            .expect("in range");
    }
    engine.alu.set_register(0, 0x0001);
    engine.alu.set_register(1, 0x00FE);
    engine.wake_task(TaskId::Kernel);

    let mut bus = FixedBus;
    let mut pump = IdlePump;
    engine
        .advance(5_000, &mut bus, &mut pump)
        .expect("workload microcode is valid");

    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    let state = &engine.state;
    hash_bytes(&mut hash, &state.cycle_count.to_le_bytes());
    hash_bytes(&mut hash, &[state.current_task.index() as u8, state.cycle, state.click_phase]);
    for task in &state.tasks {
        hash_bytes(&mut hash, &task.tpc.to_le_bytes());
        hash_bytes(&mut hash, &[task.condition, u8::from(task.wake)]);
    }
    for word in state.su.iter() {
        hash_bytes(&mut hash, &word.to_le_bytes());
    }
    hash_bytes(&mut hash, &state.byte_registers);
    hash_bytes(&mut hash, &state.links);
    hash_bytes(
        &mut hash,
        &[
            state.stack_pointer,
            state.condition,
            u8::from(state.toggle),
            state.error.signaled_bits(),
        ],
    );
    for index in 0..16u8 {
        hash_bytes(&mut hash, &engine.alu.register(index).to_le_bytes());
    }
    hash_bytes(&mut hash, &engine.alu.q().to_le_bytes());

    format!("{hash:016x}")
}

fn main() {
    println!("{}", fingerprint());
}
