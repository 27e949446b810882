//! Performance harness for the microcode engine.
//!
//! Measures cycle throughput of the hot stepping loop; the engine targets
//! multiple millions of emulated cycles per second on a single host core.
//!
//! ```sh
//! cargo run -p cp-core --example performance_harness
//! ```

#![allow(clippy::pedantic, clippy::nursery)]

use cp_core::{assemble_word, AluPath, CpConfig, Engine, SystemBus, TaskId};
use log as _;
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

use std::time::{Duration, Instant};

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

fn engine_with_loop(alu_path: AluPath) -> Engine {
    let mut engine = Engine::new(CpConfig {
        display_enabled: true,
        alu_path,
    });
    // A four-word arithmetic loop exercising adds, shifts, and branches.
    let words = [
        assemble_word(0, 1, 1, 0, 3, true, false, false, 0, 0, 0, false, 0x001),
        assemble_word(1, 2, 1, 1, 5, false, false, false, 0, 4, 0, false, 0x002),
        assemble_word(2, 3, 0, 6, 0, false, false, false, 0, 0, 0, false, 0x003),
        assemble_word(3, 0, 1, 0, 3, false, false, false, 0, 6, 0, false, 0x000),
    ];
    for (address, word) in words.iter().enumerate() {
        engine
            .load_microcode_word(address as u16, *word)
            .expect("in range");
    }
    engine.alu.set_register(0, 0x1234);
    engine.alu.set_register(1, 0x0101);
    engine.wake_task(TaskId::Kernel);
    engine
}

fn benchmark(name: &str, alu_path: AluPath, duration: Duration) {
    let mut engine = engine_with_loop(alu_path);
    let mut bus = QuietBus;

    let start = Instant::now();
    let mut cycles = 0u64;
    while start.elapsed() < duration {
        for _ in 0..10_000 {
            engine.step_cycle(&mut bus).expect("benchmark microcode is valid");
        }
        cycles += 10_000;
    }

    let rate = cycles as f64 / start.elapsed().as_secs_f64();
    println!("{name:>16}: {:.2}M cycles/sec ({cycles} cycles)", rate / 1_000_000.0);
}

fn main() {
    let warmup = Duration::from_millis(300);
    let duration = Duration::from_secs(3);

    println!("warming up for {warmup:?}...");
    benchmark("warmup", AluPath::Accurate, warmup);

    println!("running {duration:?} per path...");
    benchmark("accurate flags", AluPath::Accurate, duration);
    benchmark("fast flags", AluPath::Fast, duration);
}
