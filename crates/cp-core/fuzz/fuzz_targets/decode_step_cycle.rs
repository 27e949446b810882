#![no_main]

use cp_core::{decode, CpConfig, Engine, MicrocodeWord, SystemBus, TaskId};
use libfuzzer_sys::fuzz_target;

#[derive(Default)]
struct QuietBus;

impl SystemBus for QuietBus {
    fn load_address_register(&mut self, _value: u16, _mapped: bool) {}
    fn load_data_register(&mut self, _value: u16) {}
    fn read_data_register(&mut self, _task: TaskId) -> (u16, bool) {
        (0xA55A, true)
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

fuzz_target!(|data: &[u8]| {
    if data.len() < 6 {
        return;
    }

    // Decode is total: any 48-bit pattern must produce an instruction.
    let mut raw = 0u64;
    for byte in &data[..6] {
        raw = (raw << 8) | u64::from(*byte);
    }
    let word = MicrocodeWord::new(raw);
    let _ = decode(word);

    // Stepping over arbitrary control words must never panic: reserved
    // encodings surface as InvalidDecode, everything else executes.
    let mut engine = Engine::new(CpConfig::default());
    for (address, chunk) in data.chunks_exact(6).take(16).enumerate() {
        let mut raw = 0u64;
        for byte in chunk {
            raw = (raw << 8) | u64::from(*byte);
        }
        let _ = engine.load_microcode_word(address as u16, MicrocodeWord::new(raw));
    }
    engine.wake_task(TaskId::Kernel);

    let mut bus = QuietBus;
    for _ in 0..64 {
        if engine.step_cycle(&mut bus).is_err() {
            break;
        }
    }
});
