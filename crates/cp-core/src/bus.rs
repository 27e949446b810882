//! Host-facing contracts: the synchronous system bus the pipeline calls
//! into, the per-cycle scheduler pump, and engine configuration.

use crate::alu::AluFlags;
use crate::tasks::TaskId;

/// Narrow synchronous interface to everything outside the core: the memory
/// system, the device controllers, and the I/O processor's data path.
///
/// Every method is called directly from a pipeline step of the current
/// cycle; implementations must be cheap and must not call back into the
/// engine.
pub trait SystemBus {
    /// Cycle-1 address-register load. `mapped` is set when the address goes
    /// through the map (the page-cross-eligible form).
    fn load_address_register(&mut self, value: u16, mapped: bool);

    /// Cycle-2 data-register load.
    fn load_data_register(&mut self, value: u16);

    /// Cycle-3 data-register read for a task. The flag reports validity; an
    /// invalid read raises the memory-fault trap inside the engine.
    fn read_data_register(&mut self, task: TaskId) -> (u16, bool);

    /// Disk controller status byte.
    fn disk_status(&mut self) -> u8;
    /// Disk controller data byte.
    fn disk_data(&mut self) -> u8;
    /// Ethernet controller status byte.
    fn ethernet_status(&mut self) -> u8;
    /// Ethernet controller data byte.
    fn ethernet_data(&mut self) -> u8;
    /// Display FIFO byte.
    fn display_fifo(&mut self) -> u8;
    /// Memory controller status byte.
    fn memory_status(&mut self) -> u8;
    /// I/O processor data byte.
    fn iop_data(&mut self) -> u8;

    /// Device dispatch nibble ORed into the address modifier.
    fn device_dispatch(&mut self) -> u8;

    /// Disk controller control-byte write.
    fn disk_control(&mut self, value: u8);
    /// Ethernet controller control-byte write.
    fn ethernet_control(&mut self, value: u8);
    /// Display controller control-byte write.
    fn display_control(&mut self, value: u8);
}

/// Once-per-cycle callout for unrelated timer-driven subsystems.
///
/// The engine invokes this exactly once before each cycle it attempts;
/// implementations must be cheap and must never re-enter the engine.
pub trait SchedulerPump {
    /// Called once per emulated cycle.
    fn pump(&mut self);
}

/// A pump that does nothing; useful for hosts driving the engine directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdlePump;

impl SchedulerPump for IdlePump {
    fn pump(&mut self) {}
}

/// ALU flag-path selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AluPath {
    /// Carry-network flags for every function. The default: dispatch
    /// microcode is known to inspect flags after logical functions.
    #[default]
    Accurate,
    /// Host-width flags, accurate for arithmetic functions only.
    Fast,
}

/// Engine configuration fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CpConfig {
    /// Display output enabled: steers the display click phase between the
    /// Display and Refresh tasks.
    pub display_enabled: bool,
    /// ALU flag-path selection.
    pub alu_path: AluPath,
}

impl Default for CpConfig {
    fn default() -> Self {
        Self {
            display_enabled: true,
            alu_path: AluPath::Accurate,
        }
    }
}

/// Per-cycle record returned by the stepping API; the deterministic trace
/// unit for hosts that want one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleRecord {
    /// False when the processor is still latched waiting at power-on.
    pub executed: bool,
    /// Task that executed the cycle.
    pub task: TaskId,
    /// Cycle index executed, 1..=3.
    pub cycle: u8,
    /// TPC the instruction was fetched from.
    pub tpc: u16,
    /// Next instruction address written back to the task.
    pub nia: u16,
    /// ALU output-bus value.
    pub output: u16,
    /// ALU flag outputs of the cycle.
    pub flags: AluFlags,
}
