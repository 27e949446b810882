//! Hardware task identities, per-task contexts, and the 5-phase click pattern.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::similar_names,
    unknown_lints
)]

/// Number of cooperative hardware tasks sharing the ALU and register file.
pub const TASK_COUNT: usize = 8;

/// Number of phases in one click round.
pub const CLICK_PHASES: usize = 5;

/// The eight hardware tasks, in priority-register order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum TaskId {
    /// Macro-instruction emulator; the fallback task for every click.
    Emulator = 0,
    /// Display word fetch.
    Display = 1,
    /// Ethernet transmit/receive service.
    Ethernet = 2,
    /// Memory refresh (runs in the display phase when output is disabled).
    Refresh = 3,
    /// Disk word service.
    Disk = 4,
    /// I/O processor exchange.
    Iop = 5,
    /// I/O processor control-store access service.
    IopControlStore = 6,
    /// Kernel; retains the processor until it signals exit.
    Kernel = 7,
}

impl TaskId {
    /// Ordered list of all tasks.
    pub const ALL: [Self; TASK_COUNT] = [
        Self::Emulator,
        Self::Display,
        Self::Ethernet,
        Self::Refresh,
        Self::Disk,
        Self::Iop,
        Self::IopControlStore,
        Self::Kernel,
    ];

    /// Returns the array index for this task (`0..=7`).
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Decodes a 3-bit task select. Total over `0..=7`.
    #[must_use]
    pub const fn from_u3(bits: u8) -> Self {
        match bits & 0x7 {
            0 => Self::Emulator,
            1 => Self::Display,
            2 => Self::Ethernet,
            3 => Self::Refresh,
            4 => Self::Disk,
            5 => Self::Iop,
            6 => Self::IopControlStore,
            _ => Self::Kernel,
        }
    }
}

/// The task considered for a switch at each click phase.
///
/// Four phases map to fixed tasks; the remaining phase resolves to Display
/// or Refresh depending on whether display output is enabled.
#[must_use]
pub const fn click_phase_task(phase: usize, display_enabled: bool) -> TaskId {
    match phase % CLICK_PHASES {
        0 | 2 => TaskId::Ethernet,
        1 => TaskId::Disk,
        3 => {
            if display_enabled {
                TaskId::Display
            } else {
                TaskId::Refresh
            }
        }
        _ => TaskId::Iop,
    }
}

/// Per-task saved execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TaskContext {
    /// 12-bit task program counter.
    pub tpc: u16,
    /// 4-bit saved condition/modifier register.
    pub condition: u8,
    /// Wake flag; a sleeping task is skipped by the click switch rule.
    pub wake: bool,
}

impl TaskContext {
    /// Writes the high port byte: condition nibble plus TPC bits 8..=11.
    pub const fn load_pc_high(&mut self, byte: u8) {
        self.condition = (byte >> 4) & 0xF;
        self.tpc = (self.tpc & 0x0FF) | (((byte & 0xF) as u16) << 8);
    }

    /// Writes the low port byte: TPC bits 0..=7.
    pub const fn load_pc_low(&mut self, byte: u8) {
        self.tpc = (self.tpc & 0xF00) | byte as u16;
    }

    /// Reads the high port byte: condition nibble plus TPC bits 8..=11.
    #[must_use]
    pub const fn read_pc_high(&self) -> u8 {
        (self.condition << 4) | ((self.tpc >> 8) & 0xF) as u8
    }

    /// Reads the low port byte: TPC bits 0..=7.
    #[must_use]
    pub const fn read_pc_low(&self) -> u8 {
        (self.tpc & 0xFF) as u8
    }
}
