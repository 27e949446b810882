//! The single owned hardware-state object threaded through the engine.
//!
//! Everything the original machine kept in scattered global registers lives
//! here explicitly, so the engine stays testable and reentrant-safe.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::similar_names,
    unknown_lints
)]

use crate::ib::InstructionBuffer;
use crate::tasks::{TaskContext, TaskId, TASK_COUNT};
use crate::trap::ErrorRegister;

/// Words in the SU register file.
pub const SU_WORDS: usize = 256;

/// SU entries that double as the hardware stack.
pub const STACK_ENTRIES: u8 = 16;

/// Number of byte-wide IOP interchange registers.
pub const BYTE_REGISTER_COUNT: usize = 16;

/// Number of 4-bit call/return link registers.
pub const LINK_REGISTER_COUNT: usize = 8;

/// Complete per-processor and per-task mutable state.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(clippy::struct_excessive_bools)]
pub struct ProcessorState {
    /// The task whose microcode executes this click.
    pub current_task: TaskId,
    /// Sub-instruction cycle index, 1..=3.
    pub cycle: u8,
    /// Click phase index, 0..=4.
    pub click_phase: u8,
    /// Saved context per task.
    pub tasks: [TaskContext; TASK_COUNT],
    /// 256-word SU register file; entries 0..=15 are the stack.
    pub su: Box<[u16]>,
    /// Byte-wide IOP interchange registers.
    pub byte_registers: [u8; BYTE_REGISTER_COUNT],
    /// 4-bit link registers.
    pub links: [u8; LINK_REGISTER_COUNT],
    /// Instruction buffer.
    pub ib: InstructionBuffer,
    /// The 1-bit toggle register (flips on IB byte consumption).
    pub toggle: bool,
    /// 4-bit stack pointer into the SU file.
    pub stack_pointer: u8,
    /// Live 4-bit condition/modifier of the current task; deferred dispatch
    /// bits land here and are consumed by the next cycle's address merge.
    pub condition: u8,
    /// Accumulating error-code register and trap countdown.
    pub error: ErrorRegister,
    /// Kernel has signaled exit for the upcoming click boundary.
    pub kernel_exit_armed: bool,
    /// A macro-instruction interrupt is pending (refill-trap steering).
    pub macro_interrupt: bool,
    /// A cycle-1 page cross canceled this click's eligible data load.
    pub cancel_data_load: bool,
    /// A cycle-1 IB peek at Empty canceled this click's data load.
    pub ib_empty_latched: bool,
    /// Deferred link-register write, visible from the next cycle.
    pub pending_link: Option<(u8, u8)>,
    /// Power-on latch: the processor idles until a task is woken.
    pub waiting: bool,
    /// Total cycles executed since reset.
    pub cycle_count: u64,
}

impl Default for ProcessorState {
    fn default() -> Self {
        Self {
            current_task: TaskId::Kernel,
            cycle: 1,
            click_phase: 0,
            tasks: [TaskContext::default(); TASK_COUNT],
            su: vec![0; SU_WORDS].into_boxed_slice(),
            byte_registers: [0; BYTE_REGISTER_COUNT],
            links: [0; LINK_REGISTER_COUNT],
            ib: InstructionBuffer::default(),
            toggle: false,
            stack_pointer: 0,
            condition: 0,
            error: ErrorRegister::default(),
            kernel_exit_armed: false,
            macro_interrupt: false,
            cancel_data_load: false,
            ib_empty_latched: false,
            pending_link: None,
            waiting: true,
            cycle_count: 0,
        }
    }
}

impl ProcessorState {
    /// Applies power-on reset semantics: everything zeroed, Kernel current,
    /// processor latched waiting to be woken.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// SU address used by stack-addressed accesses.
    #[must_use]
    pub const fn stack_address(&self) -> usize {
        (self.stack_pointer & 0xF) as usize
    }

    /// SU address used by U-register accesses (rB:rA).
    #[must_use]
    pub const fn u_address(ra: u8, rb: u8) -> usize {
        (((rb & 0xF) as usize) << 4) | ((ra & 0xF) as usize)
    }

    /// Saves the live condition into the current task and restores the next
    /// task's context.
    pub fn switch_to(&mut self, next: TaskId) {
        let current = self.current_task;
        self.tasks[current.index()].condition = self.condition & 0xF;
        self.condition = self.tasks[next.index()].condition & 0xF;
        self.current_task = next;
    }
}
