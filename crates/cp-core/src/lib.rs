//! Cycle-accurate microcode execution core for a microprogrammed bit-slice
//! workstation central processor.
//!
//! The crate models the machine's hardest layer bit-for-bit: the 16-bit
//! bit-slice ALU with its nibble carry network, the 48-bit microinstruction
//! decoder, and the per-cycle execution engine with its cooperative
//! eight-task click scheduler, instruction-buffer dispatch protocol, and
//! error-trap subsystem. Everything outside the core — memory, device
//! controllers, the I/O processor — is reached through the narrow
//! [`SystemBus`] trait.

/// Raw 48-bit control-word model, field planes, and the port byte image.
pub mod microword;
pub use microword::{
    assemble_word, AluDestination, AluFunction, AluSourcePair, MicrocodeWord, StatusSource,
    XFunction, YFunction, ZFunction, CONTROL_STORE_WORDS, PORT_TRANSACTIONS,
};

/// Hardware task identities, contexts, and the click phase pattern.
pub mod tasks;
pub use tasks::{click_phase_task, TaskContext, TaskId, CLICK_PHASES, TASK_COUNT};

/// Trap taxonomy and the accumulating error register.
pub mod trap;
pub use trap::{ErrorRegister, TrapCause};

/// Instruction buffer state machine.
pub mod ib;
pub use ib::{IbPointer, InstructionBuffer};

/// Bit-slice ALU: register file, Q, carry network, fast/accurate paths.
pub mod alu;
pub use alu::{AluFlags, AluOutput, AluUnit, ALU_REGISTER_COUNT};

/// Pure, total microinstruction decode with precomputed predicates.
pub mod decoder;
pub use decoder::{decode, BusSource, DecodedInstruction, DeviceWrite, StackOp};

/// Writable control store and its decode cache.
pub mod store;
pub use store::{ControlStore, PortError};

/// The single owned hardware-state object.
pub mod state;
pub use state::{
    ProcessorState, BYTE_REGISTER_COUNT, LINK_REGISTER_COUNT, STACK_ENTRIES, SU_WORDS,
};

/// Host-facing contracts: system bus, scheduler pump, configuration.
pub mod bus;
pub use bus::{AluPath, CpConfig, CycleRecord, IdlePump, SchedulerPump, SystemBus};

/// Execution engine and task scheduler.
pub mod engine;
pub use engine::{Engine, EngineError};

/// Microcode disassembly for debuggers and diagnostics.
pub mod disasm;
pub use disasm::{disassemble_window, disassemble_word, MicrocodeRow};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
