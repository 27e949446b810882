//! Microinstruction decoder.
//!
//! `decode` is pure and total: every 48-bit pattern produces a
//! `DecodedInstruction`. All per-cycle dispatch decisions that can be made
//! from the word alone are made here, once, so the execution engine never
//! re-derives bitfield logic on the hot path. Unassigned plane codes decode
//! to reserved markers; executing one is a host-level `InvalidDecode` error,
//! not a modeled trap.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::similar_names,
    unknown_lints
)]

use crate::microword::{
    wake_task_select, AluDestination, AluFunction, AluSourcePair, MicrocodeWord, StatusSource,
    XFunction, YFunction, ZFunction,
};
use crate::tasks::TaskId;

/// Stack operation classification, folded from the three independent
/// push/pop encodings (X push, X pop, Z pop).
///
/// Coding both pop encodings changes only the boundary test performed — a
/// two-deep underflow check — never the pointer delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StackOp {
    /// No stack activity.
    #[default]
    None,
    /// Pointer +1 with overflow test.
    Push,
    /// Pointer −1 with underflow test.
    Pop,
    /// Pointer −1 with double-underflow test.
    PopDoubleTest,
    /// Pointer loaded directly from the ALU output low nibble.
    Load,
}

/// Resolved external-bus input source for cycles that are not the cycle-3
/// leg of a memory operation (where memory data always drives the bus).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusSource {
    /// Nothing drives the bus; it reads as zero.
    #[default]
    Idle,
    /// Synthesized 8-bit literal.
    Literal(u8),
    /// One of the ten rA-selected status/data reads.
    Status(StatusSource),
    /// SU entry addressed by rB:rA (the eleventh bus-read form).
    URegister,
    /// Byte-swapped R\[a\].
    RotateRa,
}

/// Device-write targets of the Y plane's last group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceWrite {
    /// Disk controller control byte.
    Disk,
    /// Ethernet controller control byte.
    Ethernet,
    /// Display controller control byte.
    Display,
    /// IOP interchange byte register selected by rB.
    ByteRegister,
}

/// Immutable decoded view of one control word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct DecodedInstruction {
    /// The raw word this view was decoded from.
    pub word: MicrocodeWord,
    /// A register select.
    pub ra: u8,
    /// B register select.
    pub rb: u8,
    /// ALU operand-pair selection.
    pub source: AluSourcePair,
    /// ALU function.
    pub function: AluFunction,
    /// ALU destination/shift code.
    pub destination: AluDestination,
    /// Raw carry-in bit.
    pub carry_in: bool,
    /// SU-file write enable.
    pub su_write_enable: bool,
    /// Memory-operation flag.
    pub mem_op: bool,
    /// Decoded X-plane function.
    pub x_fn: XFunction,
    /// Decoded Y-plane function.
    pub y_fn: YFunction,
    /// Decoded Z-plane function.
    pub z_fn: ZFunction,
    /// 12-bit literal next-address field.
    pub nia: u16,

    /// Destination is one of the four shift codes.
    pub is_shift: bool,
    /// Destination is a Q-chained double shift.
    pub is_double_shift: bool,
    /// Shift direction is left.
    pub shift_left: bool,
    /// Shift is end-around (Cycle) rather than zero-filling.
    pub is_cycle: bool,
    /// Folded stack operation.
    pub stack_op: StackOp,
    /// SU accesses use the stack pointer instead of rB:rA.
    pub stack_addressed: bool,
    /// Call/return link selector, when one of the link X codes is present.
    pub link_index: Option<u8>,
    /// Synthesized 8-bit constant; byte mode wins over nibble mode.
    pub literal: Option<u8>,
    /// Resolved bus-input source.
    pub bus_source: BusSource,
    /// The operand pair consumes the external-bus input.
    pub needs_bus_input: bool,
    /// Cycle-1 address load goes through the map.
    pub mapped_address: bool,
    /// Cycle-3 memory data also loads the instruction buffer.
    pub ib_load: bool,
    /// Instruction-buffer dispatch requested.
    pub ib_dispatch: bool,
    /// IB dispatch proceeds even when the buffer is not Full.
    pub dispatch_override: bool,
    /// Effective carry-in comes from the toggle register. Only honored when
    /// the raw carry bit is already 1.
    pub carry_from_toggle: bool,
    /// Kernel exit signal (cycle 1, Kernel only).
    pub kernel_exit: bool,
    /// Clears the error register.
    pub error_clear: bool,
    /// Inverts the toggle register.
    pub toggle_flip: bool,
    /// Clears the toggle register.
    pub toggle_clear: bool,
    /// Clears the current task's wake flag.
    pub sleep_self: bool,
    /// Sets the wake flag of the selected task.
    pub wake_task: Option<TaskId>,
    /// Device-write target.
    pub device_write: Option<DeviceWrite>,
    /// Low bit of the raw function code; the page-cross XOR term.
    pub function_odd: bool,
    /// Unassigned plane code or status select present in the word.
    pub reserved_code: Option<u8>,
}

/// Decodes one control word.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn decode(word: MicrocodeWord) -> DecodedInstruction {
    let ra = word.ra();
    let rb = word.rb();
    let source = AluSourcePair::from_u3(word.a_s());
    let function = AluFunction::from_u3(word.a_f());
    let destination = AluDestination::from_u3(word.a_d());
    let x_fn = XFunction::from_u4(word.f_x());
    let y_fn = YFunction::from_u4(word.f_y());
    let z_fn = ZFunction::from_u4(word.f_z());

    let x_pop = matches!(x_fn, XFunction::Pop);
    let z_pop = matches!(z_fn, ZFunction::Pop);
    let stack_op = match (x_fn, x_pop, z_pop) {
        (XFunction::Push, _, _) => StackOp::Push,
        (XFunction::LoadStackPointer, _, _) => StackOp::Load,
        (_, true, true) => StackOp::PopDoubleTest,
        (_, true, false) | (_, false, true) => StackOp::Pop,
        _ => StackOp::None,
    };

    let link_index = match x_fn {
        XFunction::Link(index) => Some(index),
        _ => None,
    };

    // Byte-mode literal wins over nibble-mode when both are coded.
    let literal = if matches!(y_fn, YFunction::LiteralByte) {
        Some((ra << 4) | rb)
    } else if matches!(z_fn, ZFunction::LiteralNibble) {
        Some(rb)
    } else {
        None
    };

    let mut reserved_code = None;
    let bus_source = if let Some(value) = literal {
        BusSource::Literal(value)
    } else {
        match z_fn {
            ZFunction::StatusRead => match StatusSource::from_u4(ra) {
                Some(status) => BusSource::Status(status),
                None => {
                    reserved_code = Some(ra);
                    BusSource::Idle
                }
            },
            ZFunction::RotateRa => BusSource::RotateRa,
            ZFunction::ReadURegister => BusSource::URegister,
            ZFunction::Reserved(code) => {
                reserved_code = Some(code);
                BusSource::Idle
            }
            _ => BusSource::Idle,
        }
    };
    if let ZFunction::Reserved(code) = z_fn {
        reserved_code = Some(code);
    }

    let device_write = match y_fn {
        YFunction::DiskControl => Some(DeviceWrite::Disk),
        YFunction::EthernetControl => Some(DeviceWrite::Ethernet),
        YFunction::DisplayControl => Some(DeviceWrite::Display),
        YFunction::ByteRegister => Some(DeviceWrite::ByteRegister),
        _ => None,
    };

    let is_shift = destination.is_shift();

    DecodedInstruction {
        word,
        ra,
        rb,
        source,
        function,
        destination,
        carry_in: word.cin(),
        su_write_enable: word.en_su(),
        mem_op: word.mem(),
        x_fn,
        y_fn,
        z_fn,
        nia: word.nia(),
        is_shift,
        is_double_shift: matches!(
            destination,
            AluDestination::ShiftRightDouble | AluDestination::ShiftLeftDouble
        ),
        shift_left: matches!(
            destination,
            AluDestination::ShiftLeftDouble | AluDestination::ShiftLeft
        ),
        is_cycle: is_shift && word.cyc(),
        stack_op,
        stack_addressed: !matches!(stack_op, StackOp::None),
        link_index,
        literal,
        bus_source,
        needs_bus_input: source.uses_bus_input(),
        mapped_address: matches!(z_fn, ZFunction::MapAddressLoad),
        ib_load: matches!(z_fn, ZFunction::IbLoad),
        ib_dispatch: matches!(y_fn, YFunction::IbDispatch),
        dispatch_override: matches!(z_fn, ZFunction::DispatchOverride),
        carry_from_toggle: matches!(z_fn, ZFunction::CarryFromToggle) && word.cin(),
        kernel_exit: matches!(x_fn, XFunction::KernelExit),
        error_clear: matches!(x_fn, XFunction::ErrorClear),
        toggle_flip: matches!(x_fn, XFunction::ToggleFlip),
        toggle_clear: matches!(x_fn, XFunction::ToggleClear),
        sleep_self: matches!(y_fn, YFunction::SleepSelf),
        wake_task: if matches!(y_fn, YFunction::WakeTask) {
            Some(wake_task_select(ra))
        } else {
            None
        },
        device_write,
        function_odd: word.a_f() & 1 != 0,
        reserved_code,
    }
}
