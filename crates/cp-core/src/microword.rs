//! Raw 48-bit microcode word model: field extraction, plane tables, and the
//! byte-wide port image used by the external I/O processor.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::similar_names,
    unknown_lints
)]

use crate::tasks::TaskId;

/// Number of words in the writable control store.
pub const CONTROL_STORE_WORDS: usize = 4096;

/// Number of byte-wide port transactions needed to move one word.
pub const PORT_TRANSACTIONS: usize = 6;

/// Mask covering the 48 architecturally defined bits of a control word.
pub const WORD_MASK: u64 = 0xFFFF_FFFF_FFFF;

/// Bit shifts of the word slice carried by each port transaction.
///
/// The I/O processor moves the low half of the word first, high byte first
/// within each half, so the field image is deliberately not MSB-to-LSB in
/// transaction order.
pub const PORT_TRANSACTION_SHIFTS: [u32; PORT_TRANSACTIONS] = [16, 8, 0, 40, 32, 24];

/// One 48-bit microcode control word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MicrocodeWord(u64);

impl MicrocodeWord {
    /// Wraps a raw value, discarding anything above bit 47.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw & WORD_MASK)
    }

    /// Returns the raw 48-bit value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// A register select, bits 47..=44.
    #[must_use]
    pub const fn ra(self) -> u8 {
        ((self.0 >> 44) & 0xF) as u8
    }

    /// B register select, bits 43..=40.
    #[must_use]
    pub const fn rb(self) -> u8 {
        ((self.0 >> 40) & 0xF) as u8
    }

    /// ALU source-pair select, bits 39..=37.
    #[must_use]
    pub const fn a_s(self) -> u8 {
        ((self.0 >> 37) & 0x7) as u8
    }

    /// ALU function select, bits 36..=34.
    #[must_use]
    pub const fn a_f(self) -> u8 {
        ((self.0 >> 34) & 0x7) as u8
    }

    /// ALU destination/shift code, bits 33..=31.
    #[must_use]
    pub const fn a_d(self) -> u8 {
        ((self.0 >> 31) & 0x7) as u8
    }

    /// Even-parity bit, bit 30. Modeled for diagnostics only.
    #[must_use]
    pub const fn ep(self) -> bool {
        (self.0 >> 30) & 1 != 0
    }

    /// Raw ALU carry-in, bit 29.
    #[must_use]
    pub const fn cin(self) -> bool {
        (self.0 >> 29) & 1 != 0
    }

    /// SU-file write enable, bit 28.
    #[must_use]
    pub const fn en_su(self) -> bool {
        (self.0 >> 28) & 1 != 0
    }

    /// Memory-operation flag, bit 27. Its meaning depends on the cycle index.
    #[must_use]
    pub const fn mem(self) -> bool {
        (self.0 >> 27) & 1 != 0
    }

    /// X function plane, bits 26..=23.
    #[must_use]
    pub const fn f_x(self) -> u8 {
        ((self.0 >> 23) & 0xF) as u8
    }

    /// Y function plane, bits 22..=19.
    #[must_use]
    pub const fn f_y(self) -> u8 {
        ((self.0 >> 19) & 0xF) as u8
    }

    /// Z function plane, bits 18..=15.
    #[must_use]
    pub const fn f_z(self) -> u8 {
        ((self.0 >> 15) & 0xF) as u8
    }

    /// Cycle-vs-Shift select for the shift destinations, bit 14.
    #[must_use]
    pub const fn cyc(self) -> bool {
        (self.0 >> 14) & 1 != 0
    }

    /// Literal next-instruction-address field, bits 11..=0.
    #[must_use]
    pub const fn nia(self) -> u16 {
        (self.0 & 0xFFF) as u16
    }

    /// True when the word (including `ep`) has even parity.
    #[must_use]
    pub const fn has_even_parity(self) -> bool {
        self.0.count_ones() % 2 == 0
    }

    /// Returns the word with `ep` adjusted so the whole word has even parity.
    #[must_use]
    pub const fn with_even_parity(self) -> Self {
        let without = self.0 & !(1 << 30);
        if without.count_ones() % 2 == 0 {
            Self(without)
        } else {
            Self(without | (1 << 30))
        }
    }

    /// Extracts the byte carried by one port transaction.
    #[must_use]
    pub const fn port_byte(self, transaction: usize) -> u8 {
        ((self.0 >> PORT_TRANSACTION_SHIFTS[transaction]) & 0xFF) as u8
    }

    /// Returns the word with one port-transaction byte replaced.
    #[must_use]
    pub const fn with_port_byte(self, transaction: usize, byte: u8) -> Self {
        let shift = PORT_TRANSACTION_SHIFTS[transaction];
        Self((self.0 & !(0xFF << shift)) | ((byte as u64) << shift))
    }
}

/// ALU operand-pair selections, in hardware encoding order.
///
/// `D` is the external-bus input; `Z` is the constant zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum AluSourcePair {
    /// {R\[a\], Q}
    Aq,
    /// {R\[a\], R\[b\]}
    Ab,
    /// {0, Q}
    Zq,
    /// {0, R\[b\]}
    Zb,
    /// {0, R\[a\]}
    Za,
    /// {D, R\[a\]}
    Da,
    /// {D, Q}
    Dq,
    /// {D, 0}
    Dz,
}

impl AluSourcePair {
    /// Decodes the 3-bit source-pair field. Total over `0..=7`.
    #[must_use]
    pub const fn from_u3(bits: u8) -> Self {
        match bits & 0x7 {
            0 => Self::Aq,
            1 => Self::Ab,
            2 => Self::Zq,
            3 => Self::Zb,
            4 => Self::Za,
            5 => Self::Da,
            6 => Self::Dq,
            _ => Self::Dz,
        }
    }

    /// True when the pair consumes the external-bus input `D`.
    #[must_use]
    pub const fn uses_bus_input(self) -> bool {
        matches!(self, Self::Da | Self::Dq | Self::Dz)
    }
}

/// ALU functions, in hardware encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AluFunction {
    /// R + S
    RPlusS,
    /// S − R
    SMinusR,
    /// R − S
    RMinusS,
    /// R | S
    ROrS,
    /// R & S
    RAndS,
    /// ~R & S
    NotRAndS,
    /// R ^ S
    RXorS,
    /// ~(R ^ S)
    RXnorS,
}

impl AluFunction {
    /// Decodes the 3-bit function field. Total over `0..=7`.
    #[must_use]
    pub const fn from_u3(bits: u8) -> Self {
        match bits & 0x7 {
            0 => Self::RPlusS,
            1 => Self::SMinusR,
            2 => Self::RMinusS,
            3 => Self::ROrS,
            4 => Self::RAndS,
            5 => Self::NotRAndS,
            6 => Self::RXorS,
            _ => Self::RXnorS,
        }
    }

    /// True for the three adder-based functions.
    #[must_use]
    pub const fn is_arithmetic(self) -> bool {
        matches!(self, Self::RPlusS | Self::SMinusR | Self::RMinusS)
    }

    /// The function actually applied to the top byte during an address load:
    /// the low 2 bits of the code are forced to 3.
    #[must_use]
    pub const fn address_load_forced(self) -> Self {
        match self {
            Self::RPlusS | Self::SMinusR | Self::RMinusS | Self::ROrS => Self::ROrS,
            Self::RAndS | Self::NotRAndS | Self::RXorS | Self::RXnorS => Self::RXnorS,
        }
    }
}

/// ALU destination/shift codes, in hardware encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AluDestination {
    /// Write Q; result on the output bus.
    WriteQ,
    /// No register write; result on the output bus.
    NoWrite,
    /// Write R\[b\]; the *prior* R\[a\] value on the output bus.
    WriteBExposeA,
    /// Write R\[b\]; result on the output bus.
    WriteB,
    /// Double-word (Q-chained) right shift/rotate into R\[b\] and Q.
    ShiftRightDouble,
    /// Single-word right shift/rotate into R\[b\].
    ShiftRight,
    /// Double-word (Q-chained) left shift/rotate into R\[b\] and Q.
    ShiftLeftDouble,
    /// Single-word left shift/rotate into R\[b\].
    ShiftLeft,
}

impl AluDestination {
    /// Decodes the 3-bit destination field. Total over `0..=7`.
    #[must_use]
    pub const fn from_u3(bits: u8) -> Self {
        match bits & 0x7 {
            0 => Self::WriteQ,
            1 => Self::NoWrite,
            2 => Self::WriteBExposeA,
            3 => Self::WriteB,
            4 => Self::ShiftRightDouble,
            5 => Self::ShiftRight,
            6 => Self::ShiftLeftDouble,
            _ => Self::ShiftLeft,
        }
    }

    /// True for the four shift/rotate destinations.
    #[must_use]
    pub const fn is_shift(self) -> bool {
        matches!(
            self,
            Self::ShiftRightDouble | Self::ShiftRight | Self::ShiftLeftDouble | Self::ShiftLeft
        )
    }
}

/// X-plane functions: stack controls, kernel/error controls, toggle controls,
/// and the eight call/return link selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XFunction {
    /// No X-plane action.
    Noop,
    /// Push one stack entry.
    Push,
    /// Pop one stack entry.
    Pop,
    /// Load the stack pointer from the ALU output low nibble.
    LoadStackPointer,
    /// Kernel signals click-boundary exit (honored during cycle 1 only).
    KernelExit,
    /// Clear the error-code register.
    ErrorClear,
    /// Invert the 1-bit toggle register.
    ToggleFlip,
    /// Clear the 1-bit toggle register.
    ToggleClear,
    /// Call/return link selector.
    Link(u8),
}

impl XFunction {
    /// Decodes the 4-bit X-plane field. Total over `0..=15`.
    #[must_use]
    pub const fn from_u4(bits: u8) -> Self {
        match bits & 0xF {
            0 => Self::Noop,
            1 => Self::Push,
            2 => Self::Pop,
            3 => Self::LoadStackPointer,
            4 => Self::KernelExit,
            5 => Self::ErrorClear,
            6 => Self::ToggleFlip,
            7 => Self::ToggleClear,
            code => Self::Link(code & 0x7),
        }
    }
}

/// Y-plane functions: control operations, branch/dispatch evaluation, and
/// device writes, in three contiguous groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum YFunction {
    /// No Y-plane action.
    Noop,
    /// Byte-mode literal: the bus constant is rA:rB.
    LiteralByte,
    /// Clear the current task's wake flag.
    SleepSelf,
    /// Set the wake flag of the task selected by rA.
    WakeTask,
    /// OR 1 into the modifier when the ALU zero flag is set.
    ZeroBranch,
    /// OR 1 into the modifier when the ALU negative flag is set.
    NegBranch,
    /// OR 1 into the modifier when the ALU carry-out flag is set.
    CarryBranch,
    /// OR 1 into the modifier when the ALU overflow flag is set.
    OverflowBranch,
    /// OR the bus low nibble into the modifier.
    BusNibbleLow,
    /// OR the bus high nibble (of the low byte) into the modifier.
    BusNibbleHigh,
    /// OR the external device dispatch nibble into the modifier.
    DeviceDispatch,
    /// Consume an instruction-buffer byte and dispatch on it.
    IbDispatch,
    /// Write the ALU output low byte to the disk controller.
    DiskControl,
    /// Write the ALU output low byte to the ethernet controller.
    EthernetControl,
    /// Write the ALU output low byte to the display controller.
    DisplayControl,
    /// Write the ALU output low byte to the byte register selected by rB.
    ByteRegister,
}

impl YFunction {
    /// Decodes the 4-bit Y-plane field. Total over `0..=15`.
    #[must_use]
    pub const fn from_u4(bits: u8) -> Self {
        match bits & 0xF {
            0 => Self::Noop,
            1 => Self::LiteralByte,
            2 => Self::SleepSelf,
            3 => Self::WakeTask,
            4 => Self::ZeroBranch,
            5 => Self::NegBranch,
            6 => Self::CarryBranch,
            7 => Self::OverflowBranch,
            8 => Self::BusNibbleLow,
            9 => Self::BusNibbleHigh,
            10 => Self::DeviceDispatch,
            11 => Self::IbDispatch,
            12 => Self::DiskControl,
            13 => Self::EthernetControl,
            14 => Self::DisplayControl,
            _ => Self::ByteRegister,
        }
    }
}

/// Z-plane functions: the second pop encoding, address mapping, nibble
/// literals, dispatch override, IB load, carry steering, and bus sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZFunction {
    /// No Z-plane action.
    Noop,
    /// Pop one stack entry (independent second encoding).
    Pop,
    /// Cycle-1 address load goes through the map (page-cross eligible).
    MapAddressLoad,
    /// Nibble-mode literal: the bus constant is rB.
    LiteralNibble,
    /// IB dispatch proceeds even when the buffer is not Full.
    DispatchOverride,
    /// The cycle-3 memory word also loads the instruction buffer.
    IbLoad,
    /// Carry-in comes from the toggle register (only if the raw carry bit is 1).
    CarryFromToggle,
    /// Status/data bus read selected by rA (10 of the 11 bus-read forms).
    StatusRead,
    /// Byte-swapped R\[a\] drives the bus.
    RotateRa,
    /// Bus read of the SU entry addressed by rB:rA (the eleventh bus-read
    /// form; rA is free here because no select nibble is needed).
    ReadURegister,
    /// Unassigned Z-plane code; executing one is an `InvalidDecode` error.
    Reserved(u8),
}

impl ZFunction {
    /// Decodes the 4-bit Z-plane field. Total over `0..=15`.
    #[must_use]
    pub const fn from_u4(bits: u8) -> Self {
        match bits & 0xF {
            0 => Self::Noop,
            1 => Self::Pop,
            2 => Self::MapAddressLoad,
            3 => Self::LiteralNibble,
            4 => Self::DispatchOverride,
            5 => Self::IbLoad,
            6 => Self::CarryFromToggle,
            7 => Self::StatusRead,
            8 => Self::RotateRa,
            9 => Self::ReadURegister,
            code => Self::Reserved(code),
        }
    }
}

/// Eleven-way status/data bus-read selects (the `StatusRead` rA operand).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusSource {
    /// Disk controller status byte.
    DiskStatus,
    /// Disk controller data byte.
    DiskData,
    /// Ethernet controller status byte.
    EthernetStatus,
    /// Ethernet controller data byte.
    EthernetData,
    /// Display FIFO byte.
    DisplayFifo,
    /// Memory controller status byte.
    MemoryStatus,
    /// I/O processor data byte.
    IopData,
    /// Instruction-buffer front byte (traps when the buffer is Empty).
    IbFront,
    /// Instruction-buffer byte pair (traps when the buffer is Empty).
    IbPair,
    /// SU entry at the stack pointer.
    StackTop,
}

impl StatusSource {
    /// Decodes the 4-bit select. Selects `10..=15` are unassigned; the
    /// eleventh bus-read form is `ZFunction::ReadURegister`.
    #[must_use]
    pub const fn from_u4(bits: u8) -> Option<Self> {
        match bits & 0xF {
            0 => Some(Self::DiskStatus),
            1 => Some(Self::DiskData),
            2 => Some(Self::EthernetStatus),
            3 => Some(Self::EthernetData),
            4 => Some(Self::DisplayFifo),
            5 => Some(Self::MemoryStatus),
            6 => Some(Self::IopData),
            7 => Some(Self::IbFront),
            8 => Some(Self::IbPair),
            9 => Some(Self::StackTop),
            _ => None,
        }
    }
}

/// Builds a control word from individual fields. Intended for tests and the
/// disassembler's round-trip checks; microcode normally arrives via the ports.
#[must_use]
#[allow(clippy::too_many_arguments, clippy::fn_params_excessive_bools)]
pub const fn assemble_word(
    ra: u8,
    rb: u8,
    a_s: u8,
    a_f: u8,
    a_d: u8,
    cin: bool,
    en_su: bool,
    mem: bool,
    f_x: u8,
    f_y: u8,
    f_z: u8,
    cyc: bool,
    nia: u16,
) -> MicrocodeWord {
    let mut raw = 0u64;
    raw |= ((ra & 0xF) as u64) << 44;
    raw |= ((rb & 0xF) as u64) << 40;
    raw |= ((a_s & 0x7) as u64) << 37;
    raw |= ((a_f & 0x7) as u64) << 34;
    raw |= ((a_d & 0x7) as u64) << 31;
    raw |= (cin as u64) << 29;
    raw |= (en_su as u64) << 28;
    raw |= (mem as u64) << 27;
    raw |= ((f_x & 0xF) as u64) << 23;
    raw |= ((f_y & 0xF) as u64) << 19;
    raw |= ((f_z & 0xF) as u64) << 15;
    raw |= (cyc as u64) << 14;
    raw |= (nia & 0xFFF) as u64;
    MicrocodeWord::new(raw).with_even_parity()
}

/// Decodes the task select carried in rA for `WakeTask`.
#[must_use]
pub const fn wake_task_select(ra: u8) -> TaskId {
    TaskId::from_u3(ra & 0x7)
}
