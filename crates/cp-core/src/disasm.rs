//! Microcode disassembly: renders control words as human-readable rows for
//! debuggers and diagnostic listings.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::similar_names,
    unknown_lints
)]

use crate::decoder::{decode, StackOp};
use crate::microword::{
    AluDestination, AluFunction, AluSourcePair, MicrocodeWord, XFunction, YFunction, ZFunction,
};
use crate::store::ControlStore;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single disassembled control-store row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MicrocodeRow {
    /// Control-store address of this word.
    pub address: u16,
    /// Raw 48-bit value.
    pub raw: u64,
    /// Rendered field listing.
    pub text: String,
}

/// Disassembles one control word.
#[must_use]
pub fn disassemble_word(address: u16, word: MicrocodeWord) -> MicrocodeRow {
    let instr = decode(word);

    let operands = match instr.source {
        AluSourcePair::Aq => format!("R{}, Q", instr.ra),
        AluSourcePair::Ab => format!("R{}, R{}", instr.ra, instr.rb),
        AluSourcePair::Zq => "0, Q".to_owned(),
        AluSourcePair::Zb => format!("0, R{}", instr.rb),
        AluSourcePair::Za => format!("0, R{}", instr.ra),
        AluSourcePair::Da => format!("D, R{}", instr.ra),
        AluSourcePair::Dq => "D, Q".to_owned(),
        AluSourcePair::Dz => "D, 0".to_owned(),
    };

    let function = match instr.function {
        AluFunction::RPlusS => "ADD",
        AluFunction::SMinusR => "SUBR",
        AluFunction::RMinusS => "SUBS",
        AluFunction::ROrS => "OR",
        AluFunction::RAndS => "AND",
        AluFunction::NotRAndS => "ANDC",
        AluFunction::RXorS => "XOR",
        AluFunction::RXnorS => "XNOR",
    };

    let destination = match instr.destination {
        AluDestination::WriteQ => "Q←".to_owned(),
        AluDestination::NoWrite => String::new(),
        AluDestination::WriteBExposeA => format!("R{}←(bypass A)", instr.rb),
        AluDestination::WriteB => format!("R{}←", instr.rb),
        AluDestination::ShiftRightDouble => format!("R{}←dshr", instr.rb),
        AluDestination::ShiftRight => format!("R{}←shr", instr.rb),
        AluDestination::ShiftLeftDouble => format!("R{}←dshl", instr.rb),
        AluDestination::ShiftLeft => format!("R{}←shl", instr.rb),
    };

    let mut parts = vec![format!("{destination} {function} {operands}").trim().to_owned()];
    if instr.carry_in {
        parts.push("cin".to_owned());
    }
    if instr.is_cycle {
        parts.push("cyc".to_owned());
    }
    if instr.mem_op {
        parts.push("mem".to_owned());
    }
    if instr.su_write_enable {
        parts.push("enSU".to_owned());
    }
    if let Some(x) = x_mnemonic(instr.x_fn) {
        parts.push(x);
    }
    if let Some(y) = y_mnemonic(instr.y_fn) {
        parts.push(y.to_owned());
    }
    if let Some(z) = z_mnemonic(instr.z_fn) {
        parts.push(z);
    }
    match instr.stack_op {
        StackOp::PopDoubleTest => parts.push("pop2test".to_owned()),
        StackOp::None | StackOp::Push | StackOp::Pop | StackOp::Load => {}
    }
    if let Some(value) = instr.literal {
        parts.push(format!("lit={value:#04x}"));
    }
    parts.push(format!("NIA={:#05x}", instr.nia));

    MicrocodeRow {
        address,
        raw: word.raw(),
        text: parts.join(", "),
    }
}

/// Disassembles a window of the control store around a center address.
#[must_use]
pub fn disassemble_window(
    store: &ControlStore,
    center: u16,
    before: u16,
    after: u16,
) -> Vec<MicrocodeRow> {
    let start = center.saturating_sub(before);
    let end = center.saturating_add(after).min(0xFFF);
    (start..=end)
        .filter_map(|address| {
            store
                .word(address)
                .ok()
                .map(|word| disassemble_word(address, word))
        })
        .collect()
}

fn x_mnemonic(x_fn: XFunction) -> Option<String> {
    match x_fn {
        XFunction::Noop => None,
        XFunction::Push => Some("push".to_owned()),
        XFunction::Pop => Some("pop".to_owned()),
        XFunction::LoadStackPointer => Some("stkp←".to_owned()),
        XFunction::KernelExit => Some("kexit".to_owned()),
        XFunction::ErrorClear => Some("errclr".to_owned()),
        XFunction::ToggleFlip => Some("tglflip".to_owned()),
        XFunction::ToggleClear => Some("tglclr".to_owned()),
        XFunction::Link(index) => Some(format!("L{index}")),
    }
}

const fn y_mnemonic(y_fn: YFunction) -> Option<&'static str> {
    match y_fn {
        YFunction::Noop | YFunction::LiteralByte => None,
        YFunction::SleepSelf => Some("sleep"),
        YFunction::WakeTask => Some("wake"),
        YFunction::ZeroBranch => Some("brz"),
        YFunction::NegBranch => Some("brn"),
        YFunction::CarryBranch => Some("brc"),
        YFunction::OverflowBranch => Some("brv"),
        YFunction::BusNibbleLow => Some("dispbl"),
        YFunction::BusNibbleHigh => Some("dispbh"),
        YFunction::DeviceDispatch => Some("dispdev"),
        YFunction::IbDispatch => Some("ibdisp"),
        YFunction::DiskControl => Some("kctl←"),
        YFunction::EthernetControl => Some("ectl←"),
        YFunction::DisplayControl => Some("dctl←"),
        YFunction::ByteRegister => Some("breg←"),
    }
}

fn z_mnemonic(z_fn: ZFunction) -> Option<String> {
    match z_fn {
        ZFunction::Noop | ZFunction::Pop | ZFunction::LiteralNibble => None,
        ZFunction::MapAddressLoad => Some("map".to_owned()),
        ZFunction::DispatchOverride => Some("always".to_owned()),
        ZFunction::IbLoad => Some("ib←md".to_owned()),
        ZFunction::CarryFromToggle => Some("cin←tgl".to_owned()),
        ZFunction::StatusRead => Some("←status".to_owned()),
        ZFunction::RotateRa => Some("←rot".to_owned()),
        ZFunction::ReadURegister => Some("←U".to_owned()),
        ZFunction::Reserved(code) => Some(format!(".rsvd {code:#x}")),
    }
}
