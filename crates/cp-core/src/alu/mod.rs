//! The 16-bit bit-slice ALU: register file, Q register, and the per-call
//! arithmetic/logic/shift computation.
//!
//! Two flag paths are preserved, as on the original hardware model: the
//! accurate path drives the nibble carry network for every function (some
//! microcode inspects carry/overflow after logical functions), while the
//! fast path computes flags only for the arithmetic functions and reports
//! logic carries as zero.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::similar_names,
    unknown_lints
)]

mod carry;

use crate::decoder::DecodedInstruction;
use crate::microword::{AluDestination, AluFunction, AluSourcePair};
use carry::NetworkCarries;

/// Number of general registers in the ALU register file.
pub const ALU_REGISTER_COUNT: usize = 16;

/// Flag outputs of one ALU invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(clippy::struct_excessive_bools)]
pub struct AluFlags {
    /// Function result is zero.
    pub zero: bool,
    /// Function result bit 15 is set.
    pub negative: bool,
    /// Carry out of bit 3.
    pub nibble_carry: bool,
    /// Carry out of bit 7.
    pub page_carry: bool,
    /// Carry out of bit 15.
    pub carry_out: bool,
    /// Two's-complement overflow.
    pub overflow: bool,
}

/// Result of one ALU invocation: the output-bus value and the flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluOutput {
    /// Value driven onto the output bus (the A-bypass destination exposes
    /// the prior R\[a\] here instead of the function result).
    pub value: u16,
    /// Flag outputs, always derived from the function result.
    pub flags: AluFlags,
}

/// Register file, Q register, and the computation core.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct AluUnit {
    registers: [u16; ALU_REGISTER_COUNT],
    q: u16,
}

impl AluUnit {
    /// Reads a general register.
    #[must_use]
    pub const fn register(&self, index: u8) -> u16 {
        self.registers[(index & 0xF) as usize]
    }

    /// Writes a general register.
    pub const fn set_register(&mut self, index: u8, value: u16) {
        self.registers[(index & 0xF) as usize] = value;
    }

    /// Reads the Q register.
    #[must_use]
    pub const fn q(&self) -> u16 {
        self.q
    }

    /// Writes the Q register.
    pub const fn set_q(&mut self, value: u16) {
        self.q = value;
    }

    /// Zeroes the register file and Q.
    pub fn reset(&mut self) {
        self.registers = [0; ALU_REGISTER_COUNT];
        self.q = 0;
    }

    /// Runs one invocation on the accurate flag path and applies the
    /// destination write-back.
    pub fn execute(
        &mut self,
        instr: &DecodedInstruction,
        data_input: u16,
        carry_in: bool,
        address_load: bool,
    ) -> AluOutput {
        self.run(instr, data_input, carry_in, address_load, true)
    }

    /// Runs one invocation on the fast flag path (flags accurate for the
    /// arithmetic functions only) and applies the destination write-back.
    pub fn execute_fast(
        &mut self,
        instr: &DecodedInstruction,
        data_input: u16,
        carry_in: bool,
        address_load: bool,
    ) -> AluOutput {
        self.run(instr, data_input, carry_in, address_load, false)
    }

    fn run(
        &mut self,
        instr: &DecodedInstruction,
        data_input: u16,
        carry_in: bool,
        address_load: bool,
        accurate: bool,
    ) -> AluOutput {
        let (r, s) = self.operand_pair(instr, data_input);
        let (mut result, mut flags) = compute(instr.function, r, s, carry_in, accurate);

        if address_load {
            // The top byte is recomputed with the function's low 2 code bits
            // forced, against source pair (0, R[b]). Carry-out and overflow
            // come from this alternate computation alone; nothing propagates
            // across the byte boundary.
            let forced = instr.function.address_load_forced();
            let rb = self.register(instr.rb);
            let alt = match forced {
                AluFunction::ROrS => rb,
                _ => !rb,
            };
            result = (alt & 0xFF00) | (result & 0x00FF);
            if accurate {
                let (g, p) = logic_network_inputs(forced, alt);
                let alt_carries = carry::propagate_high_byte(g, p);
                flags.carry_out = alt_carries.carry_out;
                flags.overflow = alt_carries.carry_out;
            } else {
                flags.carry_out = false;
                flags.overflow = false;
            }
        }

        flags.zero = result == 0;
        flags.negative = result & 0x8000 != 0;

        let value = self.write_back(instr, result);
        AluOutput { value, flags }
    }

    fn operand_pair(&self, instr: &DecodedInstruction, data_input: u16) -> (u16, u16) {
        let a = self.register(instr.ra);
        let b = self.register(instr.rb);
        match instr.source {
            AluSourcePair::Aq => (a, self.q),
            AluSourcePair::Ab => (a, b),
            AluSourcePair::Zq => (0, self.q),
            AluSourcePair::Zb => (0, b),
            AluSourcePair::Za => (0, a),
            AluSourcePair::Da => (data_input, a),
            AluSourcePair::Dq => (data_input, self.q),
            AluSourcePair::Dz => (data_input, 0),
        }
    }

    fn write_back(&mut self, instr: &DecodedInstruction, result: u16) -> u16 {
        match instr.destination {
            AluDestination::WriteQ => {
                self.q = result;
                result
            }
            AluDestination::NoWrite => result,
            AluDestination::WriteBExposeA => {
                let prior_a = self.register(instr.ra);
                self.set_register(instr.rb, result);
                prior_a
            }
            AluDestination::WriteB => {
                self.set_register(instr.rb, result);
                result
            }
            AluDestination::ShiftRight => {
                let fill = if instr.is_cycle { result & 1 } else { 0 };
                self.set_register(instr.rb, (result >> 1) | (fill << 15));
                result
            }
            AluDestination::ShiftRightDouble => {
                let fill = if instr.is_cycle { self.q & 1 } else { 0 };
                let q_in = result & 1;
                self.set_register(instr.rb, (result >> 1) | (fill << 15));
                self.q = (self.q >> 1) | (q_in << 15);
                result
            }
            AluDestination::ShiftLeft => {
                let fill = if instr.is_cycle { result >> 15 } else { 0 };
                self.set_register(instr.rb, (result << 1) | fill);
                result
            }
            AluDestination::ShiftLeftDouble => {
                let fill = if instr.is_cycle { result >> 15 } else { 0 };
                let r_in = self.q >> 15;
                self.set_register(instr.rb, (result << 1) | r_in);
                self.q = (self.q << 1) | fill;
                result
            }
        }
    }
}

/// Computes one function result plus carry/overflow flags. Zero and negative
/// are filled in by the caller after any address-load byte merge.
fn compute(function: AluFunction, r: u16, s: u16, carry_in: bool, accurate: bool) -> (u16, AluFlags) {
    let mut flags = AluFlags::default();

    if function.is_arithmetic() {
        // Subtraction is complement-and-add; the carry-in doubles as the
        // borrow complement.
        let (a, b) = match function {
            AluFunction::RPlusS => (r, s),
            AluFunction::SMinusR => (!r, s),
            _ => (r, !s),
        };
        let result = a.wrapping_add(b).wrapping_add(u16::from(carry_in));
        let carries = if accurate {
            carry::propagate(a & b, a | b, carry_in)
        } else {
            fast_arithmetic_carries(a, b, carry_in)
        };
        flags.nibble_carry = carries.nibble;
        flags.page_carry = carries.page;
        flags.carry_out = carries.carry_out;
        flags.overflow = carries.into_msb ^ carries.carry_out;
        (result, flags)
    } else {
        let result = match function {
            AluFunction::ROrS => r | s,
            AluFunction::RAndS => r & s,
            AluFunction::NotRAndS => !r & s,
            AluFunction::RXorS => r ^ s,
            _ => !(r ^ s),
        };
        if accurate {
            // Logical functions still drive the carry network: the result
            // steers generate/propagate, and overflow mirrors carry-out.
            let (g, p) = logic_network_inputs(function, result);
            let carries = carry::propagate(g, p, carry_in);
            flags.nibble_carry = carries.nibble;
            flags.page_carry = carries.page;
            flags.carry_out = carries.carry_out;
            flags.overflow = carries.carry_out;
        }
        (result, flags)
    }
}

/// Generate/propagate nibble inputs for the logic-mode carry network.
///
/// The inclusive forms (R|S, ~R^S) propagate through set result bits and
/// generate on clear ones; the conjunctive forms (R&S, ~R&S, R^S) generate
/// on set result bits.
const fn logic_network_inputs(function: AluFunction, result: u16) -> (u16, u16) {
    match function {
        AluFunction::ROrS | AluFunction::RXnorS => (!result, result),
        _ => (result, !result),
    }
}

/// Host-width carry computation used by the fast path.
fn fast_arithmetic_carries(a: u16, b: u16, carry_in: bool) -> NetworkCarries {
    let c = u32::from(carry_in);
    let nibble = (u32::from(a & 0x000F) + u32::from(b & 0x000F) + c) > 0x000F;
    let page = (u32::from(a & 0x00FF) + u32::from(b & 0x00FF) + c) > 0x00FF;
    let into_msb = (u32::from(a & 0x7FFF) + u32::from(b & 0x7FFF) + c) > 0x7FFF;
    let carry_out = (u32::from(a) + u32::from(b) + c) > 0xFFFF;
    NetworkCarries {
        nibble,
        page,
        into_msb,
        carry_out,
    }
}
