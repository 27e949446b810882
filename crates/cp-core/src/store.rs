//! Writable control store plus its decode cache.
//!
//! The store holds 4096 48-bit words. Decoding happens once per write, never
//! per cycle: the engine fetches `DecodedInstruction`s straight out of the
//! cache. The external I/O processor moves words through byte-wide port
//! transactions with the non-contiguous layout defined in `microword`.

use thiserror::Error;

use crate::decoder::{decode, DecodedInstruction};
use crate::microword::{MicrocodeWord, CONTROL_STORE_WORDS, PORT_TRANSACTIONS};

/// Errors for the byte-wide control-store port surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum PortError {
    /// Word address beyond the 4096-word store.
    #[error("control-store address {0:#06x} out of range")]
    AddressOutOfRange(u16),
    /// Transaction index beyond the six byte slots.
    #[error("control-store transaction index {0} out of range")]
    InvalidTransaction(u8),
}

/// The 4096-word control store and its decoded shadow.
#[derive(Debug, Clone)]
pub struct ControlStore {
    words: Box<[MicrocodeWord]>,
    decoded: Box<[DecodedInstruction]>,
}

impl Default for ControlStore {
    fn default() -> Self {
        let words = vec![MicrocodeWord::default(); CONTROL_STORE_WORDS].into_boxed_slice();
        let decoded = vec![decode(MicrocodeWord::default()); CONTROL_STORE_WORDS].into_boxed_slice();
        Self { words, decoded }
    }
}

impl ControlStore {
    /// Reads a raw word.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::AddressOutOfRange`] for addresses ≥ 4096.
    pub fn word(&self, address: u16) -> Result<MicrocodeWord, PortError> {
        self.words
            .get(usize::from(address))
            .copied()
            .ok_or(PortError::AddressOutOfRange(address))
    }

    /// Writes a raw word and refreshes its decoded shadow.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::AddressOutOfRange`] for addresses ≥ 4096.
    pub fn write_word(&mut self, address: u16, word: MicrocodeWord) -> Result<(), PortError> {
        let slot = usize::from(address);
        if slot >= CONTROL_STORE_WORDS {
            return Err(PortError::AddressOutOfRange(address));
        }
        log::trace!("control store write {address:#05x} = {:#014x}", word.raw());
        self.words[slot] = word;
        self.decoded[slot] = decode(word);
        Ok(())
    }

    /// Fetches the decoded instruction at a 12-bit address. Addresses are
    /// masked to the store size, mirroring the address bus width.
    #[must_use]
    pub fn fetch(&self, address: u16) -> &DecodedInstruction {
        &self.decoded[usize::from(address) & (CONTROL_STORE_WORDS - 1)]
    }

    /// Reads one port-transaction byte of a word.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] for a bad address or transaction index.
    pub fn read_port_byte(&self, address: u16, transaction: u8) -> Result<u8, PortError> {
        if usize::from(transaction) >= PORT_TRANSACTIONS {
            return Err(PortError::InvalidTransaction(transaction));
        }
        Ok(self.word(address)?.port_byte(usize::from(transaction)))
    }

    /// Writes one port-transaction byte of a word, refreshing the decode.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] for a bad address or transaction index.
    pub fn write_port_byte(
        &mut self,
        address: u16,
        transaction: u8,
        byte: u8,
    ) -> Result<(), PortError> {
        if usize::from(transaction) >= PORT_TRANSACTIONS {
            return Err(PortError::InvalidTransaction(transaction));
        }
        let updated = self.word(address)?.with_port_byte(usize::from(transaction), byte);
        self.write_word(address, updated)
    }

    /// True when the word at `address` carries even parity. Diagnostics may
    /// signal `ControlStoreParity` from this; the pipeline never does.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::AddressOutOfRange`] for addresses ≥ 4096.
    pub fn verify_parity(&self, address: u16) -> Result<bool, PortError> {
        Ok(self.word(address)?.has_even_parity())
    }
}

#[cfg(test)]
mod tests {
    use super::{ControlStore, PortError};
    use crate::microword::{assemble_word, MicrocodeWord, PORT_TRANSACTIONS};

    #[test]
    fn writes_refresh_the_decoded_shadow() {
        let mut store = ControlStore::default();
        let word = assemble_word(3, 4, 1, 0, 3, true, false, false, 1, 0, 0, false, 0x2AB);
        store.write_word(0x123, word).expect("in range");

        let decoded = store.fetch(0x123);
        assert_eq!(decoded.word, word);
        assert_eq!(decoded.nia, 0x2AB);
        assert_eq!(decoded.ra, 3);
    }

    #[test]
    fn fetch_masks_to_the_store_width() {
        let mut store = ControlStore::default();
        let word = assemble_word(0, 0, 0, 0, 1, false, false, false, 0, 0, 0, false, 0x001);
        store.write_word(0x005, word).expect("in range");
        assert_eq!(store.fetch(0x1005).word, word);
    }

    #[test]
    fn port_bytes_assemble_a_whole_word() {
        let mut store = ControlStore::default();
        let word = MicrocodeWord::new(0x5A5A_1234_ABCD);
        for transaction in 0..PORT_TRANSACTIONS {
            store
                .write_port_byte(0x040, transaction as u8, word.port_byte(transaction))
                .expect("valid transaction");
        }
        assert_eq!(store.word(0x040).expect("in range"), word);
        assert_eq!(store.fetch(0x040).word, word);
    }

    #[test]
    fn port_surface_rejects_bad_indices() {
        let mut store = ControlStore::default();
        assert_eq!(
            store.write_port_byte(0x040, 6, 0),
            Err(PortError::InvalidTransaction(6))
        );
        assert_eq!(
            store.write_word(0x1000, MicrocodeWord::default()),
            Err(PortError::AddressOutOfRange(0x1000))
        );
        assert_eq!(
            store.read_port_byte(0x1000, 0),
            Err(PortError::AddressOutOfRange(0x1000))
        );
    }

    #[test]
    fn parity_verification_tracks_the_ep_bit() {
        let mut store = ControlStore::default();
        let word = assemble_word(1, 2, 3, 4, 5, false, true, false, 6, 7, 8, false, 0x0FF);
        store.write_word(0x010, word).expect("in range");
        assert!(store.verify_parity(0x010).expect("in range"));

        let corrupted = MicrocodeWord::new(word.raw() ^ 0x1);
        store.write_word(0x010, corrupted).expect("in range");
        assert!(!store.verify_parity(0x010).expect("in range"));
    }
}
