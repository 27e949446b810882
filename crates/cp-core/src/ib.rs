//! Instruction buffer: the 3-byte queue feeding macro-instruction bytes to
//! the dispatch mechanism.

/// Instruction-buffer fill pointer. It only ever decrements along
/// Full → Word → Byte → Empty and is stable at Empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum IbPointer {
    /// No bytes available.
    #[default]
    Empty,
    /// One byte available (the front byte).
    Byte,
    /// Two bytes available.
    Word,
    /// Three bytes available.
    Full,
}

impl IbPointer {
    /// The pointer state after consuming one byte.
    #[must_use]
    pub const fn consumed(self) -> Self {
        match self {
            Self::Full => Self::Word,
            Self::Word => Self::Byte,
            Self::Byte | Self::Empty => Self::Empty,
        }
    }
}

/// The instruction buffer: a front byte plus a 2-byte pair behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct InstructionBuffer {
    front: u8,
    pair: [u8; 2],
    pointer: IbPointer,
}

impl InstructionBuffer {
    /// Current fill pointer.
    #[must_use]
    pub const fn pointer(&self) -> IbPointer {
        self.pointer
    }

    /// True when no bytes are available.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pointer == IbPointer::Empty
    }

    /// The front byte, regardless of pointer state. Peeking an Empty buffer
    /// is the caller's trap condition; the stale byte is still driven.
    #[must_use]
    pub const fn front(&self) -> u8 {
        self.front
    }

    /// The byte pair as a big-endian word, front-adjacent byte high.
    #[must_use]
    pub const fn pair_word(&self) -> u16 {
        u16::from_be_bytes(self.pair)
    }

    /// Loads a 16-bit memory word (high byte first) into the buffer.
    ///
    /// From Empty the word becomes front + second byte (pointer Word); with
    /// a front byte already held the word fills the pair (pointer Full). A
    /// load at Word or Full overwrites the pair and leaves the buffer Full.
    pub fn load(&mut self, word: u16) {
        let [hi, lo] = word.to_be_bytes();
        match self.pointer {
            IbPointer::Empty => {
                self.front = hi;
                self.pair = [lo, 0];
                self.pointer = IbPointer::Word;
            }
            IbPointer::Byte => {
                self.pair = [hi, lo];
                self.pointer = IbPointer::Full;
            }
            IbPointer::Word | IbPointer::Full => {
                self.pair = [hi, lo];
                self.pointer = IbPointer::Full;
            }
        }
    }

    /// Consumes the front byte, shifting the pair forward and stepping the
    /// pointer down. Idempotent at Empty (returns the stale front byte).
    pub const fn consume(&mut self) -> u8 {
        let byte = self.front;
        self.front = self.pair[0];
        self.pair[0] = self.pair[1];
        self.pointer = self.pointer.consumed();
        byte
    }

    /// Drops all buffered bytes.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
