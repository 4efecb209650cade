//! Packed-instruction command streams for the PC sequencer.
//!
//! Every configuration write is one 64-bit word. A stream is append-only:
//! configuration words first, then the fixed four-word tail (two
//! `PC_REGISTER_AMOUNTS` markers around a padding word, then the
//! operation-enable write), after which the stream is sealed and refuses
//! further emission. The declared register-config amount is the word count
//! minus the tail, and [`CmdStream::regcfg_amount`] checks that
//! relationship so a drifting generator fails in the encoder instead of
//! stalling the sequencer mid-fetch.

use alloc::vec::Vec;

use crate::registers::{pc, unit_target, TARGET_ENABLE};

/// Packs one sequencer instruction word.
pub const fn pack(target: u16, value: u32, reg: u16) -> u64 {
    ((target as u64) << 48) | ((value as u64) << 16) | reg as u64
}

/// Splits an instruction word into `(target, value, reg)`.
pub const fn unpack(word: u64) -> (u16, u32, u16) {
    ((word >> 48) as u16, (word >> 16) as u32, word as u16)
}

#[derive(Debug, Default)]
pub struct CmdStream {
    words: Vec<u64>,
    tail_start: Option<usize>,
    sealed: bool,
}

impl CmdStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(words: usize) -> Self {
        Self {
            words: Vec::with_capacity(words),
            tail_start: None,
            sealed: false,
        }
    }

    /// Emits a config write to `reg`, routed by its unit window.
    pub fn emit(&mut self, reg: u16, value: u32) {
        self.emit_raw(unit_target(reg), reg, value);
    }

    /// Emits a word with an explicit target tag.
    pub fn emit_raw(&mut self, target: u16, reg: u16, value: u32) {
        assert!(!self.sealed, "command stream already sealed by enable");
        self.words.push(pack(target, value, reg));
    }

    /// Marks the start of the trailing words the sequencer fetches beyond
    /// the declared register-config amount.
    pub fn begin_tail(&mut self) {
        assert!(self.tail_start.is_none(), "tail already started");
        self.tail_start = Some(self.words.len());
    }

    /// Emits the operation-enable write and seals the stream.
    pub fn enable(&mut self, enable_mask: u32) {
        self.emit_raw(TARGET_ENABLE, pc::PC_OPERATION_ENABLE, enable_mask);
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Register-config amount to declare in the task descriptor.
    ///
    /// Panics if the stream is not sealed or the tail does not hold exactly
    /// [`pc::PC_DATA_EXTRA_AMOUNT`] words; a wrong amount makes the
    /// sequencer hang waiting for words that never arrive, so this is
    /// checked here rather than on the device.
    pub fn regcfg_amount(&self) -> u32 {
        assert!(self.sealed, "stream must be sealed before declaring it");
        let tail_start = match self.tail_start {
            Some(at) => at,
            None => panic!("stream has no tail marker"),
        };
        let tail = (self.words.len() - tail_start) as u32;
        assert_eq!(
            tail,
            pc::PC_DATA_EXTRA_AMOUNT,
            "stream tail must be exactly the extra words the sequencer fetches"
        );
        self.words.len() as u32 - pc::PC_DATA_EXTRA_AMOUNT
    }
}
