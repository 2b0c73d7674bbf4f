//! The [`Step`] snapshot and the mode state machine it carries.
//!
//! A step is never edited once it's part of a trace. Every transition copies
//! an earlier step and overwrites a handful of fields, so recursion (a lookup
//! nested in some caller's work, a write unwinding back up to the root) is
//! expressed with indices into the trace instead of a call stack.

use ethereum_types::U256;
use serde::{Deserialize, Serialize};

use crate::{
    error::{StepError, StepResult},
    nibbles::{Nibbles, MAX_NIBBLES},
};

/// What the next transition out of a step does.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MptMode {
    /// The lookup is done; resume the step at `return_to_step`.
    Returning = 0,

    /// Walk one node down towards the lookup key.
    Reading = 1,

    /// Turn the value to write into the reference spliced in below the
    /// node the read phase stopped at.
    WriteStart = 2,

    /// Rewrite one ancestor to hold the new reference coming from below.
    Writing = 3,

    /// No trie work is in progress.
    #[default]
    Idle = 0xff,
}

impl MptMode {
    /// The numeric mode code.
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Why a read ended without finding a value. These are regular outcomes of a
/// lookup, not errors.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LookupFailure {
    /// The lookup reached an empty node (or an empty branch slot).
    EmptyNode = 1,

    /// A leaf ends where the key does, but holds a different key suffix.
    LeafKeyMismatch = 2,

    /// A leaf's key ends before the lookup key does.
    LeafKeyTooShort = 3,

    /// A leaf's key continues past the end of the lookup key.
    LeafKeyTooLong = 4,

    /// An extension continues past the end of the lookup key.
    ExtensionTooLong = 5,

    /// An extension's key piece differs from the lookup key.
    ExtensionMismatch = 6,

    /// The key ends at a branch whose value slot is empty.
    EmptyValue = 10,
}

impl LookupFailure {
    /// The numeric failure code.
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// An immutable snapshot of trie work in progress.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Step {
    /// What the next transition does.
    pub mode: MptMode,

    /// The mode to switch to once the read phase ends.
    pub mode_on_finish: MptMode,

    /// Reference to the node being visited. Once [`Step::at_value`] is set,
    /// a reference to the value instead. When a write finishes, the new root.
    #[serde(with = "crate::hex")]
    pub current_root: Vec<u8>,

    /// While writing, the reference carried up to the next ancestor.
    #[serde(with = "crate::hex")]
    pub write_root: Vec<u8>,

    /// The value a write stores at the lookup key.
    #[serde(with = "crate::hex")]
    pub write_value: Vec<u8>,

    /// The key being looked up, first nibble in the most significant bits.
    pub lookup_key: U256,

    /// Number of nibbles in the lookup key.
    pub lookup_key_nibbles: u8,

    /// Number of key nibbles consumed so far.
    pub lookup_nibble_depth: u8,

    /// Whether [`Step::current_root`] references the value at the key rather
    /// than a trie node.
    pub at_value: bool,

    /// Set when the read phase ended without finding a value.
    pub fail_lookup: Option<LookupFailure>,

    /// Index of the step that visited this node's parent.
    pub parent_node_step: Option<usize>,

    /// Index of the step to resume once the lookup is done.
    pub return_to_step: Option<usize>,

    /// The value found by the lookup.
    #[serde(with = "crate::hex")]
    pub value: Vec<u8>,
}

impl Step {
    /// The first step of a read of `key` in the trie rooted at `root`, started
    /// on behalf of the step at `caller` (if any).
    pub fn start_read(caller: Option<usize>, root: &[u8], key: &Nibbles) -> Self {
        Self {
            mode: MptMode::Reading,
            mode_on_finish: Self::finish_mode_for(caller),
            current_root: root.to_vec(),
            lookup_key: key.to_left_aligned(),
            lookup_key_nibbles: key.count as u8,
            return_to_step: caller,
            ..Default::default()
        }
    }

    /// The first step of a write of `value` at `key` in the trie rooted at
    /// `root`. The write first reads down to where the key lives (or would
    /// live), then rewrites every node on the way back up.
    pub fn start_write(caller: Option<usize>, root: &[u8], key: &Nibbles, value: Vec<u8>) -> Self {
        Self {
            mode_on_finish: MptMode::WriteStart,
            write_value: value,
            ..Self::start_read(caller, root, key)
        }
    }

    /// The lookup key as [`Nibbles`].
    ///
    /// Steps may come from untrusted trace files, so this fails if the step
    /// claims a key longer than `64` nibbles or a depth past the key's end.
    pub fn lookup_key(&self) -> StepResult<Nibbles> {
        let key_nibbles = self.lookup_key_nibbles as usize;
        let depth = self.lookup_nibble_depth as usize;

        if key_nibbles > MAX_NIBBLES {
            return Err(StepError::KeyTooLong(key_nibbles));
        }

        if depth > key_nibbles {
            return Err(StepError::DepthPastKey { depth, key_nibbles });
        }

        Ok(Nibbles::from_left_aligned(self.lookup_key, key_nibbles))
    }

    /// The part of the lookup key not consumed yet.
    pub fn remaining_key(&self) -> StepResult<Nibbles> {
        Ok(self
            .lookup_key()?
            .truncate_n_nibbles_front(self.lookup_nibble_depth as usize))
    }

    /// The mode a finished lookup (or write) hands control back with.
    pub const fn caller_mode(&self) -> MptMode {
        Self::finish_mode_for(self.return_to_step)
    }

    /// Whether the step has no trie work left.
    pub fn is_idle(&self) -> bool {
        self.mode == MptMode::Idle
    }

    const fn finish_mode_for(caller: Option<usize>) -> MptMode {
        match caller {
            Some(_) => MptMode::Returning,
            None => MptMode::Idle,
        }
    }
}
