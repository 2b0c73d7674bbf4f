//! Errors that abort a step.
//!
//! A lookup that simply doesn't find its key is *not* an error: that outcome
//! is recorded in the step itself (see
//! [`LookupFailure`](crate::step::LookupFailure)). Everything here means the
//! step can't be produced at all, either because the witness can't be trusted
//! or because the inputs are structurally broken.

use ethereum_types::H256;
use thiserror::Error;

use crate::node::NodeDecodeError;

/// Stores the result of producing a step. Returns a [`StepError`] upon
/// failure.
pub type StepResult<T> = Result<T, StepError>;

/// An error type for step transitions.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum StepError {
    /// A node referenced by hash is not part of the witness.
    #[error("Node {0:x} is not present in the witness")]
    MissingNode(H256),

    /// The witness supplied bytes that don't hash to the reference they were
    /// fetched under.
    #[error("Witness node hashes to {actual:x} but was referenced as {expected:x}")]
    WitnessMismatch {
        /// The reference the node was fetched under.
        expected: H256,
        /// The hash of the bytes the witness returned.
        actual: H256,
    },

    /// A node (or a reference to one) could not be decoded.
    #[error(transparent)]
    MalformedNode(#[from] NodeDecodeError),

    /// The lookup key claims more nibbles than a key can hold.
    #[error("Lookup key length {0} exceeds 64 nibbles")]
    KeyTooLong(usize),

    /// The lookup depth is past the end of the lookup key.
    #[error("Lookup depth {depth} is past the end of a {key_nibbles} nibble key")]
    DepthPastKey {
        /// Nibbles consumed so far.
        depth: usize,
        /// Nibbles in the key.
        key_nibbles: usize,
    },

    /// The trace holds no steps, so there's nothing to continue from.
    #[error("Tried to step an empty trace")]
    EmptyTrace,

    /// A step links to an index the trace doesn't hold.
    #[error("Step index {index} is out of range (trace length: {len})")]
    StepOutOfRange {
        /// The linked index.
        index: usize,
        /// Number of steps in the trace.
        len: usize,
    },

    /// A step inside the trace's range was left out of a partial trace.
    #[error("Step {0} is not part of the step witness")]
    MissingStep(usize),

    /// A write step has no traversal parent to rewrite.
    #[error("Write step {0} has no parent node step to rewrite")]
    MissingParent(usize),

    /// A returning step doesn't record where to return to.
    #[error("Step {0} is returning but has no step to return to")]
    MissingReturn(usize),

    /// The latest step has no trie work in progress.
    #[error("Step {0} is idle; there is no trie work to continue")]
    Idle(usize),

    /// Writing an empty value would be a deletion, which isn't supported.
    #[error("Tried to write an empty value (deletion is not supported)")]
    EmptyWriteValue,
}

impl StepError {
    /// Whether the error means the witness is corrupted or malicious, as
    /// opposed to the inputs or linkage being structurally broken.
    pub const fn is_witness_failure(&self) -> bool {
        matches!(
            self,
            StepError::MissingNode(_)
                | StepError::WitnessMismatch { .. }
                | StepError::MissingStep(_)
        )
    }
}
