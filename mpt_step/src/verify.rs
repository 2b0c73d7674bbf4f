//! Single step replay, the check a fraud-proof verifier runs on a disputed
//! step.
//!
//! Checking step `i` only needs the steps before it and the nodes that step
//! `i` itself touches, so a verifier never has to re-execute the whole trace.

use log::{debug, trace};
use thiserror::Error;

use crate::{error::StepError, step::Step, store::TrieStore, trace::StepTrace};

#[cfg(doc)]
use crate::trace::PartialTrace;

/// Why a claimed step doesn't follow from the trace before it.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum VerifyError {
    /// The step has no predecessor (index `0`) or lies past the trace's end.
    #[error("Step {0} has no predecessor to replay from")]
    NoPredecessor(usize),

    /// Replaying the predecessor failed outright.
    #[error("Replaying step {index} failed: {source}")]
    Replay {
        /// The step being checked.
        index: usize,
        /// What went wrong.
        source: StepError,
    },

    /// The replay produced a different step than the one claimed.
    #[error("Step {index} does not follow from the steps before it")]
    Mismatch {
        /// The step being checked.
        index: usize,
        /// What the replay produced.
        expected: Box<Step>,
        /// What the trace holds.
        claimed: Box<Step>,
    },
}

/// Checks that `steps[index]` is exactly the step [`next_step`] computes from
/// `steps[..index]` with the nodes in `store`.
///
/// Nodes the replay writes end up in `store`, so verifying a write needs a
/// mutable store even though a correct trace persists nothing new.
///
/// [`next_step`]: crate::next_step
pub fn verify_step<S>(steps: &[Step], index: usize, store: &mut S) -> Result<(), VerifyError>
where
    S: TrieStore + ?Sized,
{
    if index == 0 || index >= steps.len() {
        return Err(VerifyError::NoPredecessor(index));
    }

    verify_step_in(&steps[..index], &steps[index], store)
}

/// Checks that `claimed` is the step following `prefix`.
///
/// `prefix` only has to hold the steps the transition reads, so a
/// [`PartialTrace`] built from a step witness is enough. Steps it left out
/// surface as [`VerifyError::Replay`] with [`StepError::MissingStep`].
pub fn verify_step_in<T, S>(prefix: &T, claimed: &Step, store: &mut S) -> Result<(), VerifyError>
where
    T: StepTrace + ?Sized,
    S: TrieStore + ?Sized,
{
    let index = prefix.length();
    if index == 0 {
        return Err(VerifyError::NoPredecessor(index));
    }

    let expected = crate::next_step(prefix, store)
        .map_err(|source| VerifyError::Replay { index, source })?;

    match &expected == claimed {
        true => {
            trace!("Step {} verified", index);
            Ok(())
        }
        false => {
            debug!("Step {} does not match its replay", index);
            Err(VerifyError::Mismatch {
                index,
                expected: Box::new(expected),
                claimed: Box::new(claimed.clone()),
            })
        }
    }
}

/// Checks every transition of `steps`, stopping at the first bad one.
pub fn verify_trace<S>(steps: &[Step], store: &mut S) -> Result<(), VerifyError>
where
    S: TrieStore + ?Sized,
{
    (1..steps.len()).try_for_each(|index| verify_step(steps, index, store))
}
