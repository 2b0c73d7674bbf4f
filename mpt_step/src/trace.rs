//! Append-only sequences of [`Step`]s.
//!
//! Besides the owned [`Trace`], this holds [`RecordingTrace`], which notes the
//! steps a transition reads, and [`PartialTrace`], which holds only those
//! steps. Together they let a single transition be replayed without the rest
//! of its trace.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    error::{StepError, StepResult},
    step::Step,
};

/// Read access to a trace. Transitions only ever read through this; appending
/// is up to whoever drives them.
pub trait StepTrace {
    /// Gets the step at `index`.
    fn by_index(&self, index: usize) -> StepResult<&Step>;

    /// Number of steps in the trace.
    fn length(&self) -> usize;

    /// The most recent step.
    fn last(&self) -> StepResult<&Step> {
        match self.length() {
            0 => Err(StepError::EmptyTrace),
            len => self.by_index(len - 1),
        }
    }
}

impl StepTrace for [Step] {
    fn by_index(&self, index: usize) -> StepResult<&Step> {
        self.get(index).ok_or(StepError::StepOutOfRange {
            index,
            len: self.len(),
        })
    }

    fn length(&self) -> usize {
        self.len()
    }
}

/// An owned trace that only grows.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Trace {
    steps: Vec<Step>,
}

impl Trace {
    /// Creates a trace holding just `first`.
    pub fn new(first: Step) -> Self {
        Self { steps: vec![first] }
    }

    /// Appends a step and returns its index.
    pub fn push(&mut self, step: Step) -> usize {
        self.steps.push(step);
        self.steps.len() - 1
    }

    /// All steps, oldest first.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Hands back the steps.
    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }
}

impl From<Vec<Step>> for Trace {
    fn from(steps: Vec<Step>) -> Self {
        Self { steps }
    }
}

impl StepTrace for Trace {
    fn by_index(&self, index: usize) -> StepResult<&Step> {
        self.steps.by_index(index)
    }

    fn length(&self) -> usize {
        self.steps.len()
    }
}

/// Wraps a trace and notes the index of every step read through it.
///
/// A transition reads its latest step and at most one earlier step (the
/// parent it rewrites or the caller it returns to), so the recorded indices
/// are exactly the steps a verifier needs to replay it.
#[derive(Debug)]
pub struct RecordingTrace<'a, T: ?Sized> {
    inner: &'a T,
    read: Mutex<Vec<usize>>,
}

impl<'a, T: StepTrace + ?Sized> RecordingTrace<'a, T> {
    /// Starts recording reads of `inner`.
    pub fn new(inner: &'a T) -> Self {
        Self {
            inner,
            read: Mutex::new(Vec::new()),
        }
    }

    /// Indices read since the last call, sorted and without duplicates.
    pub fn take_read(&self) -> Vec<usize> {
        let mut read = std::mem::take(&mut *self.read.lock());
        read.sort_unstable();
        read.dedup();
        read
    }
}

impl<T: StepTrace + ?Sized> StepTrace for RecordingTrace<'_, T> {
    fn by_index(&self, index: usize) -> StepResult<&Step> {
        let step = self.inner.by_index(index)?;
        self.read.lock().push(index);
        Ok(step)
    }

    fn length(&self) -> usize {
        self.inner.length()
    }
}

/// A trace of known length holding only some of its steps.
///
/// Reading a step that was left out fails with [`StepError::MissingStep`],
/// which counts as a witness failure.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PartialTrace {
    length: usize,
    steps: BTreeMap<usize, Step>,
}

impl PartialTrace {
    /// Creates a trace of `length` steps, none of them present yet.
    pub const fn new(length: usize) -> Self {
        Self {
            length,
            steps: BTreeMap::new(),
        }
    }

    /// Adds the step at `index`. Indices past the length are rejected.
    pub fn insert(&mut self, index: usize, step: Step) -> StepResult<()> {
        if index >= self.length {
            return Err(StepError::StepOutOfRange {
                index,
                len: self.length,
            });
        }

        self.steps.insert(index, step);
        Ok(())
    }
}

impl StepTrace for PartialTrace {
    fn by_index(&self, index: usize) -> StepResult<&Step> {
        if index >= self.length {
            return Err(StepError::StepOutOfRange {
                index,
                len: self.length,
            });
        }

        self.steps.get(&index).ok_or(StepError::MissingStep(index))
    }

    fn length(&self) -> usize {
        self.length
    }
}
