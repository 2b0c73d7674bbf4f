//! Runs lookups to completion and checks recorded runs step by step.

use std::collections::BTreeMap;

use ethereum_types::H256;
use mpt_step::{
    error::StepError,
    next_step,
    step::Step,
    store::{MemoryTrieStore, RecordingTrieStore, TrieSelector, TrieSource, TrieStore},
    trace::{PartialTrace, RecordingTrace, StepTrace, Trace},
    verify::{verify_step_in, VerifyError},
};
use thiserror::Error;
use tracing::{debug, info};

use crate::witness::{AccessRecord, HexBytes, IndexedStep, StepWitness, TraceFile};

/// Sanity limit on the transitions of a single run.
pub const DEFAULT_MAX_STEPS: usize = 10_000;

/// Why a run was aborted.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Producing a step failed.
    #[error("Failed to produce step {index}: {source}")]
    Step {
        /// Index the step would have had.
        index: usize,
        /// The underlying failure.
        source: StepError,
    },

    /// The run didn't go idle within the step limit.
    #[error("Run did not finish within {0} steps")]
    StepLimit(usize),
}

/// Appends steps to a trace until it goes idle, recording the steps and nodes
/// every transition reads.
#[derive(Clone, Copy, Debug)]
pub struct Driver {
    max_steps: usize,
}

impl Default for Driver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STEPS)
    }
}

impl Driver {
    /// Creates a driver giving up after `max_steps` transitions.
    pub const fn new(max_steps: usize) -> Self {
        Self { max_steps }
    }

    /// Runs `start` to completion against the trie `source` names.
    pub fn run_in<Sel>(
        &self,
        start: Step,
        tries: &mut Sel,
        source: TrieSource,
    ) -> Result<TraceFile, DriverError>
    where
        Sel: TrieSelector,
    {
        debug!("Running against {:?}", source);
        self.run(start, tries.select(source))
    }

    /// Runs `start` to completion against `store`.
    pub fn run<S: TrieStore>(&self, start: Step, store: &mut S) -> Result<TraceFile, DriverError> {
        self.run_trace(Trace::new(start), store)
    }

    /// Continues `trace` until its latest step goes idle. The steps already
    /// in `trace` are kept, so a lookup can return to a caller in them.
    pub fn run_trace<S: TrieStore>(
        &self,
        mut trace: Trace,
        store: &mut S,
    ) -> Result<TraceFile, DriverError> {
        let mut store = RecordingTrieStore::new(store);
        let first = trace.length();
        let mut accesses = Vec::new();

        loop {
            let index = trace.length();
            let last = trace
                .last()
                .map_err(|source| DriverError::Step { index, source })?;

            if last.is_idle() {
                break;
            }

            if index - first >= self.max_steps {
                return Err(DriverError::StepLimit(self.max_steps));
            }

            let (step, read_steps) = {
                let reads = RecordingTrace::new(&trace);
                let step = next_step(&reads, &mut store)
                    .map_err(|source| DriverError::Step { index, source })?;
                (step, reads.take_read())
            };

            accesses.push(AccessRecord {
                step: index,
                read_steps,
                accesses: store.take_accesses(),
            });

            trace.push(step);
        }

        let nodes = touched_nodes(store.inner(), &accesses)?;
        info!(
            "Run finished after {} steps touching {} nodes",
            trace.length() - first,
            nodes.len()
        );

        Ok(TraceFile {
            steps: trace.into_steps(),
            accesses,
            nodes,
        })
    }
}

fn touched_nodes<S: TrieStore>(
    store: &S,
    accesses: &[AccessRecord],
) -> Result<Vec<HexBytes>, DriverError> {
    let mut nodes = BTreeMap::new();

    for record in accesses {
        let hashes = record
            .accesses
            .fetched
            .iter()
            .chain(&record.accesses.written);

        for hash in hashes {
            let node = store.get_node(hash).map_err(|source| DriverError::Step {
                index: record.step,
                source,
            })?;
            nodes.insert(*hash, HexBytes(node.to_vec()));
        }
    }

    Ok(nodes.into_values().collect())
}

/// Cuts the witness for step `index` out of a recorded run: the earlier steps
/// and the nodes its transition was recorded reading, and nothing else.
///
/// Nodes the run file lacks are left out, so a replay of the result reports
/// them missing.
pub fn step_witness(file: &TraceFile, index: usize) -> Result<StepWitness, VerifyError> {
    let claimed = file
        .steps
        .get(index)
        .filter(|_| index > 0)
        .ok_or(VerifyError::NoPredecessor(index))?;

    let mut all_nodes = MemoryTrieStore::new();
    all_nodes.insert_proof(&file.nodes);

    let record = file.record_of(index);
    let steps = record
        .map(|record| record.read_steps.as_slice())
        .unwrap_or_default()
        .iter()
        .filter_map(|&read| {
            let step = file.steps.get(read).filter(|_| read < index)?;
            Some(IndexedStep {
                index: read,
                step: step.clone(),
            })
        })
        .collect();

    let nodes = record
        .map(|record| record.accesses.fetched.as_slice())
        .unwrap_or_default()
        .iter()
        .filter_map(|hash| all_nodes.get_node(hash).ok())
        .map(|node| HexBytes(node.to_vec()))
        .collect();

    Ok(StepWitness {
        index,
        claimed: claimed.clone(),
        steps,
        nodes,
    })
}

/// Replays the disputed step of `witness` from the witness alone.
pub fn verify_step_witness(witness: &StepWitness) -> Result<(), VerifyError> {
    let index = witness.index;
    let mut prefix = PartialTrace::new(index);
    for IndexedStep { index: read, step } in &witness.steps {
        prefix
            .insert(*read, step.clone())
            .map_err(|source| VerifyError::Replay { index, source })?;
    }

    let mut nodes = MemoryTrieStore::new();
    nodes.insert_proof(&witness.nodes);

    verify_step_in(&prefix, &witness.claimed, &mut nodes)?;
    debug!(
        "Step {} verified against {} steps and {} nodes",
        index,
        witness.steps.len(),
        nodes.len()
    );

    Ok(())
}

/// Checks every transition of a recorded run, each from nothing but its own
/// [step witness](step_witness). This is exactly what a verifier holding a
/// single disputed step can check.
pub fn verify_trace_file(file: &TraceFile) -> Result<(), VerifyError> {
    (1..file.steps.len()).try_for_each(|index| verify_step_witness(&step_witness(file, index)?))
}

/// The root a finished write produced, if the run was a write.
pub fn written_root(file: &TraceFile) -> Option<H256> {
    let last = file.steps.last()?;
    let is_write = !file.steps.first()?.write_value.is_empty();

    match is_write && last.current_root.len() == 32 {
        true => Some(H256::from_slice(&last.current_root)),
        false => None,
    }
}
