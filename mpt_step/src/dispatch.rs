//! Routes a trace to the transition its latest step's mode calls for.

use log::trace;

use crate::{
    error::{StepError, StepResult},
    read::read_step,
    step::{MptMode, Step},
    store::{TrieSelector, TrieSource, TrieStore},
    trace::StepTrace,
    write::{write_start_step, write_step},
};

/// Computes the step that follows the latest step of `trace`.
///
/// Exactly one step is produced per call and the trace is never modified;
/// appending the result is up to the caller. Lookups that end without a value
/// still succeed, with the outcome in [`Step::fail_lookup`]. An `Err` means
/// the witness in `store` is bad or the trace is structurally broken.
pub fn next_step<T, S>(trace: &T, store: &mut S) -> StepResult<Step>
where
    T: StepTrace + ?Sized,
    S: TrieStore + ?Sized,
{
    let last = trace.last()?;
    trace!(
        "Stepping from step {} in mode {:?}",
        trace.length() - 1,
        last.mode
    );

    match last.mode {
        MptMode::Returning => return_step(trace),
        MptMode::Reading => read_step(trace, &*store),
        MptMode::WriteStart => write_start_step(trace, store),
        MptMode::Writing => write_step(trace, store),
        MptMode::Idle => Err(StepError::Idle(trace.length() - 1)),
    }
}

/// Like [`next_step`], but runs against whichever trie `source` names.
pub fn next_step_in<T, Sel>(trace: &T, tries: &mut Sel, source: TrieSource) -> StepResult<Step>
where
    T: StepTrace + ?Sized,
    Sel: TrieSelector + ?Sized,
{
    next_step(trace, tries.select(source))
}

/// Resumes the caller of a finished lookup with its results.
fn return_step<T>(trace: &T) -> StepResult<Step>
where
    T: StepTrace + ?Sized,
{
    let last = trace.last()?;
    let caller_idx = last
        .return_to_step
        .ok_or(StepError::MissingReturn(trace.length() - 1))?;

    let mut next = trace.by_index(caller_idx)?.clone();
    next.value = last.value.clone();
    next.current_root = last.current_root.clone();
    next.fail_lookup = last.fail_lookup;

    Ok(next)
}

#[cfg(test)]
mod tests {
    use ethereum_types::{H160, H256};

    use super::{next_step, next_step_in};
    use crate::{
        error::StepError,
        node::{NodeRef, TrieNode},
        step::{LookupFailure, MptMode, Step},
        store::{MemoryTrieStore, StateTries, TrieSelector, TrieSource, TrieStore},
        testing_utils::{common_setup, leaf, nibs, read_key, run_to_completion, write_key},
        trace::Trace,
    };

    fn store_root(store: &mut MemoryTrieStore, node: &TrieNode) -> Vec<u8> {
        store.put_node(&node.encode()).as_bytes().to_vec()
    }

    #[test]
    fn empty_trie_reads_fail_with_empty_node() {
        common_setup();

        let store = MemoryTrieStore::new();
        let done = read_key(&store, H256::zero().as_bytes(), &nibs("0x1234"));

        assert_eq!(done.mode, MptMode::Idle);
        assert_eq!(done.fail_lookup, Some(LookupFailure::EmptyNode));
        assert!(done.value.is_empty());
    }

    #[test]
    fn single_leaf_trie_reads() {
        common_setup();

        let mut store = MemoryTrieStore::new();
        let root = store_root(&mut store, &leaf("0xabc", b"hello"));

        let found = read_key(&store, &root, &nibs("0xabc"));
        assert_eq!(found.value, b"hello".to_vec());
        assert_eq!(found.fail_lookup, None);

        let missed = read_key(&store, &root, &nibs("0xabd"));
        assert_eq!(missed.fail_lookup, Some(LookupFailure::LeafKeyMismatch));
        assert_eq!(missed.fail_lookup.map(LookupFailure::code), Some(2));
    }

    #[test]
    fn second_key_with_shared_prefix_stays_readable() {
        common_setup();

        let mut store = MemoryTrieStore::new();
        let root = store_root(&mut store, &leaf("0xabc", b"hello"));
        let root = write_key(&mut store, &root, &nibs("0xab5"), b"world");

        assert_eq!(read_key(&store, &root, &nibs("0xabc")).value, b"hello".to_vec());
        assert_eq!(read_key(&store, &root, &nibs("0xab5")).value, b"world".to_vec());
    }

    #[test]
    fn empty_branch_slot_fails_with_empty_node() {
        common_setup();

        let mut store = MemoryTrieStore::new();
        let mut branch = TrieNode::empty_branch();
        let child = leaf("0x", b"three");
        branch.set_branch_child(3, NodeRef::for_encoded_node(child.encode()));
        let root = store_root(&mut store, &branch);

        assert_eq!(read_key(&store, &root, &nibs("0x3")).value, b"three".to_vec());
        assert_eq!(
            read_key(&store, &root, &nibs("0x4")).fail_lookup,
            Some(LookupFailure::EmptyNode)
        );
    }

    #[test]
    fn finished_read_returns_to_its_caller() {
        common_setup();

        let mut store = MemoryTrieStore::new();
        let root = store_root(&mut store, &leaf("0x12", b"v"));

        let caller = Step {
            lookup_nibble_depth: 7,
            ..Default::default()
        };
        let mut trace = Trace::new(caller);
        trace.push(Step::start_read(Some(0), &root, &nibs("0x12")));

        let steps = run_to_completion(trace, &mut store).unwrap();
        let returning = &steps[steps.len() - 2];
        let resumed = steps.last().unwrap();

        assert_eq!(returning.mode, MptMode::Returning);
        assert_eq!(resumed.mode, MptMode::Idle);
        assert_eq!(resumed.lookup_nibble_depth, 7);
        assert_eq!(resumed.value, b"v".to_vec());
        assert_eq!(resumed.current_root, b"v".to_vec());
    }

    #[test]
    fn idle_and_broken_steps_are_errors() {
        let mut store = MemoryTrieStore::new();

        assert_eq!(
            next_step(&[Step::default()][..], &mut store),
            Err(StepError::Idle(0))
        );
        let empty: &[Step] = &[];
        assert_eq!(next_step(empty, &mut store), Err(StepError::EmptyTrace));

        let returning = Step {
            mode: MptMode::Returning,
            ..Default::default()
        };
        assert_eq!(
            next_step(&[returning.clone()][..], &mut store),
            Err(StepError::MissingReturn(0))
        );

        let dangling = Step {
            return_to_step: Some(3),
            ..returning
        };
        assert_eq!(
            next_step(&[dangling][..], &mut store),
            Err(StepError::StepOutOfRange { index: 3, len: 1 })
        );
    }

    #[test]
    fn lookups_run_against_the_selected_trie() {
        common_setup();

        let account = H160::repeat_byte(0x11);
        let mut tries = StateTries::<MemoryTrieStore>::new();
        let root = store_root(
            tries.select(TrieSource::AccountStorage(account)),
            &leaf("0x01", b"slot"),
        );

        let trace = Trace::new(Step::start_read(None, &root, &nibs("0x01")));

        let in_storage = next_step_in(&trace, &mut tries, TrieSource::AccountStorage(account));
        assert!(in_storage.unwrap().at_value);

        let in_world = next_step_in(&trace, &mut tries, TrieSource::WorldAccounts);
        assert!(matches!(in_world, Err(StepError::MissingNode(_))));
    }
}
