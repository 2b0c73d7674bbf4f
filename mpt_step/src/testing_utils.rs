use std::{str::FromStr, sync::Arc};

use eth_trie::{EthTrie, MemoryDB, Trie};
use ethereum_types::H256;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    error::StepResult,
    nibbles::Nibbles,
    node::TrieNode,
    step::Step,
    store::{MemoryTrieStore, TrieStore},
    trace::{StepTrace, Trace},
};

/// Generous upper bound on the steps a single lookup or write can take.
const MAX_STEPS_PER_LOOKUP: usize = 512;

pub(crate) type TestEntry = (Nibbles, Vec<u8>);

pub(crate) fn common_setup() {
    // Try init since multiple tests calling `init` will cause an error.
    let _ = pretty_env_logger::try_init();
}

pub(crate) fn nibs(s: &str) -> Nibbles {
    Nibbles::from_str(s).unwrap()
}

pub(crate) fn leaf(path: &str, value: &[u8]) -> TrieNode {
    TrieNode::Leaf {
        nibbles: nibs(path),
        value: value.to_vec(),
    }
}

/// Steps `trace` until it goes idle, returning every step.
pub(crate) fn run_to_completion<S: TrieStore>(
    mut trace: Trace,
    store: &mut S,
) -> StepResult<Vec<Step>> {
    while !trace.last()?.is_idle() {
        assert!(
            trace.length() < MAX_STEPS_PER_LOOKUP,
            "Lookup did not finish within {MAX_STEPS_PER_LOOKUP} steps"
        );

        let next = crate::next_step(&trace, store)?;
        trace.push(next);
    }

    Ok(trace.into_steps())
}

/// Writes `value` at `key` and returns the new root.
pub(crate) fn write_key(
    store: &mut MemoryTrieStore,
    root: &[u8],
    key: &Nibbles,
    value: impl AsRef<[u8]>,
) -> Vec<u8> {
    let start = Step::start_write(None, root, key, value.as_ref().to_vec());
    let steps = run_to_completion(Trace::new(start), store).unwrap();

    steps.last().unwrap().current_root.clone()
}

/// Writes every entry in order, starting from `root`, and returns the final
/// root.
pub(crate) fn write_entries(
    store: &mut MemoryTrieStore,
    root: &[u8],
    entries: &[TestEntry],
) -> Vec<u8> {
    entries
        .iter()
        .fold(root.to_vec(), |root, (k, v)| write_key(store, &root, k, v))
}

/// Reads `key` and returns the final step of the lookup.
pub(crate) fn read_key(store: &MemoryTrieStore, root: &[u8], key: &Nibbles) -> Step {
    // Reads never persist anything, so a scratch copy keeps the caller's
    // store borrowed immutably.
    let mut scratch = store.clone();
    let steps = run_to_completion(Trace::new(Step::start_read(None, root, key)), &mut scratch)
        .unwrap();

    steps.last().unwrap().clone()
}

/// The root an established trie library computes for the same entries. Keys
/// must have an even number of nibbles.
pub(crate) fn eth_trie_root(entries: &[TestEntry]) -> H256 {
    let mut truth_trie = EthTrie::new(Arc::new(MemoryDB::new(true)));

    for (k, v) in entries {
        assert_eq!(k.count % 2, 0, "eth_trie keys are whole bytes");
        truth_trie.insert(&k.bytes_be(), v).unwrap();
    }

    // Both of these types are identical except that one is re-exported from a
    // different crate version.
    H256(truth_trie.root_hash().unwrap().0)
}

/// Random full length keys with short (inlined) values.
pub(crate) fn generate_n_random_fixed_entries(
    n: usize,
    seed: u64,
) -> impl Iterator<Item = TestEntry> {
    let mut rng = StdRng::seed_from_u64(seed);

    (0..n).map(move |_| {
        let key = Nibbles::from_h256_be(H256(rng.gen()));
        let value_len = rng.gen_range(1..32);
        let value = (0..value_len).map(|_| rng.gen()).collect();

        (key, value)
    })
}
