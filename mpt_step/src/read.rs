//! The read transition: walk one node down towards the lookup key.

use std::cmp::Ordering;

use bytes::Bytes;
use ethereum_types::H256;
use keccak_hash::KECCAK_NULL_RLP;
use log::{debug, trace};

use crate::{
    error::{StepError, StepResult},
    node::{node_hash, NodeRef, TrieNode, TrieNodeType, MIN_HASHED_NODE_LEN},
    step::{LookupFailure, Step},
    store::TrieStore,
    trace::StepTrace,
};

/// Produces the step after a [`Reading`](crate::step::MptMode::Reading) step.
pub(crate) fn read_step<T, S>(trace: &T, store: &S) -> StepResult<Step>
where
    T: StepTrace + ?Sized,
    S: TrieStore + ?Sized,
{
    let last = trace.last()?;
    let key = last.lookup_key()?;
    let depth = last.lookup_nibble_depth as usize;

    let mut next = last.clone();
    next.parent_node_step = Some(trace.length() - 1);

    if last.at_value {
        let value = resolve_value(store, &last.current_root)?;

        match value.is_empty() {
            false => {
                debug!("Found {} byte value at key {}", value.len(), key);
                next.value = value;
                next.mode = next.mode_on_finish;
            }
            true => finish_failed(&mut next, LookupFailure::EmptyValue),
        }

        return Ok(next);
    }

    let node = load_node(store, &NodeRef::from_bytes(&last.current_root)?)?;
    trace!(
        "Reading {} node at depth {} of key {}",
        TrieNodeType::from(&node),
        depth,
        key
    );

    let remaining = key.truncate_n_nibbles_front(depth);
    match node {
        TrieNode::Empty => finish_failed(&mut next, LookupFailure::EmptyNode),
        TrieNode::Leaf { nibbles, value } => match nibbles.count.cmp(&remaining.count) {
            Ordering::Equal if nibbles == remaining => {
                next.current_root = value;
                next.lookup_nibble_depth = key.count as u8;
                next.at_value = true;
            }
            Ordering::Equal => finish_failed(&mut next, LookupFailure::LeafKeyMismatch),
            Ordering::Less => finish_failed(&mut next, LookupFailure::LeafKeyTooShort),
            Ordering::Greater => finish_failed(&mut next, LookupFailure::LeafKeyTooLong),
        },
        TrieNode::Extension { nibbles, child } => {
            if nibbles.count > remaining.count {
                finish_failed(&mut next, LookupFailure::ExtensionTooLong);
            } else if remaining.get_next_nibbles(nibbles.count) != nibbles {
                finish_failed(&mut next, LookupFailure::ExtensionMismatch);
            } else {
                next.current_root = child.to_vec();
                next.lookup_nibble_depth = (depth + nibbles.count) as u8;
            }
        }
        TrieNode::Branch { children, value } => match remaining.is_empty() {
            true => {
                next.current_root = value;
                next.at_value = true;
            }
            false => {
                let nibble = remaining.get_nibble(0);
                next.current_root = children[nibble as usize].to_vec();
                next.lookup_nibble_depth = (depth + 1) as u8;
            }
        },
    }

    Ok(next)
}

/// Loads the node behind a reference, authenticating anything fetched from
/// the store.
pub(crate) fn load_node<S>(store: &S, node_ref: &NodeRef) -> StepResult<TrieNode>
where
    S: TrieStore + ?Sized,
{
    match node_ref {
        NodeRef::Empty => Ok(TrieNode::Empty),
        NodeRef::Hash(h) if is_empty_trie_hash(h) => Ok(TrieNode::Empty),
        NodeRef::Inline(raw) => Ok(TrieNode::decode(raw)?),
        NodeRef::Hash(h) => {
            let raw = fetch_verified(store, h)?;
            Ok(TrieNode::decode(&raw)?)
        }
    }
}

/// Resolves a value reference. Values of `32` bytes or more are stored by
/// hash, anything shorter is the value itself.
pub(crate) fn resolve_value<S>(store: &S, value_ref: &[u8]) -> StepResult<Vec<u8>>
where
    S: TrieStore + ?Sized,
{
    match value_ref.len() {
        MIN_HASHED_NODE_LEN => {
            let raw = fetch_verified(store, &H256::from_slice(value_ref))?;
            Ok(raw.to_vec())
        }
        _ => Ok(value_ref.to_vec()),
    }
}

/// Both the zero hash and the hash of an empty node stand for an empty trie.
pub(crate) fn is_empty_trie_hash(h: &H256) -> bool {
    h.is_zero() || *h == KECCAK_NULL_RLP
}

fn fetch_verified<S>(store: &S, expected: &H256) -> StepResult<Bytes>
where
    S: TrieStore + ?Sized,
{
    let raw = store.get_node(expected)?;
    let actual = node_hash(&raw);

    if actual != *expected {
        return Err(StepError::WitnessMismatch {
            expected: *expected,
            actual,
        });
    }

    Ok(raw)
}

fn finish_failed(next: &mut Step, failure: LookupFailure) {
    debug!(
        "Lookup of key {:x} failed at depth {}: {:?}",
        next.lookup_key,
        next.lookup_nibble_depth,
        failure
    );

    next.fail_lookup = Some(failure);
    next.value.clear();
    next.mode = next.mode_on_finish;
}
