//! The write transitions.
//!
//! A write first runs as a read, so the trace already holds one step per node
//! on the path to the key. [`write_start_step`] turns the value into the
//! reference that gets spliced in, then every [`write_step`] rewrites the node
//! of one of those earlier steps (following `parent_node_step` links back up)
//! until the root has been rewritten.
//!
//! What the reference carried up in `write_root` means depends on where it's
//! spliced in. Below a leaf or a branch's value slot it's a value reference;
//! everywhere else it references the node rewritten one level below. The shape
//! of the node being rewritten always tells which one it is.

use log::{debug, trace};

use crate::{
    error::{StepError, StepResult},
    nibbles::Nibbles,
    node::{NodeRef, TrieNode, TrieNodeType, MIN_HASHED_NODE_LEN},
    read::load_node,
    step::{MptMode, Step},
    store::TrieStore,
    trace::StepTrace,
};

/// Produces the step after a [`WriteStart`](MptMode::WriteStart) step.
pub(crate) fn write_start_step<T, S>(trace: &T, store: &mut S) -> StepResult<Step>
where
    T: StepTrace + ?Sized,
    S: TrieStore + ?Sized,
{
    let last = trace.last()?;
    let key = last.lookup_key()?;

    if last.write_value.is_empty() {
        return Err(StepError::EmptyWriteValue);
    }

    let mut next = last.clone();
    next.write_root = match last.write_value.len() >= MIN_HASHED_NODE_LEN {
        false => last.write_value.clone(),
        true => store.put_node(&last.write_value).as_bytes().to_vec(),
    };
    next.mode = MptMode::Writing;

    trace!(
        "Starting write of {} byte value at key {}",
        last.write_value.len(),
        key
    );

    Ok(next)
}

/// Produces the step after a [`Writing`](MptMode::Writing) step: the rewrite
/// of the node one level above the previous rewrite.
pub(crate) fn write_step<T, S>(trace: &T, store: &mut S) -> StepResult<Step>
where
    T: StepTrace + ?Sized,
    S: TrieStore + ?Sized,
{
    let last = trace.last()?;
    let last_idx = trace.length() - 1;
    let parent_idx = last
        .parent_node_step
        .ok_or(StepError::MissingParent(last_idx))?;
    let parent = trace.by_index(parent_idx)?;

    let key = parent.lookup_key()?;
    let remaining = key.truncate_n_nibbles_front(parent.lookup_nibble_depth as usize);

    let rewritten = match parent.at_value {
        true => None,
        false => {
            let node = load_node(&*store, &NodeRef::from_bytes(&parent.current_root)?)?;
            trace!(
                "Rewriting {} node of step {} at depth {}",
                TrieNodeType::from(&node),
                parent_idx,
                parent.lookup_nibble_depth
            );

            Some(rewrite_node(node, &remaining, &last.write_root, store)?)
        }
    };

    let mut next = parent.clone();
    next.mode = MptMode::Writing;
    next.mode_on_finish = last.mode_on_finish;
    next.return_to_step = last.return_to_step;
    next.write_value = last.write_value.clone();
    next.value = last.value.clone();
    next.fail_lookup = last.fail_lookup;

    match (rewritten, parent.parent_node_step) {
        (None, Some(_)) => next.write_root = last.write_root.clone(),
        (Some(node), Some(_)) => next.write_root = store_node(store, &node).to_vec(),
        (Some(node), None) => {
            // The root is always referenced by hash, however small it is.
            let root = store.put_node(&node.encode());
            debug!("Write of key {} produced root {:x}", key, root);

            next.write_root = root.as_bytes().to_vec();
            next.current_root = next.write_root.clone();
            next.mode = next.caller_mode();
        }
        (None, None) => return Err(StepError::MissingParent(parent_idx)),
    }

    Ok(next)
}

/// Rewrites `node` so that the key piece `remaining` (the part of the key
/// left once `node` is reached) leads to `below`.
fn rewrite_node<S>(
    node: TrieNode,
    remaining: &Nibbles,
    below: &[u8],
    store: &mut S,
) -> StepResult<TrieNode>
where
    S: TrieStore + ?Sized,
{
    let rewritten = match node {
        TrieNode::Empty => TrieNode::Leaf {
            nibbles: *remaining,
            value: below.to_vec(),
        },
        TrieNode::Leaf { nibbles, .. } if nibbles == *remaining => TrieNode::Leaf {
            nibbles,
            value: below.to_vec(),
        },
        TrieNode::Leaf { nibbles, value } => {
            split_leaf(&nibbles, value, remaining, below.to_vec(), store)
        }
        TrieNode::Extension { nibbles, .. } if extension_covers(&nibbles, remaining) => {
            TrieNode::Extension {
                nibbles,
                child: NodeRef::from_bytes(below)?,
            }
        }
        TrieNode::Extension { nibbles, child } => {
            split_extension(&nibbles, child, remaining, below.to_vec(), store)
        }
        mut branch @ TrieNode::Branch { .. } => {
            match remaining.is_empty() {
                true => branch.set_branch_value(below.to_vec()),
                false => {
                    let child = NodeRef::from_bytes(below)?;
                    branch.set_branch_child(remaining.get_nibble(0), child);
                }
            }

            branch
        }
    };

    Ok(rewritten)
}

fn extension_covers(ext_nibbles: &Nibbles, remaining: &Nibbles) -> bool {
    ext_nibbles.count <= remaining.count
        && remaining.get_next_nibbles(ext_nibbles.count) == *ext_nibbles
}

/// Replaces a leaf whose key differs from the written one with a branch
/// holding both, behind an extension for any shared prefix.
fn split_leaf<S>(
    leaf_nibbles: &Nibbles,
    leaf_value: Vec<u8>,
    remaining: &Nibbles,
    value: Vec<u8>,
    store: &mut S,
) -> TrieNode
where
    S: TrieStore + ?Sized,
{
    let common = leaf_nibbles.common_prefix_len(remaining);
    trace!(
        "Splitting leaf {} for key piece {} after {} shared nibbles",
        leaf_nibbles,
        remaining,
        common
    );

    let mut branch = TrieNode::empty_branch();
    place_value(&mut branch, leaf_nibbles, common, leaf_value, store);
    place_value(&mut branch, remaining, common, value, store);

    behind_prefix(branch, remaining.get_next_nibbles(common), store)
}

/// Replaces an extension the written key leaves (or ends inside of) with a
/// branch at the point where the two diverge.
fn split_extension<S>(
    ext_nibbles: &Nibbles,
    child: NodeRef,
    remaining: &Nibbles,
    value: Vec<u8>,
    store: &mut S,
) -> TrieNode
where
    S: TrieStore + ?Sized,
{
    let common = ext_nibbles.common_prefix_len(remaining);
    trace!(
        "Splitting extension {} for key piece {} after {} shared nibbles",
        ext_nibbles,
        remaining,
        common
    );

    let rest = ext_nibbles.truncate_n_nibbles_front(common + 1);
    let existing = match rest.is_empty() {
        true => child,
        false => store_node(
            store,
            &TrieNode::Extension {
                nibbles: rest,
                child,
            },
        ),
    };

    let mut branch = TrieNode::empty_branch();
    branch.set_branch_child(ext_nibbles.get_nibble(common), existing);
    place_value(&mut branch, remaining, common, value, store);

    behind_prefix(branch, ext_nibbles.get_next_nibbles(common), store)
}

/// Puts `value` into a branch that sits `common` nibbles into `path`: in the
/// value slot if the path ends there, otherwise in a leaf under the next
/// nibble.
fn place_value<S>(
    branch: &mut TrieNode,
    path: &Nibbles,
    common: usize,
    value: Vec<u8>,
    store: &mut S,
) where
    S: TrieStore + ?Sized,
{
    if path.count == common {
        branch.set_branch_value(value);
        return;
    }

    let leaf = TrieNode::Leaf {
        nibbles: path.truncate_n_nibbles_front(common + 1),
        value,
    };
    branch.set_branch_child(path.get_nibble(common), store_node(store, &leaf));
}

fn behind_prefix<S>(node: TrieNode, prefix: Nibbles, store: &mut S) -> TrieNode
where
    S: TrieStore + ?Sized,
{
    match prefix.is_empty() {
        true => node,
        false => TrieNode::Extension {
            nibbles: prefix,
            child: store_node(store, &node),
        },
    }
}

/// Encodes a node and returns the reference a parent keeps for it, persisting
/// it if it's too large to be inlined.
fn store_node<S>(store: &mut S, node: &TrieNode) -> NodeRef
where
    S: TrieStore + ?Sized,
{
    let encoded = node.encode();
    let node_ref = NodeRef::for_encoded_node(encoded.clone());

    if node_ref.is_hash() {
        store.put_node(&encoded);
    }

    node_ref
}
