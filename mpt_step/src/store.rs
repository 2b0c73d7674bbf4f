//! Content-addressed node storage.
//!
//! Nodes are only ever added, never replaced, so a root written by an older
//! step stays resolvable after later writes.

use std::{collections::HashMap, mem};

use bytes::Bytes;
use ethereum_types::{H160, H256};
use log::trace;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    error::{StepError, StepResult},
    node::node_hash,
};

/// Fetches and persists raw node encodings by their hash.
pub trait TrieStore {
    /// Gets the bytes stored under `hash`. Fails if the node is unknown.
    ///
    /// Implementations may be backed by untrusted witness data, so callers
    /// must check that the bytes really hash to `hash`.
    fn get_node(&self, hash: &H256) -> StepResult<Bytes>;

    /// Stores an encoded node and returns its hash.
    fn put_node(&mut self, node: &[u8]) -> H256;
}

impl<S: TrieStore + ?Sized> TrieStore for &mut S {
    fn get_node(&self, hash: &H256) -> StepResult<Bytes> {
        (**self).get_node(hash)
    }

    fn put_node(&mut self, node: &[u8]) -> H256 {
        (**self).put_node(node)
    }
}

/// A [`TrieStore`] held entirely in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryTrieStore {
    nodes: HashMap<H256, Bytes>,
}

impl MemoryTrieStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a proof (any collection of encoded nodes), keying every node
    /// by its hash.
    pub fn insert_proof<I, B>(&mut self, proof: I)
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        for node in proof {
            self.put_node(node.as_ref());
        }
    }

    /// Stores `node` under `hash` without checking that it hashes there. This
    /// is how a dishonest witness looks to the engines.
    pub fn insert_unchecked(&mut self, hash: H256, node: Bytes) {
        self.nodes.insert(hash, node);
    }

    /// Whether a node is stored under `hash`.
    pub fn contains(&self, hash: &H256) -> bool {
        self.nodes.contains_key(hash)
    }

    /// Number of stored nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the store holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over every stored node.
    pub fn nodes(&self) -> impl Iterator<Item = (&H256, &Bytes)> {
        self.nodes.iter()
    }
}

impl TrieStore for MemoryTrieStore {
    fn get_node(&self, hash: &H256) -> StepResult<Bytes> {
        self.nodes
            .get(hash)
            .cloned()
            .ok_or(StepError::MissingNode(*hash))
    }

    fn put_node(&mut self, node: &[u8]) -> H256 {
        let hash = node_hash(node);
        self.nodes
            .entry(hash)
            .or_insert_with(|| Bytes::copy_from_slice(node));

        hash
    }
}

/// The nodes a single step touched.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct StepAccesses {
    /// Hashes passed to [`TrieStore::get_node`], in call order.
    pub fetched: Vec<H256>,
    /// Hashes returned by [`TrieStore::put_node`], in call order.
    pub written: Vec<H256>,
}

impl StepAccesses {
    /// Whether the step touched no stored node at all.
    pub fn is_empty(&self) -> bool {
        self.fetched.is_empty() && self.written.is_empty()
    }
}

/// Wraps a store and records every access until the record is taken. Taking
/// the record after each step yields the witness that step needs.
#[derive(Debug)]
pub struct RecordingTrieStore<S> {
    inner: S,
    accesses: Mutex<StepAccesses>,
}

impl<S: TrieStore> RecordingTrieStore<S> {
    /// Starts recording accesses to `inner`.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            accesses: Mutex::new(StepAccesses::default()),
        }
    }

    /// Returns the accesses recorded since the last call and starts a fresh
    /// record.
    pub fn take_accesses(&self) -> StepAccesses {
        mem::take(&mut *self.accesses.lock())
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Stops recording and hands back the wrapped store.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: TrieStore> TrieStore for RecordingTrieStore<S> {
    fn get_node(&self, hash: &H256) -> StepResult<Bytes> {
        trace!("Fetching node {:x}", hash);
        self.accesses.lock().fetched.push(*hash);

        self.inner.get_node(hash)
    }

    fn put_node(&mut self, node: &[u8]) -> H256 {
        let hash = self.inner.put_node(node);
        trace!("Stored node {:x} ({} bytes)", hash, node.len());
        self.accesses.get_mut().written.push(hash);

        hash
    }
}

/// Names one of the logical tries a lookup can run against.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum TrieSource {
    /// The global account trie.
    WorldAccounts,

    /// The storage trie of a single account.
    AccountStorage(H160),
}

/// Resolves a [`TrieSource`] to the store holding that trie's nodes.
pub trait TrieSelector {
    /// The store type backing every trie.
    type Store: TrieStore;

    /// Gets the store for `source`.
    fn select(&mut self, source: TrieSource) -> &mut Self::Store;
}

/// In-memory stores for the account trie and any number of storage tries.
#[derive(Debug, Default)]
pub struct StateTries<S = MemoryTrieStore> {
    world: S,
    storage: HashMap<H160, S>,
}

impl<S: TrieStore + Default> StateTries<S> {
    /// Creates a selector with an empty store per trie.
    pub fn new() -> Self {
        Self {
            world: S::default(),
            storage: HashMap::new(),
        }
    }
}

impl<S: TrieStore + Default> TrieSelector for StateTries<S> {
    type Store = S;

    fn select(&mut self, source: TrieSource) -> &mut S {
        match source {
            TrieSource::WorldAccounts => &mut self.world,
            TrieSource::AccountStorage(account) => self.storage.entry(account).or_default(),
        }
    }
}
