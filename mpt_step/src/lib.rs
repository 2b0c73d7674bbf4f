//! A step-wise engine for reading and writing Ethereum Merkle Patricia Tries.
//!
//! Instead of walking a trie in one go, every lookup and insert is broken
//! into [`Step`][step::Step]s: immutable snapshots that each touch a single
//! trie node. A step only depends on the steps before it in its
//! [trace][trace::StepTrace] and on the nodes it fetches from a
//! [`TrieStore`][store::TrieStore], so any one of them can be replayed in
//! isolation (see [`verify`]). This is what a fraud proof needs: the two
//! parties bisect down to a single disputed step and only that step is
//! re-executed.
//!
//! Nodes are encoded exactly as Ethereum encodes them. As long as every value
//! is shorter than `32` bytes, the roots produced here are the roots any other
//! client computes for the same contents. Longer values are stored by hash and
//! the leaf holds that hash, so tries holding them get different roots.
//!
//! Driving a lookup looks like this:
//!
//! ```
//! use ethereum_types::H256;
//! use mpt_step::{
//!     next_step, nibbles::Nibbles, step::{LookupFailure, Step}, store::MemoryTrieStore,
//!     trace::{StepTrace, Trace},
//! };
//!
//! let mut store = MemoryTrieStore::new();
//! let key = Nibbles::from_h256_be(H256::repeat_byte(0x42));
//!
//! let mut trace = Trace::new(Step::start_read(None, H256::zero().as_bytes(), &key));
//! while !trace.last().unwrap().is_idle() {
//!     let step = next_step(&trace, &mut store).unwrap();
//!     trace.push(step);
//! }
//!
//! assert_eq!(trace.last().unwrap().fail_lookup, Some(LookupFailure::EmptyNode));
//! ```

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]
#![deny(missing_docs)]

pub mod dispatch;
pub mod error;
pub mod nibbles;
pub mod node;
mod read;
pub mod step;
pub mod store;
pub mod trace;
pub mod verify;
mod write;

#[cfg(test)]
pub(crate) mod testing_utils;

pub use dispatch::{next_step, next_step_in};

/// Serializes byte fields as `0x`-prefixed hex strings, for use with
/// `#[serde(with = "mpt_step::hex")]`.
#[doc(hidden)]
pub mod hex {
    use serde::{de::Error as _, Deserialize as _, Deserializer, Serializer};

    /// Writes `data` as a `0x`-prefixed hex string.
    pub fn serialize<S: Serializer, T>(data: T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: hex::ToHex,
    {
        let s = data.encode_hex::<String>();
        serializer.serialize_str(&format!("0x{}", s))
    }

    /// Reads a hex string, with or without the `0x` prefix.
    pub fn deserialize<'de, D: Deserializer<'de>, T>(deserializer: D) -> Result<T, D::Error>
    where
        T: hex::FromHex,
        T::Error: std::fmt::Display,
    {
        let s = String::deserialize(deserializer)?;
        match s.strip_prefix("0x") {
            Some(rest) => T::from_hex(rest),
            None => T::from_hex(&*s),
        }
        .map_err(D::Error::custom)
    }
}
