//! Decoding and encoding of single trie nodes.
//!
//! Nodes travel as raw RLP. The node kind is never stored explicitly: it
//! follows from the list arity (`0`, `2` or `17`) and, for two item lists, from
//! the terminating flag of the hex-prefix encoded path. Children are referenced
//! either by the keccak hash of their encoding or, when that encoding is
//! shorter than `32` bytes, by embedding the encoding itself.

use std::fmt::{self, Display};

use bytes::Bytes;
use enum_as_inner::EnumAsInner;
use ethereum_types::H256;
use keccak_hash::keccak;
use rlp::{Rlp, RlpStream};
use thiserror::Error;

use crate::nibbles::{decode_path, FromHexPrefixError, Nibble, Nibbles};

/// Number of nibble indexed children a branch holds. The value sits in the
/// slot after them.
pub const BRANCH_CHILDREN: usize = 16;

/// Index of the value slot in a branch's RLP list.
pub const BRANCH_VALUE_SLOT: usize = 16;

/// Encodings at least this long are referenced by hash instead of inlined.
pub const MIN_HASHED_NODE_LEN: usize = 32;

/// Errors encountered while turning raw bytes into a [`TrieNode`].
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum NodeDecodeError {
    #[error("Node is not valid RLP: {0}")]
    /// The RLP itself is broken.
    Rlp(#[from] rlp::DecoderError),

    #[error("Node RLP has {actual} bytes but its header only covers {expected}")]
    /// Bytes follow the encoded node.
    TrailingBytes {
        /// Length claimed by the RLP header.
        expected: usize,
        /// Length of the raw input.
        actual: usize,
    },

    #[error("Node is a non-empty RLP string instead of a list: {0}")]
    /// Only the empty string may stand in for a node.
    NotAList(String),

    #[error("Node list has {0} items (expected 0, 2 or 17)")]
    /// The list arity doesn't match any node kind.
    UnexpectedArity(usize),

    #[error(transparent)]
    /// The path of a leaf or extension is malformed.
    InvalidPath(#[from] FromHexPrefixError),

    #[error("Child reference must be empty, an inline node or a 32 byte hash (got {1} bytes: {0})")]
    /// A child slot holds something that can't reference a node.
    InvalidReference(String, usize),
}

/// How a parent (or a step) points at a node.
#[derive(Clone, Debug, EnumAsInner, Eq, Hash, PartialEq)]
pub enum NodeRef {
    /// Nothing is there.
    Empty,

    /// The RLP of a node that encodes to fewer than `32` bytes.
    Inline(Bytes),

    /// The keccak hash of a node's RLP.
    Hash(H256),
}

impl NodeRef {
    /// Reads a reference stored as plain bytes (eg. a step's `current_root`).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NodeDecodeError> {
        match bytes.len() {
            0 => Ok(Self::Empty),
            l if l < MIN_HASHED_NODE_LEN => Ok(Self::Inline(Bytes::copy_from_slice(bytes))),
            MIN_HASHED_NODE_LEN => Ok(Self::Hash(H256::from_slice(bytes))),
            l => Err(NodeDecodeError::InvalidReference(hex::encode(bytes), l)),
        }
    }

    /// The reference a parent stores for a node with the given encoding.
    pub fn for_encoded_node(encoded: Bytes) -> Self {
        match encoded.len() < MIN_HASHED_NODE_LEN {
            true => Self::Inline(encoded),
            false => Self::Hash(node_hash(&encoded)),
        }
    }

    /// The bytes stored in a step for this reference.
    pub fn to_vec(&self) -> Vec<u8> {
        match self {
            NodeRef::Empty => Vec::new(),
            NodeRef::Inline(b) => b.to_vec(),
            NodeRef::Hash(h) => h.as_bytes().to_vec(),
        }
    }

    /// Decodes one child item of a branch or extension.
    fn from_child_item(item: &Rlp) -> Result<Self, NodeDecodeError> {
        if item.is_list() {
            let raw = item.as_raw();
            return match raw.len() < MIN_HASHED_NODE_LEN {
                true => Ok(Self::Inline(Bytes::copy_from_slice(raw))),
                false => Err(NodeDecodeError::InvalidReference(
                    hex::encode(raw),
                    raw.len(),
                )),
            };
        }

        let data = item.data()?;
        match data.len() {
            0 => Ok(Self::Empty),
            MIN_HASHED_NODE_LEN => Ok(Self::Hash(H256::from_slice(data))),
            l => Err(NodeDecodeError::InvalidReference(hex::encode(data), l)),
        }
    }

    fn append_to_stream(&self, s: &mut RlpStream) {
        match self {
            NodeRef::Empty => s.append_empty_data(),
            NodeRef::Inline(b) => s.append_raw(b, 1),
            NodeRef::Hash(h) => s.append(&h.as_bytes()),
        };
    }
}

/// A decoded trie node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TrieNode {
    /// An empty trie (or subtrie).
    Empty,

    /// Terminates a key with a value.
    Leaf {
        /// The remaining key piece.
        nibbles: Nibbles,
        /// The value stored at the key.
        value: Vec<u8>,
    },

    /// Compresses a run of nibbles without branching.
    Extension {
        /// The key piece the extension covers.
        nibbles: Nibbles,
        /// The node below the key piece.
        child: NodeRef,
    },

    /// Sixteen nibble indexed children plus a value slot.
    Branch {
        /// One child per nibble.
        children: Box<[NodeRef; BRANCH_CHILDREN]>,
        /// The value of a key that ends at this branch.
        value: Vec<u8>,
    },
}

impl TrieNode {
    /// A branch with every slot empty.
    pub fn empty_branch() -> Self {
        Self::Branch {
            children: Box::new(std::array::from_fn(|_| NodeRef::Empty)),
            value: Vec::new(),
        }
    }

    /// Decodes the RLP of a single node.
    pub fn decode(raw: &[u8]) -> Result<Self, NodeDecodeError> {
        let rlp = Rlp::new(raw);

        let expected = rlp.payload_info()?.total();
        if expected != raw.len() {
            return Err(NodeDecodeError::TrailingBytes {
                expected,
                actual: raw.len(),
            });
        }

        if !rlp.is_list() {
            return match rlp.data()? {
                [] => Ok(Self::Empty),
                _ => Err(NodeDecodeError::NotAList(hex::encode(raw))),
            };
        }

        match rlp.item_count()? {
            0 => Ok(Self::Empty),
            2 => {
                let (terminating, nibbles) = decode_path(rlp.at(0)?.data()?)?;
                let second = rlp.at(1)?;

                match terminating {
                    true => Ok(Self::Leaf {
                        nibbles,
                        value: second.data()?.to_vec(),
                    }),
                    false => Ok(Self::Extension {
                        nibbles,
                        child: NodeRef::from_child_item(&second)?,
                    }),
                }
            }
            17 => {
                let mut children: [NodeRef; BRANCH_CHILDREN] =
                    std::array::from_fn(|_| NodeRef::Empty);

                for (i, child) in children.iter_mut().enumerate() {
                    *child = NodeRef::from_child_item(&rlp.at(i)?)?;
                }

                Ok(Self::Branch {
                    children: Box::new(children),
                    value: rlp.at(BRANCH_VALUE_SLOT)?.data()?.to_vec(),
                })
            }
            n => Err(NodeDecodeError::UnexpectedArity(n)),
        }
    }

    /// RLP encodes the node.
    pub fn encode(&self) -> Bytes {
        match self {
            TrieNode::Empty => Bytes::from_static(&rlp::NULL_RLP),
            TrieNode::Leaf { nibbles, value } => {
                let mut stream = RlpStream::new_list(2);

                stream.append(&nibbles.to_hex_prefix_encoding(true));
                stream.append(value);

                stream.out().freeze()
            }
            TrieNode::Extension { nibbles, child } => {
                let mut stream = RlpStream::new_list(2);

                stream.append(&nibbles.to_hex_prefix_encoding(false));
                child.append_to_stream(&mut stream);

                stream.out().freeze()
            }
            TrieNode::Branch { children, value } => {
                let mut stream = RlpStream::new_list(17);

                for c in children.iter() {
                    c.append_to_stream(&mut stream);
                }

                match value.is_empty() {
                    false => stream.append(value),
                    true => stream.append_empty_data(),
                };

                stream.out().freeze()
            }
        }
    }

    /// Sets the child at `nibble` of a branch. Does nothing for other kinds.
    pub(crate) fn set_branch_child(&mut self, nibble: Nibble, child: NodeRef) {
        if let TrieNode::Branch { children, .. } = self {
            children[nibble as usize] = child;
        }
    }

    /// Sets the value slot of a branch. Does nothing for other kinds.
    pub(crate) fn set_branch_value(&mut self, new_value: Vec<u8>) {
        if let TrieNode::Branch { value, .. } = self {
            *value = new_value;
        }
    }
}

/// Calculates the hash identifying an encoded node.
pub fn node_hash(bytes: &[u8]) -> H256 {
    keccak(bytes)
}

/// Simplified trie node type to make logging cleaner.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TrieNodeType {
    /// Empty node.
    Empty,

    /// Branch node.
    Branch,

    /// Extension node.
    Extension,

    /// Leaf node.
    Leaf,
}

impl From<&TrieNode> for TrieNodeType {
    fn from(node: &TrieNode) -> Self {
        match node {
            TrieNode::Empty => Self::Empty,
            TrieNode::Branch { .. } => Self::Branch,
            TrieNode::Extension { .. } => Self::Extension,
            TrieNode::Leaf { .. } => Self::Leaf,
        }
    }
}

impl Display for TrieNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrieNodeType::Empty => "Empty",
            TrieNodeType::Branch => "Branch",
            TrieNodeType::Extension => "Extension",
            TrieNodeType::Leaf => "Leaf",
        };

        write!(f, "{}", s)
    }
}
