//! LOUDS succinct trie and loudstxt3 shard format.
//!
//! Dictionaries are stored as one trie per identifier (a first character or
//! a base name such as `memory`) plus shard files holding the rows of every
//! trie node. This crate reads and writes both, bit-exact.
//!
//! # Architecture
//!
//! - [`louds`] -- bit-packed trie: rank/select search over 64-bit words
//! - [`builder`] -- breadth-first trie construction from character-id keys
//! - [`charid`] -- character-to-id table (`charID.chid`)
//! - [`loudstxt3`] -- row-group shard codec addressed by node index
//! - [`identifier`] -- filename-safe escaping of trie identifiers
//! - [`files`] -- on-disk layout, atomic writes and dictionary export

pub mod builder;
pub mod charid;
pub mod files;
pub mod identifier;
pub mod louds;
pub mod loudstxt3;

pub use builder::LoudsBuilder;
pub use charid::CharIdTable;
pub use louds::Louds;

/// Error type for trie and shard encoding, decoding and file access.
#[derive(Debug, thiserror::Error)]
pub enum LoudsError {
    #[error("data too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("trie bit file length {0} is not a multiple of 8")]
    UnalignedBits(usize),
    #[error("character {ch:?} in key {key:?} has no character id")]
    UnmappableCharacter { ch: char, key: String },
    #[error("character table holds {0} characters, at most 256 are addressable")]
    TooManyCharacters(usize),
    #[error("group {index} out of range for shard with {count} groups")]
    IndexOutOfRange { index: usize, count: usize },
    #[error("malformed group {index}: {reason}")]
    MalformedGroup { index: usize, reason: &'static str },
    #[error("{what} exceeds the format limit")]
    TooLarge { what: &'static str },
    #[error("invalid UTF-8 in text block of group {0}")]
    InvalidUtf8(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Persist(#[from] tempfile::PersistError),
}

/// Number of node slots per shard file.
pub const SHARD_SLOTS: usize = 2048;

/// Shard id and slot of a trie node index.
#[inline]
pub fn shard_address(node_index: usize) -> (usize, usize) {
    (node_index >> 11, node_index & (SHARD_SLOTS - 1))
}
