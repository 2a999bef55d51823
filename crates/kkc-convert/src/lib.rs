//! Kana-kanji decoding: dictionary store, typo correction, lattice and the
//! N-best decoder.
//!
//! # Architecture
//!
//! - [`config`] -- dictionary, learning and conversion options
//! - [`store`] -- static tries and shards, connection matrices, learned memory
//! - [`typo`] -- bounded-penalty enumeration of alternate readings
//! - [`lattice`] -- dual-indexed lattice nodes and shared hypothesis chains
//! - [`decoder`] -- fresh, post-commit, suffix-edit and prefix-constrained decoding
//! - [`candidate`] -- chain walk-back and clause segmentation
//! - [`time_expression`] -- digit strings read as clock times
//! - [`handle`] -- the `Converter` that picks a decode mode per request

use std::path::PathBuf;

pub mod candidate;
pub mod config;
pub mod decoder;
pub mod handle;
pub mod lattice;
pub mod store;
pub mod time_expression;
pub mod typo;

pub use candidate::{Candidate, Clause};
pub use config::{ConvertOptions, DictionaryConfig, LearningConfig, LearningType};
pub use decoder::{DecodeState, Decoded, Decoder, PrefixConstraint, TextEdit};
pub use handle::Converter;
pub use store::DictionaryStore;

/// Error type for store construction, export and memory persistence.
///
/// Decoding itself never fails: missing or malformed dictionary data only
/// shrinks the result.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("dictionary data error: {0}")]
    Dictionary(#[from] kkc_louds::LoudsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid matrix file {path}: line {line}: {reason}")]
    InvalidMatrix {
        path: PathBuf,
        line: usize,
        reason: &'static str,
    },

    #[error("learned memory has no directory configured")]
    NoMemoryDirectory,
}
