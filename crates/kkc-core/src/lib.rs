//! Shared value types for the kkc kana-kanji decoding core.
//!
//! - [`entry`] -- dictionary entries, entry sources and reserved class ids
//! - [`character`] -- kana classification and hiragana/katakana conversion
//! - [`input`] -- input elements, styles and the romaji input table context
//! - [`composing`] -- composing text with its input-to-surface position map

pub mod character;
pub mod composing;
pub mod entry;
pub mod input;

pub use composing::ComposingText;
pub use entry::{BOS_EOS_CLASS_ID, DictionaryEntry, EntrySource, NEUTRAL_PHRASE_ID};
pub use input::{InputElement, InputStyle, InputTable};
