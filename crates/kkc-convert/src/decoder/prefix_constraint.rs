// Decoding whose output must begin with a fixed string
//
// Compatibility is checked on UTF-8 bytes of the words along a chain.
// Learned and user entries are never filtered.

use kkc_core::{ComposingText, DictionaryEntry};

use super::{Decoded, Decoder, ExtensionFilter};
use crate::lattice::HypothesisChain;

/// Required start of every decoded text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixConstraint {
    bytes: Vec<u8>,
    has_eos: bool,
}

impl PrefixConstraint {
    /// `has_eos` asks for texts equal to `text` rather than starting with it.
    ///
    /// With `has_eos`, every extension must leave the text strictly shorter
    /// than `text`. The extension into the word that completes it is
    /// therefore refused, and only a single word spanning the whole input
    /// closes. Learned and user words are exempt.
    pub fn new(text: &str, has_eos: bool) -> Self {
        Self {
            bytes: text.as_bytes().to_vec(),
            has_eos,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn has_eos(&self) -> bool {
        self.has_eos
    }

    /// Bytes of `words` matching the constraint before the first mismatch
    /// (capped at its length), and their total byte length.
    fn matched_and_total<'w>(&self, words: impl IntoIterator<Item = &'w str>) -> (usize, usize) {
        let mut matched = 0;
        let mut total = 0;
        let mut diverged = false;
        for word in words {
            for &b in word.as_bytes() {
                if !diverged {
                    if matched < self.bytes.len() && self.bytes[matched] == b {
                        matched += 1;
                    } else {
                        diverged = true;
                    }
                }
            }
            total += word.len();
        }
        (matched, total)
    }
}

/// Words of `prev` (root excluded) followed by `word`.
fn chain_words<'c>(prev: &'c HypothesisChain, word: &'c str) -> impl Iterator<Item = &'c str> {
    prev.path()
        .into_iter()
        .map(|step| step.entry.word.as_str())
        .filter(|w| !w.is_empty())
        .chain(std::iter::once(word))
}

impl ExtensionFilter for PrefixConstraint {
    fn accepts_terminal(&self, prev: &HypothesisChain, entry: &DictionaryEntry) -> bool {
        if entry.source.is_trusted() {
            return true;
        }
        let (matched, total) = self.matched_and_total(chain_words(prev, &entry.word));
        let len = self.bytes.len();
        if self.has_eos {
            matched == len && total == len
        } else {
            matched == len
        }
    }

    fn accepts_extension(&self, prev: &HypothesisChain, entry: &DictionaryEntry, next: &DictionaryEntry) -> bool {
        if next.source.is_trusted() {
            return true;
        }
        let len = self.bytes.len();
        let (matched, total) = self.matched_and_total(chain_words(prev, &entry.word));
        if matched != total.min(len) {
            return false;
        }
        let (matched, total) = self.matched_and_total(chain_words(prev, &entry.word).chain([next.word.as_str()]));
        if self.has_eos {
            // The extended text must stay a strict prefix.
            matched == total && total < len
        } else {
            matched == len || (total <= len && matched == total)
        }
    }
}

impl Decoder<'_> {
    /// Fresh decode keeping only chains compatible with `constraint`.
    /// Typo variants are not looked up.
    pub fn decode_with_prefix(&self, text: &ComposingText, constraint: &PrefixConstraint) -> Decoded {
        self.decode_fresh(text, constraint, false)
    }
}
