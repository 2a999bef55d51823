// Candidates: terminal chains walked back to their root and segmented into
// clauses

use kkc_core::{ComposingText, DictionaryEntry, NEUTRAL_PHRASE_ID};

use crate::lattice::{HypothesisChain, LatticeIndex, LatticeRange};
use crate::store::DictionaryStore;

/// Score given to the unconverted pass-through candidate.
pub const PASS_THROUGH_SCORE: f32 = -200.0;

/// A run of entries that reads as one phrase.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Clause {
    pub text: String,
    pub ruby: String,
    pub phrase_id: u16,
    pub ranges: Vec<LatticeRange>,
    /// Chain score at the end of the clause.
    pub score: f32,
    pub entry_count: usize,
}

impl Clause {
    fn empty() -> Self {
        Self {
            text: String::new(),
            ruby: String::new(),
            phrase_id: NEUTRAL_PHRASE_ID,
            ranges: Vec::new(),
            score: 0.0,
            entry_count: 0,
        }
    }

    fn push(&mut self, entry: &DictionaryEntry, range: LatticeRange, score: f32) {
        self.text.push_str(&entry.word);
        self.ruby.push_str(&entry.ruby);
        self.ranges.push(range);
        self.score = score;
        self.entry_count += 1;
        if self.phrase_id == NEUTRAL_PHRASE_ID && entry.has_phrase_class() {
            self.phrase_id = entry.phrase_id;
        }
    }
}

/// One conversion result.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Candidate {
    pub text: String,
    pub total_score: f32,
    pub consumed_input_count: usize,
    pub consumed_surface_count: usize,
    pub last_phrase_id: u16,
    pub last_right_id: u16,
    pub entries: Vec<DictionaryEntry>,
    pub clauses: Vec<Clause>,
}

impl Candidate {
    /// Walk `chain` back to its root and segment it into clauses.
    ///
    /// An entry joins the current clause unless the store reports a clause
    /// break between it and its predecessor. The total adds the phrase
    /// bigram cost of every clause, starting from the root's phrase class.
    pub fn from_chain(chain: &HypothesisChain, text: &ComposingText, store: &DictionaryStore) -> Self {
        let path = chain.path();
        let root = path[0];
        let mut clauses = vec![Clause::empty()];
        let mut entries = Vec::new();
        for pair in path.windows(2) {
            let (prev, step) = (pair[0], pair[1]);
            let entry = &*step.entry;
            if entry.word.is_empty() {
                continue;
            }
            let joins = match clauses.last() {
                Some(last) => last.text.is_empty() || !store.is_clause_break(prev.entry.right_id, entry.left_id),
                None => false,
            };
            if !joins {
                clauses.push(Clause::empty());
            }
            if let Some(last) = clauses.last_mut() {
                last.push(entry, step.range, step.total_score);
            }
            entries.push(entry.clone());
        }

        let mut previous_phrase = root.entry.phrase_id;
        let mut phrase_total = 0.0;
        for clause in &clauses {
            phrase_total += store.phrase_cost(previous_phrase, clause.phrase_id);
            previous_phrase = clause.phrase_id;
        }

        let (consumed_input_count, consumed_surface_count) = consumed_counts(chain.range.end(), text);
        Self {
            text: clauses.iter().map(|c| c.text.as_str()).collect(),
            total_score: chain.total_score + phrase_total,
            consumed_input_count,
            consumed_surface_count,
            last_phrase_id: previous_phrase,
            last_right_id: entries.last().map_or(root.entry.right_id, |e| e.right_id),
            entries,
            clauses,
        }
    }

    /// Candidate made of a single entry covering the whole text.
    pub fn from_entry(entry: DictionaryEntry, text: &ComposingText) -> Self {
        let range = LatticeRange::Input {
            start: 0,
            end: text.input_count(),
        };
        let mut clause = Clause::empty();
        clause.push(&entry, range, entry.score);
        Self {
            text: entry.word.clone(),
            total_score: entry.score,
            consumed_input_count: text.input_count(),
            consumed_surface_count: text.surface_count(),
            last_phrase_id: clause.phrase_id,
            last_right_id: entry.right_id,
            entries: vec![entry],
            clauses: vec![clause],
        }
    }

    /// The surface as typed, offered when nothing better exists.
    pub fn pass_through(text: &ComposingText) -> Self {
        let surface = text.surface_string();
        let ruby = kkc_core::character::to_katakana(&surface);
        let entry = DictionaryEntry::with_class(
            surface,
            ruby,
            kkc_core::BOS_EOS_CLASS_ID,
            NEUTRAL_PHRASE_ID,
            PASS_THROUGH_SCORE,
        );
        Self::from_entry(entry, text)
    }

    /// The leading clause as a candidate of its own, for partial commits.
    ///
    /// `None` when the clause ends at a position with no counterpart in the
    /// other space (inside a romaji rendering).
    pub fn first_clause(&self, text: &ComposingText) -> Option<Candidate> {
        let first = self.clauses.first()?;
        if self.clauses.len() == 1 {
            return Some(self.clone());
        }
        let end = first.ranges.last()?.end();
        let (consumed_input_count, consumed_surface_count) = match end {
            LatticeIndex::Input(i) => (i, text.surface_index(i)?),
            LatticeIndex::Surface(s) => (text.input_index(s)?, s),
        };
        let entries = self.entries.get(..first.entry_count)?.to_vec();
        Some(Candidate {
            text: first.text.clone(),
            total_score: first.score,
            consumed_input_count,
            consumed_surface_count,
            last_phrase_id: first.phrase_id,
            last_right_id: entries.last()?.right_id,
            entries,
            clauses: vec![first.clone()],
        })
    }
}

fn consumed_counts(end: LatticeIndex, text: &ComposingText) -> (usize, usize) {
    match end {
        LatticeIndex::Input(i) => (i, text.surface_index(i).unwrap_or(text.surface_count())),
        LatticeIndex::Surface(s) => (text.input_index(s).unwrap_or(text.input_count()), s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DictionaryConfig, LearningConfig};
    use crate::store::CostMatrix;
    use std::sync::Arc;

    fn store(attaching: bool) -> DictionaryStore {
        let config = DictionaryConfig {
            attaching_left_ids: if attaching { vec![20..=29] } else { Vec::new() },
            ..DictionaryConfig::default()
        };
        let mut phrase = CostMatrix::default();
        phrase.set(NEUTRAL_PHRASE_ID, 501, -1.0);
        phrase.set(501, 502, -2.0);
        DictionaryStore::open(config, LearningConfig::default())
            .unwrap()
            .with_matrices(CostMatrix::default(), phrase)
    }

    fn chain(words: &[(&str, &str, u16, u16, f32)]) -> Arc<HypothesisChain> {
        let mut current = HypothesisChain::bos();
        let mut at = 0;
        for &(word, ruby, class, phrase, total) in words {
            let len = ruby.chars().count();
            current = Arc::new(HypothesisChain {
                entry: Arc::new(DictionaryEntry::with_class(word, ruby, class, phrase, -1.0)),
                parent: Some(current),
                total_score: total,
                range: LatticeRange::Input { start: at, end: at + len },
            });
            at += len;
        }
        current
    }

    #[test]
    fn attaching_classes_join_the_clause() {
        let text = ComposingText::from_direct("わたしはがくせい");
        let c = chain(&[
            ("私", "ワタシ", 10, 501, -3.0),
            ("は", "ハ", 21, NEUTRAL_PHRASE_ID, -4.0),
            ("学生", "ガクセイ", 11, 502, -8.0),
        ]);
        let candidate = Candidate::from_chain(&c, &text, &store(true));
        let clauses: Vec<_> = candidate.clauses.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(clauses, vec!["私は", "学生"]);
        assert_eq!(candidate.text, "私は学生");
        assert_eq!(candidate.clauses[0].phrase_id, 501);
        assert_eq!(candidate.clauses[0].score, -4.0);
        assert_eq!(candidate.last_phrase_id, 502);
        assert_eq!(candidate.last_right_id, 11);
        // -8 plus phrase costs: neutral to 501 and 501 to 502.
        assert_eq!(candidate.total_score, -11.0);
        assert_eq!(candidate.consumed_input_count, 8);
        assert_eq!(candidate.consumed_surface_count, 8);
    }

    #[test]
    fn without_rules_every_entry_is_a_clause() {
        let text = ComposingText::from_direct("わたしは");
        let c = chain(&[("私", "ワタシ", 10, 501, -3.0), ("は", "ハ", 21, 501, -4.0)]);
        let candidate = Candidate::from_chain(&c, &text, &store(false));
        assert_eq!(candidate.clauses.len(), 2);
    }

    #[test]
    fn first_clause_consumes_its_span() {
        let text = ComposingText::from_direct("わたしはがくせい");
        let c = chain(&[
            ("私", "ワタシ", 10, 501, -3.0),
            ("は", "ハ", 21, NEUTRAL_PHRASE_ID, -4.0),
            ("学生", "ガクセイ", 11, 502, -8.0),
        ]);
        let candidate = Candidate::from_chain(&c, &text, &store(true));
        let first = candidate.first_clause(&text).unwrap();
        assert_eq!(first.text, "私は");
        assert_eq!(first.consumed_input_count, 4);
        assert_eq!(first.consumed_surface_count, 4);
        assert_eq!(first.entries.len(), 2);
        assert_eq!(first.last_right_id, 21);
    }

    #[test]
    fn pass_through_keeps_the_surface() {
        let text = ComposingText::from_direct("ほげ");
        let candidate = Candidate::pass_through(&text);
        assert_eq!(candidate.text, "ほげ");
        assert_eq!(candidate.entries[0].ruby, "ホゲ");
        assert_eq!(candidate.consumed_input_count, 2);
        assert_eq!(candidate.total_score, PASS_THROUGH_SCORE);
    }
}
