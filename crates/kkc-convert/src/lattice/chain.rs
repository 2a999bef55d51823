// Shared, immutable hypothesis chains

use std::sync::Arc;

use kkc_core::DictionaryEntry;

use super::LatticeRange;

/// One step of a decoding hypothesis, linked to its predecessor.
///
/// Chains share their prefixes: every node that extends a chain holds an
/// `Arc` to it, so N-best lists across the lattice stay cheap.
#[derive(Debug)]
pub struct HypothesisChain {
    pub entry: Arc<DictionaryEntry>,
    pub parent: Option<Arc<HypothesisChain>>,
    /// Accumulated score up to and including `entry`.
    pub total_score: f32,
    pub range: LatticeRange,
}

impl HypothesisChain {
    /// The sentence-start root.
    pub fn bos() -> Arc<Self> {
        Arc::new(Self {
            entry: Arc::new(DictionaryEntry::bos()),
            parent: None,
            total_score: 0.0,
            range: LatticeRange::ZERO,
        })
    }

    /// Root that continues after a committed candidate: it carries the
    /// committed right class and phrase class, with a zero score.
    pub fn continuation(right_id: u16, phrase_id: u16) -> Arc<Self> {
        let mut entry = DictionaryEntry::bos();
        entry.right_id = right_id;
        entry.phrase_id = phrase_id;
        Arc::new(Self {
            entry: Arc::new(entry),
            parent: None,
            total_score: 0.0,
            range: LatticeRange::ZERO,
        })
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Steps from the root to `self`, root first.
    pub fn path(&self) -> Vec<&HypothesisChain> {
        let mut steps = Vec::new();
        let mut current = Some(self);
        while let Some(step) = current {
            steps.push(step);
            current = step.parent.as_deref();
        }
        steps.reverse();
        steps
    }

    /// Entries of the chain without the root, in reading order.
    pub fn entries(&self) -> Vec<Arc<DictionaryEntry>> {
        self.path()
            .into_iter()
            .skip(1)
            .map(|step| Arc::clone(&step.entry))
            .collect()
    }
}
