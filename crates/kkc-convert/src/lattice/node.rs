// Lattice nodes and N-best chain registration

use std::sync::Arc;

use kkc_core::DictionaryEntry;

use super::{HypothesisChain, LatticeRange};

/// A dictionary entry placed over a range of the composing text.
///
/// `incoming` holds at most N chains that end right before this node,
/// sorted by descending total score with ties in insertion order.
/// `best_scores[i]` is the score of `incoming[i]` extended by this node.
#[derive(Debug, Clone)]
pub struct LatticeNode {
    pub entry: Arc<DictionaryEntry>,
    pub range: LatticeRange,
    pub incoming: Vec<Arc<HypothesisChain>>,
    pub best_scores: Vec<f32>,
}

impl LatticeNode {
    pub fn new(entry: DictionaryEntry, range: LatticeRange) -> Self {
        Self {
            entry: Arc::new(entry),
            range,
            incoming: Vec::new(),
            best_scores: Vec::new(),
        }
    }

    /// Recompute `best_scores` from `incoming`. `connection` gives the cost
    /// added in front of this node for a given predecessor; it is only
    /// charged at the head of the text, where predecessors are roots.
    pub fn update_scores(&mut self, is_head: bool, connection: impl Fn(&HypothesisChain) -> f32) {
        let score = self.entry.score;
        self.best_scores = self
            .incoming
            .iter()
            .map(|prev| {
                if is_head {
                    prev.total_score + score + connection(prev)
                } else {
                    prev.total_score + score
                }
            })
            .collect();
    }

    /// Chain that extends `incoming[index]` with this node.
    pub fn extension(&self, index: usize, total_score: f32) -> Arc<HypothesisChain> {
        Arc::new(HypothesisChain {
            entry: Arc::clone(&self.entry),
            parent: Some(Arc::clone(&self.incoming[index])),
            total_score,
            range: self.range,
        })
    }

    /// Offer `chain` to this node's N-best list. Returns whether it was kept.
    pub fn register(&mut self, chain: Arc<HypothesisChain>, n_best: usize) -> bool {
        let score = chain.total_score;
        let at = self
            .incoming
            .iter()
            .rposition(|c| c.total_score >= score)
            .map_or(0, |p| p + 1);
        if at >= n_best {
            return false;
        }
        if self.incoming.len() >= n_best {
            self.incoming.pop();
        }
        self.incoming.insert(at, chain);
        true
    }

    /// Register every extension of `source` into `self`, adding
    /// `connection` (the class cost between the two nodes).
    /// `accept(i)` may veto the extension of `source.incoming[i]`.
    pub fn register_from(
        &mut self,
        source: &LatticeNode,
        connection: f32,
        n_best: usize,
        mut accept: impl FnMut(usize) -> bool,
    ) {
        for (i, &value) in source.best_scores.iter().enumerate() {
            if !accept(i) {
                continue;
            }
            self.register(source.extension(i, value + connection), n_best);
        }
    }

    pub fn clear_incoming(&mut self) {
        self.incoming.clear();
        self.best_scores.clear();
    }
}
