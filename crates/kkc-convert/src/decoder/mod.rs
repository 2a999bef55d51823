// N-best lattice decoder
//
// Four entry points share one dynamic program (`run_dp`): a fresh decode, a
// decode after a partial commit, a decode after a tail edit, and a decode
// whose output must start with a given byte string.

mod fresh;
mod post_commit;
mod prefix_constraint;
mod suffix_edit;

use std::sync::Arc;

use kkc_core::{BOS_EOS_CLASS_ID, ComposingText, DictionaryEntry, InputTable};

use crate::candidate::Candidate;
use crate::config::ConvertOptions;
use crate::lattice::{DualIndex, DualIndexMap, HypothesisChain, Lattice, LatticeNode};
use crate::store::{DictionaryStore, LookupRange};

pub use prefix_constraint::PrefixConstraint;
pub use suffix_edit::TextEdit;

/// The text a lattice was built for, kept so the next request can reuse it.
#[derive(Debug, Clone)]
pub struct DecodeState {
    pub text: ComposingText,
    pub lattice: Lattice,
}

/// Result of one decode: the lattice plus every chain that reached the end
/// of the text, best first.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub state: DecodeState,
    pub eos: Vec<Arc<HypothesisChain>>,
}

impl Decoded {
    pub fn empty(text: ComposingText) -> Self {
        Self {
            state: DecodeState {
                text,
                lattice: Lattice::default(),
            },
            eos: Vec::new(),
        }
    }

    /// Candidates for every terminal chain, ordered by total score
    /// (phrase costs included). Ties keep chain order.
    pub fn candidates(&self, store: &DictionaryStore) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = self
            .eos
            .iter()
            .map(|chain| Candidate::from_chain(chain, &self.state.text, store))
            .collect();
        candidates.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
        candidates
    }
}

/// Veto hook consulted before a chain is extended or terminated.
pub trait ExtensionFilter {
    /// May `prev` followed by `entry` end the text?
    fn accepts_terminal(&self, prev: &HypothesisChain, entry: &DictionaryEntry) -> bool;

    /// May `prev` followed by `entry` continue into `next`?
    fn accepts_extension(&self, prev: &HypothesisChain, entry: &DictionaryEntry, next: &DictionaryEntry) -> bool;
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconstrained;

impl ExtensionFilter for Unconstrained {
    fn accepts_terminal(&self, _prev: &HypothesisChain, _entry: &DictionaryEntry) -> bool {
        true
    }

    fn accepts_extension(&self, _prev: &HypothesisChain, _entry: &DictionaryEntry, _next: &DictionaryEntry) -> bool {
        true
    }
}

/// Decoder bound to one store and input table.
///
/// Every decode is a pure function of its arguments and the store's
/// current contents; nothing is cached between calls.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'a> {
    store: &'a DictionaryStore,
    table: &'a InputTable,
    n_best: usize,
    typo_correction: bool,
}

impl<'a> Decoder<'a> {
    pub fn new(store: &'a DictionaryStore, table: &'a InputTable, options: &ConvertOptions) -> Self {
        Self {
            store,
            table,
            n_best: options.n_best.max(1),
            typo_correction: options.typo_correction,
        }
    }

    pub fn n_best(&self) -> usize {
        self.n_best
    }

    // -----------------------------------------------------------------------
    // Lattice construction
    // -----------------------------------------------------------------------

    /// Nodes starting at `start` whose end lies past `min_input` (input
    /// lookups) or `min_surface` (surface lookups).
    ///
    /// A start with an input counterpart is looked up over input elements,
    /// typo variants included. A start inside a multi-character rendering
    /// only has its exact surface readings.
    fn lookup_from(
        &self,
        text: &ComposingText,
        start: DualIndex,
        min_input: usize,
        min_surface: usize,
        typo_correction: bool,
    ) -> Vec<LatticeNode> {
        let range = match (start.input, start.surface) {
            (Some(i), _) => LookupRange::Input {
                start: i,
                ends: (i + 1).max(min_input + 1)..=text.input_count(),
            },
            (None, Some(s)) => LookupRange::Surface {
                start: s,
                ends: (s + 1).max(min_surface + 1)..=text.surface_count(),
            },
            (None, None) => return Vec::new(),
        };
        let typo = typo_correction && matches!(range, LookupRange::Input { .. });
        let mut nodes = self.store.lookup(text, self.table, range, typo);
        nodes.retain(|n| !self.store.should_suppress(&n.entry));
        nodes
    }

    /// Lattice of every node ending past the given boundaries.
    fn build_lattice(
        &self,
        text: &ComposingText,
        map: &DualIndexMap,
        min_input: usize,
        min_surface: usize,
        typo_correction: bool,
    ) -> Lattice {
        let mut lattice = Lattice::new(map.input_count(), map.surface_count());
        for start in map.starts() {
            lattice.extend(self.lookup_from(text, start, min_input, min_surface, typo_correction));
        }
        lattice
    }

    /// Register `root` into every node starting at the head of the text.
    fn seed(&self, lattice: &mut Lattice, root: &Arc<HypothesisChain>) {
        for node in lattice.nodes_at_mut(DualIndex::ZERO) {
            node.register(Arc::clone(root), self.n_best);
        }
    }

    // -----------------------------------------------------------------------
    // Dynamic program
    // -----------------------------------------------------------------------

    /// Propagate chains through `lattice` in the order of `starts`.
    ///
    /// Each node with incoming chains scores them, then either closes them
    /// against EOS (when it ends the text) or offers them to every node
    /// starting where it ends. Returns the closed chains, best first.
    fn run_dp(
        &self,
        lattice: &mut Lattice,
        map: &DualIndexMap,
        starts: &[DualIndex],
        filter: &dyn ExtensionFilter,
    ) -> Vec<Arc<HypothesisChain>> {
        let mut eos = Vec::new();
        for &start in starts {
            for position in Lattice::positions(start) {
                // Nodes never end where they start, so the list can be taken
                // out while later positions are updated.
                let Some(list) = lattice.list_mut(position) else {
                    continue;
                };
                let mut nodes = std::mem::take(list);
                for node in &mut nodes {
                    if node.incoming.is_empty() {
                        continue;
                    }
                    self.score_node(node, start.is_zero());
                    let end = node.range.end();
                    if map.is_terminal(end) {
                        eos.extend(self.terminal_chains(node, filter));
                        continue;
                    }
                    let source = &*node;
                    for next in lattice.nodes_at_mut(map.dual(end)) {
                        let next_entry = Arc::clone(&next.entry);
                        let cost = self.store.connection_cost(source.entry.right_id, next_entry.left_id);
                        next.register_from(source, cost, self.n_best, |i| {
                            filter.accepts_extension(&source.incoming[i], &source.entry, &next_entry)
                        });
                    }
                }
                if let Some(list) = lattice.list_mut(position) {
                    *list = nodes;
                }
            }
        }
        sort_chains(&mut eos);
        eos
    }

    fn score_node(&self, node: &mut LatticeNode, is_head: bool) {
        let left_id = node.entry.left_id;
        node.update_scores(is_head, |prev| self.store.connection_cost(prev.entry.right_id, left_id));
    }

    /// Chains closing `node` against EOS.
    fn terminal_chains<'n>(
        &'n self,
        node: &'n LatticeNode,
        filter: &'n dyn ExtensionFilter,
    ) -> impl Iterator<Item = Arc<HypothesisChain>> + 'n {
        let eos_cost = self.store.connection_cost(node.entry.right_id, BOS_EOS_CLASS_ID);
        node.best_scores
            .iter()
            .enumerate()
            .filter(move |&(i, _)| filter.accepts_terminal(&node.incoming[i], &node.entry))
            .map(move |(i, &value)| node.extension(i, value + eos_cost))
    }
}

/// Best first; equal scores keep their order.
fn sort_chains(chains: &mut [Arc<HypothesisChain>]) {
    chains.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
}
