// Lattice data model
//
// Nodes are stored by start position in one of two arrays: input-indexed
// nodes come from lookups over raw input (typo expansion included),
// surface-indexed nodes from positions inside a multi-character rendering
// that has no input boundary.

mod chain;
mod index;
mod node;

pub use chain::HypothesisChain;
pub use index::{DualIndex, DualIndexMap, LatticeIndex, LatticeRange};
pub use node::LatticeNode;

/// Lattice nodes grouped by start position and coordinate space.
#[derive(Debug, Clone, Default)]
pub struct Lattice {
    input_nodes: Vec<Vec<LatticeNode>>,
    surface_nodes: Vec<Vec<LatticeNode>>,
}

impl Lattice {
    pub fn new(input_count: usize, surface_count: usize) -> Self {
        Self {
            input_nodes: vec![Vec::new(); input_count],
            surface_nodes: vec![Vec::new(); surface_count],
        }
    }

    /// Place `node` under its start position.
    pub fn insert(&mut self, node: LatticeNode) {
        let (list, at) = match node.range.start() {
            LatticeIndex::Input(i) => (&mut self.input_nodes, i),
            LatticeIndex::Surface(s) => (&mut self.surface_nodes, s),
        };
        if list.len() <= at {
            list.resize_with(at + 1, Vec::new);
        }
        list[at].push(node);
    }

    pub fn extend(&mut self, nodes: impl IntoIterator<Item = LatticeNode>) {
        for node in nodes {
            self.insert(node);
        }
    }

    /// Nodes starting at `index`.
    pub fn list(&self, index: LatticeIndex) -> &[LatticeNode] {
        let list = match index {
            LatticeIndex::Input(i) => self.input_nodes.get(i),
            LatticeIndex::Surface(s) => self.surface_nodes.get(s),
        };
        list.map(Vec::as_slice).unwrap_or_default()
    }

    pub fn list_mut(&mut self, index: LatticeIndex) -> Option<&mut Vec<LatticeNode>> {
        match index {
            LatticeIndex::Input(i) => self.input_nodes.get_mut(i),
            LatticeIndex::Surface(s) => self.surface_nodes.get_mut(s),
        }
    }

    /// Nodes starting at either side of `index`.
    pub fn nodes_at(&self, index: DualIndex) -> impl Iterator<Item = &LatticeNode> {
        let input = index.input.and_then(|i| self.input_nodes.get(i));
        let surface = index.surface.and_then(|s| self.surface_nodes.get(s));
        input.into_iter().chain(surface).flatten()
    }

    pub fn nodes_at_mut(&mut self, index: DualIndex) -> impl Iterator<Item = &mut LatticeNode> {
        let input = index.input.and_then(|i| self.input_nodes.get_mut(i));
        let surface = index.surface.and_then(|s| self.surface_nodes.get_mut(s));
        input.into_iter().chain(surface).flatten()
    }

    /// Start positions of `index` that hold nodes, input side first.
    pub fn positions(index: DualIndex) -> impl Iterator<Item = LatticeIndex> {
        index
            .input
            .map(LatticeIndex::Input)
            .into_iter()
            .chain(index.surface.map(LatticeIndex::Surface))
    }

    pub fn iter(&self) -> impl Iterator<Item = &LatticeNode> {
        self.input_nodes.iter().chain(&self.surface_nodes).flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut LatticeNode> {
        self.input_nodes
            .iter_mut()
            .chain(self.surface_nodes.iter_mut())
            .flatten()
    }

    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Nodes that start and end within the first `input_count` input
    /// elements or `surface_count` surface characters.
    pub fn prefix(&self, input_count: usize, surface_count: usize) -> Lattice {
        let keep = |lists: &[Vec<LatticeNode>], count: usize| -> Vec<Vec<LatticeNode>> {
            lists
                .iter()
                .take(count)
                .map(|list| {
                    list.iter()
                        .filter(|n| n.range.ends_within(input_count, surface_count))
                        .cloned()
                        .collect()
                })
                .collect()
        };
        Lattice {
            input_nodes: keep(&self.input_nodes, input_count),
            surface_nodes: keep(&self.surface_nodes, surface_count),
        }
    }

    /// The last `input_count` input positions and the last `surface_count`
    /// surface positions. Ranges are left untouched; see [`Lattice::offset`].
    pub fn suffix(&self, input_count: usize, surface_count: usize) -> Lattice {
        let tail = |lists: &[Vec<LatticeNode>], count: usize| -> Vec<Vec<LatticeNode>> {
            lists[lists.len().saturating_sub(count)..].to_vec()
        };
        Lattice {
            input_nodes: tail(&self.input_nodes, input_count),
            surface_nodes: tail(&self.surface_nodes, surface_count),
        }
    }

    /// Pad or cut both arrays to the given position counts.
    pub fn resize(&mut self, input_count: usize, surface_count: usize) {
        self.input_nodes.resize_with(input_count, Vec::new);
        self.surface_nodes.resize_with(surface_count, Vec::new);
    }

    /// Shift every node range by the delta of its space.
    pub fn offset(&mut self, input_delta: isize, surface_delta: isize) {
        for node in self.iter_mut() {
            node.range = node.range.offset(input_delta, surface_delta);
        }
    }

    /// Append `other`'s nodes position by position.
    pub fn merge(&mut self, other: Lattice) {
        merge_lists(&mut self.input_nodes, other.input_nodes);
        merge_lists(&mut self.surface_nodes, other.surface_nodes);
    }
}

fn merge_lists(into: &mut Vec<Vec<LatticeNode>>, from: Vec<Vec<LatticeNode>>) {
    if into.len() < from.len() {
        into.resize_with(from.len(), Vec::new);
    }
    for (target, nodes) in into.iter_mut().zip(from) {
        target.extend(nodes);
    }
}
