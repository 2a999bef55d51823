// Breadth-first LOUDS construction

use std::collections::{BTreeMap, VecDeque};

use crate::charid::CharIdTable;
use crate::louds::Louds;
use crate::LoudsError;

/// Incremental trie builder.
///
/// Keys are inserted into an ordered in-memory trie; [`build`](Self::build)
/// emits the LOUDS bits breadth-first with children sorted by character id.
#[derive(Debug)]
pub struct LoudsBuilder {
    /// Children of each builder node; node 0 is the root.
    children: Vec<BTreeMap<u8, usize>>,
}

/// A built trie plus the LOUDS node index of every builder node.
#[derive(Debug)]
pub struct BuiltTrie {
    pub louds: Louds,
    node_index: Vec<usize>,
}

impl BuiltTrie {
    /// LOUDS node index of the builder node returned by `insert`.
    pub fn node_index(&self, builder_node: usize) -> usize {
        self.node_index[builder_node]
    }
}

impl Default for LoudsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoudsBuilder {
    pub fn new() -> Self {
        Self {
            children: vec![BTreeMap::new()],
        }
    }

    /// Insert a key and return its builder node.
    pub fn insert(&mut self, key: &[u8]) -> usize {
        let mut node = 0;
        for &c in key {
            node = match self.children[node].get(&c) {
                Some(&next) => next,
                None => {
                    let next = self.children.len();
                    self.children.push(BTreeMap::new());
                    self.children[node].insert(c, next);
                    next
                }
            };
        }
        node
    }

    /// Emit the LOUDS encoding.
    pub fn build(self) -> BuiltTrie {
        let node_total = self.children.len();
        let mut bits = BitWriter::default();
        // Super-root with the root as its only child.
        bits.push(true);
        bits.push(false);

        let mut node_index = vec![0usize; node_total];
        let mut node_to_char = vec![0u8, 0u8];
        node_index[0] = 1;

        let mut queue = VecDeque::from([0usize]);
        while let Some(node) = queue.pop_front() {
            for (&c, &child) in &self.children[node] {
                bits.push(true);
                node_index[child] = node_to_char.len();
                node_to_char.push(c);
                queue.push_back(child);
            }
            bits.push(false);
        }

        BuiltTrie {
            louds: Louds::from_parts(bits.finish(), node_to_char),
            node_index,
        }
    }
}

/// Build a trie over string keys; returns the node index of each key in order.
///
/// Fails with [`LoudsError::UnmappableCharacter`] when a key character has
/// no id in `table`.
pub fn build_from_keys(
    keys: &[&str],
    table: &CharIdTable,
) -> Result<(Louds, Vec<usize>), LoudsError> {
    let mut builder = LoudsBuilder::new();
    let mut builder_nodes = Vec::with_capacity(keys.len());
    for key in keys {
        let ids = table.encode_for_build(key)?;
        builder_nodes.push(builder.insert(&ids));
    }
    let built = builder.build();
    let indices = builder_nodes
        .into_iter()
        .map(|n| built.node_index(n))
        .collect();
    Ok((built.louds, indices))
}

/// MSB-first bit packer producing 1-padded words.
#[derive(Default)]
struct BitWriter {
    words: Vec<u64>,
    len: usize,
}

impl BitWriter {
    fn push(&mut self, bit: bool) {
        if self.len % 64 == 0 {
            self.words.push(u64::MAX);
        }
        if !bit {
            let last = self.words.len() - 1;
            self.words[last] &= !(1u64 << (63 - self.len % 64));
        }
        self.len += 1;
    }

    fn finish(self) -> Vec<u64> {
        self.words
    }
}
