// LOUDS trie: bit-packed ordinal tree with rank/select search

use crate::LoudsError;

/// A Level-Order Unary Degree Sequence trie.
///
/// The bit stream starts with `10` (a super-root whose only child is the
/// root), followed by one run per node in breadth-first order: a `1` for each
/// child, ordered by character id, then a terminating `0`.
///
/// The node index of a `1` bit at position `p` is the number of `1` bits in
/// `0..=p`, so the root is node 1 and node 0 is never produced. The children
/// of node `k` sit between the `k`-th and `(k+1)`-th zero bits.
///
/// Bits are stored most-significant-first inside little-endian `u64` words,
/// and the last word is padded with `1` bits.
#[derive(Clone)]
pub struct Louds {
    words: Vec<u64>,
    /// `zero_prefix[w]` = number of zero bits in `words[..w]`.
    zero_prefix: Vec<u32>,
    /// Character id of each node, indexed by node index.
    node_to_char: Vec<u8>,
}

impl std::fmt::Debug for Louds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Louds")
            .field("word_count", &self.words.len())
            .field("node_count", &self.node_count())
            .finish()
    }
}

impl Louds {
    /// Build from raw words and the per-node character ids.
    pub fn from_parts(words: Vec<u64>, node_to_char: Vec<u8>) -> Self {
        let mut zero_prefix = Vec::with_capacity(words.len() + 1);
        let mut zeros = 0u32;
        zero_prefix.push(0);
        for w in &words {
            zeros += w.count_zeros();
            zero_prefix.push(zeros);
        }
        Self {
            words,
            zero_prefix,
            node_to_char,
        }
    }

    /// Load from the contents of a `.louds` file and a `.loudschars2` file.
    pub fn from_bytes(bits: &[u8], chars: &[u8]) -> Result<Self, LoudsError> {
        if bits.len() % 8 != 0 {
            return Err(LoudsError::UnalignedBits(bits.len()));
        }
        if bits.is_empty() {
            return Err(LoudsError::TooShort {
                expected: 8,
                actual: 0,
            });
        }
        // Copy into an aligned buffer, then fix endianness.
        let mut words = vec![0u64; bits.len() / 8];
        bytemuck::cast_slice_mut::<u64, u8>(&mut words).copy_from_slice(bits);
        for w in &mut words {
            *w = u64::from_le(*w);
        }
        Ok(Self::from_parts(words, chars.to_vec()))
    }

    /// Serialize to the `.louds` and `.loudschars2` file contents.
    pub fn to_bytes(&self) -> (Vec<u8>, Vec<u8>) {
        let mut bits = Vec::with_capacity(self.words.len() * 8);
        for w in &self.words {
            bits.extend_from_slice(&w.to_le_bytes());
        }
        (bits, self.node_to_char.clone())
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn node_to_char(&self) -> &[u8] {
        &self.node_to_char
    }

    /// Number of real nodes (the root included, the reserved slot excluded).
    pub fn node_count(&self) -> usize {
        self.node_to_char.len().saturating_sub(1)
    }

    #[inline]
    fn bit(&self, position: usize) -> bool {
        (self.words[position / 64] >> (63 - position % 64)) & 1 == 1
    }

    /// Position of the `k`-th zero bit (1-indexed).
    fn select0(&self, k: usize) -> Option<usize> {
        if k == 0 {
            return None;
        }
        let k = k as u32;
        let total = *self.zero_prefix.last()?;
        if k > total {
            return None;
        }
        // First word whose cumulative zero count reaches k.
        let word = self.zero_prefix.partition_point(|&z| z < k) - 1;
        let mut remaining = k - self.zero_prefix[word];
        let w = self.words[word];
        for offset in 0..64 {
            if (w >> (63 - offset)) & 1 == 0 {
                remaining -= 1;
                if remaining == 0 {
                    return Some(word * 64 + offset);
                }
            }
        }
        None
    }

    /// Child node indices of `node` as a half-open range.
    fn children(&self, node: usize) -> Option<std::ops::Range<usize>> {
        let start = self.select0(node)? + 1;
        let end = self.select0(node + 1)?;
        // A child at bit p has node index p + 1 - (zeros before p) = p + 1 - node.
        Some(start + 1 - node..end + 1 - node)
    }

    /// Child of `node` labelled `char_id`.
    fn child(&self, node: usize, char_id: u8) -> Option<usize> {
        let range = self.children(node)?;
        if range.is_empty() || range.end > self.node_to_char.len() {
            return None;
        }
        let labels = &self.node_to_char[range.clone()];
        labels
            .binary_search(&char_id)
            .ok()
            .map(|i| range.start + i)
    }

    /// Node index reached by walking `char_ids` from the root.
    ///
    /// Returns `None` if any id has no matching child.
    pub fn search_node_index(&self, char_ids: &[u8]) -> Option<usize> {
        let mut node = 1;
        for &c in char_ids {
            node = self.child(node, c)?;
        }
        Some(node)
    }

    /// Walk as far as possible along `char_ids`.
    ///
    /// Returns the deepest node reached and how many ids were matched.
    pub fn prefix_walk(&self, char_ids: &[u8]) -> (usize, usize) {
        let mut node = 1;
        for (depth, &c) in char_ids.iter().enumerate() {
            match self.child(node, c) {
                Some(next) => node = next,
                None => return (node, depth),
            }
        }
        (node, char_ids.len())
    }

    /// Whether the bit at `position` is set. Exposed for format checks.
    pub fn bit_at(&self, position: usize) -> Option<bool> {
        if position / 64 < self.words.len() {
            Some(self.bit(position))
        } else {
            None
        }
    }
}
