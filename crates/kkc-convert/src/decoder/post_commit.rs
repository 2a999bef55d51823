// Decoding the remainder of a text after its leading part was committed

use kkc_core::ComposingText;

use super::{DecodeState, Decoded, Decoder, Unconstrained};
use crate::candidate::Candidate;
use crate::lattice::{DualIndexMap, HypothesisChain};

impl Decoder<'_> {
    /// Decode `text`, the part of `previous.text` left after `committed`.
    ///
    /// Nodes of the previous lattice past the committed span are shifted to
    /// the new origin and reused; their chains are re-rooted on a start chain
    /// carrying the committed candidate's right class and phrase class.
    /// Falls back to a fresh decode when `text` is not that remainder.
    pub fn decode_after_commit(&self, text: &ComposingText, committed: &Candidate, previous: &DecodeState) -> Decoded {
        let consumed_input = committed.consumed_input_count;
        let consumed_surface = committed.consumed_surface_count;
        let is_remainder = previous.text.input.get(consumed_input..) == Some(&text.input[..])
            && previous.text.surface.get(consumed_surface..) == Some(&text.surface[..]);
        if !is_remainder || text.is_empty() {
            log::debug!("commit does not prefix the new text, decoding from scratch");
            return self.decode(text);
        }

        let map = DualIndexMap::new(text);
        let mut lattice = previous
            .lattice
            .suffix(text.input_count(), text.surface_count());
        lattice.offset(-(consumed_input as isize), -(consumed_surface as isize));
        lattice.resize(text.input_count(), text.surface_count());
        for node in lattice.iter_mut() {
            node.clear_incoming();
        }
        let root = HypothesisChain::continuation(committed.last_right_id, committed.last_phrase_id);
        self.seed(&mut lattice, &root);
        let eos = self.run_dp(&mut lattice, &map, &map.starts(), &Unconstrained);
        log::debug!(
            "decode after commit of {:?}: {} reused nodes, {} terminal chains",
            committed.text,
            lattice.node_count(),
            eos.len()
        );
        Decoded {
            state: DecodeState {
                text: text.clone(),
                lattice,
            },
            eos,
        }
    }
}
