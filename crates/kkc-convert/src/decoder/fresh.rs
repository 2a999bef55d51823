// Decoding a text from scratch

use kkc_core::ComposingText;

use super::{DecodeState, Decoded, Decoder, ExtensionFilter, Unconstrained};
use crate::lattice::{DualIndexMap, HypothesisChain};

impl Decoder<'_> {
    /// Build the whole lattice for `text` and run the N-best search over it.
    /// An empty text, or one no dictionary path covers, yields no chains.
    pub fn decode(&self, text: &ComposingText) -> Decoded {
        self.decode_fresh(text, &Unconstrained, self.typo_correction)
    }

    pub(super) fn decode_fresh(
        &self,
        text: &ComposingText,
        filter: &dyn ExtensionFilter,
        typo_correction: bool,
    ) -> Decoded {
        if text.is_empty() {
            return Decoded::empty(text.clone());
        }
        let map = DualIndexMap::new(text);
        let mut lattice = self.build_lattice(text, &map, 0, 0, typo_correction);
        self.seed(&mut lattice, &HypothesisChain::bos());
        let eos = self.run_dp(&mut lattice, &map, &map.starts(), filter);
        log::debug!(
            "fresh decode of {:?}: {} nodes, {} terminal chains",
            text.surface_string(),
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
