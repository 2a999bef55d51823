// Decoding after the tail of the text changed

use kkc_core::ComposingText;

use super::{DecodeState, Decoded, Decoder, Unconstrained, sort_chains};
use crate::lattice::{DualIndexMap, HypothesisChain, Lattice};

/// Input elements removed from the end of the previous text, then appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextEdit {
    pub deleted: usize,
    pub added: usize,
}

impl TextEdit {
    /// Edit turning `previous` into `current`, keeping their longest common
    /// input prefix.
    pub fn between(previous: &ComposingText, current: &ComposingText) -> Self {
        let common = previous
            .input
            .iter()
            .zip(&current.input)
            .take_while(|(a, b)| a == b)
            .count();
        Self {
            deleted: previous.input_count() - common,
            added: current.input_count() - common,
        }
    }
}

impl Decoder<'_> {
    /// Decode `text` reusing the nodes of `previous` that lie wholly inside
    /// the part `edit` left untouched.
    ///
    /// Only nodes ending past the retained prefix are looked up again. The
    /// retained nodes keep their chains and extend into the new ones. Falls
    /// back to a fresh decode when `edit` does not describe the change or
    /// no prefix survives.
    pub fn decode_after_edit(&self, text: &ComposingText, previous: &DecodeState, edit: TextEdit) -> Decoded {
        let Some((common_input, common_surface)) = retained_prefix(&previous.text, text, edit) else {
            return self.decode(text);
        };

        let map = DualIndexMap::new(text);
        let mut lattice = previous.lattice.prefix(common_input, common_surface);
        let mut eos = Vec::new();

        if common_input == text.input_count() {
            // Pure deletion: the retained nodes ending at the new end close.
            for node in lattice.iter_mut() {
                if node.incoming.is_empty() || !map.is_terminal(node.range.end()) {
                    continue;
                }
                let is_head = node.range.start().is_zero();
                self.score_node(node, is_head);
                eos.extend(self.terminal_chains(node, &Unconstrained));
            }
            sort_chains(&mut eos);
        } else {
            let mut added = Lattice::new(map.input_count(), map.surface_count());
            for start in map.starts() {
                added.extend(self.lookup_from(text, start, common_input, common_surface, self.typo_correction));
            }
            self.seed(&mut added, &HypothesisChain::bos());
            for node in lattice.iter_mut() {
                if node.incoming.is_empty() {
                    continue;
                }
                let is_head = node.range.start().is_zero();
                self.score_node(node, is_head);
                let source = &*node;
                for next in added.nodes_at_mut(map.dual(source.range.end())) {
                    let cost = self.store.connection_cost(source.entry.right_id, next.entry.left_id);
                    next.register_from(source, cost, self.n_best, |_| true);
                }
            }
            eos = self.run_dp(&mut added, &map, &map.starts(), &Unconstrained);
            lattice.merge(added);
        }
        lattice.resize(map.input_count(), map.surface_count());
        log::debug!(
            "decode after edit (-{}, +{}): kept {common_input} input elements, {} terminal chains",
            edit.deleted,
            edit.added,
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

/// Input and surface length of the prefix shared by both texts, pulled back
/// to a boundary both renderings agree on. `None` when `edit` does not
/// describe the change or nothing is shared.
fn retained_prefix(previous: &ComposingText, current: &ComposingText, edit: TextEdit) -> Option<(usize, usize)> {
    let common = previous.input_count().checked_sub(edit.deleted)?;
    if common + edit.added != current.input_count() || previous.input[..common] != current.input[..common] {
        log::debug!("edit does not match the texts");
        return None;
    }
    let mut input = common;
    while input > 0 {
        if let (Some(a), Some(b)) = (previous.surface_index(input), current.surface_index(input)) {
            if a == b && previous.surface[..a] == current.surface[..b] {
                return Some((input, a));
            }
        }
        input -= 1;
    }
    None
}
