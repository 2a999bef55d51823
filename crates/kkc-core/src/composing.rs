// Composing text: raw input elements, rendered surface and the
// input-to-surface position map

use crate::input::{InputElement, InputStyle, InputTable, RenderedSegment};

/// The phonetic input handed to the decoder for one call.
///
/// `input_to_surface[i]` is `Some(s)` when the rendering of `input[..i]` is
/// settled (the next element cannot rewrite it) and equals `surface[..s]`.
/// Mid-romaji positions such as the one after `k` in `ka` have no surface
/// counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposingText {
    pub input: Vec<InputElement>,
    pub surface: Vec<char>,
    input_to_surface: Vec<Option<usize>>,
}

impl ComposingText {
    /// Render `input` through `table` and compute the position map.
    pub fn new(table: &InputTable, input: Vec<InputElement>) -> Self {
        let mut prefixes: Vec<Vec<RenderedSegment>> = Vec::with_capacity(input.len() + 1);
        let mut segments = Vec::new();
        prefixes.push(segments.clone());
        for &element in &input {
            table.push(&mut segments, element);
            prefixes.push(segments.clone());
        }
        let surface = crate::input::flatten(&segments);

        let rendered: Vec<Vec<char>> = prefixes.iter().map(|s| crate::input::flatten(s)).collect();
        let mut input_to_surface = Vec::with_capacity(input.len() + 1);
        for i in 0..=input.len() {
            let here = &rendered[i];
            let settled = i == input.len()
                || (rendered[i + 1].starts_with(here) && settled_under(table, &prefixes[i]));
            if settled && surface.starts_with(here) {
                input_to_surface.push(Some(here.len()));
            } else {
                input_to_surface.push(None);
            }
        }

        Self {
            input,
            surface,
            input_to_surface,
        }
    }

    /// Composing text typed on a kana keyboard.
    pub fn from_direct(text: &str) -> Self {
        let input = text.chars().map(InputElement::direct).collect::<Vec<_>>();
        let surface = text.chars().collect::<Vec<_>>();
        let input_to_surface = (0..=surface.len()).map(Some).collect();
        Self {
            input,
            surface,
            input_to_surface,
        }
    }

    /// Composing text typed as romaji.
    pub fn from_romaji(table: &InputTable, text: &str) -> Self {
        Self::new(table, text.chars().map(InputElement::roman).collect())
    }

    pub fn input_count(&self) -> usize {
        self.input.len()
    }

    pub fn surface_count(&self) -> usize {
        self.surface.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    pub fn surface_string(&self) -> String {
        self.surface.iter().collect()
    }

    /// Surface position for an input boundary, if it has one.
    pub fn surface_index(&self, input_index: usize) -> Option<usize> {
        self.input_to_surface.get(input_index).copied().flatten()
    }

    /// Input boundary for a surface position, if one maps to it.
    ///
    /// When several input boundaries map to the same surface position (a
    /// trailing pending consonant), the earliest one wins.
    pub fn input_index(&self, surface_index: usize) -> Option<usize> {
        self.input_to_surface
            .iter()
            .position(|s| *s == Some(surface_index))
    }

    /// Text with the first `input_count` elements removed, re-rendered.
    pub fn dropping_prefix(&self, table: &InputTable, input_count: usize) -> Self {
        let rest = self.input[input_count.min(self.input.len())..].to_vec();
        if rest.iter().all(|e| e.style == InputStyle::Direct) {
            Self::from_direct(&rest.iter().map(|e| e.character).collect::<String>())
        } else {
            Self::new(table, rest)
        }
    }
}

/// A prefix rendering is settled when its last segment has no pending tail.
fn settled_under(table: &InputTable, segments: &[RenderedSegment]) -> bool {
    match segments.last() {
        Some(last) => table.stable_len(last) == last.text.chars().count(),
        None => true,
    }
}
