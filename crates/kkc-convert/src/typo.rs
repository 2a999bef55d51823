// Bounded-penalty enumeration of alternate readings of an input span
//
// Each variant replaces some keys of `inputs[left..end]` with a likely
// mistyped neighbour and accumulates the replacement weights as a penalty.
// Exploration is depth-first over an explicit stack, so the caller can
// prune subtrees with `set_unreachable_path` between calls to `next`.

use std::ops::RangeInclusive;

use kkc_core::character::{is_roman_letter, to_katakana_char};
use kkc_core::input::{RenderedSegment, direct_key, flatten};
use kkc_core::{InputElement, InputStyle, InputTable};

/// Penalty bound when correction is enabled.
pub const MAX_PENALTY: f32 = 10.5;

/// Weight of table entries without an explicit weight.
const DEFAULT_WEIGHT: f32 = 3.5;

/// Kana-keyboard confusions: key, then replacements with their weights.
const DIRECT_TYPOS: &[(char, &[(char, f32)])] = &[
    ('カ', &[('ガ', 7.0)]),
    ('キ', &[('ギ', DEFAULT_WEIGHT)]),
    ('ク', &[('グ', DEFAULT_WEIGHT)]),
    ('ケ', &[('ゲ', DEFAULT_WEIGHT)]),
    ('コ', &[('ゴ', DEFAULT_WEIGHT)]),
    ('サ', &[('ザ', DEFAULT_WEIGHT)]),
    ('シ', &[('ジ', DEFAULT_WEIGHT)]),
    ('ス', &[('ズ', DEFAULT_WEIGHT)]),
    ('セ', &[('ゼ', DEFAULT_WEIGHT)]),
    ('ソ', &[('ゾ', DEFAULT_WEIGHT)]),
    ('タ', &[('ダ', 6.0)]),
    ('チ', &[('ヂ', DEFAULT_WEIGHT)]),
    ('ツ', &[('ッ', 6.0), ('ヅ', 4.5)]),
    ('テ', &[('デ', 6.0)]),
    ('ト', &[('ド', 4.5)]),
    ('ハ', &[('バ', 4.5), ('パ', 6.0)]),
    ('ヒ', &[('ビ', DEFAULT_WEIGHT), ('ピ', 4.5)]),
    ('フ', &[('ブ', DEFAULT_WEIGHT), ('プ', 4.5)]),
    ('ヘ', &[('ベ', DEFAULT_WEIGHT), ('ペ', 4.5)]),
    ('ホ', &[('ボ', DEFAULT_WEIGHT), ('ポ', 4.5)]),
    ('バ', &[('パ', DEFAULT_WEIGHT)]),
    ('ビ', &[('ピ', DEFAULT_WEIGHT)]),
    ('ブ', &[('プ', DEFAULT_WEIGHT)]),
    ('ベ', &[('ペ', DEFAULT_WEIGHT)]),
    ('ボ', &[('ポ', DEFAULT_WEIGHT)]),
    ('ヤ', &[('ャ', DEFAULT_WEIGHT)]),
    ('ユ', &[('ュ', DEFAULT_WEIGHT)]),
    ('ヨ', &[('ョ', DEFAULT_WEIGHT)]),
];

/// Neighbouring-key confusions on a QWERTY keyboard, all at the default weight.
const ROMAN_TYPOS: &[(&str, &str)] = &[
    ("bs", "ba"),
    ("no", "bo"),
    ("li", "ki"),
    ("lo", "ko"),
    ("lu", "ku"),
    ("my", "mu"),
    ("tp", "to"),
    ("ts", "ta"),
    ("wi", "wo"),
    ("pu", "ou"),
];

/// One alternate reading of `inputs[left..end]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypoVariant {
    /// Rendered reading in katakana.
    pub text: Vec<char>,
    /// Input position right after the variant.
    pub end: usize,
    /// Sum of replacement weights; 0 for the input as typed.
    pub penalty: f32,
}

#[derive(Debug, Clone)]
struct Replacement {
    elements: Vec<InputElement>,
    weight: f32,
}

#[derive(Debug, Clone)]
struct StackItem {
    segments: Vec<RenderedSegment>,
    /// Input elements consumed past `left`.
    count: usize,
    penalty: f32,
}

/// Depth-first generator of [`TypoVariant`]s.
pub struct TypoGenerator<'a> {
    table: &'a InputTable,
    inputs: &'a [InputElement],
    left: usize,
    ends: RangeInclusive<usize>,
    max_penalty: f32,
    /// `nodes[i]` holds the replacements for keys starting at `left + i`.
    nodes: Vec<Vec<Replacement>>,
    stack: Vec<StackItem>,
    has_trie: Option<&'a dyn Fn(char) -> bool>,
}

impl<'a> TypoGenerator<'a> {
    /// Generator over `inputs[left..end]` for every `end` in `ends`.
    ///
    /// With `correction` off the only variant per end is the input itself.
    pub fn new(
        table: &'a InputTable,
        inputs: &'a [InputElement],
        left: usize,
        ends: RangeInclusive<usize>,
        correction: bool,
    ) -> Self {
        let max_end = (*ends.end()).min(inputs.len());
        let count = max_end.saturating_sub(left);
        let nodes: Vec<Vec<Replacement>> = (0..count)
            .map(|i| {
                let at = left + i;
                let mut replacements = replacements_for(&inputs[at..at + 1], correction);
                if i + 1 < count {
                    replacements.extend(replacements_for(&inputs[at..at + 2], correction));
                }
                replacements
            })
            .collect();

        let mut generator = Self {
            table,
            inputs,
            left,
            ends,
            max_penalty: if correction { MAX_PENALTY } else { 0.0 },
            nodes,
            stack: Vec::new(),
            has_trie: None,
        };
        generator.seed();
        generator
    }

    /// Drop variants whose first character is neither a roman letter nor
    /// accepted by `has_trie`.
    pub fn with_prune(mut self, has_trie: &'a dyn Fn(char) -> bool) -> Self {
        self.has_trie = Some(has_trie);
        self.stack.retain(|item| !rejected_by(has_trie, &item.segments));
        self
    }

    fn seed(&mut self) {
        let Some(first) = self.nodes.first() else {
            return;
        };
        let prefix = self.table.render(&self.inputs[..self.left]);
        let prefix_chars = flatten(&prefix);
        for replacement in first {
            if replacement.elements.len() > self.nodes.len() {
                continue;
            }
            let mut joined = prefix.clone();
            let mut own = Vec::new();
            for &element in &replacement.elements {
                self.table.push(&mut joined, element);
                self.table.push(&mut own, element);
            }
            // Left boundary: the replacement must not merge with the text
            // before it.
            let mut expected = prefix_chars.clone();
            expected.extend(flatten(&own));
            if flatten(&joined) != expected {
                continue;
            }
            self.stack.push(StackItem {
                segments: own,
                count: replacement.elements.len(),
                penalty: replacement.weight,
            });
        }
    }

    /// Remove pending variants whose settled reading starts with `target`
    /// (katakana), typically a prefix no dictionary trie contains.
    pub fn set_unreachable_path(&mut self, target: &[char]) {
        if target.is_empty() {
            return;
        }
        let table = self.table;
        self.stack
            .retain(|item| !stable_prefix_reaches(table, &item.segments, target));
    }

    fn end_is_valid(&self, segments: &[RenderedSegment], end: usize) -> bool {
        // Right boundary: the next real keystroke must not rewrite the variant.
        match self.inputs.get(end) {
            Some(&next) => {
                let mut extended = segments.to_vec();
                self.table.push(&mut extended, next);
                is_segment_prefix(segments, &extended)
            }
            None => true,
        }
    }
}

impl Iterator for TypoGenerator<'_> {
    type Item = TypoVariant;

    fn next(&mut self) -> Option<TypoVariant> {
        while let Some(item) = self.stack.pop() {
            let end = self.left + item.count;
            let mut result = None;
            if self.ends.contains(&end) && self.end_is_valid(&item.segments, end) {
                result = Some(TypoVariant {
                    text: flatten(&item.segments)
                        .into_iter()
                        .map(to_katakana_char)
                        .collect(),
                    end,
                    penalty: item.penalty,
                });
            }

            if item.count >= self.nodes.len() {
                if result.is_some() {
                    return result;
                }
                continue;
            }

            if item.penalty >= self.max_penalty {
                let actual = normalized(self.inputs[end]);
                let mut segments = item.segments;
                self.table.push(&mut segments, actual);
                self.stack.push(StackItem {
                    segments,
                    count: item.count + 1,
                    penalty: item.penalty,
                });
            } else {
                for replacement in &self.nodes[item.count] {
                    if item.count + replacement.elements.len() > self.nodes.len() {
                        continue;
                    }
                    let mut segments = item.segments.clone();
                    for &element in &replacement.elements {
                        self.table.push(&mut segments, element);
                    }
                    if self.has_trie.is_some_and(|f| rejected_by(f, &segments)) {
                        continue;
                    }
                    self.stack.push(StackItem {
                        segments,
                        count: item.count + replacement.elements.len(),
                        penalty: item.penalty + replacement.weight,
                    });
                }
            }

            if result.is_some() {
                return result;
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Key form compared against the tables: katakana for direct input,
/// lowercase for romaji.
fn normalized(element: InputElement) -> InputElement {
    let character = match element.style {
        InputStyle::Direct => direct_key(element.character),
        InputStyle::Roman2Kana => element.character.to_ascii_lowercase(),
    };
    InputElement::new(character, element.style)
}

fn replacements_for(elements: &[InputElement], correction: bool) -> Vec<Replacement> {
    let Some(style) = elements.first().map(|e| e.style) else {
        return Vec::new();
    };
    if elements.iter().any(|e| e.style != style) {
        return Vec::new();
    }
    let keys: Vec<InputElement> = elements.iter().copied().map(normalized).collect();
    let mut out = Vec::new();
    if correction {
        match style {
            InputStyle::Direct if keys.len() == 1 => {
                if let Some((_, typos)) = DIRECT_TYPOS.iter().find(|(k, _)| *k == keys[0].character) {
                    out.extend(typos.iter().map(|&(c, weight)| Replacement {
                        elements: vec![InputElement::direct(c)],
                        weight,
                    }));
                }
            }
            InputStyle::Direct => {}
            InputStyle::Roman2Kana => {
                let key: String = keys.iter().map(|e| e.character).collect();
                out.extend(
                    ROMAN_TYPOS
                        .iter()
                        .filter(|(k, _)| *k == key)
                        .map(|(_, value)| Replacement {
                            elements: value.chars().map(InputElement::roman).collect(),
                            weight: DEFAULT_WEIGHT,
                        }),
                );
            }
        }
    }
    if keys.len() == 1 {
        out.push(Replacement {
            elements: keys,
            weight: 0.0,
        });
    }
    out
}

fn rejected_by(has_trie: &dyn Fn(char) -> bool, segments: &[RenderedSegment]) -> bool {
    match segments.first().and_then(|s| s.text.chars().next()) {
        Some(c) => {
            let c = to_katakana_char(c);
            !is_roman_letter(c) && !has_trie(c)
        }
        None => false,
    }
}

/// `a` is a prefix of `b` at segment granularity, where the last segment of
/// `a` may still grow inside the matching segment of `b`.
fn is_segment_prefix(a: &[RenderedSegment], b: &[RenderedSegment]) -> bool {
    if a.len() > b.len() {
        return false;
    }
    match a.split_last() {
        None => true,
        Some((last, init)) => {
            if a.len() == b.len() {
                init == &b[..init.len()]
                    && b[init.len()].style == last.style
                    && b[init.len()].text.starts_with(&last.text)
            } else {
                a == &b[..a.len()]
            }
        }
    }
}

fn stable_prefix_reaches(table: &InputTable, segments: &[RenderedSegment], target: &[char]) -> bool {
    let mut prefix = Vec::new();
    for segment in segments {
        let stable = table.stable_len(segment);
        let total = segment.text.chars().count();
        prefix.extend(segment.text.chars().take(stable).map(to_katakana_char));
        if stable < total {
            break;
        }
        if prefix.starts_with(target) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use kkc_core::ComposingText;

    fn variants(text: &ComposingText, table: &InputTable, left: usize, end: usize) -> Vec<TypoVariant> {
        TypoGenerator::new(table, &text.input, left, end..=end, true).collect()
    }

    fn as_string(v: &TypoVariant) -> String {
        v.text.iter().collect()
    }

    #[test]
    fn correction_off_yields_only_the_input() {
        let table = InputTable::default();
        let text = ComposingText::from_direct("かた");
        let all: Vec<_> = TypoGenerator::new(&table, &text.input, 0, 1..=2, false).collect();
        let mut readings: Vec<_> = all.iter().map(|v| (as_string(v), v.end, v.penalty)).collect();
        readings.sort_by(|a, b| a.1.cmp(&b.1));
        assert_eq!(
            readings,
            vec![("カ".to_string(), 1, 0.0), ("カタ".to_string(), 2, 0.0)]
        );
    }

    #[test]
    fn voiced_variant_carries_table_weight() {
        let table = InputTable::default();
        let text = ComposingText::from_direct("か");
        let all = variants(&text, &table, 0, 1);
        let ga = all.iter().find(|v| as_string(v) == "ガ").unwrap();
        assert_eq!(ga.penalty, 7.0);
        let ka = all.iter().find(|v| as_string(v) == "カ").unwrap();
        assert_eq!(ka.penalty, 0.0);
    }

    #[test]
    fn penalty_bound_limits_replacements() {
        let table = InputTable::default();
        let text = ComposingText::from_direct("はははは");
        for v in variants(&text, &table, 0, 4) {
            // One step may cross the bound, after which only the input is kept.
            assert!(v.penalty < MAX_PENALTY + 7.0, "{v:?}");
            assert_eq!(v.text.len(), 4);
        }
        let all = variants(&text, &table, 0, 4);
        assert!(all.iter().any(|v| as_string(v) == "ハハハハ" && v.penalty == 0.0));
        assert!(all.iter().any(|v| as_string(v) == "パパハハ" && v.penalty == 12.0));
        // Three replacements would need 10.5 + more; the fourth key stays as typed.
        assert!(!all.iter().any(|v| as_string(v) == "バババパ"));
    }

    #[test]
    fn romaji_neighbour_keys() {
        let table = InputTable::default();
        let text = ComposingText::from_romaji(&table, "tp");
        let all = variants(&text, &table, 0, 2);
        let to = all.iter().find(|v| as_string(v) == "ト").unwrap();
        assert_eq!(to.penalty, DEFAULT_WEIGHT);
    }

    #[test]
    fn left_boundary_blocks_merging_with_previous_input() {
        let table = InputTable::default();
        // "k" followed by "a" would merge into か, so no variant may start at 1.
        let text = ComposingText::from_romaji(&table, "ka");
        assert!(variants(&text, &table, 1, 2).is_empty());
    }

    #[test]
    fn right_boundary_blocks_pending_romaji() {
        let table = InputTable::default();
        let text = ComposingText::from_romaji(&table, "kaki");
        // Ending after "kak" would be rewritten by the following "i".
        assert!(variants(&text, &table, 0, 3).is_empty());
        assert!(!variants(&text, &table, 0, 2).is_empty());
    }

    #[test]
    fn unreachable_path_prunes_pending_items() {
        let table = InputTable::default();
        let text = ComposingText::from_direct("かかか");
        let mut generator = TypoGenerator::new(&table, &text.input, 0, 3..=3, true);
        generator.set_unreachable_path(&['ガ']);
        let all: Vec<_> = generator.collect();
        assert!(all.iter().all(|v| v.text[0] != 'ガ'));
        assert!(all.iter().any(|v| as_string(v) == "カカカ"));
    }

    #[test]
    fn prune_drops_first_characters_without_trie() {
        let table = InputTable::default();
        let text = ComposingText::from_direct("かか");
        let only_ka = |c: char| c == 'カ';
        let all: Vec<_> = TypoGenerator::new(&table, &text.input, 0, 2..=2, true)
            .with_prune(&only_ka)
            .collect();
        assert!(!all.is_empty());
        assert!(all.iter().all(|v| v.text[0] == 'カ'));
    }

    #[test]
    fn segment_prefix_rules() {
        let seg = |style, text: &str| RenderedSegment {
            style,
            text: text.to_string(),
        };
        let a = vec![seg(InputStyle::Roman2Kana, "か")];
        let b = vec![seg(InputStyle::Roman2Kana, "かk")];
        assert!(is_segment_prefix(&a, &b));
        let c = vec![seg(InputStyle::Roman2Kana, "が")];
        assert!(!is_segment_prefix(&a, &c));
        let d = vec![seg(InputStyle::Roman2Kana, "か"), seg(InputStyle::Direct, "あ")];
        assert!(is_segment_prefix(&a, &d));
        assert!(!is_segment_prefix(&d, &a));
    }
}
