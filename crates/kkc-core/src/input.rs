// Input elements and the romaji input table context
//
// The input table is an explicit value owned by the caller and passed to
// everything that renders keystrokes into kana. There is no process-wide
// table cache.

use hashbrown::{HashMap, HashSet};

use crate::character::to_katakana_char;

/// How a keystroke is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InputStyle {
    /// The character is taken verbatim (kana keyboards, flick input).
    Direct,
    /// The character is a romaji keystroke converted through the input table.
    Roman2Kana,
}

/// One raw keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InputElement {
    pub character: char,
    pub style: InputStyle,
}

impl InputElement {
    pub fn new(character: char, style: InputStyle) -> Self {
        Self { character, style }
    }

    pub fn direct(character: char) -> Self {
        Self::new(character, InputStyle::Direct)
    }

    pub fn roman(character: char) -> Self {
        Self::new(character, InputStyle::Roman2Kana)
    }
}

/// A run of rendered text produced by consecutive elements of one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSegment {
    pub style: InputStyle,
    pub text: String,
}

/// Error raised when parsing a custom input table.
#[derive(Debug, thiserror::Error)]
pub enum InputTableError {
    #[error("line {line}: expected `key<TAB>value`")]
    MalformedLine { line: usize },
    #[error("line {line}: key must be non-empty ASCII")]
    InvalidKey { line: usize },
}

// ---------------------------------------------------------------------------
// Default romaji rules
// ---------------------------------------------------------------------------

const VOWELS: [&str; 5] = ["a", "i", "u", "e", "o"];

/// Consonant rows: key prefix and the kana for a, i, u, e, o.
const ROWS: &[(&str, [&str; 5])] = &[
    ("", ["あ", "い", "う", "え", "お"]),
    ("k", ["か", "き", "く", "け", "こ"]),
    ("s", ["さ", "し", "す", "せ", "そ"]),
    ("t", ["た", "ち", "つ", "て", "と"]),
    ("n", ["な", "に", "ぬ", "ね", "の"]),
    ("h", ["は", "ひ", "ふ", "へ", "ほ"]),
    ("m", ["ま", "み", "む", "め", "も"]),
    ("y", ["や", "い", "ゆ", "いぇ", "よ"]),
    ("r", ["ら", "り", "る", "れ", "ろ"]),
    ("w", ["わ", "うぃ", "う", "うぇ", "を"]),
    ("g", ["が", "ぎ", "ぐ", "げ", "ご"]),
    ("z", ["ざ", "じ", "ず", "ぜ", "ぞ"]),
    ("d", ["だ", "ぢ", "づ", "で", "ど"]),
    ("b", ["ば", "び", "ぶ", "べ", "ぼ"]),
    ("p", ["ぱ", "ぴ", "ぷ", "ぺ", "ぽ"]),
    ("f", ["ふぁ", "ふぃ", "ふ", "ふぇ", "ふぉ"]),
    ("j", ["じゃ", "じ", "じゅ", "じぇ", "じょ"]),
    ("v", ["ゔぁ", "ゔぃ", "ゔ", "ゔぇ", "ゔぉ"]),
    ("x", ["ぁ", "ぃ", "ぅ", "ぇ", "ぉ"]),
    ("l", ["ぁ", "ぃ", "ぅ", "ぇ", "ぉ"]),
    ("sh", ["しゃ", "し", "しゅ", "しぇ", "しょ"]),
    ("ch", ["ちゃ", "ち", "ちゅ", "ちぇ", "ちょ"]),
    ("ts", ["つぁ", "つぃ", "つ", "つぇ", "つぉ"]),
    ("th", ["てゃ", "てぃ", "てゅ", "てぇ", "てょ"]),
    ("dh", ["でゃ", "でぃ", "でゅ", "でぇ", "でょ"]),
    ("xy", ["ゃ", "ぃ", "ゅ", "ぇ", "ょ"]),
    ("ly", ["ゃ", "ぃ", "ゅ", "ぇ", "ょ"]),
];

/// Consonants whose `y` combination yields a contracted sound (きゃ, しゃ, ...).
const CONTRACTED: &[(&str, &str)] = &[
    ("k", "き"),
    ("s", "し"),
    ("t", "ち"),
    ("c", "ち"),
    ("n", "に"),
    ("h", "ひ"),
    ("m", "み"),
    ("r", "り"),
    ("g", "ぎ"),
    ("z", "じ"),
    ("j", "じ"),
    ("d", "ぢ"),
    ("b", "び"),
    ("p", "ぴ"),
];

const SMALL_Y: [&str; 5] = ["ゃ", "ぃ", "ゅ", "ぇ", "ょ"];

const EXTRA: &[(&str, &str)] = &[
    ("nn", "ん"),
    ("n'", "ん"),
    ("xn", "ん"),
    ("xtu", "っ"),
    ("ltu", "っ"),
    ("xtsu", "っ"),
    ("shi", "し"),
    ("chi", "ち"),
    ("tsu", "つ"),
    ("ca", "か"),
    ("cu", "く"),
    ("co", "こ"),
    ("qa", "くぁ"),
    ("qi", "くぃ"),
    ("qe", "くぇ"),
    ("qo", "くぉ"),
    ("-", "ー"),
    (",", "、"),
    (".", "。"),
];

/// Romaji-to-kana conversion rules plus the derived set of unstable tails.
#[derive(Debug, Clone)]
pub struct InputTable {
    rules: HashMap<String, String>,
    /// Proper prefixes of rule keys: a rendered tail in this set may still
    /// be rewritten by the next keystroke.
    pending_prefixes: HashSet<String>,
    max_key_len: usize,
}

impl Default for InputTable {
    fn default() -> Self {
        let mut rules = Vec::new();
        for (consonant, kana) in ROWS {
            for (vowel, k) in VOWELS.iter().zip(kana) {
                rules.push((format!("{consonant}{vowel}"), (*k).to_string()));
            }
        }
        for (consonant, head) in CONTRACTED {
            for (vowel, small) in VOWELS.iter().zip(SMALL_Y) {
                rules.push((format!("{consonant}y{vowel}"), format!("{head}{small}")));
            }
        }
        for (key, value) in EXTRA {
            rules.push(((*key).to_string(), (*value).to_string()));
        }
        Self::from_rules(rules)
    }
}

impl InputTable {
    /// Build a table from `(key, kana)` pairs. Later pairs win on duplicate keys.
    pub fn from_rules(rules: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut map = HashMap::new();
        let mut pending_prefixes = HashSet::new();
        let mut max_key_len = 0;
        for (key, value) in rules {
            let key = key.to_ascii_lowercase();
            for end in 1..key.len() {
                pending_prefixes.insert(key[..end].to_string());
            }
            max_key_len = max_key_len.max(key.len());
            map.insert(key, value);
        }
        Self {
            rules: map,
            pending_prefixes,
            max_key_len,
        }
    }

    /// Parse a custom table: one `key<TAB>kana` rule per line, `#` comments.
    pub fn parse(text: &str) -> Result<Self, InputTableError> {
        let mut rules = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('\t')
                .ok_or(InputTableError::MalformedLine { line: i + 1 })?;
            if key.is_empty() || !key.is_ascii() {
                return Err(InputTableError::InvalidKey { line: i + 1 });
            }
            rules.push((key.to_string(), value.to_string()));
        }
        Ok(Self::from_rules(rules))
    }

    /// Kana for an exact romaji key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.rules.get(key).map(String::as_str)
    }

    /// Append one element to the rendered segments.
    pub fn push(&self, segments: &mut Vec<RenderedSegment>, element: InputElement) {
        match segments.last_mut() {
            Some(last) if last.style == element.style => {
                self.push_into(&mut last.text, element);
            }
            _ => {
                let mut text = String::new();
                self.push_into(&mut text, element);
                segments.push(RenderedSegment {
                    style: element.style,
                    text,
                });
            }
        }
    }

    /// Render a whole element sequence.
    pub fn render(&self, elements: &[InputElement]) -> Vec<RenderedSegment> {
        let mut segments = Vec::new();
        for &element in elements {
            self.push(&mut segments, element);
        }
        segments
    }

    /// Render a whole element sequence to characters.
    pub fn render_chars(&self, elements: &[InputElement]) -> Vec<char> {
        flatten(&self.render(elements))
    }

    fn push_into(&self, text: &mut String, element: InputElement) {
        match element.style {
            InputStyle::Direct => text.push(element.character),
            InputStyle::Roman2Kana => self.push_romaji(text, element.character),
        }
    }

    fn push_romaji(&self, text: &mut String, c: char) {
        text.push(c.to_ascii_lowercase());
        let tail_start = pending_tail_start(text);
        let tail = &text[tail_start..];

        // Longest rule key that is a suffix of the pending tail.
        let longest = (1..=tail.len().min(self.max_key_len))
            .rev()
            .find(|&len| self.rules.contains_key(&tail[tail.len() - len..]));
        if let Some(len) = longest {
            let start = text.len() - len;
            if let Some(kana) = self.rules.get(&text[start..]) {
                let kana = kana.clone();
                text.truncate(start);
                text.push_str(&kana);
                return;
            }
        }

        let bytes = tail.as_bytes();
        if bytes.len() >= 2 {
            let prev = bytes[bytes.len() - 2];
            let last = bytes[bytes.len() - 1];
            if prev == last && is_consonant(last) && last != b'n' {
                // Doubled consonant: the first one becomes a small tsu.
                let at = text.len() - 2;
                text.replace_range(at..at + 1, "っ");
            } else if prev == b'n' && !is_vowel(last) && last != b'y' && last != b'n' {
                let at = text.len() - 2;
                text.replace_range(at..at + 1, "ん");
            }
        }
    }

    /// Length in chars of the part of a rendered segment that no later
    /// keystroke can rewrite.
    pub fn stable_len(&self, segment: &RenderedSegment) -> usize {
        let count = segment.text.chars().count();
        if segment.style == InputStyle::Direct {
            return count;
        }
        let tail_start = pending_tail_start(&segment.text);
        let tail = &segment.text[tail_start..];
        // The longest suffix of the tail that is still a pending prefix is unstable.
        let unstable = (1..=tail.len())
            .rev()
            .find(|&len| self.pending_prefixes.contains(&tail[tail.len() - len..]))
            .unwrap_or(0);
        count - unstable
    }
}

/// Concatenate rendered segments.
pub fn flatten(segments: &[RenderedSegment]) -> Vec<char> {
    segments.iter().flat_map(|s| s.text.chars()).collect()
}

/// Byte offset where the trailing run of unconverted ASCII starts.
fn pending_tail_start(text: &str) -> usize {
    text.char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii() && !c.is_ascii_digit())
        .last()
        .map_or(text.len(), |(i, _)| i)
}

fn is_vowel(b: u8) -> bool {
    matches!(b, b'a' | b'i' | b'u' | b'e' | b'o')
}

fn is_consonant(b: u8) -> bool {
    b.is_ascii_alphabetic() && !is_vowel(b)
}

/// Direct-input key form used by the typo tables.
pub fn direct_key(c: char) -> char {
    to_katakana_char(c)
}
