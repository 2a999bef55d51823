// Character-to-id table shared by every trie of a dictionary

use hashbrown::HashMap;

use crate::LoudsError;

/// File name of the character table inside a dictionary's `louds` directory.
pub const CHAR_TABLE_FILE: &str = "charID.chid";

/// Maps characters to the one-byte ids stored in `.loudschars2` files.
///
/// The table file is UTF-8 text; the character at position `i` has id `i`.
#[derive(Debug, Clone, Default)]
pub struct CharIdTable {
    chars: Vec<char>,
    ids: HashMap<char, u8>,
}

impl CharIdTable {
    /// Build from characters in id order. Duplicates keep their first id.
    pub fn from_chars(chars: impl IntoIterator<Item = char>) -> Result<Self, LoudsError> {
        let chars: Vec<char> = chars.into_iter().collect();
        if chars.len() > 256 {
            return Err(LoudsError::TooManyCharacters(chars.len()));
        }
        let mut ids = HashMap::with_capacity(chars.len());
        for (i, &c) in chars.iter().enumerate() {
            ids.entry(c).or_insert(i as u8);
        }
        Ok(Self { chars, ids })
    }

    /// Parse the contents of a `charID.chid` file.
    pub fn parse(text: &str) -> Result<Self, LoudsError> {
        Self::from_chars(text.chars().filter(|&c| c != '\n'))
    }

    /// Table covering every character of `keys`, in first-seen order.
    pub fn covering<'a>(keys: impl IntoIterator<Item = &'a str>) -> Result<Self, LoudsError> {
        let mut seen = hashbrown::HashSet::new();
        let mut chars = Vec::new();
        for key in keys {
            for c in key.chars() {
                if seen.insert(c) {
                    chars.push(c);
                }
            }
        }
        Self::from_chars(chars)
    }

    /// File contents for this table.
    pub fn to_text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn id_of(&self, c: char) -> Option<u8> {
        self.ids.get(&c).copied()
    }

    pub fn contains(&self, c: char) -> bool {
        self.ids.contains_key(&c)
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Ids for a lookup key; `None` when any character is unknown.
    ///
    /// User input is uncontrolled, so an unknown character is simply a miss.
    pub fn encode(&self, key: &[char]) -> Option<Vec<u8>> {
        key.iter().map(|&c| self.id_of(c)).collect()
    }

    /// Ids for a key being inserted into a trie.
    pub fn encode_for_build(&self, key: &str) -> Result<Vec<u8>, LoudsError> {
        key.chars()
            .map(|c| {
                self.id_of(c).ok_or_else(|| LoudsError::UnmappableCharacter {
                    ch: c,
                    key: key.to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_file_order() {
        let table = CharIdTable::parse("アイウ").unwrap();
        assert_eq!(table.id_of('ア'), Some(0));
        assert_eq!(table.id_of('ウ'), Some(2));
        assert_eq!(table.id_of('エ'), None);
        assert_eq!(table.to_text(), "アイウ");
    }

    #[test]
    fn lookup_encoding_misses_on_unknown_character() {
        let table = CharIdTable::parse("アイ").unwrap();
        assert_eq!(table.encode(&['ア', 'イ']), Some(vec![0, 1]));
        assert_eq!(table.encode(&['ア', 'X']), None);
    }

    #[test]
    fn build_encoding_fails_on_unknown_character() {
        let table = CharIdTable::parse("アイ").unwrap();
        let err = table.encode_for_build("アX").unwrap_err();
        assert!(matches!(err, LoudsError::UnmappableCharacter { ch: 'X', .. }));
    }

    #[test]
    fn covering_collects_in_first_seen_order() {
        let table = CharIdTable::covering(["カイ", "アイ"]).unwrap();
        assert_eq!(table.to_text(), "カイア");
    }

    #[test]
    fn reject_oversized_table() {
        let chars = (0..300u32).filter_map(|i| char::from_u32(0x4E00 + i));
        assert!(matches!(
            CharIdTable::from_chars(chars),
            Err(LoudsError::TooManyCharacters(300))
        ));
    }
}
