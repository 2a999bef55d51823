// Kana classification and conversion helpers

// ---------------------------------------------------------------------------
// Unicode blocks
// ---------------------------------------------------------------------------

/// First hiragana code point that has a katakana counterpart (ぁ).
const HIRAGANA_START: u32 = 0x3041;

/// Last hiragana code point that has a katakana counterpart (ゖ).
const HIRAGANA_END: u32 = 0x3096;

/// Distance between a hiragana code point and its katakana counterpart.
const KANA_OFFSET: u32 = 0x60;

/// Returns `true` for hiragana letters that have a katakana counterpart.
pub fn is_hiragana(c: char) -> bool {
    (HIRAGANA_START..=HIRAGANA_END).contains(&(c as u32))
}

/// Returns `true` for katakana letters that have a hiragana counterpart.
pub fn is_katakana(c: char) -> bool {
    (HIRAGANA_START + KANA_OFFSET..=HIRAGANA_END + KANA_OFFSET).contains(&(c as u32))
}

/// Returns `true` for ASCII letters.
///
/// Typo variants that start with a roman letter are kept even when no trie
/// exists for them, because romaji input may still be mid-composition.
pub fn is_roman_letter(c: char) -> bool {
    c.is_ascii_alphabetic()
}

/// Convert a single hiragana letter to katakana; other characters pass through.
pub fn to_katakana_char(c: char) -> char {
    if is_hiragana(c) {
        char::from_u32(c as u32 + KANA_OFFSET).unwrap_or(c)
    } else {
        c
    }
}

/// Convert a single katakana letter to hiragana; other characters pass through.
pub fn to_hiragana_char(c: char) -> char {
    if is_katakana(c) {
        char::from_u32(c as u32 - KANA_OFFSET).unwrap_or(c)
    } else {
        c
    }
}

/// Convert every hiragana letter in `s` to katakana.
///
/// Dictionary rubies are stored in katakana, so every lookup key goes
/// through this first.
pub fn to_katakana(s: &str) -> String {
    s.chars().map(to_katakana_char).collect()
}

/// Convert every katakana letter in `s` to hiragana.
pub fn to_hiragana(s: &str) -> String {
    s.chars().map(to_hiragana_char).collect()
}

/// Returns `true` if `s` is non-empty and made only of ASCII digits.
pub fn is_ascii_digits(s: &[char]) -> bool {
    !s.is_empty() && s.iter().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hiragana_to_katakana() {
        assert_eq!(to_katakana("あいうえお"), "アイウエオ");
        assert_eq!(to_katakana("きゃっ"), "キャッ");
        assert_eq!(to_katakana("ゔ"), "ヴ");
    }

    #[test]
    fn katakana_to_hiragana() {
        assert_eq!(to_hiragana("カタカナ"), "かたかな");
    }

    #[test]
    fn non_kana_passes_through() {
        assert_eq!(to_katakana("漢字abc123ー"), "漢字abc123ー");
        assert_eq!(to_hiragana("漢字ー"), "漢字ー");
    }

    #[test]
    fn classification() {
        assert!(is_hiragana('ぁ'));
        assert!(!is_hiragana('ア'));
        assert!(is_katakana('ア'));
        assert!(!is_katakana('ー'));
        assert!(is_roman_letter('q'));
        assert!(!is_roman_letter('あ'));
    }

    #[test]
    fn digit_strings() {
        assert!(is_ascii_digits(&['1', '2']));
        assert!(!is_ascii_digits(&[]));
        assert!(!is_ascii_digits(&['1', 'a']));
    }
}
