// Digit strings read as clock times ("123" -> "1:23", "1234" -> "12:34")

use kkc_core::character::is_ascii_digits;
use kkc_core::{ComposingText, DictionaryEntry};

use crate::candidate::Candidate;
use crate::config::DictionaryConfig;

/// Score of a generated time expression.
pub const TIME_EXPRESSION_SCORE: f32 = -10.0;

/// `h:mm` or `hh:mm` for a 3 or 4 digit string, when it is a valid time.
/// Hours run to 24 so that "2400" is accepted.
pub fn format_time(digits: &[char]) -> Option<String> {
    if !is_ascii_digits(digits) {
        return None;
    }
    let value = |range: std::ops::Range<usize>| -> u32 {
        digits[range]
            .iter()
            .fold(0, |acc, c| acc * 10 + c.to_digit(10).unwrap_or(0))
    };
    let (hours, minutes) = match digits.len() {
        3 => (value(0..1), value(1..3)),
        4 => (value(0..2), value(2..4)),
        _ => return None,
    };
    if hours > 24 || minutes > 59 {
        return None;
    }
    let hour_digits: String = digits[..digits.len() - 2].iter().collect();
    let minute_digits: String = digits[digits.len() - 2..].iter().collect();
    Some(format!("{hour_digits}:{minute_digits}"))
}

/// Time expression candidates for `text`; empty unless its surface is 3 or
/// 4 ASCII digits forming a valid time.
pub fn time_expressions(text: &ComposingText, config: &DictionaryConfig) -> Vec<Candidate> {
    let Some(word) = format_time(&text.surface) else {
        return Vec::new();
    };
    let entry = DictionaryEntry::with_class(
        word,
        text.surface_string(),
        config.proper_noun_class_id,
        config.general_phrase_id,
        TIME_EXPRESSION_SCORE,
    );
    vec![Candidate::from_entry(entry, text)]
}
