// Filename-safe escaping of trie identifiers

/// Characters that cannot appear verbatim in a dictionary file name.
const UNSAFE: &[char] = &[
    '\n', ' ', '"', '\'', '*', '+', '.', '/', ':', '<', '>', '\\', '|',
];

/// Escape `identifier` so it can be used as a file name stem.
///
/// Unsafe characters become `[XX]`, the two-digit uppercase hex of the byte.
pub fn escape(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len());
    for c in identifier.chars() {
        if UNSAFE.contains(&c) {
            out.push_str(&format!("[{:02X}]", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_identifiers_are_unchanged() {
        assert_eq!(escape("ア"), "ア");
        assert_eq!(escape("memory"), "memory");
    }

    #[test]
    fn unsafe_characters_are_hex_escaped() {
        assert_eq!(escape("\n"), "[0A]");
        assert_eq!(escape(" "), "[20]");
        assert_eq!(escape("\""), "[22]");
        assert_eq!(escape("'"), "[27]");
        assert_eq!(escape("*"), "[2A]");
        assert_eq!(escape("+"), "[2B]");
        assert_eq!(escape("."), "[2E]");
        assert_eq!(escape("/"), "[2F]");
        assert_eq!(escape(":"), "[3A]");
        assert_eq!(escape("<"), "[3C]");
        assert_eq!(escape(">"), "[3E]");
        assert_eq!(escape("\\"), "[5C]");
        assert_eq!(escape("|"), "[7C]");
    }

    #[test]
    fn only_unsafe_characters_change() {
        assert_eq!(escape("a/b.c"), "a[2F]b[2E]c");
        assert_eq!(escape("カ"), "カ");
    }
}
