// loudstxt3 shard codec
//
// Layout (all integers little-endian):
//
//   u16 group_count C
//   C x u32 absolute start offset of each group body (first = 2 + 4C)
//   group bodies, each:
//     u16 row count R
//     R x 10-byte rows: u16 left_id, u16 right_id, u16 phrase_id, f32 score
//     UTF-8 text block: ruby \t word_1 \t ... \t word_R
//
// A group ends where the next one starts, the last one at end of file. A
// word field is empty when the word is byte-identical to the ruby.

use kkc_core::entry::DictionaryEntry;

use crate::{LoudsError, SHARD_SLOTS};

/// Size of one fixed row record.
pub const ROW_SIZE: usize = 10;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode row groups in slot order.
///
/// Each group holds the entries of one trie node; the group's ruby is taken
/// from its first entry. An empty group occupies a header slot and no body
/// bytes.
pub fn encode<G: AsRef<[DictionaryEntry]>>(groups: &[G]) -> Result<Vec<u8>, LoudsError> {
    let count = u16::try_from(groups.len()).map_err(|_| LoudsError::TooLarge {
        what: "group count",
    })?;
    let header_len = 2 + 4 * groups.len();

    let mut body = Vec::new();
    let mut offsets = Vec::with_capacity(groups.len());
    for (index, group) in groups.iter().enumerate() {
        let offset = u32::try_from(header_len + body.len()).map_err(|_| LoudsError::TooLarge {
            what: "shard size",
        })?;
        offsets.push(offset);
        encode_group(group.as_ref(), index, &mut body)?;
    }

    let mut out = Vec::with_capacity(header_len + body.len());
    out.extend_from_slice(&count.to_le_bytes());
    for offset in offsets {
        out.extend_from_slice(&offset.to_le_bytes());
    }
    out.extend_from_slice(&body);
    Ok(out)
}

/// Encode a fixed 2048-slot shard: every local index gets a header slot.
///
/// `slots` yields `(local_index, entries)`; indices not mentioned stay empty.
pub fn encode_aligned(
    slots: impl IntoIterator<Item = (usize, Vec<DictionaryEntry>)>,
) -> Result<Vec<u8>, LoudsError> {
    let mut groups: Vec<Vec<DictionaryEntry>> = vec![Vec::new(); SHARD_SLOTS];
    for (local, entries) in slots {
        let slot = groups.get_mut(local).ok_or(LoudsError::IndexOutOfRange {
            index: local,
            count: SHARD_SLOTS,
        })?;
        slot.extend(entries);
    }
    encode(&groups)
}

fn encode_group(
    entries: &[DictionaryEntry],
    index: usize,
    out: &mut Vec<u8>,
) -> Result<(), LoudsError> {
    let Some(first) = entries.first() else {
        return Ok(());
    };
    let rows = u16::try_from(entries.len()).map_err(|_| LoudsError::TooLarge { what: "row count" })?;
    out.extend_from_slice(&rows.to_le_bytes());
    for e in entries {
        out.extend_from_slice(&e.left_id.to_le_bytes());
        out.extend_from_slice(&e.right_id.to_le_bytes());
        out.extend_from_slice(&e.phrase_id.to_le_bytes());
        out.extend_from_slice(&e.score.to_le_bytes());
    }

    let ruby = first.ruby.as_str();
    if ruby.contains('\t') {
        return Err(LoudsError::MalformedGroup {
            index,
            reason: "tab in ruby",
        });
    }
    out.extend_from_slice(ruby.as_bytes());
    for e in entries {
        out.push(b'\t');
        if e.word.contains('\t') {
            return Err(LoudsError::MalformedGroup {
                index,
                reason: "tab in word",
            });
        }
        // Exact byte match only; a katakana spelling of the ruby is kept.
        if e.word != ruby {
            out.extend_from_slice(e.word.as_bytes());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn read_u16(data: &[u8], at: usize) -> Result<u16, LoudsError> {
    data.get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or(LoudsError::TooShort {
            expected: at + 2,
            actual: data.len(),
        })
}

fn read_u32(data: &[u8], at: usize) -> Result<u32, LoudsError> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(LoudsError::TooShort {
            expected: at + 4,
            actual: data.len(),
        })
}

/// Number of groups in a shard.
pub fn group_count(data: &[u8]) -> Result<usize, LoudsError> {
    let count = read_u16(data, 0)? as usize;
    let header_len = 2 + 4 * count;
    if data.len() < header_len {
        return Err(LoudsError::TooShort {
            expected: header_len,
            actual: data.len(),
        });
    }
    Ok(count)
}

/// Byte range of group `index`.
fn group_range(data: &[u8], count: usize, index: usize) -> Result<(usize, usize), LoudsError> {
    if index >= count {
        return Err(LoudsError::IndexOutOfRange { index, count });
    }
    let start = read_u32(data, 2 + 4 * index)? as usize;
    let end = if index + 1 < count {
        read_u32(data, 2 + 4 * (index + 1))? as usize
    } else {
        data.len()
    };
    if start > end || end > data.len() {
        return Err(LoudsError::MalformedGroup {
            index,
            reason: "offset outside shard",
        });
    }
    Ok((start, end))
}

/// Decode the rows of the requested local indices, in request order.
pub fn decode(data: &[u8], local_indices: &[usize]) -> Result<Vec<DictionaryEntry>, LoudsError> {
    let count = group_count(data)?;
    let mut out = Vec::new();
    for &index in local_indices {
        let (start, end) = group_range(data, count, index)?;
        parse_group(&data[start..end], index, &mut out)?;
    }
    Ok(out)
}

/// Decode a single group.
pub fn decode_group(data: &[u8], index: usize) -> Result<Vec<DictionaryEntry>, LoudsError> {
    decode(data, &[index])
}

/// Decode every non-empty group as `(local_index, rows)`.
pub fn decode_all(data: &[u8]) -> Result<Vec<(usize, Vec<DictionaryEntry>)>, LoudsError> {
    let count = group_count(data)?;
    let mut out = Vec::new();
    for index in 0..count {
        let (start, end) = group_range(data, count, index)?;
        if start == end {
            continue;
        }
        let mut rows = Vec::new();
        parse_group(&data[start..end], index, &mut rows)?;
        out.push((index, rows));
    }
    Ok(out)
}

fn parse_group(
    body: &[u8],
    index: usize,
    out: &mut Vec<DictionaryEntry>,
) -> Result<(), LoudsError> {
    if body.is_empty() {
        return Ok(());
    }
    let rows = read_u16(body, 0)? as usize;
    let text_start = 2 + rows * ROW_SIZE;
    if body.len() < text_start {
        return Err(LoudsError::MalformedGroup {
            index,
            reason: "row records truncated",
        });
    }
    let text = std::str::from_utf8(&body[text_start..]).map_err(|_| LoudsError::InvalidUtf8(index))?;
    let mut fields = text.split('\t');
    let ruby = fields.next().unwrap_or_default();

    out.reserve(rows);
    for row in 0..rows {
        let at = 2 + row * ROW_SIZE;
        let r = &body[at..at + ROW_SIZE];
        let word = fields.next().ok_or(LoudsError::MalformedGroup {
            index,
            reason: "fewer words than rows",
        })?;
        let word = if word.is_empty() { ruby } else { word };
        out.push(DictionaryEntry::new(
            word,
            ruby,
            u16::from_le_bytes([r[0], r[1]]),
            u16::from_le_bytes([r[2], r[3]]),
            u16::from_le_bytes([r[4], r[5]]),
            f32::from_le_bytes([r[6], r[7], r[8], r[9]]),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(word: &str, ruby: &str, score: f32) -> DictionaryEntry {
        DictionaryEntry::new(word, ruby, 11, 12, 501, score)
    }

    fn text_block(data: &[u8]) -> String {
        // Single group: header (2 + 4), u16 rows, rows.
        let rows = u16::from_le_bytes([data[6], data[7]]) as usize;
        String::from_utf8(data[8 + rows * ROW_SIZE..].to_vec()).unwrap()
    }

    #[test]
    fn word_equal_to_ruby_is_omitted() {
        let group = vec![entry("あい", "あい", -1.0), entry("アイ", "あい", -2.0)];
        let data = encode(&[group]).unwrap();
        assert_eq!(text_block(&data), "あい\t\tアイ");
    }

    #[test]
    fn header_offsets_start_after_header() {
        let groups = vec![vec![entry("愛", "アイ", -1.0)], vec![], vec![entry("蚊", "カ", -2.0)]];
        let data = encode(&groups).unwrap();
        assert_eq!(u16::from_le_bytes([data[0], data[1]]), 3);
        let first = u32::from_le_bytes([data[2], data[3], data[4], data[5]]);
        assert_eq!(first, 2 + 4 * 3);
        let second = u32::from_le_bytes([data[6], data[7], data[8], data[9]]);
        let third = u32::from_le_bytes([data[10], data[11], data[12], data[13]]);
        assert_eq!(second, third, "empty group has no body");
    }

    #[test]
    fn decode_restores_omitted_words() {
        let group = vec![
            entry("愛", "アイ", -3.0),
            entry("アイ", "アイ", -4.0),
            entry("藍", "アイ", -5.5),
        ];
        let data = encode(&[group.clone()]).unwrap();
        let rows = decode(&data, &[0]).unwrap();
        assert_eq!(rows, group);
    }

    #[test]
    fn decode_requested_indices_only() {
        let groups = vec![
            vec![entry("愛", "アイ", -1.0)],
            vec![entry("蚊", "カ", -2.0)],
            vec![entry("木", "キ", -3.0)],
        ];
        let data = encode(&groups).unwrap();
        let rows = decode(&data, &[2, 0]).unwrap();
        let words: Vec<_> = rows.iter().map(|e| e.word.as_str()).collect();
        assert_eq!(words, ["木", "愛"]);
        assert!(decode(&data, &[1]).unwrap()[0].score == -2.0);
    }

    #[test]
    fn aligned_shard_has_every_slot() {
        let data = encode_aligned([(5, vec![entry("愛", "アイ", -1.0)])]).unwrap();
        assert_eq!(group_count(&data).unwrap(), SHARD_SLOTS);
        assert!(decode(&data, &[4]).unwrap().is_empty());
        assert_eq!(decode(&data, &[5]).unwrap()[0].word, "愛");
        assert_eq!(decode(&data, &[2047]).unwrap(), vec![]);
    }

    #[test]
    fn decode_all_skips_empty_slots() {
        let data = encode_aligned([
            (1, vec![entry("愛", "アイ", -1.0)]),
            (7, vec![entry("蚊", "カ", -1.0), entry("課", "カ", -2.0)]),
        ])
        .unwrap();
        let all = decode_all(&data).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0, 1);
        assert_eq!(all[1].0, 7);
        assert_eq!(all[1].1.len(), 2);
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let data = encode(&[vec![entry("愛", "アイ", -1.0)]]).unwrap();
        let err = decode(&data, &[1]).unwrap_err();
        assert!(matches!(err, LoudsError::IndexOutOfRange { index: 1, count: 1 }));
    }

    #[test]
    fn truncated_rows_are_malformed() {
        let mut data = encode(&[vec![entry("愛", "アイ", -1.0)]]).unwrap();
        data.truncate(10);
        assert!(matches!(
            decode(&data, &[0]),
            Err(LoudsError::MalformedGroup { index: 0, .. })
        ));
    }

    #[test]
    fn missing_words_are_malformed() {
        let mut data = encode(&[vec![entry("愛", "アイ", -1.0), entry("藍", "アイ", -1.0)]]).unwrap();
        // Cut the last "\t藍".
        let tail = "\t藍".len();
        data.truncate(data.len() - tail);
        assert!(matches!(
            decode(&data, &[0]),
            Err(LoudsError::MalformedGroup { reason: "fewer words than rows", .. })
        ));
    }

    #[test]
    fn tab_in_word_is_rejected() {
        let err = encode(&[vec![entry("a\tb", "ア", -1.0)]]).unwrap_err();
        assert!(matches!(err, LoudsError::MalformedGroup { reason: "tab in word", .. }));
    }

    #[test]
    fn short_header_is_rejected() {
        let err = decode(&[3, 0, 0], &[0]).unwrap_err();
        assert!(matches!(err, LoudsError::TooShort { .. }));
    }
}
