// On-disk dictionary layout, atomic writes and trie export
//
// A trie with identifier `id` lives in one directory as
//
//   {id}.louds         bit words
//   {id}.loudschars2   node-to-char bytes
//   {id}{n}.loudstxt3  shard n, 2048 node slots each
//
// where `id` is escaped with `identifier::escape`.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use kkc_core::character::to_katakana;
use kkc_core::entry::DictionaryEntry;

use crate::builder::build_from_keys;
use crate::charid::{CHAR_TABLE_FILE, CharIdTable};
use crate::identifier::escape;
use crate::louds::Louds;
use crate::{LoudsError, SHARD_SLOTS, loudstxt3, shard_address};

/// Sub-directory of a dictionary holding tries and shards.
pub const LOUDS_DIR: &str = "louds";

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Paths of the two trie files for `identifier`.
pub fn trie_paths(dir: &Path, identifier: &str) -> (PathBuf, PathBuf) {
    let stem = escape(identifier);
    (
        dir.join(format!("{stem}.louds")),
        dir.join(format!("{stem}.loudschars2")),
    )
}

/// Path of shard `shard` for `identifier`.
pub fn shard_path(dir: &Path, identifier: &str, shard: usize) -> PathBuf {
    dir.join(format!("{}{shard}.loudstxt3", escape(identifier)))
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, LoudsError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Load a trie; `Ok(None)` when either file is missing.
pub fn load_trie(dir: &Path, identifier: &str) -> Result<Option<Louds>, LoudsError> {
    let (bits_path, chars_path) = trie_paths(dir, identifier);
    let Some(bits) = read_optional(&bits_path)? else {
        return Ok(None);
    };
    let Some(chars) = read_optional(&chars_path)? else {
        return Ok(None);
    };
    Louds::from_bytes(&bits, &chars).map(Some)
}

/// Raw bytes of a shard; `Ok(None)` when the file is missing.
pub fn read_shard(dir: &Path, identifier: &str, shard: usize) -> Result<Option<Vec<u8>>, LoudsError> {
    read_optional(&shard_path(dir, identifier, shard))
}

/// Load `charID.chid` from `dir`; `Ok(None)` when missing.
pub fn load_char_table(dir: &Path) -> Result<Option<CharIdTable>, LoudsError> {
    let Some(bytes) = read_optional(&dir.join(CHAR_TABLE_FILE))? else {
        return Ok(None);
    };
    let text = String::from_utf8(bytes).map_err(|_| LoudsError::InvalidUtf8(0))?;
    CharIdTable::parse(&text).map(Some)
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write `bytes` to `path` through a synced temporary file in the same
/// directory, then rename it into place.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), LoudsError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut temp_file = tempfile::NamedTempFile::new_in(dir)?;
    temp_file.write_all(bytes)?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(path)?;
    Ok(())
}

pub fn write_char_table(dir: &Path, table: &CharIdTable) -> Result<(), LoudsError> {
    write_atomic(&dir.join(CHAR_TABLE_FILE), table.to_text().as_bytes())
}

/// Remove every file of a trie. Missing files are ignored.
pub fn remove_trie(dir: &Path, identifier: &str) -> Result<(), LoudsError> {
    let (bits, chars) = trie_paths(dir, identifier);
    remove_if_exists(&bits)?;
    remove_if_exists(&chars)?;
    remove_shards_from(dir, identifier, 0)
}

fn remove_if_exists(path: &Path) -> Result<bool, LoudsError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn remove_shards_from(dir: &Path, identifier: &str, first: usize) -> Result<(), LoudsError> {
    let mut shard = first;
    while remove_if_exists(&shard_path(dir, identifier, shard))? {
        shard += 1;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Trie images
// ---------------------------------------------------------------------------

/// A built trie together with the rows of each node, ready to be written
/// or queried in memory.
#[derive(Debug, Clone)]
pub struct TrieImage {
    pub louds: Louds,
    /// `(node_index, rows)` sorted by node index; every ruby appears once.
    pub groups: Vec<(usize, Vec<DictionaryEntry>)>,
}

impl TrieImage {
    /// Group `entries` by katakana ruby and build the trie.
    ///
    /// Rows keep their relative order inside a group.
    pub fn build(
        entries: impl IntoIterator<Item = DictionaryEntry>,
        table: &CharIdTable,
    ) -> Result<Self, LoudsError> {
        let mut by_ruby: BTreeMap<String, Vec<DictionaryEntry>> = BTreeMap::new();
        for mut entry in entries {
            entry.ruby = to_katakana(&entry.ruby);
            by_ruby.entry(entry.ruby.clone()).or_default().push(entry);
        }
        let keys: Vec<&str> = by_ruby.keys().map(String::as_str).collect();
        let (louds, nodes) = build_from_keys(&keys, table)?;

        let mut groups: Vec<(usize, Vec<DictionaryEntry>)> =
            nodes.into_iter().zip(by_ruby.into_values()).collect();
        groups.sort_by_key(|(node, _)| *node);
        Ok(Self { louds, groups })
    }

    /// Rows stored at `node_index`.
    pub fn rows(&self, node_index: usize) -> &[DictionaryEntry] {
        match self.groups.binary_search_by_key(&node_index, |(node, _)| *node) {
            Ok(i) => &self.groups[i].1,
            Err(_) => &[],
        }
    }

    /// Total number of rows.
    pub fn row_count(&self) -> usize {
        self.groups.iter().map(|(_, rows)| rows.len()).sum()
    }

    /// Number of shard files covering every node.
    pub fn shard_count(&self) -> usize {
        // Node indices run from 1 to node_count inclusive.
        shard_address(self.louds.node_count()).0 + 1
    }

    /// Encoded shards, one per shard id.
    pub fn encode_shards(&self) -> Result<Vec<Vec<u8>>, LoudsError> {
        let mut slots: Vec<Vec<(usize, Vec<DictionaryEntry>)>> = vec![Vec::new(); self.shard_count()];
        for (node, rows) in &self.groups {
            let (shard, local) = shard_address(*node);
            slots[shard].push((local, rows.clone()));
        }
        slots
            .into_iter()
            .map(|slot| loudstxt3::encode_aligned(slot))
            .collect()
    }

    /// Write the trie and its shards, removing shards left over from a
    /// larger previous export.
    pub fn write(&self, dir: &Path, identifier: &str) -> Result<(), LoudsError> {
        fs::create_dir_all(dir)?;
        let shards = self.encode_shards()?;
        for (n, bytes) in shards.iter().enumerate() {
            write_atomic(&shard_path(dir, identifier, n), bytes)?;
        }
        let (bits, chars) = self.louds.to_bytes();
        let (bits_path, chars_path) = trie_paths(dir, identifier);
        write_atomic(&bits_path, &bits)?;
        write_atomic(&chars_path, &chars)?;
        remove_shards_from(dir, identifier, shards.len())?;
        log::debug!(
            "wrote trie {identifier:?}: {} nodes, {} rows, {} shards",
            self.louds.node_count(),
            self.row_count(),
            shards.len()
        );
        Ok(())
    }

    /// Rebuild an image from files; `Ok(None)` when the trie is missing.
    ///
    /// Every non-empty slot is decoded, so this is meant for small tries.
    pub fn load(dir: &Path, identifier: &str) -> Result<Option<Self>, LoudsError> {
        let Some(louds) = load_trie(dir, identifier)? else {
            return Ok(None);
        };
        let shard_total = shard_address(louds.node_count()).0 + 1;
        let mut groups = Vec::new();
        for shard in 0..shard_total {
            let Some(bytes) = read_shard(dir, identifier, shard)? else {
                continue;
            };
            for (local, rows) in loudstxt3::decode_all(&bytes)? {
                groups.push((shard * SHARD_SLOTS + local, rows));
            }
        }
        Ok(Some(Self { louds, groups }))
    }
}

/// Build and write one trie holding every entry.
pub fn export_trie(
    dir: &Path,
    identifier: &str,
    entries: impl IntoIterator<Item = DictionaryEntry>,
    table: &CharIdTable,
) -> Result<TrieImage, LoudsError> {
    let image = TrieImage::build(entries, table)?;
    image.write(dir, identifier)?;
    Ok(image)
}

/// Split entries by the first character of their katakana ruby and write
/// one trie per character. Returns the identifiers written.
pub fn export_by_first_char(
    dir: &Path,
    entries: impl IntoIterator<Item = DictionaryEntry>,
    table: &CharIdTable,
) -> Result<Vec<String>, LoudsError> {
    let mut by_first: BTreeMap<char, Vec<DictionaryEntry>> = BTreeMap::new();
    for entry in entries {
        let ruby = to_katakana(&entry.ruby);
        if let Some(first) = ruby.chars().next() {
            by_first.entry(first).or_default().push(entry);
        }
    }
    let mut written = Vec::with_capacity(by_first.len());
    for (first, group) in by_first {
        let identifier = first.to_string();
        export_trie(dir, &identifier, group, table)?;
        written.push(identifier);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn katakana_table() -> CharIdTable {
        CharIdTable::from_chars(('\u{30A1}'..='\u{30F6}').chain(['ー'])).unwrap()
    }

    fn entry(word: &str, ruby: &str, score: f32) -> DictionaryEntry {
        DictionaryEntry::new(word, ruby, 20, 20, 501, score)
    }

    fn words_of(dir: &Path, identifier: &str, ruby: &str, table: &CharIdTable) -> Vec<String> {
        let louds = load_trie(dir, identifier).unwrap().unwrap();
        let ids = table.encode(&ruby.chars().collect::<Vec<_>>()).unwrap();
        let node = louds.search_node_index(&ids).unwrap();
        let (shard, local) = shard_address(node);
        let bytes = read_shard(dir, identifier, shard).unwrap().unwrap();
        let mut words: Vec<String> = loudstxt3::decode(&bytes, &[local])
            .unwrap()
            .into_iter()
            .map(|e| e.word)
            .collect();
        words.sort();
        words
    }

    #[test]
    fn shard_and_trie_paths() {
        let dir = Path::new("/dict/louds");
        let (bits, chars) = trie_paths(dir, "/");
        assert_eq!(bits, Path::new("/dict/louds/[2F].louds"));
        assert_eq!(chars, Path::new("/dict/louds/[2F].loudschars2"));
        assert_eq!(shard_path(dir, "memory", 3), Path::new("/dict/louds/memory3.loudstxt3"));
    }

    #[test]
    fn exported_words_are_found_again() {
        let tmp = tempfile::tempdir().unwrap();
        let table = katakana_table();
        let entries = vec![
            entry("愛", "あい", -3.0),
            entry("藍", "アイ", -4.0),
            entry("アイ", "アイ", -6.0),
            entry("蚊", "カ", -5.0),
            entry("会員", "カイイン", -7.0),
        ];
        export_trie(tmp.path(), "dict", entries, &table).unwrap();

        assert_eq!(words_of(tmp.path(), "dict", "アイ", &table), ["アイ", "愛", "藍"]);
        assert_eq!(words_of(tmp.path(), "dict", "カ", &table), ["蚊"]);
        assert_eq!(words_of(tmp.path(), "dict", "カイイン", &table), ["会員"]);
    }

    #[test]
    fn ruby_is_canonicalized_to_katakana() {
        let image = TrieImage::build([entry("愛", "あい", -3.0)], &katakana_table()).unwrap();
        assert_eq!(image.groups.len(), 1);
        assert_eq!(image.groups[0].1[0].ruby, "アイ");
    }

    #[test]
    fn unmappable_ruby_fails_export() {
        let tmp = tempfile::tempdir().unwrap();
        let err = export_trie(tmp.path(), "dict", [entry("x", "x", 0.0)], &katakana_table())
            .unwrap_err();
        assert!(matches!(err, LoudsError::UnmappableCharacter { ch: 'x', .. }));
    }

    #[test]
    fn missing_files_load_as_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load_trie(tmp.path(), "nothing").unwrap().is_none());
        assert!(read_shard(tmp.path(), "nothing", 0).unwrap().is_none());
        assert!(load_char_table(tmp.path()).unwrap().is_none());
        assert!(TrieImage::load(tmp.path(), "nothing").unwrap().is_none());
    }

    #[test]
    fn image_reload_matches_written_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let table = katakana_table();
        let written = export_trie(
            tmp.path(),
            "memory",
            [entry("愛", "アイ", -1.0), entry("蚊", "カ", -2.0), entry("課", "カ", -2.5)],
            &table,
        )
        .unwrap();
        let loaded = TrieImage::load(tmp.path(), "memory").unwrap().unwrap();
        assert_eq!(loaded.groups, written.groups);
        assert_eq!(loaded.row_count(), 3);
    }

    #[test]
    fn stale_shards_are_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let table = katakana_table();
        // Leave a bogus shard from an earlier, larger export.
        write_atomic(&shard_path(tmp.path(), "dict", 1), b"old").unwrap();
        export_trie(tmp.path(), "dict", [entry("蚊", "カ", -1.0)], &table).unwrap();
        assert!(shard_path(tmp.path(), "dict", 0).exists());
        assert!(!shard_path(tmp.path(), "dict", 1).exists());
    }

    #[test]
    fn remove_trie_deletes_every_file() {
        let tmp = tempfile::tempdir().unwrap();
        export_trie(tmp.path(), "memory", [entry("蚊", "カ", -1.0)], &katakana_table()).unwrap();
        remove_trie(tmp.path(), "memory").unwrap();
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn export_splits_by_first_character() {
        let tmp = tempfile::tempdir().unwrap();
        let table = katakana_table();
        let ids = export_by_first_char(
            tmp.path(),
            [entry("愛", "アイ", -1.0), entry("蚊", "カ", -1.0), entry("案", "アン", -1.0)],
            &table,
        )
        .unwrap();
        assert_eq!(ids, ["ア", "カ"]);
        assert_eq!(words_of(tmp.path(), "ア", "アン", &table), ["案"]);
        assert_eq!(words_of(tmp.path(), "カ", "カ", &table), ["蚊"]);
    }

    #[test]
    fn char_table_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let table = CharIdTable::parse("アイウ").unwrap();
        write_char_table(tmp.path(), &table).unwrap();
        let back = load_char_table(tmp.path()).unwrap().unwrap();
        assert_eq!(back.to_text(), "アイウ");
    }
}
