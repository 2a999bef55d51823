// Learned memory: committed words kept in a small trie that is rebuilt on
// every change and persisted as `memory.*` files
//
// Files in the memory directory:
//
//   memory.louds, memory.loudschars2, memory{n}.loudstxt3   trie and rows
//   memory.memorymetadata                                 usage per row
//   .pause                                                present while saving
//
// Metadata layout (little-endian): u32 version, u64 clock, u32 row count,
// then per row in node/row order u32 use count and u64 last-used tick.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use hashbrown::HashMap;
use kkc_core::character::to_katakana;
use kkc_core::{DictionaryEntry, EntrySource};
use kkc_louds::CharIdTable;
use kkc_louds::files::{self, TrieImage};

use crate::ConvertError;
use crate::config::LearningConfig;

/// Trie identifier of the learned memory.
pub const MEMORY_IDENTIFIER: &str = "memory";

/// Usage statistics file.
pub const METADATA_FILE: &str = "memory.memorymetadata";

/// Marker present while a save is in progress.
pub const PAUSE_FILE: &str = ".pause";

const METADATA_VERSION: u32 = 1;

/// Score bonus per `ln(1 + uses)`.
const LEARNED_BONUS: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Usage {
    count: u32,
    last_used: u64,
}

impl Default for Usage {
    fn default() -> Self {
        Self {
            count: 1,
            last_used: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct LearnedRow {
    entry: DictionaryEntry,
    usage: Usage,
}

/// Score of a learned row used `count` times.
pub fn learned_score(base: f32, count: u32) -> f32 {
    base + LEARNED_BONUS * (count as f32).ln_1p()
}

/// In-process learned memory with optional on-disk persistence.
#[derive(Debug)]
pub struct MemoryStore {
    config: LearningConfig,
    table: CharIdTable,
    rows: Vec<LearnedRow>,
    clock: u64,
    /// Trie over `rows`, rebuilt after every mutation.
    image: Option<TrieImage>,
    /// Usage of each row of `image`, parallel to `image.groups`.
    usage: Vec<Vec<Usage>>,
}

impl MemoryStore {
    /// Memory with no rows. Nothing is read from disk.
    pub fn empty(config: LearningConfig, table: CharIdTable) -> Self {
        Self {
            config,
            table,
            rows: Vec::new(),
            clock: 0,
            image: None,
            usage: Vec::new(),
        }
    }

    /// Load the memory files from the configured directory.
    ///
    /// A leftover `.pause` marker means the last save was interrupted: the
    /// partial files are deleted and the memory starts empty. Unreadable
    /// files are logged and ignored.
    pub fn open(config: LearningConfig, table: CharIdTable) -> Self {
        let mut store = Self::empty(config, table);
        let Some(dir) = store.config.memory_dir.clone() else {
            return store;
        };
        if !store.config.learning_type.reads_memory() {
            return store;
        }
        if dir.join(PAUSE_FILE).exists() {
            log::warn!(
                "{}: interrupted memory save detected, discarding learned data",
                dir.display()
            );
            if let Err(e) = remove_memory_files(&dir) {
                log::warn!("{}: cannot remove memory files: {e}", dir.display());
            }
            return store;
        }
        match load_rows(&dir) {
            Ok((rows, clock)) => {
                store.rows = rows;
                store.clock = clock;
                store.rebuild();
                log::debug!("loaded {} learned rows from {}", store.rows.len(), dir.display());
            }
            Err(e) => log::warn!("{}: cannot load learned memory: {e}", dir.display()),
        }
        store
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Learned rows in insertion order, with their stored base scores.
    pub fn entries(&self) -> impl Iterator<Item = &DictionaryEntry> {
        self.rows.iter().map(|r| &r.entry)
    }

    /// Rows whose ruby is exactly `key` (katakana), scored with the
    /// learned bonus.
    pub fn lookup(&self, key: &[char]) -> Vec<DictionaryEntry> {
        let (Some(image), Some(ids)) = (&self.image, self.table.encode(key)) else {
            return Vec::new();
        };
        let Some(node) = image.louds.search_node_index(&ids) else {
            return Vec::new();
        };
        let Ok(group) = image.groups.binary_search_by_key(&node, |(n, _)| *n) else {
            return Vec::new();
        };
        image.groups[group]
            .1
            .iter()
            .zip(&self.usage[group])
            .map(|(entry, usage)| {
                let mut entry = entry.clone();
                entry.score = learned_score(entry.score, usage.count);
                entry.source = EntrySource::Learned;
                entry
            })
            .collect()
    }

    /// Length of the longest prefix of `key` present in the trie.
    pub fn matched_depth(&self, key: &[char]) -> usize {
        let Some(image) = &self.image else {
            return 0;
        };
        let ids: Vec<u8> = key.iter().map_while(|&c| self.table.id_of(c)).collect();
        image.louds.prefix_walk(&ids).1
    }

    /// Reinforce each committed entry and the phrase they form together
    /// with `previous`.
    pub fn update(&mut self, entries: &[DictionaryEntry], previous: Option<&DictionaryEntry>) {
        if !self.config.learning_type.writes_memory() || entries.is_empty() {
            return;
        }
        self.clock += 1;
        let now = self.clock;
        for entry in entries {
            self.reinforce(entry, now);
        }
        let phrase: Vec<&DictionaryEntry> = previous.into_iter().chain(entries).collect();
        if let Some(joined) = joined_entry(&phrase) {
            self.reinforce(&joined, now);
        }
        self.rebuild();
    }

    /// Remove every row with the same word and ruby as one of `entries`,
    /// or as the phrase they form. Returns whether anything was removed.
    pub fn forget(&mut self, entries: &[DictionaryEntry]) -> bool {
        let mut targets: Vec<DictionaryEntry> = entries.iter().map(canonical).collect();
        let refs: Vec<&DictionaryEntry> = entries.iter().collect();
        targets.extend(joined_entry(&refs));
        let before = self.rows.len();
        self.rows
            .retain(|row| !targets.iter().any(|t| t.same_text(&row.entry)));
        let removed = self.rows.len() != before;
        if removed {
            self.rebuild();
        }
        removed
    }

    /// Persist the memory. Only `InputAndOutput` memories are written.
    pub fn save(&self) -> Result<(), ConvertError> {
        if !self.config.learning_type.writes_memory() {
            return Ok(());
        }
        let dir = self
            .config
            .memory_dir
            .as_deref()
            .ok_or(ConvertError::NoMemoryDirectory)?;
        fs::create_dir_all(dir)?;
        let pause = dir.join(PAUSE_FILE);
        files::write_atomic(&pause, b"")?;
        match &self.image {
            Some(image) => image.write(dir, MEMORY_IDENTIFIER)?,
            None => files::remove_trie(dir, MEMORY_IDENTIFIER)?,
        }
        let metadata = encode_metadata(self.clock, self.usage.iter().flatten());
        files::write_atomic(&dir.join(METADATA_FILE), &metadata)?;
        fs::remove_file(&pause)?;
        log::debug!("saved {} learned rows to {}", self.rows.len(), dir.display());
        Ok(())
    }

    /// Drop every learned row and delete the memory files.
    pub fn reset(&mut self) -> Result<(), ConvertError> {
        self.rows.clear();
        self.clock = 0;
        self.rebuild();
        if let Some(dir) = &self.config.memory_dir {
            remove_memory_files(dir)?;
        }
        Ok(())
    }

    fn reinforce(&mut self, entry: &DictionaryEntry, now: u64) {
        if entry.word.is_empty() || entry.ruby.is_empty() {
            return;
        }
        let entry = canonical(entry);
        let key: Vec<char> = entry.ruby.chars().collect();
        if self.table.encode(&key).is_none() {
            log::warn!(
                "not learning {:?}: reading {:?} has characters without an id",
                entry.word,
                entry.ruby
            );
            return;
        }
        let existing = self.rows.iter_mut().find(|row| {
            row.entry.same_text(&entry)
                && row.entry.left_id == entry.left_id
                && row.entry.right_id == entry.right_id
        });
        match existing {
            Some(row) => {
                row.usage.count = row.usage.count.saturating_add(1);
                row.usage.last_used = now;
            }
            None => self.rows.push(LearnedRow {
                entry,
                usage: Usage {
                    count: 1,
                    last_used: now,
                },
            }),
        }
    }

    /// Drop the least recently used rows (fewest uses first on ties) until
    /// the cap holds.
    fn evict(&mut self) {
        let cap = self.config.max_memory_count;
        if self.rows.len() <= cap {
            return;
        }
        let excess = self.rows.len() - cap;
        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        order.sort_by_key(|&i| (self.rows[i].usage.last_used, self.rows[i].usage.count));
        let mut doomed = vec![false; self.rows.len()];
        for &i in &order[..excess] {
            doomed[i] = true;
        }
        let mut index = 0;
        self.rows.retain(|_| {
            let keep = !doomed[index];
            index += 1;
            keep
        });
        log::debug!("evicted {excess} learned rows");
    }

    fn rebuild(&mut self) {
        self.evict();
        self.image = None;
        self.usage.clear();
        if self.rows.is_empty() {
            return;
        }
        let image = match TrieImage::build(self.rows.iter().map(|r| r.entry.clone()), &self.table) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("cannot rebuild learned memory trie: {e}");
                return;
            }
        };
        let by_key: HashMap<(&str, &str, u16, u16), Usage> = self
            .rows
            .iter()
            .map(|r| {
                let e = &r.entry;
                ((e.word.as_str(), e.ruby.as_str(), e.left_id, e.right_id), r.usage)
            })
            .collect();
        self.usage = image
            .groups
            .iter()
            .map(|(_, rows)| {
                rows.iter()
                    .map(|e| {
                        by_key
                            .get(&(e.word.as_str(), e.ruby.as_str(), e.left_id, e.right_id))
                            .copied()
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();
        self.image = Some(image);
    }
}

/// Learned copy of `entry` with a katakana ruby.
fn canonical(entry: &DictionaryEntry) -> DictionaryEntry {
    let mut entry = entry.clone().with_source(EntrySource::Learned);
    entry.ruby = to_katakana(&entry.ruby);
    entry
}

/// One entry spanning a multi-word phrase, scored as the sum of its parts.
fn joined_entry(parts: &[&DictionaryEntry]) -> Option<DictionaryEntry> {
    let parts: Vec<&DictionaryEntry> = parts.iter().copied().filter(|e| !e.word.is_empty()).collect();
    let (first, last) = (parts.first()?, parts.last()?);
    if parts.len() < 2 {
        return None;
    }
    let word: String = parts.iter().map(|e| e.word.as_str()).collect();
    let ruby: String = parts.iter().map(|e| e.ruby.as_str()).collect();
    let score = parts.iter().map(|e| e.score).sum();
    let entry = DictionaryEntry::new(word, ruby, first.left_id, last.right_id, last.phrase_id, score);
    Some(canonical(&entry))
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

fn load_rows(dir: &Path) -> Result<(Vec<LearnedRow>, u64), ConvertError> {
    let Some(image) = TrieImage::load(dir, MEMORY_IDENTIFIER)? else {
        return Ok((Vec::new(), 0));
    };
    let row_count = image.row_count();
    let (clock, usages) = match read_metadata(&dir.join(METADATA_FILE))? {
        Some((clock, usages)) if usages.len() == row_count => (clock, usages),
        Some((_, usages)) => {
            log::warn!(
                "{}: metadata lists {} rows but the trie holds {row_count}, resetting usage",
                dir.display(),
                usages.len()
            );
            (0, vec![Usage::default(); row_count])
        }
        None => (0, vec![Usage::default(); row_count]),
    };
    let rows = image
        .groups
        .into_iter()
        .flat_map(|(_, rows)| rows)
        .zip(usages)
        .map(|(entry, usage)| LearnedRow {
            entry: entry.with_source(EntrySource::Learned),
            usage,
        })
        .collect();
    Ok((rows, clock))
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?;
        self.pos += N;
        bytes.try_into().ok()
    }

    fn u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }
}

fn read_metadata(path: &Path) -> Result<Option<(u64, Vec<Usage>)>, ConvertError> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::warn!("{}: missing, using default usage", path.display());
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    let parsed = parse_metadata(&data);
    if parsed.is_none() {
        log::warn!("{}: unreadable metadata, using default usage", path.display());
    }
    Ok(parsed)
}

fn parse_metadata(data: &[u8]) -> Option<(u64, Vec<Usage>)> {
    let mut cursor = Cursor { data, pos: 0 };
    if cursor.u32()? != METADATA_VERSION {
        return None;
    }
    let clock = cursor.u64()?;
    let count = cursor.u32()? as usize;
    let mut usages = Vec::with_capacity(count.min(data.len() / 12));
    for _ in 0..count {
        let count = cursor.u32()?;
        let last_used = cursor.u64()?;
        usages.push(Usage { count, last_used });
    }
    Some((clock, usages))
}

fn encode_metadata<'a>(clock: u64, usages: impl Iterator<Item = &'a Usage>) -> Vec<u8> {
    let usages: Vec<&Usage> = usages.collect();
    let mut out = Vec::with_capacity(16 + usages.len() * 12);
    out.extend_from_slice(&METADATA_VERSION.to_le_bytes());
    out.extend_from_slice(&clock.to_le_bytes());
    out.extend_from_slice(&(usages.len() as u32).to_le_bytes());
    for usage in usages {
        out.extend_from_slice(&usage.count.to_le_bytes());
        out.extend_from_slice(&usage.last_used.to_le_bytes());
    }
    out
}

fn remove_memory_files(dir: &Path) -> Result<(), ConvertError> {
    files::remove_trie(dir, MEMORY_IDENTIFIER)?;
    for name in [METADATA_FILE, PAUSE_FILE] {
        match fs::remove_file(dir.join(name)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
