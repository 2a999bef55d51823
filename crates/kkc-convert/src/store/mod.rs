// Dictionary store: static tries and shards, class cost matrices, learned
// memory and user dictionaries behind one lookup surface

pub mod connection;
pub mod memory;

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hashbrown::HashMap;
use kkc_core::character::{to_katakana, to_katakana_char};
use kkc_core::{ComposingText, DictionaryEntry, EntrySource, InputTable};
use kkc_louds::files::{self, TrieImage};
use kkc_louds::{CharIdTable, Louds, loudstxt3, shard_address};
use parking_lot::RwLock;

use crate::ConvertError;
use crate::config::{DictionaryConfig, LearningConfig};
use crate::lattice::{LatticeNode, LatticeRange};
use crate::typo::TypoGenerator;

pub use connection::{CONNECTION_MATRIX_FILE, CostMatrix, PHRASE_MATRIX_FILE};
pub use memory::MemoryStore;

/// Identifier of the file-backed user dictionary trie.
pub const USER_IDENTIFIER: &str = "user";

/// What part of the composing text a lookup covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupRange {
    /// Input elements `start..end` for every `end` in `ends`, typo variants
    /// included. Nodes get [`LatticeRange::Input`] ranges.
    Input { start: usize, ends: RangeInclusive<usize> },
    /// Surface characters `start..end` for every `end` in `ends`, exact
    /// readings only. Nodes get [`LatticeRange::Surface`] ranges.
    Surface { start: usize, ends: RangeInclusive<usize> },
}

type TrieCache = RwLock<HashMap<String, Option<Arc<Louds>>>>;
type ShardCache = RwLock<HashMap<(String, usize), Option<Arc<Vec<u8>>>>>;

/// Read access to every dictionary source used by the decoder.
///
/// Static tries and shards are loaded on first use and shared; the learned
/// memory and the imported user entries sit behind their own locks so
/// learning never blocks on static data.
pub struct DictionaryStore {
    config: DictionaryConfig,
    louds_dir: Option<PathBuf>,
    char_table: CharIdTable,
    connection: CostMatrix,
    phrase: CostMatrix,
    tries: TrieCache,
    shards: ShardCache,
    user: Option<TrieImage>,
    dynamic_user: RwLock<Vec<DictionaryEntry>>,
    memory: RwLock<MemoryStore>,
}

impl std::fmt::Debug for DictionaryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DictionaryStore")
            .field("louds_dir", &self.louds_dir)
            .field("chars", &self.char_table.len())
            .field("user_rows", &self.user.as_ref().map_or(0, TrieImage::row_count))
            .field("memory_rows", &self.memory.read().len())
            .finish()
    }
}

/// Character table used when no dictionary is configured: katakana, the
/// prolonged sound mark and ASCII alphanumerics.
fn fallback_char_table() -> Result<CharIdTable, ConvertError> {
    let chars = ('\u{30A1}'..='\u{30FA}')
        .chain(['ー'])
        .chain('0'..='9')
        .chain('a'..='z')
        .chain('A'..='Z');
    Ok(CharIdTable::from_chars(chars)?)
}

impl DictionaryStore {
    /// Open the configured dictionary directory and learned memory.
    ///
    /// A missing dictionary directory gives a store that only knows learned
    /// and user entries. Matrix files are optional.
    pub fn open(config: DictionaryConfig, learning: LearningConfig) -> Result<Self, ConvertError> {
        let louds_dir = config.louds_dir();
        let char_table = match &louds_dir {
            Some(dir) => match files::load_char_table(dir)? {
                Some(table) => table,
                None => {
                    log::warn!("{}: no character table, using the built-in one", dir.display());
                    fallback_char_table()?
                }
            },
            None => fallback_char_table()?,
        };
        let (connection, phrase) = match &config.dictionary_dir {
            Some(dir) => (
                CostMatrix::load(&dir.join(CONNECTION_MATRIX_FILE))?,
                CostMatrix::load(&dir.join(PHRASE_MATRIX_FILE))?,
            ),
            None => (CostMatrix::default(), CostMatrix::default()),
        };
        let user = match &config.user_dictionary_dir {
            Some(dir) => load_user_trie(dir),
            None => None,
        };
        let memory = MemoryStore::open(learning, char_table.clone());
        log::debug!(
            "opened dictionary {:?}: {} chars, connection {}x{}",
            config.dictionary_dir,
            char_table.len(),
            connection.num_left(),
            connection.num_right()
        );
        Ok(Self {
            config,
            louds_dir,
            char_table,
            connection,
            phrase,
            tries: RwLock::new(HashMap::new()),
            shards: RwLock::new(HashMap::new()),
            user,
            dynamic_user: RwLock::new(Vec::new()),
            memory: RwLock::new(memory),
        })
    }

    /// Replace the class cost matrices.
    pub fn with_matrices(mut self, connection: CostMatrix, phrase: CostMatrix) -> Self {
        self.connection = connection;
        self.phrase = phrase;
        self
    }

    pub fn config(&self) -> &DictionaryConfig {
        &self.config
    }

    pub fn char_table(&self) -> &CharIdTable {
        &self.char_table
    }

    // -----------------------------------------------------------------------
    // Costs and class rules
    // -----------------------------------------------------------------------

    /// Cost of an entry with right class `left` followed by one with left
    /// class `right`.
    #[inline]
    pub fn connection_cost(&self, left: u16, right: u16) -> f32 {
        self.connection.cost(left, right)
    }

    /// Cost of phrase class `left` followed by phrase class `right`.
    #[inline]
    pub fn phrase_cost(&self, left: u16, right: u16) -> f32 {
        self.phrase.cost(left, right)
    }

    /// Whether the decoder must not place `entry` in a lattice.
    pub fn should_suppress(&self, entry: &DictionaryEntry) -> bool {
        if entry.source.is_trusted() {
            return false;
        }
        entry.word.is_empty() || entry.word.chars().any(char::is_control) || !entry.score.is_finite()
    }

    /// Whether an entry with left class `left_id` after one with right class
    /// `right_id` starts a new clause.
    pub fn is_clause_break(&self, right_id: u16, left_id: u16) -> bool {
        let attaches = self
            .config
            .attaching_left_ids
            .iter()
            .any(|r| r.contains(&left_id));
        let continues = self
            .config
            .continuing_right_ids
            .iter()
            .any(|r| r.contains(&right_id));
        !attaches && !continues
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Lattice nodes for every reading `range` covers.
    ///
    /// Input lookups enumerate typo variants (or only the input as typed
    /// when `typo_correction` is off) and subtract each variant's penalty
    /// from the row score.
    pub fn lookup(
        &self,
        text: &ComposingText,
        table: &InputTable,
        range: LookupRange,
        typo_correction: bool,
    ) -> Vec<LatticeNode> {
        match range {
            LookupRange::Input { start, ends } => self.lookup_input(text, table, start, ends, typo_correction),
            LookupRange::Surface { start, ends } => self.lookup_surface(text, start, ends),
        }
    }

    fn lookup_input(
        &self,
        text: &ComposingText,
        table: &InputTable,
        start: usize,
        ends: RangeInclusive<usize>,
        typo_correction: bool,
    ) -> Vec<LatticeNode> {
        let has_trie = |c: char| self.has_data_for(c);
        let mut generator =
            TypoGenerator::new(table, &text.input, start, ends, typo_correction).with_prune(&has_trie);

        // Best penalty per (end, reading).
        let mut variants: BTreeMap<(usize, Vec<char>), f32> = BTreeMap::new();
        while let Some(variant) = generator.next() {
            let depth = self.matched_depth(&variant.text);
            if depth < variant.text.len() {
                generator.set_unreachable_path(&variant.text[..=depth]);
                continue;
            }
            variants
                .entry((variant.end, variant.text))
                .and_modify(|p| *p = p.min(variant.penalty))
                .or_insert(variant.penalty);
        }

        let mut nodes = Vec::new();
        for ((end, key), penalty) in variants {
            let range = LatticeRange::Input { start, end };
            for entry in self.entries_for(&key) {
                let entry = if penalty > 0.0 { entry.penalized(penalty) } else { entry };
                nodes.push(LatticeNode::new(entry, range));
            }
        }
        nodes
    }

    fn lookup_surface(&self, text: &ComposingText, start: usize, ends: RangeInclusive<usize>) -> Vec<LatticeNode> {
        let mut nodes = Vec::new();
        for end in ends {
            let Some(chars) = text.surface.get(start..end) else {
                break;
            };
            let key: Vec<char> = chars.iter().copied().map(to_katakana_char).collect();
            if self.matched_depth(&key) < key.len() {
                // Longer readings share this missing prefix.
                break;
            }
            let range = LatticeRange::Surface { start, end };
            nodes.extend(self.entries_for(&key).into_iter().map(|e| LatticeNode::new(e, range)));
        }
        nodes
    }

    /// Every entry whose reading is exactly `key` (katakana), from every
    /// source: static, user trie, imported user entries and learned memory.
    pub fn entries_for(&self, key: &[char]) -> Vec<DictionaryEntry> {
        let mut out = self.static_entries(key);
        if let Some(user) = &self.user {
            out.extend(image_rows(user, &self.char_table, key).map(|e| e.with_source(EntrySource::User)));
        }
        {
            let dynamic = self.dynamic_user.read();
            let ruby: String = key.iter().collect();
            out.extend(dynamic.iter().filter(|e| e.ruby == ruby).cloned());
        }
        let memory = self.memory.read();
        if memory.config().learning_type.reads_memory() {
            out.extend(memory.lookup(key));
        }
        out
    }

    fn static_entries(&self, key: &[char]) -> Vec<DictionaryEntry> {
        let Some(&first) = key.first() else {
            return Vec::new();
        };
        let identifier = first.to_string();
        let Some(louds) = self.static_trie(&identifier) else {
            return Vec::new();
        };
        let Some(ids) = self.char_table.encode(key) else {
            return Vec::new();
        };
        let Some(node) = louds.search_node_index(&ids) else {
            return Vec::new();
        };
        let (shard, local) = shard_address(node);
        let Some(bytes) = self.static_shard(&identifier, shard) else {
            return Vec::new();
        };
        match loudstxt3::decode(&bytes, &[local]) {
            Ok(rows) => rows,
            Err(e) => {
                log::warn!("shard {identifier}{shard}: {e}");
                Vec::new()
            }
        }
    }

    /// How many leading characters of `key` some source can still extend.
    pub fn matched_depth(&self, key: &[char]) -> usize {
        let Some(&first) = key.first() else {
            return 0;
        };
        let ids: Vec<u8> = key.iter().map_while(|&c| self.char_table.id_of(c)).collect();
        let mut depth = 0;
        if let Some(louds) = self.static_trie(&first.to_string()) {
            depth = depth.max(louds.prefix_walk(&ids).1);
        }
        if let Some(user) = &self.user {
            depth = depth.max(user.louds.prefix_walk(&ids).1);
        }
        depth = depth.max(self.memory.read().matched_depth(key));
        if depth < key.len() {
            let dynamic = self.dynamic_user.read();
            for entry in dynamic.iter() {
                let shared = entry.ruby.chars().zip(key).take_while(|(a, b)| a == *b).count();
                depth = depth.max(shared);
            }
        }
        depth
    }

    /// Whether any source holds a reading starting with `c` (katakana).
    pub fn has_data_for(&self, c: char) -> bool {
        self.matched_depth(&[c]) == 1
    }

    fn static_trie(&self, identifier: &str) -> Option<Arc<Louds>> {
        let dir = self.louds_dir.as_deref()?;
        if let Some(cached) = self.tries.read().get(identifier) {
            return cached.clone();
        }
        let loaded = match files::load_trie(dir, identifier) {
            Ok(louds) => louds.map(Arc::new),
            Err(e) => {
                log::warn!("trie {identifier}: {e}");
                None
            }
        };
        self.tries
            .write()
            .entry(identifier.to_string())
            .or_insert(loaded)
            .clone()
    }

    fn static_shard(&self, identifier: &str, shard: usize) -> Option<Arc<Vec<u8>>> {
        let dir = self.louds_dir.as_deref()?;
        let key = (identifier.to_string(), shard);
        if let Some(cached) = self.shards.read().get(&key) {
            return cached.clone();
        }
        let loaded = match files::read_shard(dir, identifier, shard) {
            Ok(Some(bytes)) => match loudstxt3::group_count(&bytes) {
                Ok(_) => Some(Arc::new(bytes)),
                Err(e) => {
                    log::warn!("shard {identifier}{shard}: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                log::warn!("shard {identifier}{shard}: {e}");
                None
            }
        };
        self.shards.write().entry(key).or_insert(loaded).clone()
    }

    // -----------------------------------------------------------------------
    // User dictionary and learning
    // -----------------------------------------------------------------------

    /// Replace the imported user entries. Rubies are stored in katakana and
    /// entries without a word or reading are dropped.
    pub fn import_user_dictionary(&self, entries: impl IntoIterator<Item = DictionaryEntry>) {
        let entries: Vec<DictionaryEntry> = entries
            .into_iter()
            .filter(|e| !e.word.is_empty() && !e.ruby.is_empty())
            .map(|mut e| {
                e.ruby = to_katakana(&e.ruby);
                e.with_source(EntrySource::User)
            })
            .collect();
        log::debug!("imported {} user entries", entries.len());
        *self.dynamic_user.write() = entries;
    }

    pub fn update_learning(&self, entries: &[DictionaryEntry], previous: Option<&DictionaryEntry>) {
        self.memory.write().update(entries, previous);
    }

    pub fn forget_memory(&self, entries: &[DictionaryEntry]) -> bool {
        self.memory.write().forget(entries)
    }

    pub fn save_memory(&self) -> Result<(), ConvertError> {
        self.memory.read().save()
    }

    pub fn reset_memory(&self) -> Result<(), ConvertError> {
        self.memory.write().reset()
    }

    /// Swap the learning configuration, reloading only the memory.
    pub fn update_learning_config(&self, learning: LearningConfig) {
        let memory = MemoryStore::open(learning, self.char_table.clone());
        *self.memory.write() = memory;
    }

    pub fn memory_len(&self) -> usize {
        self.memory.read().len()
    }
}

fn load_user_trie(dir: &Path) -> Option<TrieImage> {
    match TrieImage::load(dir, USER_IDENTIFIER) {
        Ok(image) => image,
        Err(e) => {
            log::warn!("{}: cannot load user dictionary: {e}", dir.display());
            None
        }
    }
}

fn image_rows<'a>(
    image: &'a TrieImage,
    table: &CharIdTable,
    key: &[char],
) -> impl Iterator<Item = DictionaryEntry> + 'a {
    let node = table
        .encode(key)
        .and_then(|ids| image.louds.search_node_index(&ids));
    node.map(|n| image.rows(n)).unwrap_or_default().iter().cloned()
}

// ---------------------------------------------------------------------------
// Dictionary directories
// ---------------------------------------------------------------------------

/// Write a complete dictionary directory: per-first-character tries, the
/// character table and both matrices.
pub fn write_dictionary(
    dir: &Path,
    entries: &[DictionaryEntry],
    connection: &CostMatrix,
    phrase: &CostMatrix,
) -> Result<(), ConvertError> {
    let louds_dir = dir.join(files::LOUDS_DIR);
    let table = fallback_char_table()?;
    files::export_by_first_char(&louds_dir, entries.iter().cloned(), &table)?;
    files::write_char_table(&louds_dir, &table)?;
    files::write_atomic(&dir.join(CONNECTION_MATRIX_FILE), matrix_text(connection).as_bytes())?;
    files::write_atomic(&dir.join(PHRASE_MATRIX_FILE), matrix_text(phrase).as_bytes())?;
    Ok(())
}

fn matrix_text(matrix: &CostMatrix) -> String {
    let mut out = format!("{} {}\n", matrix.num_left(), matrix.num_right());
    for right in 0..matrix.num_right() {
        for left in 0..matrix.num_left() {
            let cost = matrix.cost(left as u16, right as u16);
            if cost != 0.0 {
                out.push_str(&format!("{left} {right} {cost}\n"));
            }
        }
    }
    out
}
