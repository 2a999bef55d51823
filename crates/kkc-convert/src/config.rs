// Dictionary, learning and conversion options

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use kkc_louds::charid::CHAR_TABLE_FILE;
use kkc_louds::files::LOUDS_DIR;

/// Environment variable naming the dictionary directory.
pub const DICT_PATH_ENV: &str = "KKC_DICT_PATH";

/// Where the dictionary lives and how its class ids are interpreted.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DictionaryConfig {
    /// Directory holding `louds/`, `matrix.def` and `phrase_matrix.def`.
    /// `None` runs with no static dictionary.
    pub dictionary_dir: Option<PathBuf>,
    /// Directory holding the `user` trie, if any.
    pub user_dictionary_dir: Option<PathBuf>,
    /// Left class ids that attach to the preceding clause (particles,
    /// auxiliaries, suffixes).
    pub attaching_left_ids: Vec<RangeInclusive<u16>>,
    /// Right class ids after which the next entry stays in the same clause
    /// (prefixes).
    pub continuing_right_ids: Vec<RangeInclusive<u16>>,
    /// Class id given to generated time expressions.
    pub proper_noun_class_id: u16,
    /// Phrase id given to generated time expressions.
    pub general_phrase_id: u16,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            dictionary_dir: None,
            user_dictionary_dir: None,
            attaching_left_ids: Vec::new(),
            continuing_right_ids: Vec::new(),
            proper_noun_class_id: 1288,
            general_phrase_id: 501,
        }
    }
}

impl DictionaryConfig {
    /// Config pointing at the first dictionary directory found by
    /// [`find_dictionary_dir`].
    pub fn discover(explicit: Option<&Path>) -> Self {
        Self {
            dictionary_dir: find_dictionary_dir(explicit),
            ..Self::default()
        }
    }

    /// Directory with the tries and shards.
    pub fn louds_dir(&self) -> Option<PathBuf> {
        self.dictionary_dir.as_ref().map(|d| d.join(LOUDS_DIR))
    }
}

/// Candidate dictionary directories: the explicit path, then `KKC_DICT_PATH`,
/// then `~/.kkc/dictionary`.
fn search_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(p) = explicit {
        paths.push(p.to_path_buf());
    }
    if let Ok(env_path) = std::env::var(DICT_PATH_ENV) {
        paths.push(PathBuf::from(env_path));
    }
    if let Ok(home) = std::env::var("HOME") {
        paths.push(PathBuf::from(home).join(".kkc").join("dictionary"));
    }
    paths
}

/// First search path that holds `louds/charID.chid`.
pub fn find_dictionary_dir(explicit: Option<&Path>) -> Option<PathBuf> {
    search_paths(explicit)
        .into_iter()
        .find(|p| p.join(LOUDS_DIR).join(CHAR_TABLE_FILE).is_file())
}

// ---------------------------------------------------------------------------
// Learning
// ---------------------------------------------------------------------------

/// How the learned memory takes part in conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LearningType {
    /// Memory is neither read nor written.
    Nothing,
    /// Memory is read but never updated.
    OnlyOutput,
    /// Memory is read and updated.
    #[default]
    InputAndOutput,
}

impl LearningType {
    pub fn reads_memory(self) -> bool {
        !matches!(self, LearningType::Nothing)
    }

    pub fn writes_memory(self) -> bool {
        matches!(self, LearningType::InputAndOutput)
    }
}

/// Learned memory settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LearningConfig {
    pub learning_type: LearningType,
    /// Maximum number of learned rows kept after eviction.
    pub max_memory_count: usize,
    /// Directory of the `memory.*` files. `None` keeps memory in process only.
    pub memory_dir: Option<PathBuf>,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_type: LearningType::default(),
            max_memory_count: 65536,
            memory_dir: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Per-converter decoding options.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConvertOptions {
    /// Chains kept per lattice node.
    pub n_best: usize,
    /// Look up typo variants of the input.
    pub typo_correction: bool,
    /// Offer `12:34` style candidates for 3 and 4 digit input.
    pub time_expressions: bool,
    /// Always append the unconverted surface as the last candidate.
    pub pass_through: bool,
    /// Maximum number of candidates returned per request.
    pub max_candidates: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            n_best: 10,
            typo_correction: false,
            time_expressions: true,
            pass_through: true,
            max_candidates: 20,
        }
    }
}
