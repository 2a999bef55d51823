// Dictionary entries and grammatical class identifiers

/// Class id used for both the sentence-start and sentence-end anchors.
pub const BOS_EOS_CLASS_ID: u16 = 0;

/// Phrase class carried by anchors and entries without a phrase class.
pub const NEUTRAL_PHRASE_ID: u16 = 500;

/// Where a dictionary entry came from.
///
/// Learned and user entries are trusted: they bypass suppression and
/// prefix constraints during decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntrySource {
    #[default]
    System,
    Learned,
    User,
}

impl EntrySource {
    /// Returns `true` for learned or user entries.
    pub fn is_trusted(self) -> bool {
        matches!(self, EntrySource::Learned | EntrySource::User)
    }
}

/// One dictionary row: a surface word indexed under its phonetic key.
///
/// `score` is a log-probability style value: higher is better and
/// typical values are negative.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DictionaryEntry {
    /// Surface form (kanji, kana or mixed).
    pub word: String,
    /// Phonetic key in canonical katakana form.
    pub ruby: String,
    /// Grammatical class on the left edge (connection to the previous entry).
    pub left_id: u16,
    /// Grammatical class on the right edge (connection to the next entry).
    pub right_id: u16,
    /// Phrase class used for clause-level bigram scoring.
    pub phrase_id: u16,
    pub score: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub source: EntrySource,
}

impl DictionaryEntry {
    pub fn new(
        word: impl Into<String>,
        ruby: impl Into<String>,
        left_id: u16,
        right_id: u16,
        phrase_id: u16,
        score: f32,
    ) -> Self {
        Self {
            word: word.into(),
            ruby: ruby.into(),
            left_id,
            right_id,
            phrase_id,
            score,
            source: EntrySource::System,
        }
    }

    /// Entry with the same class on both edges.
    pub fn with_class(
        word: impl Into<String>,
        ruby: impl Into<String>,
        class_id: u16,
        phrase_id: u16,
        score: f32,
    ) -> Self {
        Self::new(word, ruby, class_id, class_id, phrase_id, score)
    }

    /// The sentence-start anchor.
    pub fn bos() -> Self {
        Self::new(
            "",
            "",
            BOS_EOS_CLASS_ID,
            BOS_EOS_CLASS_ID,
            NEUTRAL_PHRASE_ID,
            0.0,
        )
    }

    pub fn with_source(mut self, source: EntrySource) -> Self {
        self.source = source;
        self
    }

    /// Copy of this entry with `penalty` subtracted from the score.
    pub fn penalized(&self, penalty: f32) -> Self {
        let mut entry = self.clone();
        entry.score -= penalty;
        entry
    }

    /// Coarse identity used by forgetting: grammatical classes are ignored.
    pub fn same_text(&self, other: &DictionaryEntry) -> bool {
        self.word == other.word && self.ruby == other.ruby
    }

    /// Whether this entry carries a phrase class of its own.
    pub fn has_phrase_class(&self) -> bool {
        self.phrase_id != NEUTRAL_PHRASE_ID
    }
}
