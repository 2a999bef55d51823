// Converter: session-level entry point for kana-kanji conversion.
//
// Owns the options and the state of the previous request, and picks the
// decode mode for each new request from what changed since then:
// - after a partial commit, the remainder is decoded on the committed
//   candidate's classes, reusing the old lattice;
// - when the text shares a prefix with the previous one, only the edited
//   tail is looked up again;
// - otherwise the text is decoded from scratch.
//
// Design notes:
// - The store is shared through `Arc` so several converters (or threads)
//   can read one dictionary; learning goes through the store's own lock.
// - The input table is owned per converter instead of being global.
// - A `Decoder` is created per request; it borrows the store and table
//   and holds no state of its own.

use std::sync::Arc;

use hashbrown::HashSet;
use kkc_core::{ComposingText, DictionaryEntry, InputTable};

use crate::ConvertError;
use crate::candidate::Candidate;
use crate::config::ConvertOptions;
use crate::decoder::{DecodeState, Decoded, Decoder, PrefixConstraint, TextEdit};
use crate::store::DictionaryStore;
use crate::time_expression::time_expressions;

/// Conversion session over a shared [`DictionaryStore`].
pub struct Converter {
    store: Arc<DictionaryStore>,
    table: InputTable,

    // -- Options --
    options: ConvertOptions,

    // -- Session state --
    /// Text and lattice of the last request.
    previous: Option<DecodeState>,

    /// The last request was prefix-constrained. Its lattice only carries
    /// filtered chains, so plain requests must not build on it.
    constrained: bool,

    /// Candidate committed over part of the previous text, with the state it
    /// was taken from. Consumed by the next request.
    pending_commit: Option<(Candidate, DecodeState)>,

    /// Last entry of the previous commit, learned as context for the next.
    last_committed_entry: Option<DictionaryEntry>,
}

impl Converter {
    pub fn new(store: Arc<DictionaryStore>, table: InputTable, options: ConvertOptions) -> Self {
        Self {
            store,
            table,
            options,
            previous: None,
            constrained: false,
            pending_commit: None,
            last_committed_entry: None,
        }
    }

    pub fn store(&self) -> &Arc<DictionaryStore> {
        &self.store
    }

    pub fn table(&self) -> &InputTable {
        &self.table
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Replace the options. The previous lattice was built with the old
    /// ones, so the session restarts.
    pub fn set_options(&mut self, options: ConvertOptions) {
        self.options = options;
        self.stop_composition();
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Ranked candidates for `text`.
    ///
    /// Time expressions come first when enabled; the pass-through candidate
    /// is appended last unless a candidate already has its text.
    pub fn request(&mut self, text: &ComposingText) -> Vec<Candidate> {
        if text.is_empty() {
            self.stop_composition();
            return Vec::new();
        }
        let decoder = Decoder::new(&self.store, &self.table, &self.options);
        let pending_commit = self.pending_commit.take();
        let previous = self.previous.as_ref();
        let decoded = match (pending_commit, previous) {
            _ if self.constrained => decoder.decode(text),
            (Some((committed, state)), _) => decoder.decode_after_commit(text, &committed, &state),
            (None, Some(previous)) => {
                let edit = TextEdit::between(&previous.text, text);
                decoder.decode_after_edit(text, previous, edit)
            }
            (None, None) => decoder.decode(text),
        };
        self.constrained = false;

        let mut candidates = Vec::new();
        if self.options.time_expressions {
            candidates.extend(time_expressions(text, self.store.config()));
        }
        candidates.extend(decoded.candidates(&self.store));
        let mut candidates = self.finish(candidates);
        if self.options.pass_through && !candidates.iter().any(|c| c.text == text.surface_string()) {
            candidates.push(Candidate::pass_through(text));
        }
        self.previous = Some(decoded.state);
        candidates
    }

    /// Candidates for `text` that start with `constraint` (or equal it, when
    /// the constraint includes the end). No extra candidates are added.
    pub fn request_with_prefix(&mut self, text: &ComposingText, constraint: &PrefixConstraint) -> Vec<Candidate> {
        let decoder = Decoder::new(&self.store, &self.table, &self.options);
        let decoded: Decoded = decoder.decode_with_prefix(text, constraint);
        let candidates = self.finish(decoded.candidates(&self.store));
        self.pending_commit = None;
        self.previous = Some(decoded.state);
        self.constrained = true;
        candidates
    }

    /// Drop repeated texts and cap the list.
    fn finish(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|c| seen.insert(c.text.clone()))
            .take(self.options.max_candidates)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Commit and learning
    // -----------------------------------------------------------------------

    /// Accept `candidate` for the head of the last requested text and learn
    /// it. Returns the text left to convert, if any.
    pub fn commit(&mut self, candidate: &Candidate) -> Option<ComposingText> {
        self.store
            .update_learning(&candidate.entries, self.last_committed_entry.as_ref());
        self.last_committed_entry = candidate.entries.last().cloned();

        let previous = self.previous.take()?;
        if candidate.consumed_input_count >= previous.text.input_count() {
            log::debug!("committed {:?}, composition finished", candidate.text);
            self.pending_commit = None;
            return None;
        }
        let rest = previous
            .text
            .dropping_prefix(&self.table, candidate.consumed_input_count);
        log::debug!(
            "committed {:?}, {} input elements left",
            candidate.text,
            rest.input_count()
        );
        self.pending_commit = Some((candidate.clone(), previous));
        Some(rest)
    }

    /// Learn `candidate` without committing it.
    pub fn learn(&self, candidate: &Candidate) {
        self.store.update_learning(&candidate.entries, None);
    }

    /// Remove every learned row of `candidate`'s words. Returns whether
    /// anything was removed.
    pub fn forget(&self, candidate: &Candidate) -> bool {
        self.store.forget_memory(&candidate.entries)
    }

    pub fn save_memory(&self) -> Result<(), ConvertError> {
        self.store.save_memory()
    }

    pub fn reset_memory(&self) -> Result<(), ConvertError> {
        self.store.reset_memory()
    }

    pub fn import_user_dictionary(&self, entries: impl IntoIterator<Item = DictionaryEntry>) {
        self.store.import_user_dictionary(entries);
    }

    /// End the session: the next request decodes from scratch and the next
    /// commit learns without context.
    pub fn stop_composition(&mut self) {
        self.previous = None;
        self.constrained = false;
        self.pending_commit = None;
        self.last_committed_entry = None;
    }
}
