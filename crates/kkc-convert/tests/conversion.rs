//! End-to-end conversion tests over a dictionary written to a temporary
//! directory from `tests/fixtures/scenarios.json`.
//!
//! Run: cargo test -p kkc-convert --test conversion

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kkc_convert::config::{ConvertOptions, DictionaryConfig, LearningConfig};
use kkc_convert::decoder::{Decoder, PrefixConstraint, TextEdit};
use kkc_convert::lattice::{Lattice, LatticeRange};
use kkc_convert::store::memory::{METADATA_FILE, MEMORY_IDENTIFIER};
use kkc_convert::store::{CostMatrix, DictionaryStore, write_dictionary};
use kkc_convert::typo::{MAX_PENALTY, TypoGenerator};
use kkc_convert::{Candidate, Converter};
use kkc_core::{ComposingText, DictionaryEntry, EntrySource, InputTable};
use kkc_louds::files::{shard_path, trie_paths};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

fn load_fixture() -> Value {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/scenarios.json");
    let contents = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read fixture {}: {}", path.display(), e));
    serde_json::from_str(&contents)
        .unwrap_or_else(|e| panic!("failed to parse fixture {}: {}", path.display(), e))
}

fn class(v: &Value) -> u16 {
    v.as_u64().unwrap() as u16
}

fn fixture_entries(fixture: &Value) -> Vec<DictionaryEntry> {
    fixture["dictionary"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| {
            DictionaryEntry::with_class(
                row[0].as_str().unwrap(),
                row[1].as_str().unwrap(),
                class(&row[2]),
                class(&row[3]),
                row[4].as_f64().unwrap() as f32,
            )
        })
        .collect()
}

/// Write the fixture dictionary under `dir/dict` and open a store over it.
fn open_store(dir: &Path, learning: LearningConfig) -> Arc<DictionaryStore> {
    let fixture = load_fixture();
    let dict_dir = dir.join("dict");
    let mut connection = CostMatrix::default();
    for cell in fixture["connection"].as_array().unwrap() {
        connection.set(class(&cell[0]), class(&cell[1]), cell[2].as_f64().unwrap() as f32);
    }
    write_dictionary(&dict_dir, &fixture_entries(&fixture), &connection, &CostMatrix::default()).unwrap();
    let attaching = fixture["attaching_left_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| class(&r[0])..=class(&r[1]))
        .collect();
    let config = DictionaryConfig {
        dictionary_dir: Some(dict_dir),
        attaching_left_ids: attaching,
        ..DictionaryConfig::default()
    };
    Arc::new(DictionaryStore::open(config, learning).unwrap())
}

fn texts(candidates: &[Candidate]) -> Vec<String> {
    candidates.iter().map(|c| c.text.clone()).collect()
}

fn assert_n_best(lattice: &Lattice, n_best: usize) {
    for node in lattice.iter() {
        assert!(node.incoming.len() <= n_best, "{} chains into {:?}", node.incoming.len(), node.entry.word);
        assert!(
            node.incoming
                .windows(2)
                .all(|w| w[0].total_score >= w[1].total_score)
        );
    }
}

// ---------------------------------------------------------------------------
// Golden conversions
// ---------------------------------------------------------------------------

#[test]
fn fixture_conversions() {
    let tmp = tempfile::tempdir().unwrap();
    let store = open_store(tmp.path(), LearningConfig::default());
    let table = InputTable::default();
    let fixture = load_fixture();

    for case in fixture["conversions"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let text = match (case["direct"].as_str(), case["romaji"].as_str()) {
            (Some(direct), _) => ComposingText::from_direct(direct),
            (None, Some(romaji)) => ComposingText::from_romaji(&table, romaji),
            _ => panic!("{name}: no input"),
        };
        let options = ConvertOptions {
            n_best: case["n_best"].as_u64().map_or(10, |n| n as usize),
            ..ConvertOptions::default()
        };
        let mut converter = Converter::new(Arc::clone(&store), table.clone(), options);
        let candidates = converter.request(&text);
        let found = texts(&candidates);

        assert_eq!(found.first().map(String::as_str), case["top"].as_str(), "{name}: {found:?}");
        if let Some(expected) = case["contains"].as_array() {
            for word in expected {
                let word = word.as_str().unwrap();
                assert!(found.iter().any(|t| t == word), "{name}: {word} missing from {found:?}");
            }
        }
        if let Some(expected) = case["clauses"].as_array() {
            let expected: Vec<&str> = expected.iter().map(|c| c.as_str().unwrap()).collect();
            let clauses: Vec<&str> = candidates[0].clauses.iter().map(|c| c.text.as_str()).collect();
            assert_eq!(clauses, expected, "{name}");
        }
    }
}

// ---------------------------------------------------------------------------
// Decoder properties
// ---------------------------------------------------------------------------

#[test]
fn n_best_bound_in_every_mode() {
    let tmp = tempfile::tempdir().unwrap();
    let store = open_store(tmp.path(), LearningConfig::default());
    let table = InputTable::default();
    for n_best in 1..=3 {
        let options = ConvertOptions {
            n_best,
            ..ConvertOptions::default()
        };
        let decoder = Decoder::new(&store, &table, &options);

        let full = ComposingText::from_direct("わたしはあいいい");
        let fresh = decoder.decode(&full);
        assert_n_best(&fresh.state.lattice, n_best);

        let edited = ComposingText::from_direct("わたしはあいひ");
        let after_edit = decoder.decode_after_edit(&edited, &fresh.state, TextEdit::between(&full, &edited));
        assert_n_best(&after_edit.state.lattice, n_best);

        let best = after_edit.candidates(&store).remove(0);
        let first = best.first_clause(&edited).unwrap();
        let rest = edited.dropping_prefix(&table, first.consumed_input_count);
        let after_commit = decoder.decode_after_commit(&rest, &first, &after_edit.state);
        assert_n_best(&after_commit.state.lattice, n_best);

        let constrained = decoder.decode_with_prefix(&full, &PrefixConstraint::new("私", false));
        assert_n_best(&constrained.state.lattice, n_best);
    }
}

#[test]
fn typo_variants_stay_within_one_step_of_the_bound() {
    let table = InputTable::default();
    let text = ComposingText::from_direct("はははは");
    let variants: Vec<_> = TypoGenerator::new(&table, &text.input, 0, 1..=4, true).collect();
    assert!(variants.iter().any(|v| v.penalty > 0.0));
    for v in &variants {
        assert!(v.penalty <= MAX_PENALTY + 7.0, "{:?} at {}", v.text, v.penalty);
    }

    let text = ComposingText::from_direct("か");
    let variants: Vec<_> = TypoGenerator::new(&table, &text.input, 0, 1..=1, true).collect();
    assert!(variants.iter().any(|v| v.text == ['カ'] && v.penalty == 0.0));
    assert!(variants.iter().any(|v| v.text == ['ガ'] && v.penalty == 7.0));
}

#[test]
fn commit_then_remainder_matches_fresh_decode() {
    let tmp = tempfile::tempdir().unwrap();
    let store = open_store(tmp.path(), LearningConfig::default());
    let table = InputTable::default();
    let decoder = Decoder::new(&store, &table, &ConvertOptions::default());

    let full = ComposingText::from_romaji(&table, "kyouhatenki");
    let fresh = decoder.decode(&full);
    let best = fresh.candidates(&store).remove(0);
    let first = best.first_clause(&full).unwrap();
    assert_eq!(first.text, "今日は");

    let rest = full.dropping_prefix(&table, first.consumed_input_count);
    assert_eq!(rest.surface_string(), "てんき");
    let after = decoder.decode_after_commit(&rest, &first, &fresh.state);
    let tail = after.candidates(&store).remove(0);
    assert_eq!(format!("{}{}", first.text, tail.text), best.text);
}

#[test]
fn suffix_edit_keeps_prefix_nodes_and_regenerates_the_tail() {
    let tmp = tempfile::tempdir().unwrap();
    let store = open_store(tmp.path(), LearningConfig::default());
    let table = InputTable::default();
    let decoder = Decoder::new(&store, &table, &ConvertOptions::default());

    let before = ComposingText::from_direct("abc");
    let previous = decoder.decode(&before);
    let after = ComposingText::from_direct("abd");
    let edit = TextEdit::between(&before, &after);
    assert_eq!(edit, TextEdit { deleted: 1, added: 1 });
    let decoded = decoder.decode_after_edit(&after, &previous.state, edit);

    let is_old = |node: &kkc_convert::lattice::LatticeNode| {
        previous
            .state
            .lattice
            .iter()
            .any(|p| Arc::ptr_eq(&p.entry, &node.entry))
    };
    for node in decoded.state.lattice.iter() {
        assert_eq!(is_old(node), node.range.ends_within(2, 2), "{:?}", node.entry.word);
    }

    let mut regenerated: Vec<(String, LatticeRange)> = decoded
        .state
        .lattice
        .iter()
        .filter(|n| !n.range.ends_within(2, 2))
        .map(|n| (n.entry.word.clone(), n.range))
        .collect();
    let fresh = decoder.decode(&after);
    let mut expected: Vec<(String, LatticeRange)> = fresh
        .state
        .lattice
        .iter()
        .filter(|n| !n.range.ends_within(2, 2))
        .map(|n| (n.entry.word.clone(), n.range))
        .collect();
    regenerated.sort_by(|a, b| a.0.cmp(&b.0));
    expected.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(regenerated, expected);
    assert!(regenerated.iter().any(|(w, _)| w == "BD"));

    assert_eq!(texts(&decoded.candidates(&store)), texts(&fresh.candidates(&store)));
    assert_eq!(decoded.candidates(&store)[0].text, "ABD");
}

#[test]
fn prefix_constraint_branches() {
    let tmp = tempfile::tempdir().unwrap();
    let store = open_store(tmp.path(), LearningConfig::default());
    let table = InputTable::default();
    let decoder = Decoder::new(&store, &table, &ConvertOptions::default());
    let text = ComposingText::from_direct("わたしはがくせい");

    let open = decoder.decode_with_prefix(&text, &PrefixConstraint::new("私は", false));
    let found = texts(&open.candidates(&store));
    assert!(!found.is_empty());
    assert!(found.iter().all(|t| t.starts_with("私は")), "{found:?}");

    // With the end included, extensions must stay strictly shorter than the
    // constraint. 私は + 学生 needs the extension into 学生 to reach the full
    // length, which is refused, so nothing closes. Only a single word spanning
    // the whole input can match exactly.
    let exact = decoder.decode_with_prefix(&text, &PrefixConstraint::new("私は学生", true));
    assert!(exact.eos.is_empty());

    let single = decoder.decode_with_prefix(
        &ComposingText::from_direct("がくせい"),
        &PrefixConstraint::new("学生", true),
    );
    assert_eq!(texts(&single.candidates(&store)), ["学生"]);
}

#[test]
fn user_entries_bypass_the_prefix_constraint() {
    let tmp = tempfile::tempdir().unwrap();
    let store = open_store(tmp.path(), LearningConfig::default());
    store.import_user_dictionary([DictionaryEntry::with_class("哀", "あい", 10, 501, -6.0)]);
    let table = InputTable::default();
    let decoder = Decoder::new(&store, &table, &ConvertOptions::default());
    let decoded = decoder.decode_with_prefix(&ComposingText::from_direct("あい"), &PrefixConstraint::new("藍", true));
    let found = decoded.candidates(&store);
    assert!(found.iter().any(|c| c.text == "藍"));
    let user = found.iter().find(|c| c.text == "哀").unwrap();
    assert_eq!(user.entries[0].source, EntrySource::User);
}

// ---------------------------------------------------------------------------
// Learning
// ---------------------------------------------------------------------------

fn learning(dir: &Path) -> LearningConfig {
    LearningConfig {
        memory_dir: Some(dir.join("memory")),
        ..LearningConfig::default()
    }
}

#[test]
fn learned_memory_is_saved_reloaded_and_reset() {
    let tmp = tempfile::tempdir().unwrap();
    let text = ComposingText::from_direct("あい");
    let memory_dir = tmp.path().join("memory");
    {
        let store = open_store(tmp.path(), learning(tmp.path()));
        let mut converter = Converter::new(store, InputTable::default(), ConvertOptions::default());
        let candidates = converter.request(&text);
        assert_eq!(candidates[0].text, "愛");
        let indigo = candidates.iter().find(|c| c.text == "藍").unwrap().clone();
        converter.commit(&indigo);
        converter.save_memory().unwrap();
    }

    let (bits, chars) = trie_paths(&memory_dir, MEMORY_IDENTIFIER);
    assert!(bits.is_file());
    assert!(chars.is_file());
    assert!(shard_path(&memory_dir, MEMORY_IDENTIFIER, 0).is_file());
    assert!(memory_dir.join(METADATA_FILE).is_file());

    let store = open_store(tmp.path(), learning(tmp.path()));
    assert_eq!(store.memory_len(), 1);
    let mut converter = Converter::new(Arc::clone(&store), InputTable::default(), ConvertOptions::default());
    let candidates = converter.request(&text);
    assert_eq!(candidates[0].text, "藍");
    assert_eq!(candidates[0].entries[0].source, EntrySource::Learned);

    converter.reset_memory().unwrap();
    assert!(!bits.exists());
    assert!(!memory_dir.join(METADATA_FILE).exists());
    converter.stop_composition();
    assert_eq!(converter.request(&text)[0].text, "愛");
}

#[test]
fn forget_removes_every_learned_row_of_a_word() {
    let tmp = tempfile::tempdir().unwrap();
    let store = open_store(tmp.path(), LearningConfig::default());
    let mut converter = Converter::new(store, InputTable::default(), ConvertOptions::default());
    let text = ComposingText::from_direct("あい");
    let indigo = converter
        .request(&text)
        .into_iter()
        .find(|c| c.text == "藍")
        .unwrap();
    converter.learn(&indigo);
    converter.learn(&indigo);
    converter.stop_composition();
    assert_eq!(converter.request(&text)[0].text, "藍");

    assert!(converter.forget(&indigo));
    assert!(!converter.forget(&indigo));
    converter.stop_composition();
    assert_eq!(converter.request(&text)[0].text, "愛");
}

#[test]
fn memory_cap_evicts_the_oldest_rows() {
    let tmp = tempfile::tempdir().unwrap();
    let config = LearningConfig {
        max_memory_count: 2,
        ..LearningConfig::default()
    };
    let store = open_store(tmp.path(), config);
    for (word, ruby) in [("相", "アイ"), ("加", "カ"), ("比", "ヒ")] {
        store.update_learning(&[DictionaryEntry::with_class(word, ruby, 10, 501, -5.0)], None);
    }
    assert_eq!(store.memory_len(), 2);
    let learned = |ruby: &[char]| {
        store
            .entries_for(ruby)
            .into_iter()
            .filter(|e| e.source == EntrySource::Learned)
            .map(|e| e.word)
            .collect::<Vec<_>>()
    };
    assert!(learned(&['ア', 'イ']).is_empty());
    assert_eq!(learned(&['カ']), ["加"]);
    assert_eq!(learned(&['ヒ']), ["比"]);
}
