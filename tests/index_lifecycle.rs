use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use upsidedown::index::merge::DictionaryCounterMerge;
use upsidedown::index::rows::{
    BackIndexRow, DictionaryRow, RowCodec, StoredRow, TermFrequencyRow, VersionRow,
    BACK_INDEX_PREFIX, DICTIONARY_PREFIX, TERM_FREQUENCY_PREFIX, VERSION_KEY,
};
use upsidedown::storage::kvstore::{KVBatch, KVReader, KVStore};
use upsidedown::storage::log_store::LogStore;
use upsidedown::storage::wal::SyncMode;
use upsidedown::{Config, Document, ErrorKind, Field, FieldValue, Index, IndexState};

fn open(config: Config) -> Index {
    let index = Index::new(config).unwrap();
    index.open().unwrap();
    index
}

fn scan(kv: &dyn KVReader, prefix: u8) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut out = Vec::new();
    let mut iter = kv.prefix_iterator(&[prefix]);
    while let Some((k, v)) = iter.current() {
        out.push((k.to_vec(), v.to_vec()));
        iter.next();
    }
    out
}

fn dictionary(kv: &dyn KVReader) -> BTreeMap<String, u64> {
    scan(kv, DICTIONARY_PREFIX)
        .into_iter()
        .map(|(k, v)| {
            let row = DictionaryRow::from_kv(&k, &v).unwrap();
            (row.term, row.count)
        })
        .collect()
}

fn postings(kv: &dyn KVReader) -> Vec<(String, String)> {
    scan(kv, TERM_FREQUENCY_PREFIX)
        .into_iter()
        .map(|(k, v)| {
            let row = TermFrequencyRow::from_kv(&k, &v).unwrap();
            (row.term, row.doc_id)
        })
        .collect()
}

#[test]
fn the_cat_becomes_the_dog_then_disappears() {
    let index = open(Config::in_memory());

    index.update(Document::new("d1").with_text("body", "the cat sat")).unwrap();
    {
        let reader = index.reader().unwrap();
        let kv = reader.kv();
        assert_eq!(postings(kv).len(), 3);
        let dict = dictionary(kv);
        assert_eq!(dict.len(), 3);
        assert!(dict.values().all(|&c| c == 1));

        let backs = scan(kv, BACK_INDEX_PREFIX);
        assert_eq!(backs.len(), 1);
        let back = BackIndexRow::from_kv(&backs[0].0, &backs[0].1).unwrap();
        let terms: BTreeSet<_> = back.term_entries.iter().map(|e| e.term.as_str()).collect();
        assert_eq!(terms, BTreeSet::from(["cat", "sat", "the"]));
        assert_eq!(reader.doc_count(), 1);
    }

    index.update(Document::new("d1").with_text("body", "the dog sat")).unwrap();
    {
        let reader = index.reader().unwrap();
        let kv = reader.kv();
        let terms: BTreeSet<_> = postings(kv).into_iter().map(|(t, _)| t).collect();
        assert_eq!(terms, BTreeSet::from(["dog".to_string(), "sat".to_string(), "the".to_string()]));
        let dict = dictionary(kv);
        assert_eq!(dict["cat"], 0);
        assert_eq!(dict["dog"], 1);
        assert_eq!(dict["the"], 1);
        assert_eq!(index.doc_count().unwrap(), 1);
    }

    index.delete("d1").unwrap();
    let reader = index.reader().unwrap();
    let kv = reader.kv();
    assert!(postings(kv).is_empty());
    assert!(dictionary(kv).values().all(|&c| c == 0));
    assert!(scan(kv, BACK_INDEX_PREFIX).is_empty());
    assert!(scan(kv, b's').is_empty());
    assert_eq!(index.doc_count().unwrap(), 0);
}

#[test]
fn unchanged_reindex_keeps_dictionary_still() {
    let index = open(Config::in_memory());
    let doc = || Document::new("d1").with_text("body", "alpha beta beta");
    index.update(doc()).unwrap();
    let before = dictionary(index.reader().unwrap().kv());

    index.update(doc()).unwrap();
    assert_eq!(dictionary(index.reader().unwrap().kv()), before);
    assert_eq!(index.doc_count().unwrap(), 1);
}

#[test]
fn deleting_an_unknown_document_is_a_no_op() {
    let index = open(Config::in_memory());
    index.update(Document::new("keep").with_text("body", "x")).unwrap();

    index.delete("never-indexed").unwrap();
    index.delete("never-indexed").unwrap();
    assert_eq!(index.doc_count().unwrap(), 1);
}

#[test]
fn reader_is_a_snapshot() {
    let index = open(Config::in_memory());
    index.update(Document::new("d1").with_text("body", "one")).unwrap();
    let reader = index.reader().unwrap();

    index.update(Document::new("d2").with_text("body", "two")).unwrap();
    index.delete("d1").unwrap();

    assert_eq!(reader.doc_count(), 1);
    assert_eq!(reader.doc_ids().unwrap(), vec!["d1"]);
    assert_eq!(reader.term_field_reader("one", "body").unwrap().count(), 1);
    assert_eq!(index.reader().unwrap().doc_ids().unwrap(), vec!["d2"]);
}

#[test]
fn stored_fields_come_back_typed() {
    let index = open(Config::in_memory());
    let doc = Document::new("d1")
        .with_text("title", "Upside Down")
        .with_field(Field::new("rank", FieldValue::Number(4.5)))
        .with_field(Field::new("draft", FieldValue::Boolean(false)));
    index.update(doc).unwrap();

    let reader = index.reader().unwrap();
    let stored = reader.document("d1").unwrap().unwrap();
    assert_eq!(stored.get_field("title").unwrap().value, FieldValue::Text("Upside Down".into()));
    assert_eq!(stored.get_field("rank").unwrap().value, FieldValue::Number(4.5));
    assert_eq!(stored.get_field("draft").unwrap().value, FieldValue::Boolean(false));

    let terms = reader.document_field_terms("d1").unwrap().unwrap();
    assert_eq!(terms["title"], vec!["down", "upside"]);
    assert_eq!(terms["draft"], vec!["F"]);
}

#[test]
fn invalid_document_ids_are_rejected() {
    let index = open(Config::in_memory());
    let err = index.update(Document::new("").with_text("body", "x")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = index.update(Document::new("x".repeat(5000)).with_text("body", "x")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // Ids that could never be indexed delete as unknown documents
    index.delete("").unwrap();
    index.delete(&"x".repeat(5000)).unwrap();
    assert_eq!(index.doc_count().unwrap(), 0);
}

#[test]
fn log_store_reopens_with_fields_and_count() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config { sync_mode: SyncMode::Immediate, ..Config::persistent(dir.path()) };
    {
        let index = open(config.clone());
        index.update(Document::new("d1").with_text("title", "first post")).unwrap();
        index.update(Document::new("d2").with_text("body", "second post")).unwrap();
        index.update(Document::new("d3").with_text("body", "third")).unwrap();
        index.delete("d3").unwrap();
        index.set_internal(b"seq", b"7").unwrap();
        index.close().unwrap();
    }

    let index = open(config);
    assert_eq!(index.doc_count().unwrap(), 2);
    assert_eq!(index.fields(), vec![(0, "title".to_string()), (1, "body".to_string())]);

    let reader = index.reader().unwrap();
    assert_eq!(reader.term_field_reader("post", "body").unwrap().count(), 1);
    assert_eq!(reader.get_internal(b"seq").unwrap(), Some(b"7".to_vec()));

    // New field ids continue after the persisted ones
    index.update(Document::new("d4").with_text("tags", "x")).unwrap();
    assert_eq!(index.fields().last().unwrap(), &(2, "tags".to_string()));
}

#[test]
fn second_index_on_same_directory_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let _first = open(Config::persistent(dir.path()));

    let second = Index::new(Config::persistent(dir.path())).unwrap();
    assert_eq!(second.open().unwrap_err().kind(), ErrorKind::Io);
    assert_eq!(second.state(), IndexState::Unopened);
}

#[test]
fn schema_version_mismatch_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = LogStore::open(dir.path(), SyncMode::Immediate, Arc::new(DictionaryCounterMerge::new())).unwrap();
        let mut batch = KVBatch::new();
        let row = VersionRow::new(1);
        batch.set(&row.key(), &row.value());
        store.writer().unwrap().execute_batch(&batch).unwrap();
        store.close().unwrap();
        assert_eq!(row.key(), VERSION_KEY);
    }

    let index = Index::new(Config::persistent(dir.path())).unwrap();
    let err = index.open().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncompatibleVersion);
    assert_eq!(index.state(), IndexState::Unopened);

    // The failed open released the directory
    assert!(LogStore::open(dir.path(), SyncMode::None, Arc::new(DictionaryCounterMerge::new())).is_ok());
}

#[test]
fn unknown_backend_fails_open() {
    let index = Index::new(Config { store: "leveldb".to_string(), ..Config::in_memory() }).unwrap();
    assert_eq!(index.open().unwrap_err().kind(), ErrorKind::UnknownBackend);
}

#[test]
fn closed_index_rejects_everything() {
    let index = open(Config::in_memory());
    index.close().unwrap();

    assert_eq!(index.reader().err().unwrap().kind(), ErrorKind::InvalidState);
    assert_eq!(index.delete("d1").unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(index.set_internal(b"k", b"v").unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(index.doc_count().unwrap_err().kind(), ErrorKind::InvalidState);
    assert!(index.close().is_ok());
}

#[test]
fn stored_rows_match_back_index() {
    let index = open(Config::in_memory());
    index
        .update(
            Document::new("d1")
                .with_field(Field::text("tag", "a").with_array_positions(vec![0]))
                .with_field(Field::text("tag", "b").with_array_positions(vec![1])),
        )
        .unwrap();

    let reader = index.reader().unwrap();
    let kv = reader.kv();
    let stored: BTreeSet<Vec<u8>> = scan(kv, b's').into_iter().map(|(k, _)| k).collect();
    let backs = scan(kv, BACK_INDEX_PREFIX);
    let back = BackIndexRow::from_kv(&backs[0].0, &backs[0].1).unwrap();
    let listed: BTreeSet<Vec<u8>> = back.stored_rows().map(|r: StoredRow| r.key()).collect();
    assert_eq!(stored, listed);
}
