use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use crossbeam::channel::{bounded, unbounded, Receiver, TryRecvError};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};
use crate::analysis::analyzer::AnalyzerRegistry;
use crate::analysis::queue::{AnalysisQueue, AnalysisResult, AnalysisWork, DocumentAnalysis};
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::{IndexStats, IndexStatsSnapshot};
use crate::core::types::{DocId, Document};
use crate::index::analyze::DocumentAnalyzer;
use crate::index::back_index::{self, load_back_index, RowDiff};
use crate::index::field_catalog::FieldCatalog;
use crate::index::merge::DictionaryCounterMerge;
use crate::index::rows::{
    FieldRow, InternalRow, Row, RowCodec, VersionRow, BACK_INDEX_PREFIX, FIELD_PREFIX,
    SCHEMA_VERSION, VERSION_KEY,
};
use crate::memory::buffer_pool::BufferPool;
use crate::reader::index_reader::IndexReader;
use crate::storage::kvstore::{KVBatch, KVStore};
use crate::storage::registry::StoreRegistry;
use crate::writer::batch::Batch;
use crate::writer::batch_writer::BatchWriter;

/// Lifecycle of an index instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Unopened,
    Opening,
    Ready,
    Closed,
}

enum State {
    Unopened,
    Opening,
    Ready(Arc<dyn KVStore>),
    Closed,
}

impl State {
    fn public(&self) -> IndexState {
        match self {
            State::Unopened => IndexState::Unopened,
            State::Opening => IndexState::Opening,
            State::Ready(_) => IndexState::Ready,
            State::Closed => IndexState::Closed,
        }
    }
}

/// Upside-down inverted index over an ordered KV store.
///
/// Every mutation runs its diff and commit under one write mutex. Analysis
/// happens on the analysis queue before that mutex is taken. The live
/// document count sits behind its own short-held lock and only changes after
/// a batch has committed.
pub struct Index {
    config: Config,
    registry: Arc<StoreRegistry>,
    analyzers: Arc<AnalyzerRegistry>,
    fields: Arc<FieldCatalog>,
    analyzer: Arc<DocumentAnalyzer>,
    queue: AnalysisQueue,
    batch_writer: BatchWriter,

    state: RwLock<State>,
    write_lock: Mutex<()>,
    doc_count: RwLock<u64>,
    stats: Arc<IndexStats>,
}

impl Index {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_registry(config, Arc::new(StoreRegistry::new()))
    }

    /// Use a registry carrying extra KV backends
    pub fn with_registry(config: Config, registry: Arc<StoreRegistry>) -> Result<Self> {
        let analyzers = Arc::new(AnalyzerRegistry::new());
        let fields = Arc::new(FieldCatalog::new());
        let analyzer = Arc::new(DocumentAnalyzer::new(
            fields.clone(),
            analyzers.clone(),
            config.default_analyzer.as_str(),
        ));
        let queue = AnalysisQueue::new(config.analysis_workers, config.analysis_queue_size)?;
        let batch_writer = BatchWriter::new(Arc::new(BufferPool::new(config.buffer_pool_size)));

        Ok(Index {
            config,
            registry,
            analyzers,
            fields,
            analyzer,
            queue,
            batch_writer,
            state: RwLock::new(State::Unopened),
            write_lock: Mutex::new(()),
            doc_count: RwLock::new(0),
            stats: Arc::new(IndexStats::new()),
        })
    }

    /// Open the configured store, initializing it when empty.
    pub fn open(&self) -> Result<()> {
        {
            let mut state = self.state.write();
            if !matches!(*state, State::Unopened) {
                return Err(Error::invalid_state(format!("cannot open index in state {:?}", state.public())));
            }
            *state = State::Opening;
        }

        let _guard = self.write_lock.lock();
        match self.open_store() {
            Ok((store, doc_count)) => {
                *self.doc_count.write() = doc_count;
                *self.state.write() = State::Ready(store);
                Ok(())
            }
            Err(e) => {
                *self.state.write() = State::Unopened;
                Err(e.wrap("open"))
            }
        }
    }

    fn open_store(&self) -> Result<(Arc<dyn KVStore>, u64)> {
        let merge = Arc::new(DictionaryCounterMerge::with_stats(self.stats.clone()));
        let store = self.registry.create(&self.config, merge)?;
        match self.load_or_init(store.as_ref()) {
            Ok(doc_count) => Ok((store, doc_count)),
            Err(e) => {
                // Release the backend (and its directory lock) before reporting
                let _ = store.close();
                Err(e)
            }
        }
    }

    fn load_or_init(&self, store: &dyn KVStore) -> Result<u64> {
        let reader = store.reader()?;
        let version = reader.get(VERSION_KEY)?;

        let Some(raw) = version else {
            reader.close()?;
            let mut batch = KVBatch::new();
            let row = VersionRow::new(SCHEMA_VERSION);
            batch.set(&row.key(), &row.value());
            let mut writer = store.writer()?;
            writer.execute_batch(&batch)?;
            writer.close()?;

            self.fields.load(Vec::new())?;
            info!(target: "upsidedown::index", store = store.name(), version = SCHEMA_VERSION, "initialized new index");
            return Ok(0);
        };

        let found = VersionRow::from_kv(VERSION_KEY, &raw)?.version;
        if found != SCHEMA_VERSION {
            warn!(target: "upsidedown::index", found, expected = SCHEMA_VERSION, "schema version mismatch");
            return Err(Error::new(
                ErrorKind::IncompatibleVersion,
                format!("index schema version {} is not supported (expected {})", found, SCHEMA_VERSION),
            ));
        }

        let mut field_rows = Vec::new();
        let mut iter = reader.prefix_iterator(&[FIELD_PREFIX]);
        while let Some((key, value)) = iter.current() {
            field_rows.push(FieldRow::from_kv(key, value)?);
            iter.next();
        }
        drop(iter);
        self.fields.load(field_rows)?;

        let mut doc_count = 0u64;
        let mut iter = reader.prefix_iterator(&[BACK_INDEX_PREFIX]);
        while iter.valid() {
            doc_count += 1;
            iter.next();
        }
        drop(iter);
        reader.close()?;

        info!(
            target: "upsidedown::index",
            store = store.name(),
            fields = self.fields.len(),
            doc_count,
            "opened existing index"
        );
        Ok(doc_count)
    }

    /// Index `doc`, replacing whatever was indexed under its id
    pub fn update(&self, doc: Document) -> Result<()> {
        let result = self.update_inner(doc);
        self.track(result, "update")
    }

    fn update_inner(&self, doc: Document) -> Result<()> {
        let store = self.store()?;
        doc.id.validate()?;
        let doc_id = doc.id.clone();

        let started = Instant::now();
        let (reply, results) = bounded(1);
        self.queue.submit(AnalysisWork {
            analyzer: self.analyzer.clone() as Arc<dyn DocumentAnalysis>,
            doc,
            reply,
        })?;
        let rows = Self::receive(&results)?.rows?;
        self.stats.add_analysis_time(started.elapsed());

        let _guard = self.write_lock.lock();
        let started = Instant::now();

        let reader = store.reader()?;
        let old = load_back_index(reader.as_ref(), doc_id.as_str())?;
        reader.close()?;

        let existed = old.is_some();
        let diff = back_index::diff(doc_id.as_str(), old.as_ref(), rows);
        debug!(
            target: "upsidedown::index",
            doc_id = %doc_id,
            add = diff.add.len(),
            update = diff.update.len(),
            delete = diff.delete.len(),
            "updating document"
        );
        self.commit(store.as_ref(), diff)?;

        if !existed {
            *self.doc_count.write() += 1;
        }
        self.stats.record_update();
        self.stats.add_index_time(started.elapsed());
        Ok(())
    }

    /// Remove a document. Unknown ids are a successful no-op.
    pub fn delete(&self, doc_id: &str) -> Result<()> {
        let result = self.delete_inner(doc_id);
        self.track(result, "delete")
    }

    fn delete_inner(&self, doc_id: &str) -> Result<()> {
        let store = self.store()?;
        if let Err(e) = DocId::new(doc_id).validate() {
            // Such an id can never have been indexed
            debug!(target: "upsidedown::index", error = %e, "delete of an unindexable id");
            return Ok(());
        }

        let _guard = self.write_lock.lock();
        let started = Instant::now();

        let reader = store.reader()?;
        let old = load_back_index(reader.as_ref(), doc_id)?;
        reader.close()?;

        let Some(old) = old else {
            debug!(target: "upsidedown::index", doc_id, "delete of unknown document");
            return Ok(());
        };

        let diff = back_index::deletion(&old);
        debug!(target: "upsidedown::index", doc_id, delete = diff.delete.len(), "deleting document");
        self.commit(store.as_ref(), diff)?;

        {
            let mut count = self.doc_count.write();
            *count = count.saturating_sub(1);
        }
        self.stats.record_delete();
        self.stats.add_index_time(started.elapsed());
        Ok(())
    }

    /// Apply every operation in `batch` as one atomic KV batch.
    ///
    /// All documents are analyzed before the write mutex is taken.
    pub fn batch(&self, batch: &Batch) -> Result<()> {
        let result = self.batch_inner(batch);
        self.track(result, "batch")
    }

    fn batch_inner(&self, batch: &Batch) -> Result<()> {
        let store = self.store()?;

        let started = Instant::now();
        let (reply, results) = unbounded();
        let mut pending: HashSet<DocId> = HashSet::new();
        let mut deletes: Vec<&DocId> = Vec::new();
        for (id, op) in &batch.index_ops {
            match op {
                Some(doc) => {
                    doc.id.validate()?;
                    pending.insert(doc.id.clone());
                    self.queue.submit(AnalysisWork {
                        analyzer: self.analyzer.clone() as Arc<dyn DocumentAnalysis>,
                        doc: doc.clone(),
                        reply: reply.clone(),
                    })?;
                }
                None if id.validate().is_ok() => deletes.push(id),
                None => {}
            }
        }
        drop(reply);

        let analyzed = Self::collect_analysis(&results, pending)?;
        self.stats.add_analysis_time(started.elapsed());

        let _guard = self.write_lock.lock();
        let started = Instant::now();

        let reader = store.reader()?;
        let mut diff = RowDiff::default();
        let mut added = 0u64;
        let mut removed = 0u64;

        let mut updates: Vec<(DocId, Vec<Row>)> = analyzed.into_iter().collect();
        updates.sort_by(|a, b| a.0.cmp(&b.0));
        for (doc_id, rows) in updates {
            let old = load_back_index(reader.as_ref(), doc_id.as_str())?;
            if old.is_none() {
                added += 1;
            }
            diff.extend(back_index::diff(doc_id.as_str(), old.as_ref(), rows));
        }

        deletes.sort();
        for doc_id in deletes {
            if let Some(old) = load_back_index(reader.as_ref(), doc_id.as_str())? {
                removed += 1;
                diff.extend(back_index::deletion(&old));
            }
        }
        reader.close()?;

        for (key, value) in &batch.internal_ops {
            match value {
                Some(value) => diff.update.push(Row::Internal(InternalRow::new(key.clone(), value.clone()))),
                None => diff.delete.push(Row::Internal(InternalRow::new(key.clone(), Vec::new()))),
            }
        }

        debug!(
            target: "upsidedown::index",
            documents = batch.len(),
            internal = batch.internal_ops.len(),
            rows = diff.len(),
            "executing batch"
        );
        self.commit(store.as_ref(), diff)?;

        {
            let mut count = self.doc_count.write();
            *count = (*count + added).saturating_sub(removed);
        }
        self.stats.record_batch();
        self.stats.add_index_time(started.elapsed());
        Ok(())
    }

    /// Store an opaque value outside the document index
    pub fn set_internal(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let diff = RowDiff {
            update: vec![Row::Internal(InternalRow::new(key.to_vec(), value.to_vec()))],
            ..RowDiff::default()
        };
        let result = self.write_rows(diff);
        self.track(result, "set internal")
    }

    pub fn delete_internal(&self, key: &[u8]) -> Result<()> {
        let diff = RowDiff {
            delete: vec![Row::Internal(InternalRow::new(key.to_vec(), Vec::new()))],
            ..RowDiff::default()
        };
        let result = self.write_rows(diff);
        self.track(result, "delete internal")
    }

    fn write_rows(&self, diff: RowDiff) -> Result<()> {
        let store = self.store()?;
        let _guard = self.write_lock.lock();
        self.commit(store.as_ref(), diff)
    }

    /// Snapshot reader paired with the document count at the time of the call
    pub fn reader(&self) -> Result<IndexReader> {
        let store = self.store()?;
        let kv = store.reader()?;
        let doc_count = *self.doc_count.read();
        Ok(IndexReader::new(kv, doc_count, self.fields.clone()))
    }

    pub fn doc_count(&self) -> Result<u64> {
        self.store()?;
        Ok(*self.doc_count.read())
    }

    /// Release the backing store. Closed is terminal.
    pub fn close(&self) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut state = self.state.write();
        let previous = std::mem::replace(&mut *state, State::Closed);
        match previous {
            State::Ready(store) => {
                info!(target: "upsidedown::index", store = store.name(), "closing index");
                store.close()
            }
            _ => Ok(()),
        }
    }

    pub fn state(&self) -> IndexState {
        self.state.read().public()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register custom analyzers here before indexing documents that name them
    pub fn analyzers(&self) -> &AnalyzerRegistry {
        &self.analyzers
    }

    pub fn fields(&self) -> Vec<(u16, String)> {
        self.fields.fields()
    }

    pub fn stats(&self) -> IndexStatsSnapshot {
        self.stats.snapshot()
    }

    fn store(&self) -> Result<Arc<dyn KVStore>> {
        match &*self.state.read() {
            State::Ready(store) => Ok(store.clone()),
            other => Err(Error::invalid_state(format!("index is {:?}, not Ready", other.public()))),
        }
    }

    fn receive(results: &Receiver<AnalysisResult>) -> Result<AnalysisResult> {
        results.recv().map_err(|_| {
            Error::new(ErrorKind::Internal, "analysis worker dropped a document without replying".to_string())
        })
    }

    /// Exactly one result per pending document. A result for anything else,
    /// or one left over afterwards, means the batch changed under us.
    fn collect_analysis(
        results: &Receiver<AnalysisResult>,
        mut pending: HashSet<DocId>,
    ) -> Result<HashMap<DocId, Vec<Row>>> {
        let expected = pending.len();
        let mut analyzed: HashMap<DocId, Vec<Row>> = HashMap::with_capacity(expected);
        while !pending.is_empty() {
            let result = Self::receive(results)?;
            if !pending.remove(&result.doc_id) {
                return Err(Error::new(
                    ErrorKind::UnsafeBatchMutation,
                    format!("analysis result for '{}' does not match a queued document", result.doc_id),
                ));
            }
            analyzed.insert(result.doc_id, result.rows?);
        }
        match results.try_recv() {
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Ok(analyzed),
            Ok(extra) => Err(Error::new(
                ErrorKind::UnsafeBatchMutation,
                format!("{} documents queued but more results arrived (first extra '{}')", expected, extra.doc_id),
            )),
        }
    }

    /// Execute `diff` plus any Field rows not yet persisted. Caller holds the write mutex.
    fn commit(&self, store: &dyn KVStore, mut diff: RowDiff) -> Result<()> {
        let field_rows = self.fields.unpersisted_rows();
        let field_ids: Vec<u16> = field_rows.iter().map(|r| r.index).collect();
        diff.update.extend(field_rows.into_iter().map(Row::Field));

        let batch = self.batch_writer.build(&diff)?;
        let mut writer = store.writer()?;
        let executed = writer.execute_batch(&batch);
        self.batch_writer.recycle(batch);
        executed?;
        writer.close()?;

        self.fields.mark_persisted(field_ids);
        Ok(())
    }

    fn track<T>(&self, result: Result<T>, operation: &str) -> Result<T> {
        result.map_err(|e| {
            self.stats.record_error();
            debug!(target: "upsidedown::index", operation, error = %e, "operation failed");
            e.wrap(operation)
        })
    }
}

impl Drop for Index {
    fn drop(&mut self) {
        if let State::Ready(store) = std::mem::replace(self.state.get_mut(), State::Closed) {
            if let Err(e) = store.close() {
                warn!(target: "upsidedown::index", error = %e, "closing store on drop failed");
            }
        }
    }
}
