pub mod core;
pub mod storage;
pub mod analysis;
pub mod index;
pub mod writer;
pub mod reader;
pub mod memory;
pub mod compression;

pub use crate::core::config::Config;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::index::{Index, IndexState};
pub use crate::core::types::{DocId, Document, Field, FieldOptions, FieldValue};
pub use crate::reader::index_reader::IndexReader;
pub use crate::writer::batch::Batch;

/*
┌──────────────────────────────────────────────────────────────────────────────┐
│                         UPSIDEDOWN STRUCT ARCHITECTURE                       │
└──────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── CORE LAYER ──────────────────────────────────┐
│                                                                              │
│  struct Index                                                                │
│  • config: Config                    // backend name, analysis pool sizes    │
│  • registry: Arc<StoreRegistry>      // "mem" | "log" | custom               │
│  • fields: Arc<FieldCatalog>         // name <-> u16 field id                │
│  • analyzer: Arc<DocumentAnalyzer>   // Document -> TermFrequency/Stored rows│
│  • queue: AnalysisQueue              // worker threads, crossbeam channel    │
│  • batch_writer: BatchWriter         // RowDiff -> KVBatch (+ dict merges)   │
│  • state: RwLock<State>              // Unopened -> Opening -> Ready -> Closed│
│  • write_lock: Mutex<()>             // one mutation applies at a time       │
│  • doc_count: RwLock<u64>            // changed only after a commit          │
│                                                                              │
└──────────────────────────────────────────────────────────────────────────────┘

  update(doc) ──> AnalysisQueue ──rows──> [write_lock] load_back_index
                                                  │
                                                  v
                        diff(old, rows) = { add, update, delete }
                                                  │
                                                  v
              BatchWriter: set / delete / merge(dictionary key, ±1)
                                                  │
                                                  v
                          KVWriter::execute_batch (atomic)

┌──────────────────────────────── STORAGE LAYER ───────────────────────────────┐
│                                                                              │
│  trait KVStore ──reader()──> KVReader ──prefix/range──> KVIterator           │
│                └─writer()──> KVWriter ──execute_batch(KVBatch)               │
│                                                                              │
│  MemStore: Arc<BTreeMap> snapshots, copy-on-write under open readers         │
│  LogStore: MemStore + WAL (len | crc32 | bincode record) + flock             │
│                                                                              │
└──────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── ROW LAYOUT ──────────────────────────────────┐
│                                                                              │
│  v                              -> schema version byte                       │
│  f <field u16>                  -> field name                                │
│  d <term> FF <field u16>        -> varint live posting count                 │
│  t <term> FF <field u16> FF <doc>-> varint freq, f32 norm, term vectors      │
│  s <doc> FF <field u16> <path>  -> type tag + raw value                      │
│  b <doc>                        -> (term, field)* (field, path)*             │
│  i <key>                        -> opaque bytes                              │
│                                                                              │
└──────────────────────────────────────────────────────────────────────────────┘
*/
