use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use crossbeam::channel::{bounded, Receiver, Sender};
use tracing::{debug, warn};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, Document};
use crate::index::rows::Row;

/// Turns one document into its candidate TermFrequency and Stored rows
pub trait DocumentAnalysis: Send + Sync {
    fn analyze(&self, doc: &Document) -> Result<Vec<Row>>;
}

/// One document to analyze plus where to send the outcome
pub struct AnalysisWork {
    pub analyzer: Arc<dyn DocumentAnalysis>,
    pub doc: Document,
    pub reply: Sender<AnalysisResult>,
}

/// Exactly one of these is sent per submitted `AnalysisWork`
#[derive(Debug)]
pub struct AnalysisResult {
    pub doc_id: DocId,
    pub rows: Result<Vec<Row>>,
}

/// Fixed pool of analysis threads fed by a bounded channel
pub struct AnalysisQueue {
    sender: Option<Sender<AnalysisWork>>,
    workers: Vec<JoinHandle<()>>,
}

impl AnalysisQueue {
    pub fn new(workers: usize, capacity: usize) -> Result<Self> {
        let (sender, receiver) = bounded(capacity.max(1));

        let mut handles = Vec::with_capacity(workers.max(1));
        for i in 0..workers.max(1) {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("analysis-{}", i))
                .spawn(move || Self::worker(receiver))?;
            handles.push(handle);
        }
        debug!(workers = handles.len(), capacity, "analysis queue started");

        Ok(AnalysisQueue {
            sender: Some(sender),
            workers: handles,
        })
    }

    /// Blocks while the queue is full
    pub fn submit(&self, work: AnalysisWork) -> Result<()> {
        let sender = self.sender.as_ref().ok_or_else(|| {
            Error::new(ErrorKind::Internal, "analysis queue is shut down".to_string())
        })?;
        sender.send(work).map_err(|_| {
            Error::new(ErrorKind::Internal, "analysis workers are gone".to_string())
        })
    }

    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    fn worker(receiver: Receiver<AnalysisWork>) {
        while let Ok(work) = receiver.recv() {
            let AnalysisWork { analyzer, doc, reply } = work;
            let rows = panic::catch_unwind(AssertUnwindSafe(|| analyzer.analyze(&doc)))
                .unwrap_or_else(|_| {
                    warn!(doc_id = %doc.id, "analysis panicked");
                    Err(Error::new(ErrorKind::Internal, format!("analysis of '{}' panicked", doc.id)))
                });
            // The submitter may have given up; nothing to do then
            let _ = reply.send(AnalysisResult { doc_id: doc.id, rows });
        }
    }
}

impl Drop for AnalysisQueue {
    fn drop(&mut self) {
        // Closing the channel ends every worker loop
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
