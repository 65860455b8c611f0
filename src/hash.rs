//! Content hashing of build inputs and outputs, memoized per run.
//!
//! A hash record is the string `<path>:<digest>` where the digest is the
//! base64 of the file content's 128-bit digest, or the literal `x` when the
//! file cannot be read.  The sentinel is structurally distinct from any real
//! digest so that "file does not exist" participates in cache keys.

use base64::prelude::{Engine as _, BASE64_STANDARD};
use md5::{Digest, Md5};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// Digest stand-in for files that are absent or unreadable.
const MISSING: &str = "x";

/// Per-run map from file path to hash record.
///
/// Records persist for the duration of one driver invocation; tasks that
/// rewrite a file remove its entry around their commands so stale digests
/// are never consulted.
pub struct FileHasher {
    records: RefCell<HashMap<String, String>>,
    hits: Cell<usize>,
}

impl FileHasher {
    pub fn new() -> Self {
        FileHasher {
            records: RefCell::new(HashMap::new()),
            hits: Cell::new(0),
        }
    }

    /// Computes (or recalls) the hash record for one path.  Never fails.
    pub async fn hash(&self, path: &str) -> String {
        if let Some(record) = self.records.borrow().get(path) {
            self.hits.set(self.hits.get() + 1);
            return record.clone();
        }
        let digest = match tokio::fs::read(path).await {
            Ok(bytes) => BASE64_STANDARD.encode(Md5::digest(&bytes)),
            Err(_) => MISSING.to_string(),
        };
        let record = format!("{}:{}", path, digest);
        self.records
            .borrow_mut()
            .insert(path.to_string(), record.clone());
        record
    }

    /// Hashes every file target concurrently, preserving input order.
    /// Abstract targets have no on-disk artifact and are skipped.
    pub async fn hash_files(&self, targets: &[String]) -> Vec<String> {
        let files = targets.iter().filter(|t| !crate::task::is_abstract(t));
        futures::future::join_all(files.map(|t| self.hash(t))).await
    }

    /// Forgets the record for a file about to be rewritten, so later key
    /// computations in this run re-read its content.
    pub fn invalidate(&self, path: &str) {
        self.records.borrow_mut().remove(path);
    }

    /// Memoization hits, for the driver's summary line.
    pub fn hits(&self) -> usize {
        self.hits.get()
    }

    /// Drops all records; the cache lives for one driver invocation.
    pub fn reset(&self) {
        self.records.borrow_mut().clear();
        self.hits.set(0);
    }
}
