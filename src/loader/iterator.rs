//! Lazy file iterator over one partition directory
//!
//! Each in-progress partition is represented by a [`FileIterator`]
//! walking the files beneath its root. The iterator lists the root only
//! on first advance, so creating and parking one under the task lock is
//! cheap and listing failures surface where the consumer can route them
//! to the sink.
//!
//! Iterators are resumable but not restartable: a partially consumed
//! iterator picks up where it left off when re-parked on the deque, and
//! the deque disciplines exclusive ownership while it is consumed.

use crate::format::InputFormat;
use crate::fs::{is_hidden, DirectoryLister, FileStatus, FileSystem};
use crate::loader::LoaderStats;
use crate::metadata::{ColumnCoercions, PartitionKey, SchemaProperties};
use crate::predicate::ValueDomain;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use tracing::trace;

/// Context shared by every iterator of one partition, including the
/// children spawned by a recursive walk
pub struct FileIteratorContext {
    pub partition_name: String,
    pub fs: Arc<dyn FileSystem>,
    pub lister: Arc<dyn DirectoryLister>,
    pub input_format: Arc<dyn InputFormat>,
    pub schema: SchemaProperties,
    pub partition_keys: Vec<PartitionKey>,
    pub path_domain: Option<ValueDomain>,
    pub coercions: ColumnCoercions,
    pub stats: Arc<LoaderStats>,
}

/// Lazy walker over the entries directly beneath one directory root
pub struct FileIterator {
    ctx: Arc<FileIteratorContext>,
    root: String,
    // None until the first advance lists the root
    pending: Option<VecDeque<FileStatus>>,
}

impl FileIterator {
    pub fn new(root: impl Into<String>, ctx: Arc<FileIteratorContext>) -> Self {
        Self {
            ctx,
            root: root.into(),
            pending: None,
        }
    }

    /// A child iterator over a sub-directory, sharing this partition's
    /// context
    pub fn descend(&self, root: &str) -> FileIterator {
        FileIterator::new(root, Arc::clone(&self.ctx))
    }

    pub fn context(&self) -> &FileIteratorContext {
        &self.ctx
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Next non-hidden entry beneath the root. A listing failure is
    /// yielded once and ends the iterator.
    pub fn next_entry(&mut self) -> Option<io::Result<FileStatus>> {
        if self.pending.is_none() {
            match self.ctx.lister.list(self.ctx.fs.as_ref(), &self.root) {
                Ok(mut entries) => {
                    entries.retain(|entry| !is_hidden(entry.name()));
                    let files = entries.iter().filter(|entry| !entry.is_dir).count() as u64;
                    self.ctx.stats.record_files_listed(files);
                    trace!(
                        partition = %self.ctx.partition_name,
                        root = %self.root,
                        entries = entries.len(),
                        files = files,
                        "listed partition directory"
                    );
                    self.pending = Some(entries.into());
                }
                Err(e) => {
                    self.pending = Some(VecDeque::new());
                    return Some(Err(e));
                }
            }
        }
        self.pending
            .as_mut()
            .and_then(VecDeque::pop_front)
            .map(Ok)
    }
}
