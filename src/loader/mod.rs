//! Background split loader
//!
//! The loader turns a stream of partitions into a stream of splits. A
//! fixed pool of cooperative tasks drains a two-level work queue:
//!
//! ```text
//!  Iterable<PartitionMetadata>
//!            │
//!            ▼
//!     ┌─────────────┐   poll    ┌──────────────────────────────┐
//!     │  LazyQueue  │──────────▶│        LoaderTask × N        │
//!     └─────────────┘           │  load_partition dispatch:    │
//!                               │   symlink / delegated /      │
//!     ┌─────────────┐ poll_first│   bucketed / generic walk    │
//!     │  WorkDeque  │──────────▶│                              │
//!     │ (iterators) │◀──────────│  add_first on backpressure   │
//!     └─────────────┘ add_last  │  add_last for fresh/child    │
//!                               └──────────────┬───────────────┘
//!                                              │ add_to_queue
//!                                              ▼
//!                                       ┌────────────┐
//!                                       │  SplitSink │
//!                                       └────────────┘
//! ```
//!
//! Tasks suspend in exactly one place: when the sink reports it is full,
//! the current file iterator is re-parked at the front of the deque and
//! the task asks to be resumed when the sink's completion signal fires.
//! Termination is detected by a racy drain check confirmed under the
//! write lock, which guarantees no peer is mid-sequence when the
//! terminal `no_more_splits` goes out.

pub mod iterator;
pub mod queue;
pub mod resumable;


use crate::config::{LoaderConfig, Session};
use crate::error::{LoaderError, Result};
use crate::format::{FileSplit, InputFormatRegistry};
use crate::fs::{is_hidden, DirectoryLister, FileStatus, FileSystem, FileSystemProvider};
use crate::loader::iterator::{FileIterator, FileIteratorContext};
use crate::loader::queue::{LazyQueue, WorkDeque};
use crate::loader::resumable::{submit, ResumableTask, TaskStatus};
use crate::metadata::{
    partition_keys, partition_location, partition_schema, Bucket, BucketHandle, ColumnCoercions,
    PartitionKey, PartitionMetadata, SchemaProperties, Table,
};
use crate::predicate::{EffectivePredicate, ValueDomain};
use crate::sink::{CompletionSignal, SplitSink};
use crate::split::{InternalSplit, SplitFactory};
use parking_lot::RwLock;
use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

/// Counters exposed by a running loader
#[derive(Debug, Default)]
pub struct LoaderStats {
    /// Partitions dispatched
    pub partitions_loaded: AtomicU64,

    /// Files surfaced by directory listings
    pub files_listed: AtomicU64,

    /// Splits handed to the sink
    pub splits_enqueued: AtomicU64,

    /// Times a task yielded on sink backpressure
    pub backpressure_yields: AtomicU64,

    /// Errors routed to the sink
    pub failures: AtomicU64,
}

impl LoaderStats {
    fn record_partition(&self) {
        self.partitions_loaded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_files_listed(&self, count: u64) {
        self.files_listed.fetch_add(count, Ordering::Relaxed);
    }

    fn record_split(&self) {
        self.splits_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    fn record_backpressure(&self) {
        self.backpressure_yields.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn partitions_loaded(&self) -> u64 {
        self.partitions_loaded.load(Ordering::Relaxed)
    }

    pub fn files_listed(&self) -> u64 {
        self.files_listed.load(Ordering::Relaxed)
    }

    pub fn splits_enqueued(&self) -> u64 {
        self.splits_enqueued.load(Ordering::Relaxed)
    }

    pub fn backpressure_yields(&self) -> u64 {
        self.backpressure_yields.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Background split loader for one table scan
pub struct BackgroundSplitLoader {
    inner: Arc<LoaderInner>,
    executor: Handle,
    loader_concurrency: usize,
}

struct LoaderInner {
    table: Table,
    effective_predicate: EffectivePredicate,
    bucket_handle: Option<BucketHandle>,
    buckets: Vec<Bucket>,
    session: Session,
    fs_provider: Arc<dyn FileSystemProvider>,
    lister: Arc<dyn DirectoryLister>,
    formats: Arc<InputFormatRegistry>,
    recursive_dir_walker_enabled: bool,

    partitions: LazyQueue<PartitionMetadata>,
    file_iterators: WorkDeque<FileIterator>,

    // Purpose of this lock: while the write lock is held, no other task
    // can poll from `partitions`, poll from or push to `file_iterators`,
    // or push to the sink. Any one of those operations requires at least
    // the read lock, and a sequence spanning two or more of them must
    // hold the lock continuously across the whole sequence. A reader may
    // observe such a sequence half done; the write-lock holder cannot.
    task_execution_lock: RwLock<()>,

    sink: OnceLock<Arc<dyn SplitSink>>,
    stopped: AtomicBool,
    stats: Arc<LoaderStats>,
}

impl BackgroundSplitLoader {
    #[allow(clippy::too_many_arguments)]
    pub fn new<I>(
        table: Table,
        partitions: I,
        effective_predicate: EffectivePredicate,
        bucket_handle: Option<BucketHandle>,
        buckets: Vec<Bucket>,
        session: Session,
        fs_provider: Arc<dyn FileSystemProvider>,
        lister: Arc<dyn DirectoryLister>,
        formats: Arc<InputFormatRegistry>,
        executor: Handle,
        config: LoaderConfig,
    ) -> Self
    where
        I: IntoIterator<Item = PartitionMetadata>,
        I::IntoIter: Send + 'static,
    {
        Self {
            inner: Arc::new(LoaderInner {
                table,
                effective_predicate,
                bucket_handle,
                buckets,
                session,
                fs_provider,
                lister,
                formats,
                recursive_dir_walker_enabled: config.recursive_dir_walker_enabled,
                partitions: LazyQueue::new(partitions),
                file_iterators: WorkDeque::new(),
                task_execution_lock: RwLock::new(()),
                sink: OnceLock::new(),
                stopped: AtomicBool::new(false),
                stats: Arc::new(LoaderStats::default()),
            }),
            executor,
            loader_concurrency: config.loader_concurrency,
        }
    }

    /// Begin loading splits into the sink. Call once.
    pub fn start(&self, sink: Arc<dyn SplitSink>) {
        if self.inner.sink.set(sink).is_err() {
            warn!("split loader started twice, ignoring");
            return;
        }
        debug!(
            table = %self.inner.table.table_name,
            concurrency = self.loader_concurrency,
            "starting split loader"
        );
        for task_id in 0..self.loader_concurrency {
            submit(
                &self.executor,
                LoaderTask {
                    inner: Arc::clone(&self.inner),
                    id: task_id,
                },
            );
        }
    }

    /// Ask the tasks to wind down. Splits already enqueued stay valid;
    /// the terminal sink signal is not sent on the caller's behalf.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
    }

    pub fn stats(&self) -> &LoaderStats {
        &self.inner.stats
    }
}

/// One cooperative loader task
struct LoaderTask {
    inner: Arc<LoaderInner>,
    id: usize,
}

impl ResumableTask for LoaderTask {
    fn process(&mut self) -> TaskStatus {
        loop {
            if self.inner.is_stopped() {
                trace!(task = self.id, "loader task stopped");
                return TaskStatus::Finished;
            }

            let result = {
                let _read = self.inner.task_execution_lock.read();
                self.inner.load_splits()
            };

            match result {
                Ok(signal) => {
                    let drained =
                        self.inner.partitions.is_empty() && self.inner.file_iterators.is_empty();
                    self.inner.maybe_signal_no_more_splits();
                    if !signal.is_complete() {
                        self.inner.stats.record_backpressure();
                        trace!(task = self.id, "sink full, yielding");
                        return TaskStatus::ContinueOn(signal);
                    }
                    if drained {
                        // Any work a peer is still about to park will be
                        // finished by that peer; this task has nothing
                        // left to pick up.
                        trace!(task = self.id, "work queues drained");
                        return TaskStatus::Finished;
                    }
                }
                Err(error) => {
                    self.inner.stats.record_failure();
                    warn!(task = self.id, error = %error, "split loading failed");
                    self.inner.sink().fail(error);
                }
            }
        }
    }
}

impl LoaderInner {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn sink(&self) -> &Arc<dyn SplitSink> {
        self.sink.get().expect("split loader not started")
    }

    /// One unit of work: resume a parked iterator, or dispatch the next
    /// partition. Runs entirely under the read lock.
    fn load_splits(&self) -> Result<CompletionSignal> {
        let Some(mut files) = self.file_iterators.poll_first() else {
            let Some(partition) = self.partitions.poll() else {
                return Ok(CompletionSignal::completed());
            };
            return self.load_partition(partition);
        };

        while !self.is_stopped() {
            let Some(entry) = files.next_entry() else {
                break;
            };
            let entry = entry?;

            if entry.is_dir {
                if self.recursive_dir_walker_enabled {
                    self.file_iterators.add_last(files.descend(&entry.path));
                }
                continue;
            }

            let ctx = files.context();
            let splittable = ctx.input_format.is_splittable(ctx.fs.as_ref(), &entry.path);
            let factory = SplitFactory {
                partition_name: &ctx.partition_name,
                schema: &ctx.schema,
                partition_keys: &ctx.partition_keys,
                coercions: &ctx.coercions,
                session: &self.session,
                path_domain: ctx.path_domain.as_ref(),
            };
            let split = factory.create(
                &entry.path,
                &entry.block_locations,
                0,
                entry.len,
                entry.len,
                splittable,
                None,
            )?;
            let Some(split) = split else {
                continue;
            };

            self.stats.record_split();
            let signal = self.sink().add_to_queue(split);
            if !signal.is_complete() {
                // Park the iterator where the next free task resumes it;
                // its position must not outlive this call in task state.
                self.file_iterators.add_first(files);
                return Ok(signal);
            }
        }

        // Drained or stopped; either way the iterator is not re-parked
        Ok(CompletionSignal::completed())
    }

    /// Dispatch one partition: symlink expansion, delegated split
    /// computation, bucketed listing, or the generic walk.
    fn load_partition(&self, partition: PartitionMetadata) -> Result<CompletionSignal> {
        self.stats.record_partition();
        let partition_name = partition.name.clone();
        debug!(partition = %partition_name, "loading partition");

        let schema = partition_schema(&self.table, partition.partition.as_ref()).clone();
        let keys = partition_keys(&self.table, partition.partition.as_ref())?;
        let location = partition_location(&self.table, partition.partition.as_ref()).to_string();
        let path_domain = self.effective_predicate.path_domain().cloned();
        let input_format = self.formats.get(&schema)?;
        let fs = self.fs_provider.filesystem(&location)?;

        if input_format.resolves_symlink_targets() {
            if self.bucket_handle.is_some() {
                return Err(LoaderError::Unsupported(
                    "bucketed table in symlink format".to_string(),
                ));
            }

            let mut last = CompletionSignal::completed();
            for target in symlink_targets(fs.as_ref(), &location)? {
                // targets may live on a different cluster than the
                // symlink directory, and are always read as text
                let target_format = self.formats.text_format();
                let target_fs = self.fs_provider.filesystem(&target)?;
                let splits = target_format.get_splits(target_fs.as_ref(), &target)?;
                last = self.add_splits_to_sink(
                    &splits,
                    &partition_name,
                    &keys,
                    &schema,
                    &partition.column_coercions,
                    path_domain.as_ref(),
                )?;
                if self.is_stopped() {
                    return Ok(CompletionSignal::completed());
                }
            }
            return Ok(last);
        }

        if input_format.uses_external_split_computation() {
            let splits = input_format.get_splits(fs.as_ref(), &location)?;
            return self.add_splits_to_sink(
                &splits,
                &partition_name,
                &keys,
                &schema,
                &partition.column_coercions,
                path_domain.as_ref(),
            );
        }

        let ctx = Arc::new(FileIteratorContext {
            partition_name: partition_name.clone(),
            fs,
            lister: Arc::clone(&self.lister),
            input_format,
            schema,
            partition_keys: keys,
            path_domain,
            coercions: partition.column_coercions,
            stats: Arc::clone(&self.stats),
        });
        let iterator = FileIterator::new(&location, Arc::clone(&ctx));

        // Explicit bucket selection: load exactly the requested files
        if !self.buckets.is_empty() {
            let bucket_count = self.buckets[0].bucket_count;
            let files = list_and_sort_bucket_files(iterator, bucket_count)?;
            let mut batch = Vec::with_capacity(self.buckets.len());
            for bucket in &self.buckets {
                if self.is_stopped() {
                    return Ok(CompletionSignal::completed());
                }
                if let Some(split) =
                    self.bucket_split(&ctx, &files[bucket.bucket_number], bucket.bucket_number)?
                {
                    batch.push(split);
                }
            }
            return Ok(self.sink().add_batch(batch));
        }

        // Bucketed full scan: every file, tagged with its bucket number
        if let Some(handle) = self.bucket_handle {
            let files = list_and_sort_bucket_files(iterator, handle.bucket_count)?;
            let mut batch = Vec::with_capacity(handle.bucket_count);
            for (bucket_number, file) in files.iter().enumerate() {
                if self.is_stopped() {
                    return Ok(CompletionSignal::completed());
                }
                if let Some(split) = self.bucket_split(&ctx, file, bucket_number)? {
                    batch.push(split);
                }
            }
            return Ok(self.sink().add_batch(batch));
        }

        // Generic: park a fresh iterator for the tasks to drain
        self.file_iterators.add_last(iterator);
        Ok(CompletionSignal::completed())
    }

    fn bucket_split(
        &self,
        ctx: &FileIteratorContext,
        file: &FileStatus,
        bucket_number: usize,
    ) -> Result<Option<InternalSplit>> {
        let splittable = ctx.input_format.is_splittable(ctx.fs.as_ref(), &file.path);
        let factory = SplitFactory {
            partition_name: &ctx.partition_name,
            schema: &ctx.schema,
            partition_keys: &ctx.partition_keys,
            coercions: &ctx.coercions,
            session: &self.session,
            path_domain: ctx.path_domain.as_ref(),
        };
        let split = factory.create(
            &file.path,
            &file.block_locations,
            0,
            file.len,
            file.len,
            splittable,
            Some(bucket_number),
        )?;
        if split.is_some() {
            self.stats.record_split();
        }
        Ok(split)
    }

    /// Resolve externally computed file splits against their own
    /// filesystems and feed them to the sink one by one. External splits
    /// are never splittable further.
    fn add_splits_to_sink(
        &self,
        splits: &[FileSplit],
        partition_name: &str,
        partition_keys: &[PartitionKey],
        schema: &SchemaProperties,
        coercions: &ColumnCoercions,
        path_domain: Option<&ValueDomain>,
    ) -> Result<CompletionSignal> {
        let factory = SplitFactory {
            partition_name,
            schema,
            partition_keys,
            coercions,
            session: &self.session,
            path_domain,
        };

        let mut last = CompletionSignal::completed();
        for file_split in splits {
            let target_fs = self.fs_provider.filesystem(&file_split.path)?;
            let status = target_fs.file_status(&file_split.path)?;
            let locations =
                target_fs.block_locations(&status, file_split.start, file_split.length)?;
            if let Some(split) = factory.create(
                &file_split.path,
                &locations,
                file_split.start,
                file_split.length,
                status.len,
                false,
                None,
            )? {
                self.stats.record_split();
                last = self.sink().add_to_queue(split);
            }
            if self.is_stopped() {
                return Ok(CompletionSignal::completed());
            }
        }
        Ok(last)
    }

    /// Racy drain check, confirmed under the write lock. The write lock
    /// guarantees no peer is between polling a partition and parking its
    /// iterator, or between taking an iterator and pushing a split, so a
    /// confirmed drain really is final. Repeat signals are legal; the
    /// sink absorbs them.
    fn maybe_signal_no_more_splits(&self) {
        if self.partitions.is_empty() && self.file_iterators.is_empty() {
            let _write = self.task_execution_lock.write();
            if self.partitions.is_empty() && self.file_iterators.is_empty() {
                debug!(table = %self.table.table_name, "no more splits");
                self.sink().no_more_splits();
            }
        }
    }
}

/// Collect and order the files of a bucketed partition. Bucket
/// directories are flat and hold exactly one file per bucket; anything
/// else is corrupt bucketing.
fn list_and_sort_bucket_files(
    mut iterator: FileIterator,
    bucket_count: usize,
) -> Result<Vec<FileStatus>> {
    let mut files = Vec::with_capacity(bucket_count);
    while let Some(entry) = iterator.next_entry() {
        let entry = entry?;
        if entry.is_dir {
            return Err(LoaderError::BucketDirectoryNotFlat {
                partition: iterator.context().partition_name.clone(),
            });
        }
        files.push(entry);
    }

    if files.len() != bucket_count {
        return Err(LoaderError::BucketCountMismatch {
            partition: iterator.context().partition_name.clone(),
            files: files.len(),
            buckets: bucket_count,
        });
    }

    // bucket N is the N-th file in canonical status order
    files.sort();
    Ok(files)
}

/// Read the target paths out of a symlink directory's manifests, one
/// path per line, preserving manifest and line order. Any I/O problem
/// here is bad table data, not an environment failure.
fn symlink_targets(fs: &dyn FileSystem, path: &str) -> Result<Vec<String>> {
    let read_all = || -> std::io::Result<Vec<String>> {
        let mut manifests = fs.list_status(path)?;
        manifests.retain(|status| !is_hidden(status.name()));

        let mut targets = Vec::new();
        for manifest in manifests {
            let mut contents = String::new();
            fs.open(&manifest.path)?.read_to_string(&mut contents)?;
            targets.extend(
                contents
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string),
            );
        }
        Ok(targets)
    };

    read_all().map_err(|source| LoaderError::BadData {
        path: path.to_string(),
        source,
    })
}
