//! split-loader - Background Split Generation for a Distributed SQL Engine
//!
//! Given a logical table and the partitions a query scans, this crate
//! produces a stream of SPLITS - self-contained descriptors of a byte
//! range inside one file, annotated with data-locality hints - which
//! downstream worker tasks consume to perform parallel scans.
//!
//! # Features
//!
//! - **Cooperative pipeline**: A bounded pool of loader tasks drains a
//!   two-level work queue (partitions, then files). Tasks never block a
//!   thread; they suspend on the sink's completion signal and resume on
//!   any executor thread.
//!
//! - **Backpressure aware**: When the sink is full, the in-progress file
//!   iterator is re-parked at the front of the work deque so the next
//!   free task resumes exactly where it stopped.
//!
//! - **Layout aware**: Symlink-manifest partitions, formats that compute
//!   their own splits, bucketed directories (explicit selection or full
//!   scan) and plain recursive walks all funnel into one split factory.
//!
//! - **Locality accurate**: Filesystem block ranges are clamped against
//!   each split and must cover it end to end, so the scheduler always
//!   has real placement information.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Metastore / Planner                           │
//! │      (partitions, predicate, bucketing, session)                 │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   BackgroundSplitLoader                          │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐         ┌─────────┐     │
//! │  │ Task 1  │  │ Task 2  │  │ Task 3  │  ...    │ Task N  │     │
//! │  └────┬────┘  └────┬────┘  └────┬────┘         └────┬────┘     │
//! │       │            │            │                    │          │
//! │       └────────────┼────────────┼────────────────────┘          │
//! │                    ▼            ▼                               │
//! │       ┌──────────────────┐  ┌──────────────────────┐           │
//! │       │ LazyQueue        │  │ WorkDeque            │           │
//! │       │ (partitions)     │  │ (file iterators)     │           │
//! │       └──────────────────┘  └──────────────────────┘           │
//! │                         │                                       │
//! │                         ▼                                       │
//! │            ┌──────────────────────────┐                         │
//! │            │      SplitFactory        │                         │
//! │            │  clamp blocks, locality  │                         │
//! │            └──────────────────────────┘                         │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ add_to_queue / no_more_splits
//!                               ▼
//!                    ┌──────────────────┐
//!                    │    SplitSink     │
//!                    │ (bounded queue)  │
//!                    └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use split_loader::fs::{FsDirectoryLister, SingleFileSystemProvider};
//! use split_loader::fs::memory::MemoryFileSystem;
//! use split_loader::format::InputFormatRegistry;
//! use split_loader::metadata::{PartitionMetadata, SchemaProperties, StorageDescriptor, Table};
//! use split_loader::predicate::EffectivePredicate;
//! use split_loader::{BackgroundSplitLoader, LoaderConfig, Session};
//! use std::sync::Arc;
//!
//! let fs = Arc::new(MemoryFileSystem::new());
//! let table = Table::new(
//!     "default",
//!     "events",
//!     StorageDescriptor::new("/warehouse/events", SchemaProperties::new()),
//!     vec![],
//! );
//!
//! let loader = BackgroundSplitLoader::new(
//!     table,
//!     vec![PartitionMetadata::new("events", None)],
//!     EffectivePredicate::none(),
//!     None,
//!     vec![],
//!     Session::default(),
//!     Arc::new(SingleFileSystemProvider::new(fs)),
//!     Arc::new(FsDirectoryLister),
//!     Arc::new(InputFormatRegistry::new()),
//!     tokio::runtime::Handle::current(),
//!     LoaderConfig::default(),
//! );
//! // loader.start(sink) feeds splits into the engine's split queue
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod fs;
pub mod loader;
pub mod metadata;
pub mod predicate;
pub mod sink;
pub mod split;

pub use config::{LoaderConfig, Session};
pub use error::{ConfigError, LoaderError, Result};
pub use loader::{BackgroundSplitLoader, LoaderStats};
pub use sink::{CompletionSignal, CompletionTrigger, SplitSink};
pub use split::{InternalBlock, InternalSplit};
