//! Error types for the split loader
//!
//! This module defines the error hierarchy surfaced through the split sink:
//! - Data errors (unparseable symlink manifests, corrupt bucketing)
//! - Metadata errors (partition key mismatches, unsupported types)
//! - Internal invariant violations (block coverage)
//! - Filesystem I/O failures
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - Errors should be actionable - include the partition or path involved
//! - Preserve error chains for debugging

use std::io;
use thiserror::Error;

/// Shared prefix for bucketing failures. Both the sub-directory and the
/// count-mismatch case mean the same thing: the layout on disk contradicts
/// the table's bucketing declaration.
pub(crate) const CORRUPT_BUCKETING: &str =
    "table is corrupt: declared as bucketed, but the files do not match the bucketing declaration";

/// Top-level error type for the split loader
#[derive(Error, Debug)]
pub enum LoaderError {
    /// Symlink manifest could not be read or parsed
    #[error("error parsing symlink targets from '{path}': {source}")]
    BadData { path: String, source: io::Error },

    /// Sub-directory found inside a bucket directory
    #[error("{}; found sub-directory in bucket directory for partition: {partition}", CORRUPT_BUCKETING)]
    BucketDirectoryNotFlat { partition: String },

    /// Number of files in a bucket directory does not match the declared bucket count
    #[error("{}; the number of files in the directory ({files}) does not match the declared bucket count ({buckets}) for partition: {partition}", CORRUPT_BUCKETING)]
    BucketCountMismatch {
        partition: String,
        files: usize,
        buckets: usize,
    },

    /// Partition key arity does not match the table's partition columns
    #[error("invalid partition metadata: expected {expected} partition key values, but got {actual}")]
    InvalidMetadata { expected: usize, actual: usize },

    /// A partition key value is null
    #[error("partition key value cannot be null for column: {column}")]
    NullPartitionValue { column: String },

    /// Operation or type not supported by the loader
    #[error("not supported: {0}")]
    Unsupported(String),

    /// Block metadata did not cover the split range
    #[error("block metadata for '{path}' does not cover split range [{start}, {end})")]
    BadBlockMetadata { path: String, start: u64, end: u64 },

    /// No input format registered for a schema
    #[error("no input format registered under '{name}'")]
    UnknownInputFormat { name: String },

    /// Unexpected filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Configuration errors raised while constructing a loader
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid loader concurrency
    #[error("invalid loader concurrency {count}: must be between 1 and {max}")]
    InvalidConcurrency { count: usize, max: usize },
}

/// Result type alias for LoaderError
pub type Result<T> = std::result::Result<T, LoaderError>;
