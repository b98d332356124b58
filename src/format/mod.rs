//! Input formats and their registry
//!
//! An input format decides how files of a storage layout are read:
//! whether independent byte ranges can be scanned in parallel, and, for
//! two special families, how splits are computed at all.
//!
//! The registry resolves a format from a partition's schema properties.
//! Instead of inspecting runtime type information, formats advertise
//! their special behavior through capability probes:
//!
//! - [`InputFormat::resolves_symlink_targets`]: the partition directory
//!   holds manifests of target paths rather than data files.
//! - [`InputFormat::uses_external_split_computation`]: the format computes
//!   its own file splits and the loader must not walk the directory.

use crate::error::{LoaderError, Result};
use crate::fs::{is_hidden, FileSystem};
use crate::metadata::SchemaProperties;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registered name of the plain text format
pub const TEXT_FORMAT: &str = "text";

/// Registered name of the symlink-manifest text format
pub const SYMLINK_TEXT_FORMAT: &str = "symlink-text";

/// File-name suffixes of codecs that cannot be read from a mid-stream
/// offset
const NON_SPLITTABLE_SUFFIXES: &[&str] = &[".gz", ".bz2", ".lzo", ".zst", ".snappy"];

/// A split computed by an input format itself: a byte range of one file,
/// before block locations and locality are attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSplit {
    pub path: String,
    pub start: u64,
    pub length: u64,
}

/// How files of one storage layout are read
pub trait InputFormat: std::fmt::Debug + Send + Sync {
    /// Name the registry resolves this format under
    fn name(&self) -> &str;

    /// Whether independent byte ranges of this file can be scanned in
    /// parallel
    fn is_splittable(&self, fs: &dyn FileSystem, path: &str) -> bool;

    /// Format computes its own file splits; the loader must call
    /// [`InputFormat::get_splits`] instead of walking the directory
    fn uses_external_split_computation(&self) -> bool {
        false
    }

    /// Partition directory holds symlink manifests naming the real data
    /// files
    fn resolves_symlink_targets(&self) -> bool {
        false
    }

    /// Compute file splits for a path. Only meaningful for formats that
    /// delegate split computation and for resolving symlink targets.
    fn get_splits(&self, fs: &dyn FileSystem, path: &str) -> Result<Vec<FileSplit>>;
}

/// Plain text files, one record per line
#[derive(Debug, Default)]
pub struct TextInputFormat;

impl InputFormat for TextInputFormat {
    fn name(&self) -> &str {
        TEXT_FORMAT
    }

    fn is_splittable(&self, _fs: &dyn FileSystem, path: &str) -> bool {
        !NON_SPLITTABLE_SUFFIXES
            .iter()
            .any(|suffix| path.ends_with(suffix))
    }

    fn get_splits(&self, fs: &dyn FileSystem, path: &str) -> Result<Vec<FileSplit>> {
        let status = fs.file_status(path)?;
        let files = if status.is_dir {
            let mut listed = fs.list_status(path)?;
            listed.retain(|entry| !entry.is_dir && !is_hidden(entry.name()));
            listed.sort();
            listed
        } else {
            vec![status]
        };

        Ok(files
            .into_iter()
            .map(|file| FileSplit {
                start: 0,
                length: file.len,
                path: file.path,
            })
            .collect())
    }
}

/// Directories of UTF-8 manifests whose lines are target paths. The
/// loader expands the manifests itself; split computation runs on the
/// targets with a fresh text format.
#[derive(Debug, Default)]
pub struct SymlinkTextInputFormat;

impl InputFormat for SymlinkTextInputFormat {
    fn name(&self) -> &str {
        SYMLINK_TEXT_FORMAT
    }

    fn is_splittable(&self, _fs: &dyn FileSystem, _path: &str) -> bool {
        false
    }

    fn resolves_symlink_targets(&self) -> bool {
        true
    }

    fn get_splits(&self, _fs: &dyn FileSystem, _path: &str) -> Result<Vec<FileSplit>> {
        Err(LoaderError::Unsupported(
            "symlink format splits are computed on the target paths".to_string(),
        ))
    }
}

/// Resolves input formats from schema properties
pub struct InputFormatRegistry {
    formats: BTreeMap<String, Arc<dyn InputFormat>>,
}

impl InputFormatRegistry {
    /// Registry with the built-in formats
    pub fn new() -> Self {
        let mut registry = Self {
            formats: BTreeMap::new(),
        };
        registry.register(Arc::new(TextInputFormat));
        registry.register(Arc::new(SymlinkTextInputFormat));
        registry
    }

    /// Register a format under its own name, replacing any previous
    /// registration
    pub fn register(&mut self, format: Arc<dyn InputFormat>) {
        self.formats.insert(format.name().to_string(), format);
    }

    /// Resolve the format named by the schema. Schemas that name no
    /// format read as plain text.
    pub fn get(&self, schema: &SchemaProperties) -> Result<Arc<dyn InputFormat>> {
        let name = schema.input_format().unwrap_or(TEXT_FORMAT);
        self.formats
            .get(name)
            .cloned()
            .ok_or_else(|| LoaderError::UnknownInputFormat {
                name: name.to_string(),
            })
    }

    /// A freshly configured text format, used for symlink targets
    /// regardless of what the symlink partition's schema says
    pub fn text_format(&self) -> Arc<dyn InputFormat> {
        Arc::new(TextInputFormat)
    }
}

impl Default for InputFormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}
