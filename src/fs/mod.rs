//! Filesystem abstraction consumed by the loader
//!
//! The loader never talks to a concrete distributed filesystem. It works
//! against these traits:
//!
//! - [`FileSystem`]: directory listing, file status, block locations, and
//!   raw byte access (used only for symlink manifests).
//! - [`FileSystemProvider`]: resolves the filesystem serving a given path.
//!   Symlink targets may live on a different cluster than the directory
//!   that names them, so every target path gets a fresh resolution.
//! - [`DirectoryLister`]: pluggable listing so an embedding engine can
//!   interpose caching in front of namenode calls.
//!
//! Paths are plain strings (distributed-filesystem URIs), not OS paths.

pub mod memory;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::io::{self, Read};
use std::sync::Arc;

/// A host that stores a replica of a block, with an optional port
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostAddress {
    host: String,
    port: Option<u16>,
}

impl HostAddress {
    /// Parse from `"host"` or `"host:port"`
    pub fn from_string(s: &str) -> Self {
        if let Some((host, port)) = s.rsplit_once(':') {
            // a second colon means a bare IPv6 literal, not a port suffix
            if !host.contains(':') {
                if let Ok(port) = port.parse::<u16>() {
                    return Self {
                        host: host.to_string(),
                        port: Some(port),
                    };
                }
            }
        }
        Self {
            host: s.to_string(),
            port: None,
        }
    }

    /// The host text without any port
    pub fn host_text(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }
}

impl std::fmt::Display for HostAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.host, port),
            None => write!(f, "{}", self.host),
        }
    }
}

/// A byte range of a file together with the hosts storing its replicas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLocation {
    pub offset: u64,
    pub length: u64,
    pub hosts: Vec<HostAddress>,
}

impl BlockLocation {
    pub fn new(offset: u64, length: u64, hosts: &[&str]) -> Self {
        Self {
            offset,
            length,
            hosts: hosts.iter().map(|h| HostAddress::from_string(h)).collect(),
        }
    }
}

/// Status of one filesystem entry, as returned by a listing
///
/// Listings return located statuses: block locations come back with the
/// entry, saving a round trip per file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    pub path: String,
    pub len: u64,
    pub is_dir: bool,
    pub block_locations: Vec<BlockLocation>,
}

impl FileStatus {
    pub fn file(path: impl Into<String>, len: u64, block_locations: Vec<BlockLocation>) -> Self {
        Self {
            path: path.into(),
            len,
            is_dir: false,
            block_locations,
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            len: 0,
            is_dir: true,
            block_locations: Vec::new(),
        }
    }

    /// Final path component
    pub fn name(&self) -> &str {
        file_name(&self.path)
    }
}

// Statuses order by path. This is the canonical sort for bucketed
// directories: bucket N is the N-th file in this order.
impl PartialOrd for FileStatus {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FileStatus {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path.cmp(&other.path)
    }
}

/// Final `/`-separated component of a path
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Names beginning with `.` or `_` are hidden (staging files, manifests)
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('_')
}

/// Filesystem operations the loader needs
pub trait FileSystem: Send + Sync {
    /// List the direct children of a directory. No hidden-file filtering;
    /// callers filter with [`is_hidden`].
    fn list_status(&self, path: &str) -> io::Result<Vec<FileStatus>>;

    /// Status of a single path
    fn file_status(&self, path: &str) -> io::Result<FileStatus>;

    /// Block locations of a file intersecting `[start, start + length)`
    fn block_locations(
        &self,
        status: &FileStatus,
        start: u64,
        length: u64,
    ) -> io::Result<Vec<BlockLocation>>;

    /// Open a file for reading (symlink manifests only)
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send>>;
}

/// Resolves the filesystem instance serving a path
pub trait FileSystemProvider: Send + Sync {
    fn filesystem(&self, path: &str) -> io::Result<Arc<dyn FileSystem>>;
}

/// Provider backed by a single filesystem, for deployments (and tests)
/// where every path lives on one cluster
pub struct SingleFileSystemProvider {
    fs: Arc<dyn FileSystem>,
}

impl SingleFileSystemProvider {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }
}

impl FileSystemProvider for SingleFileSystemProvider {
    fn filesystem(&self, _path: &str) -> io::Result<Arc<dyn FileSystem>> {
        Ok(Arc::clone(&self.fs))
    }
}

/// Pluggable directory listing
pub trait DirectoryLister: Send + Sync {
    fn list(&self, fs: &dyn FileSystem, path: &str) -> io::Result<Vec<FileStatus>>;
}

/// Passthrough lister that delegates straight to the filesystem
#[derive(Debug, Default)]
pub struct FsDirectoryLister;

impl DirectoryLister for FsDirectoryLister {
    fn list(&self, fs: &dyn FileSystem, path: &str) -> io::Result<Vec<FileStatus>> {
        fs.list_status(path)
    }
}
