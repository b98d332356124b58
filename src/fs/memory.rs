//! In-memory filesystem
//!
//! Backs the test suites and is handy for embedders that stage table
//! layouts in memory. Files carry explicit block locations; a file added
//! without any gets a single block over its whole extent hosted on
//! `localhost`, which is what a real distributed filesystem reports when
//! it has no locality information.

use crate::fs::{BlockLocation, FileStatus, FileSystem};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read};

#[derive(Debug, Clone)]
struct MemoryFile {
    len: u64,
    blocks: Vec<BlockLocation>,
    contents: Vec<u8>,
}

#[derive(Debug, Clone)]
enum Node {
    File(MemoryFile),
    Directory,
}

/// Thread-safe in-memory filesystem keyed by full path
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    nodes: Mutex<BTreeMap<String, Node>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a directory (ancestors are created implicitly)
    pub fn add_directory(&self, path: &str) {
        let mut nodes = self.nodes.lock();
        Self::ensure_ancestors(&mut nodes, path);
        nodes.insert(normalize(path), Node::Directory);
    }

    /// Register a file with explicit block locations. Passing no blocks
    /// synthesizes a single `localhost` block covering the whole file.
    pub fn add_file(&self, path: &str, len: u64, blocks: Vec<BlockLocation>) {
        let blocks = if blocks.is_empty() {
            vec![BlockLocation::new(0, len, &["localhost"])]
        } else {
            blocks
        };
        let mut nodes = self.nodes.lock();
        Self::ensure_ancestors(&mut nodes, path);
        nodes.insert(
            normalize(path),
            Node::File(MemoryFile {
                len,
                blocks,
                contents: Vec::new(),
            }),
        );
    }

    /// Register a file whose bytes matter (symlink manifests)
    pub fn add_file_with_contents(&self, path: &str, contents: &[u8]) {
        let len = contents.len() as u64;
        let mut nodes = self.nodes.lock();
        Self::ensure_ancestors(&mut nodes, path);
        nodes.insert(
            normalize(path),
            Node::File(MemoryFile {
                len,
                blocks: vec![BlockLocation::new(0, len, &["localhost"])],
                contents: contents.to_vec(),
            }),
        );
    }

    fn ensure_ancestors(nodes: &mut BTreeMap<String, Node>, path: &str) {
        let normalized = normalize(path);
        for (idx, ch) in normalized.char_indices().skip(1) {
            if ch == '/' {
                nodes
                    .entry(normalized[..idx].to_string())
                    .or_insert(Node::Directory);
            }
        }
    }

    fn status_of(path: &str, node: &Node) -> FileStatus {
        match node {
            Node::Directory => FileStatus::directory(path),
            Node::File(file) => FileStatus::file(path, file.len, file.blocks.clone()),
        }
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("no such path: {path}"))
}

impl FileSystem for MemoryFileSystem {
    fn list_status(&self, path: &str) -> io::Result<Vec<FileStatus>> {
        let nodes = self.nodes.lock();
        let dir = normalize(path);
        match nodes.get(&dir) {
            Some(Node::Directory) => {}
            Some(Node::File(_)) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("not a directory: {dir}"),
                ))
            }
            None => return Err(not_found(&dir)),
        }

        let prefix = if dir == "/" { "/".to_string() } else { format!("{dir}/") };
        let mut children = Vec::new();
        for (path, node) in nodes.range(prefix.clone()..) {
            if !path.starts_with(&prefix) {
                break;
            }
            // direct children only
            if path[prefix.len()..].contains('/') {
                continue;
            }
            children.push(Self::status_of(path, node));
        }
        Ok(children)
    }

    fn file_status(&self, path: &str) -> io::Result<FileStatus> {
        let nodes = self.nodes.lock();
        let path = normalize(path);
        nodes
            .get(&path)
            .map(|node| Self::status_of(&path, node))
            .ok_or_else(|| not_found(&path))
    }

    fn block_locations(
        &self,
        status: &FileStatus,
        _start: u64,
        _length: u64,
    ) -> io::Result<Vec<BlockLocation>> {
        // Return everything; the split factory clamps to the requested range
        let nodes = self.nodes.lock();
        match nodes.get(&normalize(&status.path)) {
            Some(Node::File(file)) => Ok(file.blocks.clone()),
            Some(Node::Directory) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a file: {}", status.path),
            )),
            None => Err(not_found(&status.path)),
        }
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send>> {
        let nodes = self.nodes.lock();
        match nodes.get(&normalize(path)) {
            Some(Node::File(file)) => Ok(Box::new(Cursor::new(file.contents.clone()))),
            Some(Node::Directory) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a file: {path}"),
            )),
            None => Err(not_found(path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_direct_children_only() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/t/a", 10, vec![]);
        fs.add_file("/t/sub/b", 10, vec![]);

        let names: Vec<_> = fs
            .list_status("/t")
            .unwrap()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "sub"]);

        let sub = fs.list_status("/t/sub").unwrap();
        assert_eq!(sub.len(), 1);
        assert_eq!(sub[0].name(), "b");
        assert!(!sub[0].is_dir);
    }

    #[test]
    fn missing_path_errors() {
        let fs = MemoryFileSystem::new();
        assert!(fs.list_status("/nope").is_err());
        assert!(fs.file_status("/nope").is_err());
        assert!(fs.open("/nope").is_err());
    }

    #[test]
    fn default_block_covers_file_on_localhost() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/t/a", 128, vec![]);

        let status = fs.file_status("/t/a").unwrap();
        assert_eq!(status.block_locations.len(), 1);
        let block = &status.block_locations[0];
        assert_eq!((block.offset, block.length), (0, 128));
        assert_eq!(block.hosts[0].host_text(), "localhost");
    }

    #[test]
    fn open_reads_contents() {
        let fs = MemoryFileSystem::new();
        fs.add_file_with_contents("/links/link0", b"/x/1\n/x/2\n");

        let mut out = String::new();
        fs.open("/links/link0").unwrap().read_to_string(&mut out).unwrap();
        assert_eq!(out, "/x/1\n/x/2\n");
    }
}
