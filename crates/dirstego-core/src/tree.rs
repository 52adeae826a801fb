//! Tree serializer (C2): directory tree <-> deterministic byte stream.
//!
//! The wire grammar is a small tag-length-value encoding (see
//! `SPEC_FULL.md` §4.2), chosen instead of a borrowed object serializer so
//! the format is self-contained and independent of any particular
//! language's runtime.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use tracing::trace;

use crate::error::{Result, StegoError};

const TAG_FILE: u8 = 0x00;
const TAG_DIR: u8 = 0x01;

/// A node in the hidden directory tree: either a file's raw contents or a
/// directory mapping names to child nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    File(Vec<u8>),
    Dir(BTreeMap<Vec<u8>, Node>),
}

impl Node {
    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Dir(_))
    }

    /// Builds the outer `name -> contents` mapping from a filesystem path.
    ///
    /// If `path` (as given by the caller) ends with a path separator, the
    /// returned name is empty and the node is the directory's children
    /// directly (the named directory itself is not included). Otherwise the
    /// name is `basename(path)`.
    pub fn from_fs(path: &Path, trailing_separator: bool) -> Result<(Vec<u8>, Node)> {
        let meta = std::fs::metadata(path).map_err(|e| StegoError::InvalidInputPath {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if trailing_separator {
            if !meta.is_dir() {
                return Err(StegoError::InvalidInputPath {
                    path: path.to_path_buf(),
                    reason: "trailing separator given but path is not a directory".into(),
                });
            }
            let children = read_dir_node(path)?;
            return Ok((Vec::new(), children));
        }

        let name = basename_bytes(path);
        let node = if meta.is_dir() {
            read_dir_node(path)?
        } else {
            Node::File(std::fs::read(path).map_err(|e| StegoError::InvalidInputPath {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?)
        };
        Ok((name, node))
    }

    /// Serializes this node to the TLV byte grammar.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut Vec<u8>) {
        match self {
            Node::File(data) => {
                out.push(TAG_FILE);
                out.extend_from_slice(&(data.len() as u64).to_be_bytes());
                out.extend_from_slice(data);
            }
            Node::Dir(children) => {
                out.push(TAG_DIR);
                out.extend_from_slice(&(children.len() as u32).to_be_bytes());
                for (name, child) in children {
                    out.extend_from_slice(&(name.len() as u16).to_be_bytes());
                    out.extend_from_slice(name);
                    child.write(out);
                }
            }
        }
    }

    /// Deserializes a node from the TLV byte grammar, requiring the whole
    /// slice to be consumed.
    pub fn deserialize(bytes: &[u8]) -> Result<Node> {
        let mut cursor = Cursor { bytes, pos: 0 };
        let node = cursor.read_node()?;
        if cursor.pos != bytes.len() {
            return Err(StegoError::CorruptPayload(format!(
                "{} trailing byte(s) after tree",
                bytes.len() - cursor.pos
            )));
        }
        Ok(node)
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(StegoError::CorruptPayload("unexpected end of tree data".into()));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_node(&mut self) -> Result<Node> {
        let tag = self.take(1)?[0];
        match tag {
            TAG_FILE => {
                let len = u64::from_be_bytes(self.take(8)?.try_into().unwrap());
                let data = self.take(len as usize)?.to_vec();
                Ok(Node::File(data))
            }
            TAG_DIR => {
                let count = u32::from_be_bytes(self.take(4)?.try_into().unwrap());
                let mut children = BTreeMap::new();
                for _ in 0..count {
                    let name_len = u16::from_be_bytes(self.take(2)?.try_into().unwrap());
                    let name = self.take(name_len as usize)?.to_vec();
                    let child = self.read_node()?;
                    children.insert(name, child);
                }
                Ok(Node::Dir(children))
            }
            other => Err(StegoError::CorruptPayload(format!(
                "unknown tree tag byte {other:#04x}"
            ))),
        }
    }
}

fn basename_bytes(path: &Path) -> Vec<u8> {
    path.file_name()
        .map(OsStr::as_bytes)
        .unwrap_or_else(|| path.as_os_str().as_bytes())
        .to_vec()
}

fn read_dir_node(dir: &Path) -> Result<Node> {
    let mut names: Vec<std::ffi::OsString> = std::fs::read_dir(dir)
        .map_err(|e| StegoError::InvalidInputPath {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<std::io::Result<_>>()?;
    // Lexicographic ascending by raw byte-name, per SPEC_FULL.md §4.2/§9.
    names.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));

    let mut children = BTreeMap::new();
    for name in names {
        let child_path = dir.join(&name);
        let meta = std::fs::symlink_metadata(&child_path)?;
        let node = if meta.is_dir() {
            read_dir_node(&child_path)?
        } else {
            Node::File(std::fs::read(&child_path)?)
        };
        trace!(name = ?name, is_dir = meta.is_dir(), "collected tree entry");
        children.insert(name.as_bytes().to_vec(), node);
    }
    Ok(Node::Dir(children))
}

/// Writes a decoded root entry (`name -> node`) to `target_dir`, which must
/// already exist and be a directory.
pub fn write_to_disk(target_dir: &Path, name: &[u8], node: &Node) -> Result<()> {
    let meta = std::fs::metadata(target_dir).map_err(|_| StegoError::InvalidInputPath {
        path: target_dir.to_path_buf(),
        reason: "target directory does not exist".into(),
    })?;
    if !meta.is_dir() {
        return Err(StegoError::InvalidInputPath {
            path: target_dir.to_path_buf(),
            reason: "target is not a directory".into(),
        });
    }

    if name.is_empty() {
        // Root name path equals the target directory verbatim (trailing
        // separator case): write the node's children directly into it
        // rather than creating a nested directory for an empty name.
        return write_children(target_dir, node);
    }

    let root_path = target_dir.join(std::ffi::OsStr::from_bytes(name));
    write_node(&root_path, node)
}

fn write_node(path: &Path, node: &Node) -> Result<()> {
    match node {
        Node::File(data) => {
            std::fs::write(path, data)?;
        }
        Node::Dir(_) => {
            std::fs::create_dir(path)?;
            write_children(path, node)?;
        }
    }
    Ok(())
}

fn write_children(dir: &Path, node: &Node) -> Result<()> {
    let Node::Dir(children) = node else {
        return Err(StegoError::CorruptPayload(
            "expected a directory node while writing children".into(),
        ));
    };
    for (name, child) in children {
        let child_path = dir.join(std::ffi::OsStr::from_bytes(name));
        write_node(&child_path, child)?;
    }
    Ok(())
}
