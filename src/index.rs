//! The in-memory index of one archive container.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ArchiveError;
use crate::header::{AsarHeader, read_header};
use crate::path::EntryPath;
use crate::record::{ArchiveFileRecord, HashAlgorithm, Integrity};

/// Suffix appended to the container path to name the directory holding
/// unpacked entries.
pub const UNPACKED_SUFFIX: &str = ".unpacked";

/// Maximum number of link hops followed by [`ArchiveIndex::lookup`].
pub const MAX_LINK_DEPTH: usize = 32;

#[derive(Deserialize)]
#[serde(untagged)]
enum Node {
    Directory { files: BTreeMap<String, Node> },
    Link { link: String },
    File(FileNode),
}

#[derive(Deserialize)]
struct FileNode {
    #[serde(default)]
    offset: Option<String>,
    size: u64,
    #[serde(default)]
    unpacked: bool,
    #[serde(default)]
    executable: bool,
    #[serde(default)]
    integrity: Option<IntegrityNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntegrityNode {
    algorithm: String,
    hash: String,
    block_size: u32,
    blocks: Vec<String>,
}

/// Immutable mapping from entry paths to file records for one container.
///
/// Directories are not represented; only leaves are. Link leaves are kept
/// separately and resolved on lookup.
#[derive(Debug)]
pub struct ArchiveIndex {
    path: PathBuf,
    header_size: u32,
    container_len: u64,
    files: BTreeMap<EntryPath, ArchiveFileRecord>,
    links: BTreeMap<EntryPath, EntryPath>,
}

impl ArchiveIndex {
    /// Open and index the container at `path`. This performs blocking I/O.
    pub fn open(path: &Path) -> Result<ArchiveIndex, ArchiveError> {
        let file = File::open(path).map_err(|e| ArchiveError::Open(e, path.to_path_buf()))?;
        let container_len = file
            .metadata()
            .map_err(|e| ArchiveError::Open(e, path.to_path_buf()))?
            .len();
        let mut reader = BufReader::new(file);
        Self::from_reader(path.to_path_buf(), &mut reader, container_len)
    }

    pub fn from_reader<R: Read + Seek>(
        path: PathBuf,
        reader: &mut R,
        container_len: u64,
    ) -> Result<ArchiveIndex, ArchiveError> {
        let header = match read_header(reader, container_len) {
            Ok(header) => header,
            Err(e) => return Err(ArchiveError::Header(e, path)),
        };
        Self::from_header(path, &header, container_len)
    }

    pub fn from_header(
        path: PathBuf,
        header: &AsarHeader,
        container_len: u64,
    ) -> Result<ArchiveIndex, ArchiveError> {
        let root: Node = match serde_json::from_str(&header.json) {
            Ok(root) => root,
            Err(e) => return Err(ArchiveError::Json(e, path)),
        };
        let Node::Directory { files: children } = root else {
            return Err(ArchiveError::MalformedEntry {
                entry: String::new(),
                reason: "root node is not a directory",
            });
        };

        let mut builder = IndexBuilder {
            content_offset: header.content_offset(),
            container_len,
            files: BTreeMap::new(),
            links: BTreeMap::new(),
        };
        builder.walk(None, children)?;

        tracing::debug!(
            path = %path.display(),
            files = builder.files.len(),
            links = builder.links.len(),
            "indexed archive"
        );

        Ok(ArchiveIndex {
            path,
            header_size: header.header_size,
            container_len,
            files: builder.files,
            links: builder.links,
        })
    }

    /// Path of the container file this index describes.
    #[inline]
    pub fn container_path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn header_size(&self) -> u32 {
        self.header_size
    }

    #[inline]
    pub fn container_len(&self) -> u64 {
        self.container_len
    }

    /// Absolute offset of the first content byte.
    #[inline]
    pub fn content_offset(&self) -> u64 {
        crate::parse::SIZE_PICKLE_LEN as u64 + self.header_size as u64
    }

    /// Look up an entry by exact path, following link leaves.
    pub fn lookup(&self, entry: &EntryPath) -> Option<&ArchiveFileRecord> {
        let mut current = entry;
        for _ in 0..=MAX_LINK_DEPTH {
            if let Some(record) = self.files.get(current) {
                return Some(record);
            }
            current = self.links.get(current)?;
        }
        tracing::warn!(entry = %entry, "link chain too deep");
        None
    }

    /// The on-disk location of an unpacked entry.
    pub fn unpacked_path(&self, entry: &EntryPath) -> PathBuf {
        let mut root = self.path.clone().into_os_string();
        root.push(UNPACKED_SUFFIX);
        PathBuf::from(root).join(entry.to_relative_path())
    }

    /// Number of file entries (links excluded).
    #[inline]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate file entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntryPath, &ArchiveFileRecord)> {
        self.files.iter()
    }

    /// Iterate link entries and their targets in path order.
    pub fn links(&self) -> impl Iterator<Item = (&EntryPath, &EntryPath)> {
        self.links.iter()
    }
}

struct IndexBuilder {
    content_offset: u64,
    container_len: u64,
    files: BTreeMap<EntryPath, ArchiveFileRecord>,
    links: BTreeMap<EntryPath, EntryPath>,
}

impl IndexBuilder {
    fn walk(
        &mut self,
        parent: Option<&EntryPath>,
        children: BTreeMap<String, Node>,
    ) -> Result<(), ArchiveError> {
        for (name, node) in children {
            if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
                return Err(ArchiveError::MalformedEntry {
                    entry: name,
                    reason: "invalid entry name",
                });
            }
            let path = EntryPath::join_component(parent, &name);

            match node {
                Node::Directory { files } => self.walk(Some(&path), files)?,
                Node::Link { link } => {
                    let target =
                        EntryPath::new(&link).map_err(|_| ArchiveError::MalformedEntry {
                            entry: path.to_string(),
                            reason: "invalid link target",
                        })?;
                    self.links.insert(path, target);
                }
                Node::File(file) => {
                    let record = self.file_record(&path, file)?;
                    self.files.insert(path, record);
                }
            }
        }
        Ok(())
    }

    fn file_record(
        &self,
        path: &EntryPath,
        file: FileNode,
    ) -> Result<ArchiveFileRecord, ArchiveError> {
        let malformed = |reason| ArchiveError::MalformedEntry {
            entry: path.to_string(),
            reason,
        };

        let integrity = file
            .integrity
            .map(|node| parse_integrity(node).ok_or_else(|| malformed("invalid integrity")))
            .transpose()?;

        if file.unpacked {
            return Ok(ArchiveFileRecord {
                offset: 0,
                size: file.size,
                unpacked: true,
                executable: file.executable,
                integrity,
            });
        }

        let relative: u64 = file
            .offset
            .as_deref()
            .ok_or_else(|| malformed("missing offset"))?
            .parse()
            .map_err(|_| malformed("offset is not a decimal integer"))?;
        let offset = self
            .content_offset
            .checked_add(relative)
            .ok_or_else(|| malformed("offset overflows"))?;
        let end = offset
            .checked_add(file.size)
            .ok_or_else(|| malformed("size overflows"))?;
        if end > self.container_len {
            return Err(ArchiveError::OutOfBounds {
                entry: path.to_string(),
                end,
                container_len: self.container_len,
            });
        }

        Ok(ArchiveFileRecord {
            offset,
            size: file.size,
            unpacked: false,
            executable: file.executable,
            integrity,
        })
    }
}

fn parse_integrity(node: IntegrityNode) -> Option<Integrity> {
    let algorithm = HashAlgorithm::from_name(&node.algorithm)?;
    let decode = |s: &str| {
        hex::decode(s)
            .ok()
            .filter(|d| d.len() == algorithm.digest_len())
    };
    if node.block_size == 0 {
        return None;
    }
    Some(Integrity {
        algorithm,
        hash: decode(&node.hash)?,
        block_size: node.block_size,
        blocks: node
            .blocks
            .iter()
            .map(|b| decode(b))
            .collect::<Option<Vec<_>>>()?,
    })
}
