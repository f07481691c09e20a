/// One file entry in an archive index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFileRecord {
    /// Absolute byte offset of the entry's content within the container file.
    /// Meaningless when `unpacked` is set.
    pub offset: u64,
    /// Logical content length.
    pub size: u64,
    /// The entry lives as a loose file next to the archive instead of inside it.
    pub unpacked: bool,
    /// The entry was marked executable when packed.
    pub executable: bool,
    pub integrity: Option<Integrity>,
}

impl ArchiveFileRecord {
    /// End offset (exclusive) of the entry's content within the container.
    #[inline]
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}

/// Content digest attached to an entry.
///
/// The whole-file digest covers the entry's bytes; `blocks` holds the digest of
/// every consecutive `block_size` slice, the last one possibly short.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Integrity {
    pub algorithm: HashAlgorithm,
    pub hash: Vec<u8>,
    pub block_size: u32,
    pub blocks: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
}

impl HashAlgorithm {
    pub fn from_name(name: &str) -> Option<HashAlgorithm> {
        match name {
            "SHA256" => Some(HashAlgorithm::Sha256),
            _ => None,
        }
    }

    #[inline]
    pub fn digest_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgorithm::Sha256 => write!(f, "SHA256"),
        }
    }
}
