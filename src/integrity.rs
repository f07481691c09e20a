//! Block-wise content verification for archive entries.

use sha2::{Digest, Sha256};

use crate::record::{HashAlgorithm, Integrity};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("block {index} does not match its recorded digest")]
    BlockMismatch { index: usize },
    #[error("content has more blocks than recorded ({recorded})")]
    MissingBlock { recorded: usize },
    #[error("content has {seen} blocks but {recorded} are recorded")]
    BlockCount { seen: usize, recorded: usize },
    #[error("whole-content digest mismatch")]
    DigestMismatch,
}

/// Incrementally verifies entry content as it streams past.
///
/// Feed bytes from the start of the entry in order. Each block is checked as
/// soon as it is complete; [`finish`](Self::finish) checks the final short
/// block, the block count and the whole-content digest.
pub struct IntegrityValidator {
    integrity: Integrity,
    whole: Sha256,
    block: Sha256,
    block_index: usize,
    block_filled: u64,
    bytes_seen: u64,
}

impl IntegrityValidator {
    pub fn new(integrity: Integrity) -> IntegrityValidator {
        IntegrityValidator {
            integrity,
            whole: Sha256::new(),
            block: Sha256::new(),
            block_index: 0,
            block_filled: 0,
            bytes_seen: 0,
        }
    }

    /// Number of content bytes fed so far.
    #[inline]
    pub fn bytes_seen(&self) -> u64 {
        self.bytes_seen
    }

    pub fn update(&mut self, mut data: &[u8]) -> Result<(), IntegrityError> {
        self.whole.update(data);
        self.bytes_seen += data.len() as u64;

        let block_size = self.integrity.block_size as u64;
        while !data.is_empty() {
            let room = (block_size - self.block_filled) as usize;
            let take = room.min(data.len());
            self.block.update(&data[..take]);
            self.block_filled += take as u64;
            data = &data[take..];

            if self.block_filled == block_size {
                self.check_block()?;
            }
        }
        Ok(())
    }

    fn check_block(&mut self) -> Result<(), IntegrityError> {
        let index = self.block_index;
        let expected = self
            .integrity
            .blocks
            .get(index)
            .ok_or(IntegrityError::MissingBlock {
                recorded: self.integrity.blocks.len(),
            })?;
        let actual = self.block.finalize_reset();
        if actual.as_slice() != expected.as_slice() {
            return Err(IntegrityError::BlockMismatch { index });
        }
        self.block_index += 1;
        self.block_filled = 0;
        Ok(())
    }

    /// Verify the tail of the content once every byte has been fed.
    pub fn finish(mut self) -> Result<(), IntegrityError> {
        if self.block_filled > 0 {
            self.check_block()?;
        }

        let recorded = self.integrity.blocks.len();
        // Empty content may be recorded with either zero blocks or one empty block.
        let count_ok = self.block_index == recorded
            || (self.bytes_seen == 0 && recorded == 1 && self.check_block().is_ok());
        if !count_ok {
            return Err(IntegrityError::BlockCount {
                seen: self.block_index,
                recorded,
            });
        }

        if self.whole.finalize().as_slice() != self.integrity.hash.as_slice() {
            return Err(IntegrityError::DigestMismatch);
        }
        Ok(())
    }
}

/// Verify a complete in-memory copy of an entry.
pub fn verify(integrity: &Integrity, data: &[u8]) -> Result<(), IntegrityError> {
    let mut validator = IntegrityValidator::new(integrity.clone());
    validator.update(data)?;
    validator.finish()
}

/// Compute the integrity record an archive packer would store for `data`.
pub fn compute(data: &[u8], block_size: u32) -> Integrity {
    let blocks = if data.is_empty() {
        vec![Sha256::digest(b"").to_vec()]
    } else {
        data.chunks(block_size as usize)
            .map(|chunk| Sha256::digest(chunk).to_vec())
            .collect()
    };
    Integrity {
        algorithm: HashAlgorithm::Sha256,
        hash: Sha256::digest(data).to_vec(),
        block_size,
        blocks,
    }
}
