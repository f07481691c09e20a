//! Herein lies the brains of serving files out of `asar` archives.
//!
//! A request path such as `/app/resources/app.asar/dist/index.html` is split
//! by the [`PathResolver`] into a container and an entry, the container's
//! index is built once by the [`ArchiveRegistry`], and a [`VirtualFileJob`]
//! streams the entry's bytes (or any ordinary file's) with single-range
//! support, optional integrity checks and cancellation.
//!
//! Use [`fetch`] to serve a path in one call, or drive a [`VirtualFileJob`]
//! yourself to stream.

pub mod aio;
pub mod compression;
pub mod context;
pub mod core;
pub mod error;
pub mod header;
pub mod index;
pub mod integrity;
pub mod mime;
pub mod parse;
pub mod path;
pub mod range;
mod record;
pub mod registry;
pub mod response;
pub mod shortcut;

pub use aio::{JobEvent, JobEvents, ReadOutcome, Response, VirtualFileJob, fetch, stream_to};
pub use context::{ServeContext, ServeOptions};
pub use self::core::{JobMachine, JobState, Resolution, ResolvedTarget};
pub use error::{ArchiveError, JobError};
pub use index::ArchiveIndex;
pub use integrity::IntegrityError;
pub use mime::{DefaultMimeSniffer, MimeSniffer};
pub use parse::{ParseError, ParseResult};
pub use path::{EntryPath, Location, PathResolver};
pub use range::{ByteRange, RangeError};
pub use record::{ArchiveFileRecord, HashAlgorithm, Integrity};
pub use registry::ArchiveRegistry;
pub use response::ResponseInfo;

#[cfg(test)]
pub(crate) mod test_util {
    /// Assemble container bytes from a JSON header and the content section.
    pub fn container(json: &str, content: &[u8]) -> Vec<u8> {
        let padded = json.len().next_multiple_of(4);
        let header_size = (8 + padded) as u32;

        let mut out = Vec::with_capacity(8 + header_size as usize + content.len());
        out.extend_from_slice(&4u32.to_le_bytes());
        out.extend_from_slice(&header_size.to_le_bytes());
        out.extend_from_slice(&((padded + 4) as u32).to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(json.as_bytes());
        out.resize(8 + header_size as usize, 0);
        out.extend_from_slice(content);
        out
    }
}
