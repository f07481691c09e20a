//! Async (tokio) frontend for serving virtual files.

mod fetch;
mod job;

pub use fetch::{READ_CHUNK_SIZE, Response, fetch, stream_to};
pub use job::{JobEvent, JobEvents, ReadOutcome, VirtualFileJob};
