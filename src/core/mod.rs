//! Sans-IO core state machine for virtual file jobs.
//!
//! The machine here performs no I/O. Frontends perform the operations it
//! asks for and feed the outcomes back:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Frontends                              │
//! │  - VirtualFileJob (async/tokio)         │
//! │  - tests driving it by hand             │
//! ├─────────────────────────────────────────┤
//! │  Sans-IO Core (this module)             │
//! │  - JobMachine                           │
//! └─────────────────────────────────────────┘
//! ```

mod job;

pub use job::{Action, JobMachine, JobState, Resolution, ResolvedTarget};
