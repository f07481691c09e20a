//! Sans-IO virtual file job state machine.
//!
//! `JobMachine` tracks one request from resolution through streaming. It
//! never performs I/O itself: every transition method returns an [`Action`]
//! naming the operation the frontend must perform next, and the frontend
//! reports the outcome through the matching `on_*` method.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ArchiveError, JobError};
use crate::index::ArchiveIndex;
use crate::path::EntryPath;
use crate::range::{self, ByteRange};
use crate::record::{ArchiveFileRecord, Integrity};
use crate::response::ResponseInfo;

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    Initializing,
    Opening,
    RangeNegotiating,
    Seeking,
    Streaming,
    Completed,
    Errored,
    Killed,
}

impl JobState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Errored | JobState::Killed
        )
    }
}

/// What a request path turned out to name.
#[derive(Debug, Clone)]
pub enum ResolvedTarget {
    PlainFile(PathBuf),
    ArchiveEntry {
        index: Arc<ArchiveIndex>,
        record: ArchiveFileRecord,
        entry: EntryPath,
    },
    NotFound,
}

impl ResolvedTarget {
    /// The file to open for this target's bytes.
    pub fn source_path(&self) -> Option<PathBuf> {
        match self {
            ResolvedTarget::PlainFile(path) => Some(path.clone()),
            ResolvedTarget::ArchiveEntry { index, record, entry } if record.unpacked => {
                Some(index.unpacked_path(entry))
            }
            ResolvedTarget::ArchiveEntry { index, .. } => {
                Some(index.container_path().to_path_buf())
            }
            ResolvedTarget::NotFound => None,
        }
    }

    /// Offset of the target's first byte within its source.
    pub fn source_offset(&self) -> u64 {
        match self {
            ResolvedTarget::ArchiveEntry { record, .. } if !record.unpacked => record.offset,
            _ => 0,
        }
    }

    /// Final path component, used for MIME typing and filter selection.
    pub fn file_name(&self) -> Option<&str> {
        match self {
            ResolvedTarget::PlainFile(path) => path.file_name().and_then(|name| name.to_str()),
            ResolvedTarget::ArchiveEntry { entry, .. } => Some(entry.file_name()),
            ResolvedTarget::NotFound => None,
        }
    }

    pub fn integrity(&self) -> Option<&Integrity> {
        match self {
            ResolvedTarget::ArchiveEntry { record, .. } => record.integrity.as_ref(),
            _ => None,
        }
    }

    #[inline]
    pub fn is_archive_entry(&self) -> bool {
        matches!(self, ResolvedTarget::ArchiveEntry { .. })
    }
}

/// Outcome of resolving a request path.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub target: ResolvedTarget,
    pub mime_type: Option<String>,
    /// Set when a plain file is a shortcut to be answered with a redirect.
    pub redirect: Option<PathBuf>,
}

/// The next thing a frontend must do on the machine's behalf.
#[derive(Debug)]
pub enum Action {
    /// Resolve the path off the I/O-driving task, then call `on_resolved`.
    Resolve { path: PathBuf },
    /// Open the source file, then call `on_opened` with its length.
    Open { path: PathBuf },
    /// Seek the source to an absolute offset, then call `on_seeked`.
    Seek { offset: u64 },
    /// Report response headers to the caller. Reads may now be issued.
    HeadersComplete(ResponseInfo),
    /// Report a redirect to the caller. The job is complete.
    Redirect(ResponseInfo),
    /// Read at most `len` bytes from the source, then call `on_read`.
    Read { len: usize },
    /// Hand `bytes` freshly read bytes to the caller.
    ReadComplete { bytes: usize },
    /// No bytes remain. The source was not touched.
    EndOfStream,
    /// The job failed and is now `Errored`.
    Fail(JobError),
    /// Nothing to do.
    Idle,
}

/// Sans-IO virtual file job.
///
/// # Example
///
/// ```ignore
/// let mut job = JobMachine::new("/app/resources/app.asar/index.html");
/// let Action::Resolve { path } = job.start() else { unreachable!() };
/// let action = job.on_resolved(context.resolve(&path));
/// // ...perform `action`, feed the result back, repeat
/// ```
#[derive(Debug)]
pub struct JobMachine {
    path: PathBuf,
    state: JobState,
    range_header: Option<String>,
    target: Option<ResolvedTarget>,
    mime_type: Option<String>,
    range: Option<ByteRange>,
    remaining: u64,
    position: u64,
    pending_read: Option<usize>,
}

impl JobMachine {
    pub fn new(path: impl Into<PathBuf>) -> JobMachine {
        JobMachine {
            path: path.into(),
            state: JobState::Created,
            range_header: None,
            target: None,
            mime_type: None,
            range: None,
            remaining: 0,
            position: 0,
            pending_read: None,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Bytes left to deliver in the negotiated range.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Absolute position in the source of the next byte to read.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    #[inline]
    pub fn range(&self) -> Option<&ByteRange> {
        self.range.as_ref()
    }

    #[inline]
    pub fn target(&self) -> Option<&ResolvedTarget> {
        self.target.as_ref()
    }

    #[inline]
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    fn transition(&mut self, next: JobState) {
        tracing::debug!(path = %self.path.display(), from = ?self.state, to = ?next, "job transition");
        self.state = next;
    }

    fn error(&mut self, err: JobError) -> Action {
        if self.state.is_terminal() {
            return Action::Idle;
        }
        tracing::debug!(path = %self.path.display(), error = %err, "job failed");
        self.pending_read = None;
        self.transition(JobState::Errored);
        Action::Fail(err)
    }

    fn unexpected(&mut self, event: &str) -> Action {
        if self.state.is_terminal() {
            return Action::Idle;
        }
        let msg = format!("{event} while {:?}", self.state);
        self.error(JobError::invariant(msg))
    }

    /// Stash the caller's `Range` header. Only valid before `start`.
    pub fn set_range_header(&mut self, value: impl Into<String>) -> Result<(), JobError> {
        if self.state != JobState::Created {
            return Err(JobError::invariant(format!(
                "range header set while {:?}",
                self.state
            )));
        }
        self.range_header = Some(value.into());
        Ok(())
    }

    pub fn start(&mut self) -> Action {
        if self.state != JobState::Created {
            return self.unexpected("start");
        }
        self.transition(JobState::Initializing);
        Action::Resolve {
            path: self.path.clone(),
        }
    }

    pub fn on_resolved(&mut self, result: Result<Resolution, JobError>) -> Action {
        if self.state != JobState::Initializing {
            return self.unexpected("resolution completed");
        }
        let resolution = match result {
            Ok(resolution) => resolution,
            Err(e) => return self.error(e),
        };

        if let ResolvedTarget::NotFound = resolution.target {
            return self.error(JobError::NotFound(self.path.clone()));
        }

        if let (ResolvedTarget::PlainFile(_), Some(redirect)) =
            (&resolution.target, &resolution.redirect)
        {
            let info = ResponseInfo::redirect(redirect);
            self.target = Some(resolution.target);
            self.transition(JobState::Completed);
            return Action::Redirect(info);
        }

        let Some(path) = resolution.target.source_path() else {
            return self.error(JobError::NotFound(self.path.clone()));
        };
        self.target = Some(resolution.target);
        self.mime_type = resolution.mime_type;
        self.transition(JobState::Opening);
        Action::Open { path }
    }

    /// The source was opened; `result` carries its total length.
    pub fn on_opened(&mut self, result: io::Result<u64>) -> Action {
        if self.state != JobState::Opening {
            return self.unexpected("open completed");
        }
        let source_len = match result {
            Ok(len) => len,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "open failed");
                return self.error(JobError::NotFound(self.path.clone()));
            }
        };
        self.transition(JobState::RangeNegotiating);

        let (content_len, base) = match &self.target {
            Some(ResolvedTarget::ArchiveEntry { record, entry, .. }) if !record.unpacked => {
                match record.end() {
                    Some(end) if end <= source_len => {}
                    end => {
                        let err = ArchiveError::OutOfBounds {
                            entry: entry.to_string(),
                            end: end.unwrap_or(u64::MAX),
                            container_len: source_len,
                        };
                        return self.error(err.into());
                    }
                }
                (record.size, record.offset)
            }
            Some(_) => (source_len, 0),
            None => return self.unexpected("open completed without a target"),
        };

        let range = match range::negotiate(self.range_header.as_deref(), content_len) {
            Ok(range) => range,
            Err(e) => return self.error(e.into()),
        };

        self.range = Some(range);
        self.remaining = range.len();
        self.position = base + range.first();

        if self.position == 0 {
            return self.headers_complete();
        }
        self.transition(JobState::Seeking);
        Action::Seek {
            offset: self.position,
        }
    }

    /// The source seek finished; `result` carries the new position.
    pub fn on_seeked(&mut self, result: io::Result<u64>) -> Action {
        if self.state != JobState::Seeking {
            return self.unexpected("seek completed");
        }
        match result {
            Ok(pos) if pos == self.position => self.headers_complete(),
            Ok(pos) => self.error(JobError::invariant(format!(
                "seek landed at {pos}, expected {}",
                self.position
            ))),
            Err(e) => self.error(e.into()),
        }
    }

    fn headers_complete(&mut self) -> Action {
        let Some(range) = self.range else {
            return self.unexpected("headers completed without a range");
        };
        let plain_file = !matches!(self.target, Some(ResolvedTarget::ArchiveEntry { .. }));
        let info = ResponseInfo::content(&range, self.mime_type.clone(), plain_file);
        self.transition(JobState::Streaming);
        Action::HeadersComplete(info)
    }

    /// The caller wants up to `max` more bytes.
    pub fn read(&mut self, max: usize) -> Action {
        if self.state != JobState::Streaming || self.pending_read.is_some() {
            return self.unexpected("read requested");
        }
        if self.remaining == 0 {
            self.transition(JobState::Completed);
            return Action::EndOfStream;
        }
        let len = (max as u64).min(self.remaining) as usize;
        if len == 0 {
            // Nothing to fetch; the job stays streaming.
            return Action::ReadComplete { bytes: 0 };
        }
        self.pending_read = Some(len);
        tracing::trace!(path = %self.path.display(), len, position = self.position, "read");
        Action::Read { len }
    }

    /// The outstanding source read finished; `result` carries the byte count.
    pub fn on_read(&mut self, result: io::Result<usize>) -> Action {
        let requested = match (self.state, self.pending_read.take()) {
            (JobState::Streaming, Some(requested)) => requested,
            _ => return self.unexpected("read completed"),
        };
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => return self.error(e.into()),
        };

        if bytes > requested || bytes as u64 > self.remaining {
            return self.error(JobError::invariant(format!(
                "source delivered {bytes} bytes with {} remaining",
                self.remaining
            )));
        }
        if bytes == 0 {
            return self.error(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }

        self.remaining -= bytes as u64;
        self.position += bytes as u64;
        Action::ReadComplete { bytes }
    }

    /// Fail the job from outside, for errors the frontend detects itself.
    pub fn fail(&mut self, err: JobError) -> Action {
        self.error(err)
    }

    /// Cancel the job. Every later transition is a no-op.
    pub fn kill(&mut self) {
        if self.state != JobState::Killed {
            self.pending_read = None;
            self.transition(JobState::Killed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::RangeError;
    use crate::test_util::container;

    fn plain(path: &str) -> Result<Resolution, JobError> {
        Ok(Resolution {
            target: ResolvedTarget::PlainFile(PathBuf::from(path)),
            mime_type: Some("text/plain".into()),
            redirect: None,
        })
    }

    fn archive_entry(offset: u64, size: u64) -> Result<Resolution, JobError> {
        let bytes = container(r#"{"files":{}}"#, b"");
        let len = bytes.len() as u64;
        let index = ArchiveIndex::from_reader(
            PathBuf::from("/res/archive.asar"),
            &mut io::Cursor::new(bytes),
            len,
        )
        .unwrap();
        Ok(Resolution {
            target: ResolvedTarget::ArchiveEntry {
                index: Arc::new(index),
                record: ArchiveFileRecord {
                    offset,
                    size,
                    unpacked: false,
                    executable: false,
                    integrity: None,
                },
                entry: EntryPath::new("sub/file.txt").unwrap(),
            },
            mime_type: Some("text/plain".into()),
            redirect: None,
        })
    }

    fn open(job: &mut JobMachine, resolution: Result<Resolution, JobError>) -> PathBuf {
        assert!(matches!(job.start(), Action::Resolve { .. }));
        match job.on_resolved(resolution) {
            Action::Open { path } => path,
            other => panic!("expected open, got {other:?}"),
        }
    }

    fn drain(job: &mut JobMachine, chunk: usize) -> u64 {
        let mut total = 0;
        loop {
            match job.read(chunk) {
                Action::Read { len } => match job.on_read(Ok(len)) {
                    Action::ReadComplete { bytes } => total += bytes as u64,
                    other => panic!("expected read complete, got {other:?}"),
                },
                Action::EndOfStream => return total,
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn full_plain_file() {
        let mut job = JobMachine::new("/www/a.txt");
        assert_eq!(open(&mut job, plain("/www/a.txt")), PathBuf::from("/www/a.txt"));

        let Action::HeadersComplete(info) = job.on_opened(Ok(50)) else {
            panic!("zero offset must skip the seek");
        };
        assert_eq!(info.status, 200);
        assert_eq!(info.content_length, 50);
        assert_eq!(info.header("Cache-Control"), Some("no-cache"));
        assert_eq!(job.state(), JobState::Streaming);

        assert_eq!(drain(&mut job, 16), 50);
        assert_eq!(job.state(), JobState::Completed);
    }

    #[test]
    fn archive_entry_seeks_to_offset() {
        let mut job = JobMachine::new("/res/archive.asar/sub/file.txt");
        assert_eq!(
            open(&mut job, archive_entry(100, 50)),
            PathBuf::from("/res/archive.asar")
        );
        assert!(matches!(job.on_opened(Ok(1000)), Action::Seek { offset: 100 }));
        assert_eq!(job.state(), JobState::Seeking);

        let Action::HeadersComplete(info) = job.on_seeked(Ok(100)) else {
            panic!("expected headers");
        };
        assert_eq!(info.content_length, 50);
        assert_eq!(info.header("Cache-Control"), None);
        assert_eq!(drain(&mut job, 4096), 50);
        assert_eq!(job.position(), 150);
    }

    #[test]
    fn partial_range() {
        let mut job = JobMachine::new("/www/a.txt");
        job.set_range_header("bytes=10-19").unwrap();
        open(&mut job, plain("/www/a.txt"));
        assert!(matches!(job.on_opened(Ok(50)), Action::Seek { offset: 10 }));
        let Action::HeadersComplete(info) = job.on_seeked(Ok(10)) else {
            panic!("expected headers");
        };
        assert_eq!(info.content_length, 10);
        assert_eq!(drain(&mut job, 3), 10);
    }

    #[test]
    fn empty_read_keeps_streaming() {
        let mut job = JobMachine::new("/www/a.txt");
        open(&mut job, plain("/www/a.txt"));
        assert!(matches!(job.on_opened(Ok(50)), Action::HeadersComplete(_)));

        assert!(matches!(job.read(0), Action::ReadComplete { bytes: 0 }));
        assert_eq!(job.state(), JobState::Streaming);
        assert_eq!(job.remaining(), 50);
        assert_eq!(drain(&mut job, 7), 50);
        assert_eq!(job.state(), JobState::Completed);
    }

    #[test]
    fn unsatisfiable_range_never_seeks() {
        let mut job = JobMachine::new("/www/a.txt");
        job.set_range_header("bytes=60-70").unwrap();
        open(&mut job, plain("/www/a.txt"));
        match job.on_opened(Ok(50)) {
            Action::Fail(JobError::RangeNotSatisfiable(RangeError::Unsatisfiable {
                total_length: 50,
            })) => {}
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(job.state(), JobState::Errored);
        assert!(matches!(job.read(10), Action::Idle));
    }

    #[test]
    fn range_header_only_before_start() {
        let mut job = JobMachine::new("/www/a.txt");
        job.start();
        assert!(job.set_range_header("bytes=0-1").is_err());
        assert_eq!(job.state(), JobState::Initializing);
    }

    #[test]
    fn open_failure_is_not_found() {
        let mut job = JobMachine::new("/www/a.txt");
        open(&mut job, plain("/www/a.txt"));
        let action = job.on_opened(Err(io::ErrorKind::PermissionDenied.into()));
        assert!(matches!(action, Action::Fail(JobError::NotFound(_))));
    }

    #[test]
    fn entry_beyond_container() {
        let mut job = JobMachine::new("/res/archive.asar/sub/file.txt");
        open(&mut job, archive_entry(100, 50));
        assert!(matches!(
            job.on_opened(Ok(120)),
            Action::Fail(JobError::ArchiveUnreadable(ArchiveError::OutOfBounds { .. }))
        ));
    }

    #[test]
    fn resolution_failures() {
        let mut job = JobMachine::new("/nope");
        job.start();
        assert!(matches!(
            job.on_resolved(Err(JobError::NotFound("/nope".into()))),
            Action::Fail(JobError::NotFound(_))
        ));

        let mut job = JobMachine::new("/nope");
        job.start();
        let resolution = Resolution {
            target: ResolvedTarget::NotFound,
            mime_type: None,
            redirect: None,
        };
        assert!(matches!(
            job.on_resolved(Ok(resolution)),
            Action::Fail(JobError::NotFound(_))
        ));
    }

    #[test]
    fn redirect_completes() {
        let mut job = JobMachine::new("/desk/App.lnk");
        job.start();
        let resolution = Resolution {
            target: ResolvedTarget::PlainFile("/desk/App.lnk".into()),
            mime_type: None,
            redirect: Some("/apps/app.exe".into()),
        };
        let Action::Redirect(info) = job.on_resolved(Ok(resolution)) else {
            panic!("expected redirect");
        };
        assert_eq!(info.status, 301);
        assert_eq!(info.header("Location"), Some("file:///apps/app.exe"));
        assert_eq!(job.state(), JobState::Completed);
    }

    #[test]
    fn over_delivery_is_fatal() {
        let mut job = JobMachine::new("/www/a.txt");
        open(&mut job, plain("/www/a.txt"));
        job.on_opened(Ok(8));
        assert!(matches!(job.read(4), Action::Read { len: 4 }));
        assert!(matches!(
            job.on_read(Ok(5)),
            Action::Fail(JobError::InternalInvariantViolation(_))
        ));
        assert_eq!(job.state(), JobState::Errored);
    }

    #[test]
    fn short_source_is_io_failure() {
        let mut job = JobMachine::new("/www/a.txt");
        open(&mut job, plain("/www/a.txt"));
        job.on_opened(Ok(8));
        job.read(8);
        assert!(matches!(job.on_read(Ok(0)), Action::Fail(JobError::IoFailure(_))));
    }

    #[test]
    fn reads_are_clamped() {
        let mut job = JobMachine::new("/www/a.txt");
        open(&mut job, plain("/www/a.txt"));
        job.on_opened(Ok(5));
        assert!(matches!(job.read(4096), Action::Read { len: 5 }));
        assert!(matches!(job.read(1), Action::Fail(_)));
    }

    #[test]
    fn empty_content() {
        let mut job = JobMachine::new("/www/empty");
        open(&mut job, plain("/www/empty"));
        let Action::HeadersComplete(info) = job.on_opened(Ok(0)) else {
            panic!("expected headers");
        };
        assert_eq!(info.content_length, 0);
        assert!(matches!(job.read(10), Action::EndOfStream));
    }

    #[test]
    fn kill_silences_every_state() {
        let mut job = JobMachine::new("/www/a.txt");
        job.kill();
        assert!(matches!(job.start(), Action::Idle));

        let mut job = JobMachine::new("/www/a.txt");
        job.start();
        job.kill();
        assert!(matches!(job.on_resolved(plain("/www/a.txt")), Action::Idle));

        let mut job = JobMachine::new("/www/a.txt");
        open(&mut job, plain("/www/a.txt"));
        job.on_opened(Ok(50));
        job.read(10);
        job.kill();
        assert!(matches!(job.on_read(Ok(10)), Action::Idle));
        assert!(matches!(job.read(10), Action::Idle));
        assert!(matches!(job.fail(JobError::invariant("late")), Action::Idle));
        assert_eq!(job.state(), JobState::Killed);
    }
}
