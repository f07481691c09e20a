use std::future::Future;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::AbortHandle;

use crate::compression::{GzipFilter, is_gzip_variant};
use crate::context::ServeContext;
use crate::core::{Action, JobMachine, JobState, Resolution};
use crate::error::JobError;
use crate::integrity::{IntegrityError, IntegrityValidator};
use crate::response::ResponseInfo;

/// Caller-visible notifications from a job.
#[derive(Debug)]
pub enum JobEvent {
    /// Headers are known; reads may be issued.
    HeadersComplete(ResponseInfo),
    /// The path is a shortcut; the job is complete.
    Redirect(ResponseInfo),
    /// Bytes for the outstanding read.
    ReadComplete(Vec<u8>),
    /// The job failed. No further events follow.
    Failed(JobError),
}

/// Receiving half of a job's event channel.
///
/// Once the job is killed nothing more is yielded, including events that
/// were queued before the kill but not yet received.
#[derive(Debug)]
pub struct JobEvents {
    rx: mpsc::UnboundedReceiver<JobEvent>,
    killed: Arc<AtomicBool>,
}

impl JobEvents {
    /// Wait for the next event. `None` once the job is killed, dropped or
    /// has nothing more to say.
    pub async fn recv(&mut self) -> Option<JobEvent> {
        if self.is_killed() {
            return None;
        }
        let event = self.rx.recv().await?;
        if self.is_killed() {
            return None;
        }
        Some(event)
    }

    pub fn try_recv(&mut self) -> Result<JobEvent, TryRecvError> {
        if self.is_killed() {
            return Err(TryRecvError::Disconnected);
        }
        let event = self.rx.try_recv()?;
        if self.is_killed() {
            return Err(TryRecvError::Disconnected);
        }
        Ok(event)
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }
}

/// Result of asking a job for more bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The bytes will arrive as a [`JobEvent::ReadComplete`].
    Pending,
    /// Nothing remains. The source was not touched.
    EndOfStream,
    /// The job is finished, failed or killed and will not read.
    Closed,
}

struct Inner {
    machine: JobMachine,
    /// Dropped on kill so a pending `recv` wakes up.
    events: Option<mpsc::UnboundedSender<JobEvent>>,
    source: Option<File>,
    filter: Option<GzipFilter>,
    validator: Option<IntegrityValidator>,
    verify_to_end: bool,
    pending: Option<AbortHandle>,
    read_len: usize,
}

struct Shared {
    context: Arc<ServeContext>,
    killed: Arc<AtomicBool>,
    /// Bumped by `kill`; completions carrying an older value are dropped.
    generation: AtomicU64,
    inner: Mutex<Inner>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Inner {
    fn send(&self, event: JobEvent) {
        // The receiver may have been dropped; the job then runs to completion unobserved.
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

/// Tokio frontend driving a [`JobMachine`].
///
/// Every operation the machine asks for runs as a spawned task holding only a
/// weak reference to the job and the generation it was issued under. At most
/// one such task is outstanding. Results are reported on the [`JobEvents`]
/// channel returned by [`new`](Self::new).
///
/// Dropping the job kills it.
///
/// Methods that issue operations must be called within a tokio runtime.
pub struct VirtualFileJob {
    shared: Arc<Shared>,
}

impl VirtualFileJob {
    pub fn new(context: Arc<ServeContext>, path: impl Into<PathBuf>) -> (VirtualFileJob, JobEvents) {
        let (events, rx) = mpsc::unbounded_channel();
        let killed = Arc::new(AtomicBool::new(false));
        let shared = Arc::new(Shared {
            context,
            killed: Arc::clone(&killed),
            generation: AtomicU64::new(0),
            inner: Mutex::new(Inner {
                machine: JobMachine::new(path),
                events: Some(events),
                source: None,
                filter: None,
                validator: None,
                verify_to_end: false,
                pending: None,
                read_len: 0,
            }),
        });
        (VirtualFileJob { shared }, JobEvents { rx, killed })
    }

    /// Stash the request's `Range` header. Only valid before [`start`](Self::start).
    pub fn set_range_header(&self, value: impl Into<String>) -> Result<(), JobError> {
        self.shared.lock().machine.set_range_header(value)
    }

    /// Begin resolution.
    pub fn start(&self) {
        let mut inner = self.shared.lock();
        let action = inner.machine.start();
        dispatch(&self.shared, &mut inner, action);
    }

    /// Ask for up to `max` more bytes.
    pub fn read(&self, max: usize) -> ReadOutcome {
        let mut inner = self.shared.lock();
        inner.read_len = max;
        match inner.machine.read(max) {
            action @ Action::Read { .. } => {
                dispatch(&self.shared, &mut inner, action);
                ReadOutcome::Pending
            }
            Action::EndOfStream => {
                inner.source = None;
                ReadOutcome::EndOfStream
            }
            Action::ReadComplete { .. } => {
                inner.send(JobEvent::ReadComplete(Vec::new()));
                ReadOutcome::Pending
            }
            action => {
                dispatch(&self.shared, &mut inner, action);
                ReadOutcome::Closed
            }
        }
    }

    /// Cancel the job. No event is delivered after this returns, queued or not.
    pub fn kill(&self) {
        let mut inner = self.shared.lock();
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        self.shared.killed.store(true, Ordering::Release);
        inner.events = None;
        if let Some(pending) = inner.pending.take() {
            pending.abort();
        }
        inner.source = None;
        inner.filter = None;
        inner.validator = None;
        inner.machine.kill();
    }

    pub fn state(&self) -> JobState {
        self.shared.lock().machine.state()
    }

    /// Bytes of the negotiated range not yet read from the source.
    pub fn remaining(&self) -> u64 {
        self.shared.lock().machine.remaining()
    }

    pub fn path(&self) -> PathBuf {
        self.shared.lock().machine.path().to_path_buf()
    }
}

impl Drop for VirtualFileJob {
    fn drop(&mut self) {
        self.kill();
    }
}

impl std::fmt::Debug for VirtualFileJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("VirtualFileJob")
            .field("path", &inner.machine.path())
            .field("state", &inner.machine.state())
            .field("remaining", &inner.machine.remaining())
            .finish()
    }
}

/// Run `op` as a task whose output is handed to `resume` under the job lock,
/// unless the job was killed or dropped in the meantime.
fn spawn_op<T, F>(
    shared: &Arc<Shared>,
    inner: &mut Inner,
    op: F,
    resume: fn(&Arc<Shared>, &mut Inner, T),
) where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let weak: Weak<Shared> = Arc::downgrade(shared);
    let generation = shared.generation.load(Ordering::Acquire);
    let handle = tokio::spawn(async move {
        let output = op.await;
        let Some(shared) = weak.upgrade() else {
            return;
        };
        let mut inner = shared.lock();
        if shared.generation.load(Ordering::Acquire) != generation {
            tracing::trace!("discarding completion for killed job");
            return;
        }
        inner.pending = None;
        resume(&shared, &mut inner, output);
    });
    inner.pending = Some(handle.abort_handle());
}

fn dispatch(shared: &Arc<Shared>, inner: &mut Inner, action: Action) {
    match action {
        Action::Resolve { path } => {
            let context = Arc::clone(&shared.context);
            spawn_op(
                shared,
                inner,
                async move {
                    tokio::task::spawn_blocking(move || context.resolve(&path))
                        .await
                        .map_err(|e| JobError::invariant(format!("resolver task failed: {e}")))
                        .and_then(|result| result)
                },
                resume_resolved,
            );
        }
        Action::Open { path } => {
            spawn_op(shared, inner, open_source(path), resume_opened);
        }
        Action::Seek { offset } => {
            let Some(mut file) = inner.source.take() else {
                let action = inner.machine.fail(JobError::invariant("seek without a source"));
                return dispatch(shared, inner, action);
            };
            spawn_op(
                shared,
                inner,
                async move {
                    let result = file.seek(SeekFrom::Start(offset)).await;
                    (file, result)
                },
                resume_seeked,
            );
        }
        Action::Read { len } => {
            let Some(mut file) = inner.source.take() else {
                let action = inner.machine.fail(JobError::invariant("read without a source"));
                return dispatch(shared, inner, action);
            };
            spawn_op(
                shared,
                inner,
                async move {
                    let mut buf = vec![0; len];
                    let result = file.read(&mut buf).await.map(|n| {
                        buf.truncate(n);
                        buf
                    });
                    (file, result)
                },
                resume_read,
            );
        }
        Action::HeadersComplete(info) => {
            prepare_stream(shared, inner);
            inner.send(JobEvent::HeadersComplete(info));
        }
        Action::Redirect(info) => {
            inner.send(JobEvent::Redirect(info));
        }
        Action::Fail(err) => {
            inner.source = None;
            inner.filter = None;
            inner.validator = None;
            inner.send(JobEvent::Failed(err));
        }
        Action::ReadComplete { .. } | Action::EndOfStream | Action::Idle => {}
    }
}

async fn open_source(path: PathBuf) -> std::io::Result<(File, u64)> {
    let file = File::open(&path).await?;
    let len = file.metadata().await?.len();
    Ok((file, len))
}

fn resume_resolved(shared: &Arc<Shared>, inner: &mut Inner, result: Result<Resolution, JobError>) {
    let action = inner.machine.on_resolved(result);
    dispatch(shared, inner, action);
}

fn resume_opened(shared: &Arc<Shared>, inner: &mut Inner, result: std::io::Result<(File, u64)>) {
    let action = match result {
        Ok((file, len)) => {
            inner.source = Some(file);
            inner.machine.on_opened(Ok(len))
        }
        Err(e) => inner.machine.on_opened(Err(e)),
    };
    dispatch(shared, inner, action);
}

fn resume_seeked(shared: &Arc<Shared>, inner: &mut Inner, (file, result): (File, std::io::Result<u64>)) {
    inner.source = Some(file);
    let action = inner.machine.on_seeked(result);
    dispatch(shared, inner, action);
}

fn resume_read(
    shared: &Arc<Shared>,
    inner: &mut Inner,
    (file, result): (File, std::io::Result<Vec<u8>>),
) {
    inner.source = Some(file);
    let (data, action) = match result {
        Ok(data) => {
            let action = inner.machine.on_read(Ok(data.len()));
            (data, action)
        }
        Err(e) => (Vec::new(), inner.machine.on_read(Err(e))),
    };
    if !matches!(action, Action::ReadComplete { .. }) {
        return dispatch(shared, inner, action);
    }

    let finished = inner.machine.remaining() == 0;
    let output = match deliver(inner, data, finished) {
        Ok(output) => output,
        Err(e) => {
            if let JobError::IntegrityViolation(err, path) = &e {
                tracing::warn!(path = %path.display(), error = %err, "integrity check failed");
            }
            let action = inner.machine.fail(e);
            return dispatch(shared, inner, action);
        }
    };

    // A decoder may swallow a whole chunk; keep reading until it yields.
    if output.is_empty() && !finished {
        let len = inner.read_len;
        let action = inner.machine.read(len);
        return dispatch(shared, inner, action);
    }
    inner.send(JobEvent::ReadComplete(output));
}

/// Decide which integrity check and decoder apply once the range is known.
fn prepare_stream(shared: &Shared, inner: &mut Inner) {
    let options = shared.context.options();
    let (Some(target), Some(range)) = (inner.machine.target(), inner.machine.range()) else {
        return;
    };

    inner.validator = match target.integrity() {
        Some(integrity) if options.verify_integrity && range.first() == 0 => {
            Some(IntegrityValidator::new(integrity.clone()))
        }
        _ => None,
    };
    inner.verify_to_end = range.is_full();

    // A slice of a gzip stream cannot be decoded, so partial ranges go out raw.
    inner.filter = match target.file_name() {
        Some(name)
            if options.decompress_gzip_variants && range.is_full() && is_gzip_variant(name) =>
        {
            Some(GzipFilter::new())
        }
        _ => None,
    };
}

/// Pass freshly read bytes through the validator and decoder.
fn deliver(inner: &mut Inner, data: Vec<u8>, finished: bool) -> Result<Vec<u8>, JobError> {
    let path = inner.machine.path().to_path_buf();
    let violation = |e: IntegrityError| JobError::IntegrityViolation(e, path.clone());

    if let Some(validator) = inner.validator.as_mut() {
        validator.update(&data).map_err(&violation)?;
    }
    if finished
        && let Some(validator) = inner.validator.take()
        && inner.verify_to_end
    {
        validator.finish().map_err(&violation)?;
    }

    let Some(filter) = inner.filter.as_mut() else {
        return Ok(data);
    };
    let mut output = filter.push(&data)?;
    if finished {
        output.extend(filter.finish()?);
    }
    Ok(output)
}
