use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::context::ServeContext;
use crate::error::JobError;
use crate::response::ResponseInfo;

use super::job::{JobEvent, JobEvents, ReadOutcome, VirtualFileJob};

/// Read size requested per streaming step.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// A fully buffered response.
#[derive(Debug)]
pub struct Response {
    pub info: ResponseInfo,
    pub body: Vec<u8>,
}

/// Serve `path` into memory.
pub async fn fetch(
    context: Arc<ServeContext>,
    path: impl Into<PathBuf>,
    range: Option<&str>,
) -> Result<Response, JobError> {
    let mut body = Vec::new();
    let info = stream_to(context, path, range, &mut body).await?;
    Ok(Response { info, body })
}

/// Serve `path`, writing the body to `writer` as it streams.
///
/// Returns the response headers once the body is complete. Redirects have no
/// body.
pub async fn stream_to<W>(
    context: Arc<ServeContext>,
    path: impl Into<PathBuf>,
    range: Option<&str>,
    writer: &mut W,
) -> Result<ResponseInfo, JobError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let (job, mut events) = VirtualFileJob::new(context, path);
    if let Some(range) = range {
        job.set_range_header(range)?;
    }
    job.start();

    let info = match events.recv().await {
        Some(JobEvent::HeadersComplete(info)) => info,
        Some(JobEvent::Redirect(info)) => return Ok(info),
        Some(JobEvent::Failed(e)) => return Err(e),
        Some(JobEvent::ReadComplete(_)) | None => {
            return Err(JobError::invariant("job produced data before headers"));
        }
    };

    loop {
        match job.read(READ_CHUNK_SIZE) {
            ReadOutcome::Pending => {}
            ReadOutcome::EndOfStream => break,
            ReadOutcome::Closed => return Err(closed_reason(&mut events)),
        }
        match events.recv().await {
            Some(JobEvent::ReadComplete(bytes)) => writer.write_all(&bytes).await?,
            Some(JobEvent::Failed(e)) => return Err(e),
            _ => return Err(JobError::invariant("unexpected job event while streaming")),
        }
    }
    writer.flush().await?;
    Ok(info)
}

fn closed_reason(events: &mut JobEvents) -> JobError {
    match events.try_recv() {
        Ok(JobEvent::Failed(e)) => e,
        _ => JobError::invariant("job closed while streaming"),
    }
}
