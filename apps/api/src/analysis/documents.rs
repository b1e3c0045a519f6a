//! Remote document handle management.
//!
//! Every handle obtained from the document service is owned by a
//! `DocumentLease` and is deleted exactly once when the lease is released.
//! A lease dropped without `release()` (cancellation, panic) schedules the
//! deletes on the current runtime instead of leaking the remote files.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use super::error::PipelineError;
use crate::llm_client::{DocumentService, DocumentState, LlmError, RemoteDocumentHandle};

pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Raw bytes to upload plus the name the provider will see.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub display_name: String,
    pub bytes: Bytes,
}

/// Uploads one document. With `max_wait`, polls until it leaves PROCESSING or
/// the wait budget runs out; on timeout the handle comes back still PROCESSING.
///
/// While polling, the handle is held by a one-document lease, so a poll
/// failure or a cancelled call releases it.
pub async fn upload(
    service: Arc<dyn DocumentService>,
    bytes: Bytes,
    display_name: &str,
    max_wait: Option<Duration>,
) -> Result<RemoteDocumentHandle, LlmError> {
    let handle = service.upload(bytes, display_name).await?;
    info!(
        "Uploaded '{}' as {} (state: {})",
        handle.display_name, handle.name, handle.state
    );
    let mut pending = DocumentLease {
        service: Arc::clone(&service),
        handles: vec![handle],
    };

    if let Some(max_wait) = max_wait {
        let polled = match pending.handles.last_mut() {
            Some(handle) => wait_until_processed(service.as_ref(), handle, max_wait).await,
            None => Ok(()),
        };
        if let Err(e) = polled {
            pending.release().await;
            return Err(e);
        }
    }
    pending.detach().pop().ok_or(LlmError::EmptyContent)
}

/// Polls every `POLL_INTERVAL` while the handle is PROCESSING, never past `max_wait`.
pub async fn wait_until_processed(
    service: &dyn DocumentService,
    handle: &mut RemoteDocumentHandle,
    max_wait: Duration,
) -> Result<(), LlmError> {
    let deadline = Instant::now() + max_wait;

    while handle.state == DocumentState::Processing {
        let now = Instant::now();
        if now >= deadline {
            warn!(
                "Document '{}' still PROCESSING after {:?}",
                handle.display_name, max_wait
            );
            break;
        }
        sleep(POLL_INTERVAL.min(deadline - now)).await;

        handle.state = service.get_status(handle).await?;
        debug!("Document '{}' state: {}", handle.display_name, handle.state);
    }
    Ok(())
}

/// Deletes a remote document. Never fails; the result is for logging only.
pub async fn release_handle(service: &dyn DocumentService, handle: &RemoteDocumentHandle) -> bool {
    match service.delete(handle).await {
        Ok(()) => {
            info!("Released remote document {} ('{}')", handle.name, handle.display_name);
            true
        }
        Err(e) => {
            warn!("Failed to release remote document {}: {e}", handle.name);
            false
        }
    }
}

/// An ordered batch of ACTIVE remote documents owned by one pipeline call.
pub struct DocumentLease {
    service: Arc<dyn DocumentService>,
    handles: Vec<RemoteDocumentHandle>,
}

impl DocumentLease {
    /// Uploads every document in order and waits for each one to become ACTIVE.
    ///
    /// The first document that fails to upload or does not reach ACTIVE aborts
    /// the batch: everything uploaded so far is released and the error names
    /// that document.
    pub async fn acquire(
        service: Arc<dyn DocumentService>,
        uploads: Vec<DocumentUpload>,
        max_wait: Duration,
    ) -> Result<Self, PipelineError> {
        let mut lease = DocumentLease {
            service: Arc::clone(&service),
            handles: Vec::with_capacity(uploads.len()),
        };

        for item in uploads {
            let handle = match upload(
                Arc::clone(&service),
                item.bytes,
                &item.display_name,
                Some(max_wait),
            )
            .await
            {
                Ok(handle) => handle,
                Err(e) => {
                    error!("Upload of '{}' failed: {e}", item.display_name);
                    lease.release().await;
                    return Err(PipelineError::Provider(e));
                }
            };

            let unusable = (!handle.is_usable()).then(|| PipelineError::DocumentProcessing {
                document: handle.display_name.clone(),
                state: handle.state,
            });
            lease.handles.push(handle);
            if let Some(err) = unusable {
                lease.release().await;
                return Err(err);
            }
        }

        Ok(lease)
    }

    pub fn handles(&self) -> &[RemoteDocumentHandle] {
        &self.handles
    }

    /// Deletes every handle in the lease. Returns how many deletes succeeded.
    pub async fn release(mut self) -> usize {
        let mut released = 0;
        // A handle leaves the lease before its delete starts; a cancelled
        // release hands only the untouched remainder to `Drop`.
        while !self.handles.is_empty() {
            let handle = self.handles.remove(0);
            if release_handle(self.service.as_ref(), &handle).await {
                released += 1;
            }
        }
        released
    }

    /// Hands the handles back to the caller without deleting them.
    fn detach(mut self) -> Vec<RemoteDocumentHandle> {
        std::mem::take(&mut self.handles)
    }
}

impl Drop for DocumentLease {
    fn drop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        let handles = std::mem::take(&mut self.handles);
        let service = Arc::clone(&self.service);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                warn!(
                    "Document lease dropped with {} live handle(s); releasing in background",
                    handles.len()
                );
                runtime.spawn(async move {
                    for handle in &handles {
                        release_handle(service.as_ref(), handle).await;
                    }
                });
            }
            Err(_) => error!(
                "Document lease dropped outside a runtime; {} remote document(s) not released",
                handles.len()
            ),
        }
    }
}
