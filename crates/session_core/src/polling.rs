use std::{future::Future, time::Duration};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use shared::{
    domain::FileId,
    protocol::{BackendRequest, File},
};
use tracing::{debug, warn};

use crate::{
    bridge,
    error::{SessionError, SessionResult},
    SessionHandle,
};

const DOWNLOAD_PRIORITY: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollBudget {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl PollBudget {
    pub const fn new(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            delay_ms,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// The initial fetch does not count against `budget.max_attempts`. The trigger
/// runs at most once and only its acknowledgement is awaited.
pub async fn poll_until<T, F, Fut, P>(
    label: &str,
    mut fetch: F,
    is_complete: P,
    trigger: Option<BoxFuture<'_, SessionResult<()>>>,
    budget: PollBudget,
) -> SessionResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SessionResult<T>>,
    P: Fn(&T) -> bool,
{
    let state = fetch().await?;
    if is_complete(&state) {
        return Ok(state);
    }

    if let Some(trigger) = trigger {
        debug!(target_label = label, "poll: starting background operation");
        trigger.await?;
    }

    for attempt in 1..=budget.max_attempts {
        tokio::time::sleep(budget.delay()).await;
        let state = fetch().await?;
        if is_complete(&state) {
            debug!(
                target_label = label,
                attempt,
                max_attempts = budget.max_attempts,
                "poll: completed"
            );
            return Ok(state);
        }
        debug!(
            target_label = label,
            attempt,
            max_attempts = budget.max_attempts,
            "poll: not complete yet"
        );
    }

    warn!(
        target_label = label,
        max_attempts = budget.max_attempts,
        "poll: retries exhausted"
    );
    Err(SessionError::RetriesExhausted {
        attempts: budget.max_attempts,
    })
}

pub async fn await_download(
    session: &dyn SessionHandle,
    file_id: FileId,
    budget: PollBudget,
) -> SessionResult<File> {
    let trigger: BoxFuture<'_, SessionResult<()>> = Box::pin(async move {
        bridge::call::<File>(
            session,
            BackendRequest::DownloadFile {
                file_id,
                priority: DOWNLOAD_PRIORITY,
            },
        )
        .await
        .map(|_| ())
    });
    poll_until(
        "file_download",
        move || bridge::call::<File>(session, BackendRequest::GetFile { file_id }),
        File::is_downloaded,
        Some(trigger),
        budget,
    )
    .await
}

pub async fn await_upload(
    session: &dyn SessionHandle,
    file_id: FileId,
    budget: PollBudget,
) -> SessionResult<File> {
    poll_until(
        "file_upload",
        move || bridge::call::<File>(session, BackendRequest::GetFile { file_id }),
        File::is_uploaded,
        None,
        budget,
    )
    .await
}

#[cfg(test)]
#[path = "tests/polling_tests.rs"]
mod tests;
