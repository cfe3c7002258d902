use chrono::{DateTime, Utc};
use shared::{
    domain::{ChatId, MessageId},
    protocol::{BackendRequest, Chat, Message},
};
use tracing::debug;

use crate::{bridge, error::SessionResult, SessionHandle};

/// Last outgoing message the counterpart has read, with its resolved date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadWatermark {
    pub message_id: MessageId,
    pub date: DateTime<Utc>,
}

/// Marks outgoing messages read when they are not newer than the watermark.
/// Returns how many were marked.
pub fn mark_outbound_read(messages: &mut [Message], watermark: &ReadWatermark) -> usize {
    let mut marked = 0;
    for message in messages.iter_mut().filter(|message| message.is_outgoing) {
        message.is_read = message.date <= watermark.date;
        if message.is_read {
            marked += 1;
        }
    }
    marked
}

/// Fetches the chat's outbound read watermark. `None` when the chat has no
/// watermark or no last message.
pub async fn resolve_watermark(
    session: &dyn SessionHandle,
    chat_id: ChatId,
) -> SessionResult<Option<ReadWatermark>> {
    let chat: Chat = bridge::call(session, BackendRequest::GetChat { chat_id }).await?;
    let message_id = chat.last_read_outbox_message_id;
    if !message_id.is_set() || chat.last_message.is_none() {
        return Ok(None);
    }
    let message: Message = bridge::call(
        session,
        BackendRequest::GetMessage {
            chat_id,
            message_id,
        },
    )
    .await?;
    Ok(Some(ReadWatermark {
        message_id,
        date: message.date,
    }))
}

pub async fn reconcile_outbound(
    session: &dyn SessionHandle,
    chat_id: ChatId,
    messages: &mut [Message],
) -> SessionResult<()> {
    let Some(watermark) = resolve_watermark(session, chat_id).await? else {
        debug!(chat_id = chat_id.0, "reconcile: no outbound watermark; skipping");
        return Ok(());
    };
    let marked = mark_outbound_read(messages, &watermark);
    debug!(
        chat_id = chat_id.0,
        watermark = watermark.message_id.0,
        marked,
        "reconcile: outbound read status applied"
    );
    Ok(())
}

#[cfg(test)]
#[path = "tests/reconcile_tests.rs"]
mod tests;
