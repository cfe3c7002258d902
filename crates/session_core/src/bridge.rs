//! Turns the backend's one-shot callbacks into awaitable results.

use shared::{
    domain::{AuthorizationState, ChatList},
    protocol::{
        BackendObject, BackendRequest, BasicGroupFullInfo, Chat, ChatFolder, Chats, File, Message,
        Messages, SupergroupFullInfo, User,
    },
};
use tokio::sync::oneshot;
use tracing::debug;

use crate::{
    error::{SessionError, SessionResult},
    SessionHandle,
};

/// Result of a single backend request, classified by shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(BackendObject),
    Failure { code: i32, message: String },
}

impl From<BackendObject> for Outcome {
    fn from(object: BackendObject) -> Self {
        match object {
            BackendObject::Error { code, message } => Outcome::Failure { code, message },
            other => Outcome::Success(other),
        }
    }
}

/// Payload types a successful outcome can be narrowed into.
pub trait FromBackendObject: Sized {
    const KIND: &'static str;

    /// Returns the object back when its shape does not match.
    fn from_object(object: BackendObject) -> Result<Self, BackendObject>;
}

/// Marker for requests answered with a bare acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack;

impl FromBackendObject for Ack {
    const KIND: &'static str = "ok";

    fn from_object(object: BackendObject) -> Result<Self, BackendObject> {
        match object {
            BackendObject::Ok => Ok(Ack),
            other => Err(other),
        }
    }
}

macro_rules! narrow_payload {
    ($ty:ty, $variant:ident, $kind:literal) => {
        impl FromBackendObject for $ty {
            const KIND: &'static str = $kind;

            fn from_object(object: BackendObject) -> Result<Self, BackendObject> {
                match object {
                    BackendObject::$variant(value) => Ok(value),
                    other => Err(other),
                }
            }
        }
    };
}

narrow_payload!(AuthorizationState, AuthorizationState, "authorization_state");
narrow_payload!(User, User, "user");
narrow_payload!(BasicGroupFullInfo, BasicGroupFullInfo, "basic_group_full_info");
narrow_payload!(SupergroupFullInfo, SupergroupFullInfo, "supergroup_full_info");
narrow_payload!(Chat, Chat, "chat");
narrow_payload!(Chats, Chats, "chats");
narrow_payload!(Message, Message, "message");
narrow_payload!(Messages, Messages, "messages");
narrow_payload!(Vec<ChatList>, ChatLists, "chat_lists");
narrow_payload!(ChatFolder, ChatFolder, "chat_folder");
narrow_payload!(File, File, "file");

/// Submits one request and waits for its single callback.
///
/// The callback owns the sending half of a oneshot channel, so a bridge is
/// bound to exactly one in-flight request. Performs no retries.
pub async fn submit(session: &dyn SessionHandle, request: BackendRequest) -> SessionResult<Outcome> {
    let name = request.name();
    let (tx, rx) = oneshot::channel();
    session.send(
        request,
        Box::new(move |object| {
            let _ = tx.send(object);
        }),
    );
    let object = rx.await.map_err(|_| SessionError::SessionClosed)?;
    debug!(request = name, result = object.kind(), "bridge: request resolved");
    Ok(Outcome::from(object))
}

/// Submits a request and narrows the success payload to `T`.
pub async fn call<T: FromBackendObject>(
    session: &dyn SessionHandle,
    request: BackendRequest,
) -> SessionResult<T> {
    match submit(session, request).await? {
        Outcome::Success(object) => {
            T::from_object(object).map_err(|other| SessionError::UnexpectedResult {
                expected: T::KIND,
                actual: other.kind(),
            })
        }
        Outcome::Failure { code, message } => Err(SessionError::BackendError { code, message }),
    }
}

#[cfg(test)]
#[path = "tests/bridge_tests.rs"]
mod tests;
