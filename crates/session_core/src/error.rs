use shared::{
    domain::{AccountId, ChatId},
    error::{ApiError, ErrorCode},
};
use thiserror::Error;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no session registered for account {account}")]
    SessionNotFound { account: AccountId },
    #[error("backend error {code}: {message}")]
    BackendError { code: i32, message: String },
    #[error("unexpected backend result: expected {expected}, got {actual}")]
    UnexpectedResult {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("session closed before the request was answered")]
    SessionClosed,
    #[error("retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
    #[error("no suitable photo size for chat {chat}")]
    NoSuitablePhotoSize { chat: ChatId },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Image {
        context: String,
        #[source]
        source: image::ImageError,
    },
    #[error("operation timed out")]
    Timeout,
    #[error("failed to resolve session credentials: {0}")]
    Credentials(#[source] anyhow::Error),
    #[error("failed to open backend session: {0}")]
    Connect(#[source] anyhow::Error),
    #[error("invalid chat list selector: {0}")]
    InvalidSelector(String),
    #[error("background task failed: {0}")]
    Task(#[source] tokio::task::JoinError),
}

impl SessionError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn image(context: impl Into<String>, source: image::ImageError) -> Self {
        Self::Image {
            context: context.into(),
            source,
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(value: SessionError) -> Self {
        let code = match &value {
            SessionError::SessionNotFound { .. } => ErrorCode::Unauthorized,
            SessionError::BackendError { .. } | SessionError::UnexpectedResult { .. } => {
                ErrorCode::Upstream
            }
            SessionError::NoSuitablePhotoSize { .. } => ErrorCode::NotFound,
            SessionError::InvalidSelector(_) => ErrorCode::Validation,
            SessionError::RetriesExhausted { .. } | SessionError::Timeout => ErrorCode::Timeout,
            SessionError::SessionClosed
            | SessionError::Io { .. }
            | SessionError::Image { .. }
            | SessionError::Credentials(_)
            | SessionError::Connect(_)
            | SessionError::Task(_) => ErrorCode::Internal,
        };
        if let SessionError::BackendError {
            code: backend_code,
            message,
        } = value
        {
            return ApiError::new(code, message).with_backend_code(backend_code);
        }
        ApiError::new(code, value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_message_passes_through_verbatim() {
        let api: ApiError = SessionError::BackendError {
            code: 400,
            message: "CHAT_NOT_FOUND".into(),
        }
        .into();
        assert_eq!(api.code, ErrorCode::Upstream);
        assert_eq!(api.message, "CHAT_NOT_FOUND");
        assert_eq!(api.backend_code, Some(400));
    }

    #[test]
    fn missing_session_maps_to_unauthorized() {
        let api: ApiError = SessionError::SessionNotFound {
            account: AccountId(7),
        }
        .into();
        assert_eq!(api.code, ErrorCode::Unauthorized);
        assert!(api.message.contains('7'));
    }
}
