use serde::{Deserialize, Serialize};
use shared::{domain::AuthorizationState, protocol::BackendRequest};
use tracing::{debug, info};

use crate::{
    bridge::{self, Ack},
    error::SessionResult,
    SessionHandle,
};

/// Caller-facing login state. The backend's shutdown states collapse into `LoggedOut`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    WaitPhoneNumber,
    WaitCode,
    WaitPassword,
    Ready,
    LoggedOut,
}

impl From<AuthorizationState> for AuthState {
    fn from(state: AuthorizationState) -> Self {
        match state {
            AuthorizationState::WaitPhoneNumber => AuthState::WaitPhoneNumber,
            AuthorizationState::WaitCode => AuthState::WaitCode,
            AuthorizationState::WaitPassword => AuthState::WaitPassword,
            AuthorizationState::Ready => AuthState::Ready,
            AuthorizationState::LoggingOut
            | AuthorizationState::Closing
            | AuthorizationState::Closed => AuthState::LoggedOut,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStep {
    Phone,
    Code,
    Password,
}

impl LoginStep {
    /// Backend state in which this step is accepted.
    pub fn expected_state(self) -> AuthorizationState {
        match self {
            LoginStep::Phone => AuthorizationState::WaitPhoneNumber,
            LoginStep::Code => AuthorizationState::WaitCode,
            LoginStep::Password => AuthorizationState::WaitPassword,
        }
    }

    fn request(self, value: String) -> BackendRequest {
        match self {
            LoginStep::Phone => BackendRequest::SetAuthenticationPhoneNumber {
                phone_number: value,
            },
            LoginStep::Code => BackendRequest::CheckAuthenticationCode { code: value },
            LoginStep::Password => BackendRequest::CheckAuthenticationPassword { password: value },
        }
    }

    fn name(self) -> &'static str {
        match self {
            LoginStep::Phone => "phone",
            LoginStep::Code => "code",
            LoginStep::Password => "password",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Submitted,
    /// The session was not waiting for this step; nothing was sent.
    Ignored { current: AuthorizationState },
}

pub async fn current_state(session: &dyn SessionHandle) -> SessionResult<AuthorizationState> {
    bridge::call(session, BackendRequest::GetAuthorizationState).await
}

/// Submits one login step if the session is waiting for it, otherwise leaves
/// the flow untouched.
pub async fn submit_step(
    session: &dyn SessionHandle,
    step: LoginStep,
    value: impl Into<String>,
) -> SessionResult<StepOutcome> {
    let current = current_state(session).await?;
    if current != step.expected_state() {
        debug!(
            step = step.name(),
            ?current,
            "auth: step does not match current state; ignoring"
        );
        return Ok(StepOutcome::Ignored { current });
    }
    bridge::call::<Ack>(session, step.request(value.into())).await?;
    info!(step = step.name(), "auth: step submitted");
    Ok(StepOutcome::Submitted)
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
