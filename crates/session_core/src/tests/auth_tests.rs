use super::*;
use crate::{
    error::SessionError,
    loopback::{LoopbackSession, LoopbackState},
};

#[test]
fn shutdown_states_collapse_to_logged_out() {
    for state in [
        AuthorizationState::LoggingOut,
        AuthorizationState::Closing,
        AuthorizationState::Closed,
    ] {
        assert_eq!(AuthState::from(state), AuthState::LoggedOut);
    }
    assert_eq!(
        AuthState::from(AuthorizationState::WaitCode),
        AuthState::WaitCode
    );
}

#[tokio::test]
async fn full_login_walks_phone_code_and_password() {
    let mut state = LoopbackState::new();
    state.password = Some("hunter2".into());
    let session = LoopbackSession::new(state);
    let handle = session.as_ref();

    assert_eq!(
        submit_step(handle, LoginStep::Phone, "+15550100").await.expect("phone"),
        StepOutcome::Submitted
    );
    assert_eq!(
        current_state(handle).await.expect("state"),
        AuthorizationState::WaitCode
    );
    assert_eq!(
        submit_step(handle, LoginStep::Code, "12345").await.expect("code"),
        StepOutcome::Submitted
    );
    assert_eq!(
        current_state(handle).await.expect("state"),
        AuthorizationState::WaitPassword
    );
    assert_eq!(
        submit_step(handle, LoginStep::Password, "hunter2")
            .await
            .expect("password"),
        StepOutcome::Submitted
    );
    assert_eq!(
        current_state(handle).await.expect("state"),
        AuthorizationState::Ready
    );
}

#[tokio::test]
async fn out_of_order_step_is_ignored_without_sending() {
    let session = LoopbackSession::new(LoopbackState::new());

    let outcome = submit_step(session.as_ref(), LoginStep::Code, "12345")
        .await
        .expect("no error");

    assert_eq!(
        outcome,
        StepOutcome::Ignored {
            current: AuthorizationState::WaitPhoneNumber
        }
    );
    assert_eq!(session.request_count("check_authentication_code"), 0);
    assert_eq!(session.state().auth_state, AuthorizationState::WaitPhoneNumber);
}

#[tokio::test]
async fn rejected_code_surfaces_backend_error() {
    let mut state = LoopbackState::new();
    state.auth_state = AuthorizationState::WaitCode;
    let session = LoopbackSession::new(state);

    let err = submit_step(session.as_ref(), LoginStep::Code, "00000")
        .await
        .err()
        .expect("rejected");

    assert!(matches!(err, SessionError::BackendError { code: 400, .. }));
    assert_eq!(session.state().auth_state, AuthorizationState::WaitCode);
}
