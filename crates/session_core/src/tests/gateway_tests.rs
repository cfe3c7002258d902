use super::*;
use crate::{
    config::Settings,
    fixtures,
    loopback::{LoopbackFactory, LoopbackState},
    staging::TempDirStaging,
    ConnectionParams, ResultCallback, SessionHandle, SessionRegistry,
};
use async_trait::async_trait;
use shared::protocol::{BackendObject, BackendRequest, InputMessageContent};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

const ACCOUNT: AccountId = AccountId(1);

struct StaticCredentials;

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn connection_params(&self, account: AccountId) -> anyhow::Result<ConnectionParams> {
        Ok(ConnectionParams {
            account,
            api_id: 1,
            api_hash: "hash".into(),
            data_dir: PathBuf::from("/tmp/gateway"),
        })
    }
}

/// Accepts requests and only answers them when told to.
#[derive(Default)]
struct SilentSession {
    parked: Mutex<Vec<ResultCallback>>,
    sent_paths: Mutex<Vec<String>>,
}

impl SilentSession {
    fn sent_paths(&self) -> Vec<String> {
        self.sent_paths
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn answer_all(&self, object: BackendObject) {
        let parked: Vec<ResultCallback> = self
            .parked
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .drain(..)
            .collect();
        for callback in parked {
            callback(object.clone());
        }
    }
}

impl SessionHandle for SilentSession {
    fn send(&self, request: BackendRequest, callback: ResultCallback) {
        if let BackendRequest::SendMessage {
            content: InputMessageContent::Document { path, .. },
            ..
        } = &request
        {
            self.sent_paths
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(path.clone());
        }
        self.parked
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(callback);
    }

    fn close(&self) {}
}

#[derive(Default)]
struct SilentFactory(Arc<SilentSession>);

#[async_trait]
impl SessionFactory for SilentFactory {
    async fn create(&self, _params: ConnectionParams) -> anyhow::Result<Arc<dyn SessionHandle>> {
        Ok(self.0.clone())
    }
}

fn gateway(settings: Settings) -> Gateway {
    let views = ChatViews::new(
        SessionRegistry::new(),
        Arc::new(TempDirStaging::default()),
        settings,
    );
    Gateway::new(views).expect("gateway")
}

fn seeded_state() -> LoopbackState {
    let mut state = LoopbackState::new().signed_in(fixtures::user(1, "Me"));
    state.add_chat(fixtures::private_chat(10), &[ChatList::Main]);
    state.add_chat(fixtures::private_chat(20), &[ChatList::Archive]);
    state
}

#[test]
fn blocking_calls_resolve_through_the_runtime() {
    let gateway = gateway(Settings::default());
    let factory = LoopbackFactory::new(seeded_state(), 1, 1);
    gateway
        .open_session(ACCOUNT, &StaticCredentials, &factory)
        .expect("open");

    let chats = gateway
        .list_chats_by_selector("archive", 10, ACCOUNT)
        .expect("archive");

    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].chat.id, ChatId(20));
    assert_eq!(
        gateway.auth_state(ACCOUNT).expect("state"),
        AuthState::Ready
    );
}

#[test]
fn bad_selector_is_rejected_before_any_lookup() {
    let gateway = gateway(Settings::default());

    let err = gateway
        .list_chats_by_selector("pinned", 10, ACCOUNT)
        .err()
        .expect("invalid");

    assert!(matches!(err, SessionError::InvalidSelector(_)));
}

#[test]
fn missing_session_surfaces_without_blocking() {
    let gateway = gateway(Settings::default());

    let err = gateway.history(ChatId(1), 50, ACCOUNT).err().expect("no session");

    assert!(matches!(err, SessionError::SessionNotFound { .. }));
}

#[test]
fn configured_timeout_bounds_unanswered_calls() {
    let settings = Settings {
        call_timeout_ms: Some(20),
        ..Settings::default()
    };
    let gateway = gateway(settings);
    assert_eq!(gateway.timeout(), Some(Duration::from_millis(20)));
    gateway
        .open_session(ACCOUNT, &StaticCredentials, &SilentFactory::default())
        .expect("open");

    let err = gateway
        .send_text(ChatId(10), "anyone there?", ACCOUNT)
        .err()
        .expect("timed out");

    assert!(matches!(err, SessionError::Timeout));
}

#[test]
fn timed_out_send_leaves_staged_file_for_the_backend() {
    let staging_dir = tempfile::tempdir().expect("tempdir");
    let settings = Settings {
        call_timeout_ms: Some(50),
        staged_cleanup_delay_ms: 1,
        ..Settings::default()
    };
    let views = ChatViews::new(
        SessionRegistry::new(),
        Arc::new(TempDirStaging::new(Some(staging_dir.path().to_path_buf()))),
        settings,
    );
    let gateway = Gateway::new(views).expect("gateway");
    let session = Arc::new(SilentSession::default());
    gateway
        .open_session(ACCOUNT, &StaticCredentials, &SilentFactory(session.clone()))
        .expect("open");

    let err = gateway
        .send_document(
            ChatId(10),
            MediaUpload {
                filename: "notes.txt".into(),
                payload: b"meeting notes".to_vec(),
                caption: None,
            },
            ACCOUNT,
        )
        .err()
        .expect("timed out");
    assert!(matches!(err, SessionError::Timeout));

    let paths = session.sent_paths();
    assert_eq!(paths.len(), 1);
    let staged = Path::new(&paths[0]);
    assert!(staged.exists(), "staged file must survive the caller timeout");

    session.answer_all(BackendObject::Message(fixtures::text_message(
        10,
        1,
        true,
        fixtures::at(0),
    )));
    for _ in 0..200 {
        if !staged.exists() {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(!staged.exists(), "cleanup runs once the backend answers");
}

#[test]
fn shutdown_drops_every_session() {
    let gateway = gateway(Settings::default()).with_timeout(Some(Duration::from_secs(5)));
    let factory = LoopbackFactory::new(seeded_state(), 1, 1);
    gateway
        .open_session(ACCOUNT, &StaticCredentials, &factory)
        .expect("open");

    gateway.shutdown();

    assert!(matches!(
        gateway.auth_state(ACCOUNT),
        Err(SessionError::SessionNotFound { .. })
    ));
}
