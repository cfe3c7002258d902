//! Session orchestration for the stateful chat backend.
//!
//! The backend takes one-shot requests and answers each through a callback.
//! This crate turns those callbacks into futures ([`bridge`]), joins
//! concurrent per-id calls ([`fan_out`]), polls background file work
//! ([`polling`]) and composes them into read models ([`views`]). [`Gateway`]
//! is the blocking boundary callers use.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use shared::{
    domain::AccountId,
    protocol::{BackendObject, BackendRequest},
};

pub mod auth;
pub mod bridge;
pub mod config;
pub mod error;
pub mod fan_out;
pub mod gateway;
pub mod loopback;
pub mod photo;
pub mod polling;
pub mod reconcile;
pub mod registry;
pub mod staging;
pub mod views;

pub use error::{SessionError, SessionResult};
pub use gateway::Gateway;
pub use registry::SessionRegistry;
pub use views::ChatViews;

/// Receives the single result of one request.
pub type ResultCallback = Box<dyn FnOnce(BackendObject) + Send + 'static>;

/// Per-account connection to the chat backend.
///
/// Implementations must accept concurrent `send` calls and invoke each
/// callback exactly once. Dropping a callback without invoking it is read as
/// the session having closed.
pub trait SessionHandle: Send + Sync {
    fn send(&self, request: BackendRequest, callback: ResultCallback);
    fn close(&self);
}

/// Decrypted parameters needed to open a backend session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub account: AccountId,
    pub api_id: i32,
    pub api_hash: String,
    pub data_dir: PathBuf,
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn connection_params(&self, account: AccountId) -> anyhow::Result<ConnectionParams>;
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self, params: ConnectionParams) -> anyhow::Result<Arc<dyn SessionHandle>>;
}

#[cfg(test)]
#[path = "tests/fixtures.rs"]
mod fixtures;
