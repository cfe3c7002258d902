//! Blocking boundary over [`ChatViews`].
//!
//! Every call blocks the current thread until the composed operation
//! resolves, bounded by the configured timeout when one is set. Must not be
//! called from inside an async runtime. A timed-out call does not cancel
//! requests already handed to the backend.

use std::{future::Future, time::Duration};

use shared::domain::{AccountId, ChatId, ChatList, MessageId, UserId};
use shared::protocol::Message;
use tokio::runtime::{Builder, Runtime};

use crate::{
    auth::{AuthState, StepOutcome},
    error::{SessionError, SessionResult},
    views::{ChatView, ChatViews, FolderSummary, MediaUpload, UnreadSummary},
    CredentialProvider, SessionFactory,
};

pub struct Gateway {
    runtime: Runtime,
    views: ChatViews,
    timeout: Option<Duration>,
}

impl Gateway {
    pub fn new(views: ChatViews) -> SessionResult<Self> {
        let runtime = Builder::new_multi_thread()
            .enable_all()
            .thread_name("session-core")
            .build()
            .map_err(|e| SessionError::io("failed to start gateway runtime", e))?;
        let timeout = views.settings().call_timeout();
        Ok(Self {
            runtime,
            views,
            timeout,
        })
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn views(&self) -> &ChatViews {
        &self.views
    }

    fn run<T>(&self, operation: impl Future<Output = SessionResult<T>>) -> SessionResult<T> {
        let limit = self.timeout;
        self.runtime.block_on(async move {
            match limit {
                Some(limit) => tokio::time::timeout(limit, operation)
                    .await
                    .map_err(|_| SessionError::Timeout)?,
                None => operation.await,
            }
        })
    }

    pub fn open_session(
        &self,
        account: AccountId,
        credentials: &dyn CredentialProvider,
        factory: &dyn SessionFactory,
    ) -> SessionResult<()> {
        self.run(self.views.open_session(account, credentials, factory))
    }

    pub fn list_chats(
        &self,
        chat_list: ChatList,
        limit: i32,
        account: AccountId,
    ) -> SessionResult<Vec<ChatView>> {
        self.run(self.views.list_chats(chat_list, limit, account))
    }

    /// Like [`Gateway::list_chats`] with a textual selector ("main", "archive", "folder:3").
    pub fn list_chats_by_selector(
        &self,
        selector: &str,
        limit: i32,
        account: AccountId,
    ) -> SessionResult<Vec<ChatView>> {
        let chat_list = selector
            .parse::<ChatList>()
            .map_err(SessionError::InvalidSelector)?;
        self.list_chats(chat_list, limit, account)
    }

    pub fn list_folders(&self, account: AccountId) -> SessionResult<Vec<FolderSummary>> {
        self.run(self.views.list_folders(account))
    }

    pub fn find_by_username(&self, username: &str, account: AccountId) -> SessionResult<ChatId> {
        self.run(self.views.find_by_username(username, account))
    }

    pub fn create_private_chat(&self, user_id: UserId, account: AccountId) -> SessionResult<ChatId> {
        self.run(self.views.create_private_chat(user_id, account))
    }

    pub fn history(
        &self,
        chat_id: ChatId,
        limit: i32,
        account: AccountId,
    ) -> SessionResult<Vec<Message>> {
        self.run(self.views.history(chat_id, limit, account))
    }

    pub fn message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        account: AccountId,
    ) -> SessionResult<Message> {
        self.run(self.views.message(chat_id, message_id, account))
    }

    pub fn send_text(&self, chat_id: ChatId, text: &str, account: AccountId) -> SessionResult<()> {
        self.run(self.views.send_text(chat_id, text, account))
    }

    pub fn send_photo(
        &self,
        chat_id: ChatId,
        upload: MediaUpload,
        account: AccountId,
    ) -> SessionResult<()> {
        self.run(self.views.send_photo(chat_id, upload, account))
    }

    pub fn send_video(
        &self,
        chat_id: ChatId,
        upload: MediaUpload,
        account: AccountId,
    ) -> SessionResult<()> {
        self.run(self.views.send_video(chat_id, upload, account))
    }

    pub fn send_document(
        &self,
        chat_id: ChatId,
        upload: MediaUpload,
        account: AccountId,
    ) -> SessionResult<()> {
        self.run(self.views.send_document(chat_id, upload, account))
    }

    pub fn set_profile_photo(
        &self,
        filename: &str,
        payload: &[u8],
        account: AccountId,
    ) -> SessionResult<()> {
        self.run(self.views.set_profile_photo(filename, payload, account))
    }

    pub fn notification_summary(&self, account: AccountId) -> SessionResult<Vec<UnreadSummary>> {
        self.run(self.views.notification_summary(account))
    }

    pub fn submit_phone(&self, phone_number: &str, account: AccountId) -> SessionResult<StepOutcome> {
        self.run(self.views.submit_phone(phone_number, account))
    }

    pub fn submit_code(&self, code: &str, account: AccountId) -> SessionResult<StepOutcome> {
        self.run(self.views.submit_code(code, account))
    }

    pub fn submit_password(&self, password: &str, account: AccountId) -> SessionResult<StepOutcome> {
        self.run(self.views.submit_password(password, account))
    }

    pub fn auth_state(&self, account: AccountId) -> SessionResult<AuthState> {
        self.run(self.views.auth_state(account))
    }

    pub fn logout(&self, account: AccountId) -> SessionResult<()> {
        self.run(self.views.logout(account))
    }

    pub fn create_draft(&self, chat_id: ChatId, text: &str, account: AccountId) -> SessionResult<()> {
        self.run(self.views.create_draft(chat_id, text, account))
    }

    pub fn delete_draft(&self, chat_id: ChatId, account: AccountId) -> SessionResult<()> {
        self.run(self.views.delete_draft(chat_id, account))
    }

    /// Closes every registered session.
    pub fn shutdown(&self) {
        self.runtime.block_on(self.views.registry().shutdown());
    }
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
