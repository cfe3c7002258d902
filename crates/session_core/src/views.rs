//! Read models and commands composed from the bridge, fan-out and polling primitives.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use shared::{
    domain::{AccountId, ChatId, ChatList, FolderId, MessageId, UserId},
    protocol::{
        BackendRequest, Chat, ChatFolder, Chats, InputMessageContent, Message, Messages, User,
    },
};
use tracing::{info, warn};

use crate::{
    auth::{self, AuthState, LoginStep, StepOutcome},
    bridge::{self, Ack},
    config::Settings,
    error::SessionResult,
    fan_out,
    photo::{self, ProfileImage},
    polling::{self, PollBudget},
    reconcile,
    registry::SessionRegistry,
    staging::{self, CleanupPolicy, LocalStaging},
    CredentialProvider, SessionFactory, SessionHandle,
};

/// Chats enumerated for the unread summary.
pub const NOTIFICATION_CHAT_LIMIT: i32 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatView {
    #[serde(flatten)]
    pub chat: Chat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<ProfileImage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderSummary {
    pub name: String,
    pub id: FolderId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnreadSummary {
    pub account: AccountId,
    pub chat_id: ChatId,
    pub unread_count: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Document,
}

#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub filename: String,
    pub payload: Vec<u8>,
    pub caption: Option<String>,
}

/// Videos are kept until the backend reports the upload done; everything else
/// waits a fixed delay.
fn cleanup_policy(
    kind: MediaKind,
    sent: &Message,
    session: Arc<dyn SessionHandle>,
    upload_budget: PollBudget,
    delay: Duration,
) -> CleanupPolicy {
    match kind {
        MediaKind::Video => match sent.content.media_file() {
            Some(file) => CleanupPolicy::UntilUploaded {
                session,
                file_id: file.id,
                budget: upload_budget,
            },
            None => {
                warn!(
                    chat_id = sent.chat_id.0,
                    message_id = sent.id.0,
                    "views: sent video carries no file; falling back to delayed cleanup"
                );
                CleanupPolicy::FixedDelay(delay)
            }
        },
        MediaKind::Photo | MediaKind::Document => CleanupPolicy::FixedDelay(delay),
    }
}

pub struct ChatViews {
    registry: Arc<SessionRegistry>,
    staging: Arc<dyn LocalStaging>,
    settings: Settings,
}

impl ChatViews {
    pub fn new(
        registry: Arc<SessionRegistry>,
        staging: Arc<dyn LocalStaging>,
        settings: Settings,
    ) -> Self {
        Self {
            registry,
            staging,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn session(&self, account: AccountId) -> SessionResult<Arc<dyn SessionHandle>> {
        self.registry.get(account).await
    }

    pub async fn open_session(
        &self,
        account: AccountId,
        credentials: &dyn CredentialProvider,
        factory: &dyn SessionFactory,
    ) -> SessionResult<()> {
        self.registry.open(account, credentials, factory).await?;
        Ok(())
    }

    /// Chats under `chat_list`, with resolved profile images, in the order the
    /// backend enumerated them.
    pub async fn list_chats(
        &self,
        chat_list: ChatList,
        limit: i32,
        account: AccountId,
    ) -> SessionResult<Vec<ChatView>> {
        let session = self.session(account).await?;
        let session = session.as_ref();
        let chats: Chats =
            bridge::call(session, BackendRequest::GetChats { chat_list, limit }).await?;
        let budget = self.settings.profile_photo_poll;

        let views = fan_out::for_each(&chats.chat_ids, move |chat_id| async move {
            let chat: Chat = bridge::call(session, BackendRequest::GetChat { chat_id }).await?;
            let photo = photo::resolve_profile_image(session, &chat, budget).await?;
            Ok(ChatView { chat, photo })
        })
        .await?;
        Ok(fan_out::reorder_by_ids(&chats.chat_ids, views, |view| {
            view.chat.id
        }))
    }

    /// Folder names and ids, fetched one folder at a time.
    pub async fn list_folders(&self, account: AccountId) -> SessionResult<Vec<FolderSummary>> {
        let session = self.session(account).await?;
        let session = session.as_ref();
        let me: User = bridge::call(session, BackendRequest::GetMe).await?;
        let lists: Vec<ChatList> = bridge::call(
            session,
            BackendRequest::GetChatListsToAddChat {
                chat_id: ChatId(me.id.0),
            },
        )
        .await?;

        let mut folders = Vec::new();
        for folder_id in lists.iter().filter_map(ChatList::folder_id) {
            let folder: ChatFolder =
                bridge::call(session, BackendRequest::GetChatFolder { folder_id }).await?;
            folders.push(FolderSummary {
                name: folder.title,
                id: folder_id,
            });
        }
        Ok(folders)
    }

    pub async fn find_by_username(&self, username: &str, account: AccountId) -> SessionResult<ChatId> {
        let session = self.session(account).await?;
        let chat: Chat = bridge::call(
            session.as_ref(),
            BackendRequest::SearchPublicChat {
                username: username.trim_start_matches('@').to_string(),
            },
        )
        .await?;
        Ok(chat.id)
    }

    pub async fn create_private_chat(
        &self,
        user_id: UserId,
        account: AccountId,
    ) -> SessionResult<ChatId> {
        let session = self.session(account).await?;
        let chat: Chat =
            bridge::call(session.as_ref(), BackendRequest::CreatePrivateChat { user_id }).await?;
        Ok(chat.id)
    }

    /// Full history of a chat, newest first, with outgoing read status applied.
    ///
    /// Pages backwards from the newest message until the backend returns an
    /// empty batch. Every call starts over from the newest message.
    pub async fn history(
        &self,
        chat_id: ChatId,
        limit: i32,
        account: AccountId,
    ) -> SessionResult<Vec<Message>> {
        let session = self.session(account).await?;
        let session = session.as_ref();
        let mut messages = Vec::new();
        let mut cursor = MessageId::NEWEST;
        loop {
            let batch: Messages = bridge::call(
                session,
                BackendRequest::GetChatHistory {
                    chat_id,
                    from_message_id: cursor,
                    offset: 0,
                    limit,
                },
            )
            .await?;
            let Some(last) = batch.messages.last() else {
                break;
            };
            cursor = last.id;
            messages.extend(batch.messages);
        }
        reconcile::reconcile_outbound(session, chat_id, &mut messages).await?;
        Ok(messages)
    }

    /// A single message, with its media downloaded locally.
    pub async fn message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        account: AccountId,
    ) -> SessionResult<Message> {
        let session = self.session(account).await?;
        let session = session.as_ref();
        let mut message: Message = bridge::call(
            session,
            BackendRequest::GetMessage {
                chat_id,
                message_id,
            },
        )
        .await?;
        let pending = message
            .content
            .media_file()
            .filter(|file| !file.is_downloaded())
            .map(|file| file.id);
        if let Some(file_id) = pending {
            let file =
                polling::await_download(session, file_id, self.settings.media_download_poll)
                    .await?;
            message.content.replace_media_file(file);
        }
        Ok(message)
    }

    pub async fn send_text(
        &self,
        chat_id: ChatId,
        text: impl Into<String>,
        account: AccountId,
    ) -> SessionResult<()> {
        let session = self.session(account).await?;
        let _: Message = bridge::call(
            session.as_ref(),
            BackendRequest::SendMessage {
                chat_id,
                content: InputMessageContent::Text { text: text.into() },
            },
        )
        .await?;
        Ok(())
    }

    pub async fn send_photo(
        &self,
        chat_id: ChatId,
        upload: MediaUpload,
        account: AccountId,
    ) -> SessionResult<()> {
        self.send_media(MediaKind::Photo, chat_id, upload, account)
            .await
    }

    pub async fn send_video(
        &self,
        chat_id: ChatId,
        upload: MediaUpload,
        account: AccountId,
    ) -> SessionResult<()> {
        self.send_media(MediaKind::Video, chat_id, upload, account)
            .await
    }

    pub async fn send_document(
        &self,
        chat_id: ChatId,
        upload: MediaUpload,
        account: AccountId,
    ) -> SessionResult<()> {
        self.send_media(MediaKind::Document, chat_id, upload, account)
            .await
    }

    /// The staged copy is removed right away if the send fails.
    pub async fn send_media(
        &self,
        kind: MediaKind,
        chat_id: ChatId,
        upload: MediaUpload,
        account: AccountId,
    ) -> SessionResult<()> {
        let session = self.session(account).await?;
        let MediaUpload {
            filename,
            payload,
            caption,
        } = upload;

        let (staged, content) = match kind {
            MediaKind::Photo => {
                let prepared =
                    staging::prepare_image(&payload, &filename, self.settings.max_image_edge)?;
                let staged = self.staging.stage(&filename, &prepared.bytes)?;
                let content = InputMessageContent::Photo {
                    path: staged.path_string(),
                    caption,
                    width: prepared.width,
                    height: prepared.height,
                };
                (staged, content)
            }
            MediaKind::Video => {
                let staged = self.staging.stage(&filename, &payload)?;
                let content = InputMessageContent::Video {
                    path: staged.path_string(),
                    caption,
                };
                (staged, content)
            }
            MediaKind::Document => {
                let staged = self.staging.stage(&filename, &payload)?;
                let content = InputMessageContent::Document {
                    path: staged.path_string(),
                    caption,
                };
                (staged, content)
            }
        };

        let watch = session.clone();
        let upload_budget = self.settings.upload_cleanup_poll;
        let delay = self.settings.staged_cleanup_delay();
        let sent: Message = staging::submit_staged(
            session,
            staged,
            BackendRequest::SendMessage { chat_id, content },
            move |sent: &Message| cleanup_policy(kind, sent, watch, upload_budget, delay),
        )
        .await?;
        info!(
            account = account.0,
            chat_id = chat_id.0,
            message_id = sent.id.0,
            ?kind,
            "views: media message accepted"
        );
        Ok(())
    }

    pub async fn set_profile_photo(
        &self,
        filename: &str,
        payload: &[u8],
        account: AccountId,
    ) -> SessionResult<()> {
        let session = self.session(account).await?;
        let prepared = staging::prepare_image(payload, filename, self.settings.max_image_edge)?;
        let staged = self.staging.stage(filename, &prepared.bytes)?;
        let path = staged.path_string();
        let delay = self.settings.staged_cleanup_delay();
        let _: Ack = staging::submit_staged(
            session,
            staged,
            BackendRequest::SetProfilePhoto { path },
            move |_: &Ack| CleanupPolicy::FixedDelay(delay),
        )
        .await?;
        Ok(())
    }

    /// Unread counts for every chat in the main list.
    pub async fn notification_summary(
        &self,
        account: AccountId,
    ) -> SessionResult<Vec<UnreadSummary>> {
        let session = self.session(account).await?;
        let session = session.as_ref();
        let chats: Chats = bridge::call(
            session,
            BackendRequest::GetChats {
                chat_list: ChatList::Main,
                limit: NOTIFICATION_CHAT_LIMIT,
            },
        )
        .await?;
        let details = fan_out::for_each(&chats.chat_ids, |chat_id| {
            bridge::call::<Chat>(session, BackendRequest::GetChat { chat_id })
        })
        .await?;
        Ok(details
            .into_iter()
            .map(|chat| UnreadSummary {
                account,
                chat_id: chat.id,
                unread_count: chat.unread_count,
            })
            .collect())
    }

    pub async fn create_draft(
        &self,
        chat_id: ChatId,
        text: impl Into<String>,
        account: AccountId,
    ) -> SessionResult<()> {
        self.set_draft(chat_id, Some(text.into()), account).await
    }

    pub async fn delete_draft(&self, chat_id: ChatId, account: AccountId) -> SessionResult<()> {
        self.set_draft(chat_id, None, account).await
    }

    async fn set_draft(
        &self,
        chat_id: ChatId,
        draft: Option<String>,
        account: AccountId,
    ) -> SessionResult<()> {
        let session = self.session(account).await?;
        let _: Ack = bridge::call(
            session.as_ref(),
            BackendRequest::SetChatDraftMessage { chat_id, draft },
        )
        .await?;
        Ok(())
    }

    pub async fn submit_phone(
        &self,
        phone_number: &str,
        account: AccountId,
    ) -> SessionResult<StepOutcome> {
        self.submit_login_step(LoginStep::Phone, phone_number, account)
            .await
    }

    pub async fn submit_code(&self, code: &str, account: AccountId) -> SessionResult<StepOutcome> {
        self.submit_login_step(LoginStep::Code, code, account).await
    }

    pub async fn submit_password(
        &self,
        password: &str,
        account: AccountId,
    ) -> SessionResult<StepOutcome> {
        self.submit_login_step(LoginStep::Password, password, account)
            .await
    }

    async fn submit_login_step(
        &self,
        step: LoginStep,
        value: &str,
        account: AccountId,
    ) -> SessionResult<StepOutcome> {
        let session = self.session(account).await?;
        auth::submit_step(session.as_ref(), step, value).await
    }

    pub async fn auth_state(&self, account: AccountId) -> SessionResult<AuthState> {
        let session = self.session(account).await?;
        Ok(auth::current_state(session.as_ref()).await?.into())
    }

    /// Logs the account out and evicts its session.
    pub async fn logout(&self, account: AccountId) -> SessionResult<()> {
        let session = self.session(account).await?;
        let _: Ack = bridge::call(session.as_ref(), BackendRequest::LogOut).await?;
        drop(session);
        self.registry.remove(account).await;
        info!(account = account.0, "views: logged out");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/views_tests.rs"]
mod tests;
