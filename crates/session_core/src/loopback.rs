//! In-memory chat backend speaking the same request/callback protocol.
//!
//! Used by the probe binary and by tests. Callbacks are delivered from a
//! spawned task when a tokio runtime is available, inline otherwise. File
//! downloads and uploads finish after a configurable number of `GetFile`
//! polls.

use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use async_trait::async_trait;
use chrono::Utc;
use shared::{
    domain::{
        AuthorizationState, BasicGroupId, ChatId, ChatKind, ChatList, FileId, FolderId,
        MessageId, SupergroupId, UserId,
    },
    protocol::{
        BackendObject, BackendRequest, BasicGroupFullInfo, Chat, ChatFolder, Chats, File,
        InputMessageContent, LocalFile, Message, MessageContent, Messages, PhotoSize, RemoteFile,
        SupergroupFullInfo, User,
    },
};
use tracing::debug;

use crate::{ConnectionParams, ResultCallback, SessionFactory, SessionHandle};

const LOOPBACK_FILE_ROOT: &str = "/loopback/files";

type RequestFilter = Box<dyn Fn(&BackendRequest) -> Option<BackendObject> + Send + Sync>;

/// Backend data served by [`LoopbackSession`].
pub struct LoopbackState {
    pub auth_state: AuthorizationState,
    pub login_code: String,
    pub password: Option<String>,
    pub me: Option<User>,
    pub users: HashMap<UserId, User>,
    pub chats: HashMap<ChatId, Chat>,
    pub chat_lists: HashMap<ChatList, Vec<ChatId>>,
    /// Messages per chat keyed by id, so iteration runs oldest to newest.
    pub messages: HashMap<ChatId, BTreeMap<MessageId, Message>>,
    pub basic_groups: HashMap<BasicGroupId, BasicGroupFullInfo>,
    pub supergroups: HashMap<SupergroupId, SupergroupFullInfo>,
    pub folders: BTreeMap<FolderId, ChatFolder>,
    pub files: HashMap<FileId, File>,
    pub profile_photo_path: Option<String>,
    pending_downloads: HashMap<FileId, u32>,
    pending_uploads: HashMap<FileId, u32>,
    next_message_id: i64,
    next_file_id: i64,
}

impl Default for LoopbackState {
    fn default() -> Self {
        Self {
            auth_state: AuthorizationState::WaitPhoneNumber,
            login_code: "12345".into(),
            password: None,
            me: None,
            users: HashMap::new(),
            chats: HashMap::new(),
            chat_lists: HashMap::new(),
            messages: HashMap::new(),
            basic_groups: HashMap::new(),
            supergroups: HashMap::new(),
            folders: BTreeMap::new(),
            files: HashMap::new(),
            profile_photo_path: None,
            pending_downloads: HashMap::new(),
            pending_uploads: HashMap::new(),
            next_message_id: 1_000_000,
            next_file_id: 1_000_000,
        }
    }
}

impl LoopbackState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the state as signed in as `me`.
    pub fn signed_in(mut self, me: User) -> Self {
        self.auth_state = AuthorizationState::Ready;
        self.users.insert(me.id, me.clone());
        self.me = Some(me);
        self
    }

    pub fn add_user(&mut self, user: User) {
        self.users.insert(user.id, user);
    }

    /// Adds a chat at the end of each given list.
    pub fn add_chat(&mut self, chat: Chat, lists: &[ChatList]) {
        for list in lists {
            self.chat_lists.entry(*list).or_default().push(chat.id);
        }
        self.chats.insert(chat.id, chat);
    }

    /// Stores a message and makes it the chat's last message when newer.
    pub fn add_message(&mut self, message: Message) {
        if let Some(chat) = self.chats.get_mut(&message.chat_id) {
            let newer = chat
                .last_message
                .as_ref()
                .map_or(true, |last| last.id <= message.id);
            if newer {
                chat.last_message = Some(Box::new(message.clone()));
            }
        }
        self.messages
            .entry(message.chat_id)
            .or_default()
            .insert(message.id, message);
    }

    pub fn add_folder(&mut self, folder_id: FolderId, folder: ChatFolder) {
        self.folders.insert(folder_id, folder);
    }

    pub fn add_file(&mut self, file: File) {
        self.files.insert(file.id, file);
    }

    pub fn add_basic_group(&mut self, info: BasicGroupFullInfo) {
        self.basic_groups.insert(info.basic_group_id, info);
    }

    pub fn add_supergroup(&mut self, info: SupergroupFullInfo) {
        self.supergroups.insert(info.supergroup_id, info);
    }

    fn allocate_file(&mut self, path: &str, size: i64) -> File {
        self.next_file_id += 1;
        let file = File {
            id: FileId(self.next_file_id),
            size,
            local: LocalFile {
                path: Some(path.to_string()),
                is_downloading_active: false,
                is_downloading_completed: true,
                downloaded_size: size,
            },
            remote: RemoteFile {
                is_uploading_active: true,
                is_uploading_completed: false,
                uploaded_size: 0,
            },
        };
        self.files.insert(file.id, file.clone());
        file
    }
}

fn error(code: i32, message: impl Into<String>) -> BackendObject {
    BackendObject::Error {
        code,
        message: message.into(),
    }
}

fn chat_not_found() -> BackendObject {
    error(400, "Chat not found")
}

fn file_size(path: &str) -> i64 {
    std::fs::metadata(path)
        .map(|meta| meta.len() as i64)
        .unwrap_or_default()
}

/// Session handle over a shared [`LoopbackState`].
pub struct LoopbackSession {
    state: Arc<Mutex<LoopbackState>>,
    requests: Mutex<Vec<BackendRequest>>,
    filters: Mutex<Vec<RequestFilter>>,
    closed: AtomicBool,
    download_polls: u32,
    upload_polls: u32,
}

impl LoopbackSession {
    pub fn new(state: LoopbackState) -> Arc<Self> {
        Self::shared(Arc::new(Mutex::new(state)), 1, 1)
    }

    /// A session over state shared with other handles. Downloads and uploads
    /// complete after `download_polls`/`upload_polls` `GetFile` requests.
    pub fn shared(
        state: Arc<Mutex<LoopbackState>>,
        download_polls: u32,
        upload_polls: u32,
    ) -> Arc<Self> {
        Arc::new(Self {
            state,
            requests: Mutex::new(Vec::new()),
            filters: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            download_polls,
            upload_polls,
        })
    }

    pub fn with_file_latency(
        state: LoopbackState,
        download_polls: u32,
        upload_polls: u32,
    ) -> Arc<Self> {
        Self::shared(Arc::new(Mutex::new(state)), download_polls, upload_polls)
    }

    /// Answers matching requests with the filter's result instead of the state's.
    pub fn intercept(
        &self,
        filter: impl Fn(&BackendRequest) -> Option<BackendObject> + Send + Sync + 'static,
    ) {
        lock(&self.filters).push(Box::new(filter));
    }

    pub fn state(&self) -> MutexGuard<'_, LoopbackState> {
        lock(&self.state)
    }

    pub fn requests(&self) -> Vec<BackendRequest> {
        lock(&self.requests).clone()
    }

    /// Number of received requests with the given [`BackendRequest::name`].
    pub fn request_count(&self, name: &str) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|request| request.name() == name)
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn respond(&self, request: &BackendRequest) -> BackendObject {
        for filter in lock(&self.filters).iter() {
            if let Some(result) = filter(request) {
                return result;
            }
        }
        let mut state = lock(&self.state);
        self.apply(&mut state, request)
    }

    fn apply(&self, state: &mut LoopbackState, request: &BackendRequest) -> BackendObject {
        match request {
            BackendRequest::GetAuthorizationState => {
                BackendObject::AuthorizationState(state.auth_state)
            }
            BackendRequest::SetAuthenticationPhoneNumber { .. } => {
                if state.auth_state != AuthorizationState::WaitPhoneNumber {
                    return error(400, "PHONE_NUMBER_UNEXPECTED");
                }
                state.auth_state = AuthorizationState::WaitCode;
                BackendObject::Ok
            }
            BackendRequest::CheckAuthenticationCode { code } => {
                if *code != state.login_code {
                    return error(400, "PHONE_CODE_INVALID");
                }
                state.auth_state = if state.password.is_some() {
                    AuthorizationState::WaitPassword
                } else {
                    AuthorizationState::Ready
                };
                BackendObject::Ok
            }
            BackendRequest::CheckAuthenticationPassword { password } => {
                if state.password.as_deref() != Some(password.as_str()) {
                    return error(400, "PASSWORD_HASH_INVALID");
                }
                state.auth_state = AuthorizationState::Ready;
                BackendObject::Ok
            }
            BackendRequest::LogOut => {
                state.auth_state = AuthorizationState::Closed;
                BackendObject::Ok
            }
            BackendRequest::GetMe => match &state.me {
                Some(me) => BackendObject::User(me.clone()),
                None => error(401, "Unauthorized"),
            },
            BackendRequest::GetUser { user_id } => match state.users.get(user_id) {
                Some(user) => BackendObject::User(user.clone()),
                None => error(404, "User not found"),
            },
            BackendRequest::GetBasicGroupFullInfo { basic_group_id } => {
                match state.basic_groups.get(basic_group_id) {
                    Some(info) => BackendObject::BasicGroupFullInfo(info.clone()),
                    None => error(400, "Group not found"),
                }
            }
            BackendRequest::GetSupergroupFullInfo { supergroup_id } => {
                match state.supergroups.get(supergroup_id) {
                    Some(info) => BackendObject::SupergroupFullInfo(info.clone()),
                    None => error(400, "Supergroup not found"),
                }
            }
            BackendRequest::GetChats { chat_list, limit } => {
                let ids = state.chat_lists.get(chat_list).cloned().unwrap_or_default();
                let total_count = ids.len() as i32;
                BackendObject::Chats(Chats {
                    total_count,
                    chat_ids: ids.into_iter().take((*limit).max(0) as usize).collect(),
                })
            }
            BackendRequest::GetChat { chat_id } => match state.chats.get(chat_id) {
                Some(chat) => BackendObject::Chat(chat.clone()),
                None => chat_not_found(),
            },
            BackendRequest::SearchPublicChat { username } => {
                let user_id = state
                    .users
                    .values()
                    .find(|user| user.username.as_deref() == Some(username.as_str()))
                    .map(|user| user.id);
                match user_id.and_then(|id| state.chats.get(&ChatId(id.0))) {
                    Some(chat) => BackendObject::Chat(chat.clone()),
                    None => error(400, "USERNAME_NOT_OCCUPIED"),
                }
            }
            BackendRequest::CreatePrivateChat { user_id } => {
                let chat_id = ChatId(user_id.0);
                if let Some(chat) = state.chats.get(&chat_id) {
                    return BackendObject::Chat(chat.clone());
                }
                let Some(user) = state.users.get(user_id) else {
                    return error(400, "User not found");
                };
                let chat = Chat {
                    id: chat_id,
                    kind: ChatKind::Private { user_id: *user_id },
                    title: format!("{} {}", user.first_name, user.last_name)
                        .trim()
                        .to_string(),
                    last_message: None,
                    last_read_inbox_message_id: MessageId::NEWEST,
                    last_read_outbox_message_id: MessageId::NEWEST,
                    unread_count: 0,
                    has_photo: user.profile_photo.is_some(),
                    draft: None,
                };
                state.chats.insert(chat_id, chat.clone());
                BackendObject::Chat(chat)
            }
            BackendRequest::GetChatHistory {
                chat_id,
                from_message_id,
                limit,
                ..
            } => {
                if !state.chats.contains_key(chat_id) {
                    return chat_not_found();
                }
                let messages: Vec<Message> = state
                    .messages
                    .get(chat_id)
                    .map(|messages| {
                        messages
                            .values()
                            .rev()
                            .filter(|m| !from_message_id.is_set() || m.id < *from_message_id)
                            .take((*limit).max(0) as usize)
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                BackendObject::Messages(Messages {
                    total_count: messages.len() as i32,
                    messages,
                })
            }
            BackendRequest::GetMessage {
                chat_id,
                message_id,
            } => match state
                .messages
                .get(chat_id)
                .and_then(|messages| messages.get(message_id))
            {
                Some(message) => BackendObject::Message(message.clone()),
                None => error(404, "Message not found"),
            },
            BackendRequest::GetChatListsToAddChat { chat_id } => {
                if !state.chats.contains_key(chat_id) {
                    return chat_not_found();
                }
                let mut lists = vec![ChatList::Main];
                lists.extend(state.folders.keys().map(|id| ChatList::Folder(*id)));
                BackendObject::ChatLists(lists)
            }
            BackendRequest::GetChatFolder { folder_id } => match state.folders.get(folder_id) {
                Some(folder) => BackendObject::ChatFolder(folder.clone()),
                None => error(400, "Chat folder not found"),
            },
            BackendRequest::GetFile { file_id } => self.poll_file(state, *file_id),
            BackendRequest::DownloadFile { file_id, .. } => {
                let Some(file) = state.files.get_mut(file_id) else {
                    return error(404, "File not found");
                };
                if !file.local.is_downloading_completed {
                    file.local.is_downloading_active = true;
                    let file = file.clone();
                    state
                        .pending_downloads
                        .entry(*file_id)
                        .or_insert(self.download_polls);
                    return BackendObject::File(file);
                }
                BackendObject::File(file.clone())
            }
            BackendRequest::SendMessage { chat_id, content } => {
                self.send_message(state, *chat_id, content)
            }
            BackendRequest::SetProfilePhoto { path } => {
                if !Path::new(path).exists() {
                    return error(400, "PHOTO_FILE_MISSING");
                }
                state.profile_photo_path = Some(path.clone());
                BackendObject::Ok
            }
            BackendRequest::SetChatDraftMessage { chat_id, draft } => {
                match state.chats.get_mut(chat_id) {
                    Some(chat) => {
                        chat.draft = draft.clone();
                        BackendObject::Ok
                    }
                    None => chat_not_found(),
                }
            }
        }
    }

    fn poll_file(&self, state: &mut LoopbackState, file_id: FileId) -> BackendObject {
        let download_done = tick(&mut state.pending_downloads, file_id);
        let upload_done = tick(&mut state.pending_uploads, file_id);
        let Some(file) = state.files.get_mut(&file_id) else {
            return error(404, "File not found");
        };
        if download_done {
            file.local.is_downloading_active = false;
            file.local.is_downloading_completed = true;
            file.local.downloaded_size = file.size;
            file.local.path = Some(format!("{LOOPBACK_FILE_ROOT}/{}", file_id.0));
        }
        if upload_done {
            file.remote.is_uploading_active = false;
            file.remote.is_uploading_completed = true;
            file.remote.uploaded_size = file.size;
        }
        BackendObject::File(file.clone())
    }

    fn send_message(
        &self,
        state: &mut LoopbackState,
        chat_id: ChatId,
        content: &InputMessageContent,
    ) -> BackendObject {
        if !state.chats.contains_key(&chat_id) {
            return chat_not_found();
        }
        let media_path = match content {
            InputMessageContent::Text { .. } => None,
            InputMessageContent::Photo { path, .. }
            | InputMessageContent::Video { path, .. }
            | InputMessageContent::Document { path, .. } => Some(path.as_str()),
        };
        if let Some(path) = media_path {
            if !Path::new(path).exists() {
                return error(400, "FILE_PATH_INVALID");
            }
        }
        let upload = |state: &mut LoopbackState, path: &str| {
            let file = state.allocate_file(path, file_size(path));
            state.pending_uploads.insert(file.id, self.upload_polls);
            file
        };
        let content = match content {
            InputMessageContent::Text { text } => MessageContent::Text { text: text.clone() },
            InputMessageContent::Photo {
                path,
                caption,
                width,
                height,
            } => MessageContent::Photo {
                caption: caption.clone().unwrap_or_default(),
                sizes: vec![PhotoSize {
                    kind: "x".into(),
                    file: upload(state, path),
                    width: *width as i32,
                    height: *height as i32,
                }],
            },
            InputMessageContent::Video { path, caption } => MessageContent::Video {
                caption: caption.clone().unwrap_or_default(),
                duration: 0,
                video: upload(state, path),
            },
            InputMessageContent::Document { path, caption } => MessageContent::Document {
                caption: caption.clone().unwrap_or_default(),
                file_name: Path::new(path)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                document: upload(state, path),
            },
        };
        state.next_message_id += 1;
        let message = Message {
            id: MessageId(state.next_message_id),
            chat_id,
            sender_id: state.me.as_ref().map(|me| me.id),
            is_outgoing: true,
            date: Utc::now(),
            content,
            is_read: false,
        };
        state.add_message(message.clone());
        BackendObject::Message(message)
    }
}

/// Counts down one poll; true when the pending operation just finished.
fn tick(pending: &mut HashMap<FileId, u32>, file_id: FileId) -> bool {
    let Some(remaining) = pending.get_mut(&file_id) else {
        return false;
    };
    *remaining = remaining.saturating_sub(1);
    if *remaining == 0 {
        pending.remove(&file_id);
        return true;
    }
    false
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionHandle for LoopbackSession {
    fn send(&self, request: BackendRequest, callback: ResultCallback) {
        if self.is_closed() {
            debug!(request = request.name(), "loopback: session closed; dropping request");
            return;
        }
        lock(&self.requests).push(request.clone());
        let result = self.respond(&request);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { callback(result) });
            }
            Err(_) => callback(result),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Creates loopback sessions that all serve the same state.
pub struct LoopbackFactory {
    state: Arc<Mutex<LoopbackState>>,
    download_polls: u32,
    upload_polls: u32,
}

impl LoopbackFactory {
    pub fn new(state: LoopbackState, download_polls: u32, upload_polls: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            download_polls,
            upload_polls,
        }
    }
}

#[async_trait]
impl SessionFactory for LoopbackFactory {
    async fn create(&self, params: ConnectionParams) -> anyhow::Result<Arc<dyn SessionHandle>> {
        debug!(account = params.account.0, "loopback: creating session");
        let session: Arc<dyn SessionHandle> = LoopbackSession::shared(
            self.state.clone(),
            self.download_polls,
            self.upload_polls,
        );
        Ok(session)
    }
}

#[cfg(test)]
#[path = "tests/loopback_tests.rs"]
mod tests;
