use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    AuthorizationState, BasicGroupId, ChatId, ChatKind, ChatList, FileId, FolderId, MessageId,
    SupergroupId, UserId,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub is_downloading_active: bool,
    pub is_downloading_completed: bool,
    pub downloaded_size: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub is_uploading_active: bool,
    pub is_uploading_completed: bool,
    pub uploaded_size: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub id: FileId,
    pub size: i64,
    pub local: LocalFile,
    pub remote: RemoteFile,
}

impl File {
    pub fn is_downloaded(&self) -> bool {
        self.local.is_downloading_completed && self.local.path.is_some()
    }

    pub fn is_uploaded(&self) -> bool {
        self.remote.is_uploading_completed
    }
}

/// One size variant of a photo. `kind` is the backend's size tag ("s", "m", "b", ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoSize {
    pub kind: String,
    pub file: File,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePhoto {
    pub id: i64,
    pub small: File,
    pub big: File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPhoto {
    pub id: i64,
    pub sizes: Vec<PhotoSize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_photo: Option<ProfilePhoto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicGroupFullInfo {
    pub basic_group_id: BasicGroupId,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<ChatPhoto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupergroupFullInfo {
    pub supergroup_id: SupergroupId,
    pub description: String,
    pub member_count: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<ChatPhoto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    Photo {
        caption: String,
        sizes: Vec<PhotoSize>,
    },
    Video {
        caption: String,
        duration: i32,
        video: File,
    },
    Document {
        caption: String,
        file_name: String,
        document: File,
    },
    Unsupported,
}

impl MessageContent {
    /// File carrying the media payload; for photos the largest variant.
    pub fn media_file(&self) -> Option<&File> {
        match self {
            MessageContent::Photo { sizes, .. } => sizes.last().map(|size| &size.file),
            MessageContent::Video { video, .. } => Some(video),
            MessageContent::Document { document, .. } => Some(document),
            MessageContent::Text { .. } | MessageContent::Unsupported => None,
        }
    }

    pub fn replace_media_file(&mut self, file: File) {
        match self {
            MessageContent::Photo { sizes, .. } => {
                if let Some(size) = sizes.last_mut() {
                    size.file = file;
                }
            }
            MessageContent::Video { video, .. } => *video = file,
            MessageContent::Document { document, .. } => *document = file,
            MessageContent::Text { .. } | MessageContent::Unsupported => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<UserId>,
    pub is_outgoing: bool,
    pub date: DateTime<Utc>,
    pub content: MessageContent,
    /// Derived locally for outgoing messages; never reported by the backend.
    #[serde(default)]
    pub is_read: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub kind: ChatKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Box<Message>>,
    pub last_read_inbox_message_id: MessageId,
    pub last_read_outbox_message_id: MessageId,
    pub unread_count: i32,
    pub has_photo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chats {
    pub total_count: i32,
    pub chat_ids: Vec<ChatId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Messages {
    pub total_count: i32,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFolder {
    pub title: String,
    pub included_chat_ids: Vec<ChatId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputMessageContent {
    Text {
        text: String,
    },
    Photo {
        path: String,
        caption: Option<String>,
        width: u32,
        height: u32,
    },
    Video {
        path: String,
        caption: Option<String>,
    },
    Document {
        path: String,
        caption: Option<String>,
    },
}

/// Requests understood by the stateful chat backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BackendRequest {
    GetAuthorizationState,
    SetAuthenticationPhoneNumber {
        phone_number: String,
    },
    CheckAuthenticationCode {
        code: String,
    },
    CheckAuthenticationPassword {
        password: String,
    },
    LogOut,
    GetMe,
    GetUser {
        user_id: UserId,
    },
    GetBasicGroupFullInfo {
        basic_group_id: BasicGroupId,
    },
    GetSupergroupFullInfo {
        supergroup_id: SupergroupId,
    },
    GetChats {
        chat_list: ChatList,
        limit: i32,
    },
    GetChat {
        chat_id: ChatId,
    },
    SearchPublicChat {
        username: String,
    },
    CreatePrivateChat {
        user_id: UserId,
    },
    GetChatHistory {
        chat_id: ChatId,
        from_message_id: MessageId,
        offset: i32,
        limit: i32,
    },
    GetMessage {
        chat_id: ChatId,
        message_id: MessageId,
    },
    GetChatListsToAddChat {
        chat_id: ChatId,
    },
    GetChatFolder {
        folder_id: FolderId,
    },
    GetFile {
        file_id: FileId,
    },
    DownloadFile {
        file_id: FileId,
        priority: i32,
    },
    SendMessage {
        chat_id: ChatId,
        content: InputMessageContent,
    },
    SetProfilePhoto {
        path: String,
    },
    SetChatDraftMessage {
        chat_id: ChatId,
        draft: Option<String>,
    },
}

impl BackendRequest {
    pub fn name(&self) -> &'static str {
        match self {
            BackendRequest::GetAuthorizationState => "get_authorization_state",
            BackendRequest::SetAuthenticationPhoneNumber { .. } => {
                "set_authentication_phone_number"
            }
            BackendRequest::CheckAuthenticationCode { .. } => "check_authentication_code",
            BackendRequest::CheckAuthenticationPassword { .. } => "check_authentication_password",
            BackendRequest::LogOut => "log_out",
            BackendRequest::GetMe => "get_me",
            BackendRequest::GetUser { .. } => "get_user",
            BackendRequest::GetBasicGroupFullInfo { .. } => "get_basic_group_full_info",
            BackendRequest::GetSupergroupFullInfo { .. } => "get_supergroup_full_info",
            BackendRequest::GetChats { .. } => "get_chats",
            BackendRequest::GetChat { .. } => "get_chat",
            BackendRequest::SearchPublicChat { .. } => "search_public_chat",
            BackendRequest::CreatePrivateChat { .. } => "create_private_chat",
            BackendRequest::GetChatHistory { .. } => "get_chat_history",
            BackendRequest::GetMessage { .. } => "get_message",
            BackendRequest::GetChatListsToAddChat { .. } => "get_chat_lists_to_add_chat",
            BackendRequest::GetChatFolder { .. } => "get_chat_folder",
            BackendRequest::GetFile { .. } => "get_file",
            BackendRequest::DownloadFile { .. } => "download_file",
            BackendRequest::SendMessage { .. } => "send_message",
            BackendRequest::SetProfilePhoto { .. } => "set_profile_photo",
            BackendRequest::SetChatDraftMessage { .. } => "set_chat_draft_message",
        }
    }
}

/// Closed set of result shapes the backend delivers to a request callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BackendObject {
    Ok,
    Error { code: i32, message: String },
    AuthorizationState(AuthorizationState),
    User(User),
    BasicGroupFullInfo(BasicGroupFullInfo),
    SupergroupFullInfo(SupergroupFullInfo),
    Chat(Chat),
    Chats(Chats),
    Message(Message),
    Messages(Messages),
    ChatLists(Vec<ChatList>),
    ChatFolder(ChatFolder),
    File(File),
}

impl BackendObject {
    pub fn kind(&self) -> &'static str {
        match self {
            BackendObject::Ok => "ok",
            BackendObject::Error { .. } => "error",
            BackendObject::AuthorizationState(_) => "authorization_state",
            BackendObject::User(_) => "user",
            BackendObject::BasicGroupFullInfo(_) => "basic_group_full_info",
            BackendObject::SupergroupFullInfo(_) => "supergroup_full_info",
            BackendObject::Chat(_) => "chat",
            BackendObject::Chats(_) => "chats",
            BackendObject::Message(_) => "message",
            BackendObject::Messages(_) => "messages",
            BackendObject::ChatLists(_) => "chat_lists",
            BackendObject::ChatFolder(_) => "chat_folder",
            BackendObject::File(_) => "file",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: i64) -> File {
        File {
            id: FileId(id),
            size: 10,
            local: LocalFile::default(),
            remote: RemoteFile::default(),
        }
    }

    #[test]
    fn photo_media_file_is_largest_variant() {
        let content = MessageContent::Photo {
            caption: String::new(),
            sizes: vec![
                PhotoSize {
                    kind: "s".into(),
                    file: file(1),
                    width: 90,
                    height: 90,
                },
                PhotoSize {
                    kind: "x".into(),
                    file: file(2),
                    width: 800,
                    height: 800,
                },
            ],
        };
        assert_eq!(content.media_file().map(|f| f.id), Some(FileId(2)));
    }

    #[test]
    fn text_has_no_media_file() {
        let mut content = MessageContent::Text {
            text: "hi".into(),
        };
        content.replace_media_file(file(3));
        assert!(content.media_file().is_none());
    }

    #[test]
    fn backend_request_serializes_with_type_tag() {
        let value = serde_json::to_value(BackendRequest::GetChat {
            chat_id: ChatId(42),
        })
        .expect("serialize");
        assert_eq!(value["type"], "get_chat");
        assert_eq!(value["payload"]["chat_id"], 42);
    }
}
