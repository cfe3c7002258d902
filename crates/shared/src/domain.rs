use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(AccountId);
id_newtype!(ChatId);
id_newtype!(MessageId);
id_newtype!(UserId);
id_newtype!(BasicGroupId);
id_newtype!(SupergroupId);
id_newtype!(FileId);
id_newtype!(FolderId);

impl MessageId {
    /// Cursor value asking the backend for the most recent messages.
    pub const NEWEST: MessageId = MessageId(0);

    pub fn is_set(self) -> bool {
        self.0 != 0
    }
}

/// Scope used to enumerate a bounded set of chats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "folder_id", rename_all = "snake_case")]
pub enum ChatList {
    Main,
    Archive,
    Folder(FolderId),
}

impl ChatList {
    pub fn folder_id(&self) -> Option<FolderId> {
        match self {
            ChatList::Folder(id) => Some(*id),
            ChatList::Main | ChatList::Archive => None,
        }
    }
}

impl std::str::FromStr for ChatList {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("main") {
            return Ok(ChatList::Main);
        }
        if raw.eq_ignore_ascii_case("archive") {
            return Ok(ChatList::Archive);
        }
        let id = raw
            .strip_prefix("folder:")
            .unwrap_or(raw)
            .parse::<i64>()
            .map_err(|_| format!("unknown chat list selector '{raw}'"))?;
        Ok(ChatList::Folder(FolderId(id)))
    }
}

impl std::fmt::Display for ChatList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatList::Main => f.write_str("main"),
            ChatList::Archive => f.write_str("archive"),
            ChatList::Folder(id) => write!(f, "folder:{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatKind {
    Private { user_id: UserId },
    Secret { user_id: UserId },
    BasicGroup { basic_group_id: BasicGroupId },
    Supergroup { supergroup_id: SupergroupId, is_channel: bool },
}

/// Authorization state as reported by the chat backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationState {
    WaitPhoneNumber,
    WaitCode,
    WaitPassword,
    Ready,
    LoggingOut,
    Closing,
    Closed,
}
