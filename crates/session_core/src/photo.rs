use serde::{Deserialize, Serialize};
use shared::{
    domain::{ChatId, ChatKind, FileId},
    protocol::{
        BackendRequest, BasicGroupFullInfo, Chat, ChatPhoto, File, PhotoSize, SupergroupFullInfo,
        User,
    },
};

use crate::{
    bridge,
    error::{SessionError, SessionResult},
    polling::{self, PollBudget},
    SessionHandle,
};

pub const PHOTO_SIZE_MEDIUM: &str = "m";
pub const PHOTO_SIZE_BIG: &str = "b";

const PREFERRED_SIZES: [&str; 2] = [PHOTO_SIZE_MEDIUM, PHOTO_SIZE_BIG];

/// A chat's profile image, materialized on local disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileImage {
    pub file_id: FileId,
    pub local_path: String,
}

/// Picks the first "m" variant anywhere in the list, falling back to the first "b".
pub fn select_best_size(sizes: &[PhotoSize]) -> Option<&PhotoSize> {
    PREFERRED_SIZES
        .iter()
        .find_map(|tag| sizes.iter().find(|size| size.kind == *tag))
}

fn pick_from_chat_photo(chat_id: ChatId, photo: Option<ChatPhoto>) -> SessionResult<Option<File>> {
    let Some(photo) = photo else {
        return Ok(None);
    };
    select_best_size(&photo.sizes)
        .map(|size| Some(size.file.clone()))
        .ok_or(SessionError::NoSuitablePhotoSize { chat: chat_id })
}

/// Resolves the file backing a chat's photo.
///
/// People expose their best photo on the user record. Groups only carry the
/// size list on their full info, which costs a second request.
pub async fn photo_file(session: &dyn SessionHandle, chat: &Chat) -> SessionResult<Option<File>> {
    match chat.kind {
        ChatKind::Private { user_id } | ChatKind::Secret { user_id } => {
            let user: User = bridge::call(session, BackendRequest::GetUser { user_id }).await?;
            Ok(user.profile_photo.map(|photo| photo.big))
        }
        ChatKind::BasicGroup { basic_group_id } => {
            let info: BasicGroupFullInfo = bridge::call(
                session,
                BackendRequest::GetBasicGroupFullInfo { basic_group_id },
            )
            .await?;
            pick_from_chat_photo(chat.id, info.photo)
        }
        ChatKind::Supergroup { supergroup_id, .. } => {
            let info: SupergroupFullInfo = bridge::call(
                session,
                BackendRequest::GetSupergroupFullInfo { supergroup_id },
            )
            .await?;
            pick_from_chat_photo(chat.id, info.photo)
        }
    }
}

/// Resolves and downloads a chat's profile image. Chats without a photo yield `None`.
pub async fn resolve_profile_image(
    session: &dyn SessionHandle,
    chat: &Chat,
    budget: PollBudget,
) -> SessionResult<Option<ProfileImage>> {
    if !chat.has_photo {
        return Ok(None);
    }
    let Some(file) = photo_file(session, chat).await? else {
        return Ok(None);
    };
    let file = polling::await_download(session, file.id, budget).await?;
    Ok(Some(ProfileImage {
        file_id: file.id,
        local_path: file.local.path.unwrap_or_default(),
    }))
}

#[cfg(test)]
#[path = "tests/photo_tests.rs"]
mod tests;
