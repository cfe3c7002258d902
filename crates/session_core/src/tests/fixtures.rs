//! Builders for backend records shared by the unit tests.

use chrono::{DateTime, TimeZone, Utc};
use shared::{
    domain::{ChatId, ChatKind, FileId, MessageId, UserId},
    protocol::{
        Chat, ChatPhoto, File, LocalFile, Message, MessageContent, PhotoSize, ProfilePhoto,
        RemoteFile, User,
    },
};

pub fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + seconds, 0)
        .single()
        .expect("valid timestamp")
}

pub fn remote_file(id: i64) -> File {
    File {
        id: FileId(id),
        size: 2_048,
        local: LocalFile::default(),
        remote: RemoteFile {
            is_uploading_active: false,
            is_uploading_completed: true,
            uploaded_size: 2_048,
        },
    }
}

pub fn local_file(id: i64) -> File {
    let mut file = remote_file(id);
    file.local = LocalFile {
        path: Some(format!("/cache/{id}.jpg")),
        is_downloading_active: false,
        is_downloading_completed: true,
        downloaded_size: 2_048,
    };
    file
}

pub fn photo_size(kind: &str, file: File) -> PhotoSize {
    PhotoSize {
        kind: kind.into(),
        file,
        width: 320,
        height: 320,
    }
}

pub fn chat_photo(sizes: Vec<PhotoSize>) -> ChatPhoto {
    ChatPhoto { id: 1, sizes }
}

pub fn user(id: i64, first_name: &str) -> User {
    User {
        id: UserId(id),
        first_name: first_name.into(),
        last_name: String::new(),
        username: Some(first_name.to_lowercase()),
        profile_photo: None,
    }
}

pub fn user_with_photo(id: i64, first_name: &str, big: File) -> User {
    User {
        profile_photo: Some(ProfilePhoto {
            id: id * 10,
            small: remote_file(big.id.0 + 1),
            big,
        }),
        ..user(id, first_name)
    }
}

pub fn chat(id: i64, kind: ChatKind) -> Chat {
    Chat {
        id: ChatId(id),
        kind,
        title: format!("chat {id}"),
        last_message: None,
        last_read_inbox_message_id: MessageId::NEWEST,
        last_read_outbox_message_id: MessageId::NEWEST,
        unread_count: 0,
        has_photo: false,
        draft: None,
    }
}

pub fn private_chat(user_id: i64) -> Chat {
    chat(
        user_id,
        ChatKind::Private {
            user_id: UserId(user_id),
        },
    )
}

pub fn text_message(chat_id: i64, id: i64, is_outgoing: bool, date: DateTime<Utc>) -> Message {
    Message {
        id: MessageId(id),
        chat_id: ChatId(chat_id),
        sender_id: None,
        is_outgoing,
        date,
        content: MessageContent::Text {
            text: format!("message {id}"),
        },
        is_read: false,
    }
}

/// A small solid-color PNG.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}
