use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::{json, Value};
use session_core::{
    config::load_settings,
    loopback::{LoopbackFactory, LoopbackState},
    staging::TempDirStaging,
    views::MediaUpload,
    ChatViews, ConnectionParams, CredentialProvider, Gateway, SessionError, SessionRegistry,
};
use shared::{
    domain::{AccountId, ChatId, ChatKind, ChatList, FolderId, MessageId, UserId},
    error::ApiError,
    protocol::{Chat, ChatFolder, Message, MessageContent, User},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Drives the session layer against an in-memory backend.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value_t = 1)]
    account: i64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List chats under "main", "archive" or "folder:<id>".
    Chats {
        #[arg(long, default_value = "main")]
        list: String,
        #[arg(long, default_value_t = 50)]
        limit: i32,
    },
    Folders,
    History {
        #[arg(long)]
        chat: i64,
        #[arg(long, default_value_t = 50)]
        limit: i32,
    },
    Message {
        #[arg(long)]
        chat: i64,
        #[arg(long)]
        message: i64,
    },
    Send {
        #[arg(long)]
        chat: i64,
        #[arg(long)]
        text: String,
    },
    /// Send a local file as a photo, video or document.
    SendFile {
        #[arg(long)]
        chat: i64,
        #[arg(long, value_enum)]
        kind: FileKind,
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        caption: Option<String>,
    },
    Summary,
    AuthState,
    Draft {
        #[arg(long)]
        chat: i64,
        /// Deletes the draft when omitted.
        #[arg(long)]
        text: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FileKind {
    Photo,
    Video,
    Document,
}

struct StaticCredentials;

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn connection_params(&self, account: AccountId) -> Result<ConnectionParams> {
        Ok(ConnectionParams {
            account,
            api_id: 0,
            api_hash: "loopback".into(),
            data_dir: std::env::temp_dir().join(format!("probe-{account}")),
        })
    }
}

fn seed_state() -> LoopbackState {
    let me = User {
        id: UserId(1),
        first_name: "Probe".into(),
        last_name: String::new(),
        username: Some("probe".into()),
        profile_photo: None,
    };
    let mut state = LoopbackState::new().signed_in(me);
    let base = Utc
        .timestamp_opt(1_700_000_000, 0)
        .single()
        .unwrap_or_else(Utc::now);

    for (id, name) in [(1, "Saved Messages"), (2, "Ada"), (3, "Grace")] {
        let lists = if id == 1 {
            vec![ChatList::Main]
        } else {
            vec![ChatList::Main, ChatList::Folder(FolderId(1))]
        };
        state.add_user(User {
            id: UserId(id),
            first_name: name.into(),
            last_name: String::new(),
            username: Some(name.to_lowercase()),
            profile_photo: None,
        });
        state.add_chat(
            Chat {
                id: ChatId(id),
                kind: ChatKind::Private {
                    user_id: UserId(id),
                },
                title: name.into(),
                last_message: None,
                last_read_inbox_message_id: MessageId::NEWEST,
                last_read_outbox_message_id: MessageId(if id == 2 { 3 } else { 0 }),
                unread_count: id as i32 - 1,
                has_photo: false,
                draft: None,
            },
            &lists,
        );
    }
    for id in 1..=6 {
        state.add_message(Message {
            id: MessageId(id),
            chat_id: ChatId(2),
            sender_id: Some(UserId(if id % 2 == 0 { 1 } else { 2 })),
            is_outgoing: id % 2 == 0,
            date: base + Duration::minutes(id),
            content: MessageContent::Text {
                text: format!("message {id}"),
            },
            is_read: false,
        });
    }
    state.add_folder(
        FolderId(1),
        ChatFolder {
            title: "Friends".into(),
            included_chat_ids: vec![ChatId(2), ChatId(3)],
        },
    );
    state
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn to_json(value: impl Serialize) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

fn run(gateway: &Gateway, account: AccountId, command: Command) -> Result<Value> {
    match command {
        Command::Chats { list, limit } => {
            to_json(gateway.list_chats_by_selector(&list, limit, account)?)
        }
        Command::Folders => to_json(gateway.list_folders(account)?),
        Command::History { chat, limit } => to_json(gateway.history(ChatId(chat), limit, account)?),
        Command::Message { chat, message } => {
            to_json(gateway.message(ChatId(chat), MessageId(message), account)?)
        }
        Command::Send { chat, text } => {
            gateway.send_text(ChatId(chat), &text, account)?;
            Ok(json!({ "status": "sent" }))
        }
        Command::SendFile {
            chat,
            kind,
            path,
            caption,
        } => {
            let payload = std::fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let upload = MediaUpload {
                filename: path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "upload".into()),
                payload,
                caption,
            };
            match kind {
                FileKind::Photo => gateway.send_photo(ChatId(chat), upload, account)?,
                FileKind::Video => gateway.send_video(ChatId(chat), upload, account)?,
                FileKind::Document => gateway.send_document(ChatId(chat), upload, account)?,
            }
            Ok(json!({ "status": "sent" }))
        }
        Command::Summary => to_json(gateway.notification_summary(account)?),
        Command::AuthState => to_json(gateway.auth_state(account)?),
        Command::Draft { chat, text } => {
            match text {
                Some(text) => gateway.create_draft(ChatId(chat), &text, account)?,
                None => gateway.delete_draft(ChatId(chat), account)?,
            }
            Ok(json!({ "status": "ok" }))
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();
    let settings = load_settings();
    let account = AccountId(args.account);

    let staging = Arc::new(TempDirStaging::new(settings.staging_dir.clone()));
    let views = ChatViews::new(SessionRegistry::new(), staging, settings);
    let gateway = Gateway::new(views).context("failed to start gateway")?;
    let factory = LoopbackFactory::new(seed_state(), 2, 2);
    gateway
        .open_session(account, &StaticCredentials, &factory)
        .context("failed to open loopback session")?;
    info!(account = account.0, "probe: session ready");

    let outcome = run(&gateway, account, args.command);
    gateway.shutdown();
    match outcome {
        Ok(value) => print_json(&value),
        Err(error) => {
            let error = error.downcast::<SessionError>()?;
            print_json(&ApiError::from(error))?;
            std::process::exit(1);
        }
    }
}
