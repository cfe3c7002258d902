//! Local staging of uploaded payloads before the backend picks them up.

use std::{
    io::{Cursor, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use image::{imageops::FilterType, DynamicImage, ImageFormat};
use shared::{domain::FileId, protocol::BackendRequest};
use tempfile::TempPath;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    bridge::{self, FromBackendObject},
    error::{SessionError, SessionResult},
    polling::{self, PollBudget},
    SessionHandle,
};

pub const DEFAULT_IMAGE_FORMAT: ImageFormat = ImageFormat::Jpeg;

const ENCODABLE_FORMATS: [ImageFormat; 5] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::WebP,
    ImageFormat::Bmp,
];

/// A staged file on local disk. Dropping it deletes the file.
#[derive(Debug)]
pub struct StagedFile {
    path: TempPath,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn path_string(&self) -> String {
        self.path.display().to_string()
    }

    pub fn discard(self) -> std::io::Result<()> {
        self.path.close()
    }
}

pub trait LocalStaging: Send + Sync {
    fn stage(&self, filename: &str, payload: &[u8]) -> SessionResult<StagedFile>;
}

#[derive(Debug, Clone, Default)]
pub struct TempDirStaging {
    dir: Option<PathBuf>,
}

impl TempDirStaging {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }
}

impl LocalStaging for TempDirStaging {
    fn stage(&self, filename: &str, payload: &[u8]) -> SessionResult<StagedFile> {
        let suffix = Path::new(filename)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let mut builder = tempfile::Builder::new();
        builder.prefix("staged-").suffix(&suffix);
        let created = match &self.dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        let mut file =
            created.map_err(|e| SessionError::io("failed to create staging file", e))?;
        file.write_all(payload)
            .and_then(|_| file.flush())
            .map_err(|e| SessionError::io(format!("failed to write staging file for '{filename}'"), e))?;
        let staged = StagedFile {
            path: file.into_temp_path(),
        };
        debug!(path = %staged.path().display(), bytes = payload.len(), "staging: payload written");
        Ok(staged)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

pub fn format_for_filename(filename: &str) -> ImageFormat {
    Path::new(filename)
        .extension()
        .and_then(ImageFormat::from_extension)
        .filter(|format| ENCODABLE_FORMATS.contains(format))
        .unwrap_or(DEFAULT_IMAGE_FORMAT)
}

/// Images already within `max_edge` are passed through untouched.
pub fn prepare_image(payload: &[u8], filename: &str, max_edge: u32) -> SessionResult<PreparedImage> {
    let image = image::load_from_memory(payload)
        .map_err(|e| SessionError::image(format!("failed to decode image '{filename}'"), e))?;
    if image.width().max(image.height()) <= max_edge {
        return Ok(PreparedImage {
            bytes: payload.to_vec(),
            width: image.width(),
            height: image.height(),
        });
    }

    let format = format_for_filename(filename);
    let resized = image.resize(max_edge, max_edge, FilterType::Lanczos3);
    let resized = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8()),
        _ => resized,
    };
    let mut out = Cursor::new(Vec::new());
    resized
        .write_to(&mut out, format)
        .map_err(|e| SessionError::image(format!("failed to encode image '{filename}'"), e))?;
    debug!(
        original_width = image.width(),
        original_height = image.height(),
        width = resized.width(),
        height = resized.height(),
        ?format,
        "staging: image downscaled"
    );
    Ok(PreparedImage {
        bytes: out.into_inner(),
        width: resized.width(),
        height: resized.height(),
    })
}

pub enum CleanupPolicy {
    FixedDelay(Duration),
    UntilUploaded {
        session: Arc<dyn SessionHandle>,
        file_id: FileId,
        budget: PollBudget,
    },
}

/// Failures are logged and swallowed.
pub fn schedule_cleanup(staged: StagedFile, policy: CleanupPolicy) -> JoinHandle<()> {
    tokio::spawn(async move {
        match policy {
            CleanupPolicy::FixedDelay(delay) => tokio::time::sleep(delay).await,
            CleanupPolicy::UntilUploaded {
                session,
                file_id,
                budget,
            } => {
                if let Err(error) = polling::await_upload(session.as_ref(), file_id, budget).await {
                    warn!(
                        file_id = file_id.0,
                        %error,
                        "staging: upload not confirmed; deleting staged file anyway"
                    );
                }
            }
        }
        let path = staged.path_string();
        match staged.discard() {
            Ok(()) => debug!(%path, "staging: staged file removed"),
            Err(error) => warn!(%path, %error, "staging: failed to remove staged file"),
        }
    })
}

/// Sends `request` from a detached task that owns `staged`, then hands the
/// file to `policy`. A caller that stops waiting leaves the file in place for
/// the backend; a rejected request drops it at once.
pub async fn submit_staged<T, P>(
    session: Arc<dyn SessionHandle>,
    staged: StagedFile,
    request: BackendRequest,
    policy: P,
) -> SessionResult<T>
where
    T: FromBackendObject + Send + 'static,
    P: FnOnce(&T) -> CleanupPolicy + Send + 'static,
{
    tokio::spawn(async move {
        let result: T = bridge::call(session.as_ref(), request).await?;
        schedule_cleanup(staged, policy(&result));
        Ok(result)
    })
    .await
    .map_err(SessionError::Task)?
}

#[cfg(test)]
#[path = "tests/staging_tests.rs"]
mod tests;
