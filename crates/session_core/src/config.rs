use std::{fs, path::Path, path::PathBuf, str::FromStr, time::Duration};

use serde::Deserialize;
use tracing::warn;

use crate::polling::PollBudget;

pub const SETTINGS_FILE: &str = "gateway.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "SettingsFile")]
pub struct Settings {
    /// Profile photos are small; poll briefly.
    pub profile_photo_poll: PollBudget,
    /// Message media can be large; poll for longer.
    pub media_download_poll: PollBudget,
    /// Background watch on video uploads before deleting the staged copy.
    pub upload_cleanup_poll: PollBudget,
    pub staged_cleanup_delay_ms: u64,
    pub max_image_edge: u32,
    /// Bound on each blocking gateway call. Unset waits indefinitely.
    pub call_timeout_ms: Option<u64>,
    pub staging_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            profile_photo_poll: PollBudget::new(10, 300),
            media_download_poll: PollBudget::new(60, 1_000),
            upload_cleanup_poll: PollBudget::new(120, 1_000),
            staged_cleanup_delay_ms: 30_000,
            max_image_edge: 1_280,
            call_timeout_ms: None,
            staging_dir: None,
        }
    }
}

/// A poll budget table where either key may be left out.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BudgetFile {
    max_attempts: Option<u32>,
    delay_ms: Option<u64>,
}

impl BudgetFile {
    fn merge_into(self, budget: &mut PollBudget) {
        if let Some(max_attempts) = self.max_attempts {
            budget.max_attempts = max_attempts;
        }
        if let Some(delay_ms) = self.delay_ms {
            budget.delay_ms = delay_ms;
        }
    }
}

/// On-disk shape of [`Settings`]. Absent keys keep their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsFile {
    profile_photo_poll: BudgetFile,
    media_download_poll: BudgetFile,
    upload_cleanup_poll: BudgetFile,
    staged_cleanup_delay_ms: Option<u64>,
    max_image_edge: Option<u32>,
    call_timeout_ms: Option<u64>,
    staging_dir: Option<PathBuf>,
}

impl From<SettingsFile> for Settings {
    fn from(file: SettingsFile) -> Self {
        let mut settings = Settings::default();
        file.profile_photo_poll
            .merge_into(&mut settings.profile_photo_poll);
        file.media_download_poll
            .merge_into(&mut settings.media_download_poll);
        file.upload_cleanup_poll
            .merge_into(&mut settings.upload_cleanup_poll);
        if let Some(delay) = file.staged_cleanup_delay_ms {
            settings.staged_cleanup_delay_ms = delay;
        }
        if let Some(edge) = file.max_image_edge {
            settings.max_image_edge = edge;
        }
        settings.call_timeout_ms = file.call_timeout_ms;
        settings.staging_dir = file.staging_dir;
        settings
    }
}

impl Settings {
    pub fn staged_cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.staged_cleanup_delay_ms)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}

/// Loads `gateway.toml` from the working directory, then `APP__*` overrides.
pub fn load_settings() -> Settings {
    let mut settings = load_settings_from(Path::new(SETTINGS_FILE));
    apply_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

/// Reads settings from a TOML file. A missing or malformed file yields defaults.
pub fn load_settings_from(path: &Path) -> Settings {
    let Ok(raw) = fs::read_to_string(path) else {
        return Settings::default();
    };
    match toml::from_str::<Settings>(&raw) {
        Ok(settings) => settings,
        Err(error) => {
            warn!(path = %path.display(), %error, "config: ignoring malformed settings file");
            Settings::default()
        }
    }
}

fn parse_into<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, target: &mut T) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(key, value = %raw, "config: ignoring unparsable override"),
        }
    }
}

pub fn apply_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    parse_into(
        &lookup,
        "APP__PROFILE_PHOTO_ATTEMPTS",
        &mut settings.profile_photo_poll.max_attempts,
    );
    parse_into(
        &lookup,
        "APP__PROFILE_PHOTO_DELAY_MS",
        &mut settings.profile_photo_poll.delay_ms,
    );
    parse_into(
        &lookup,
        "APP__MEDIA_DOWNLOAD_ATTEMPTS",
        &mut settings.media_download_poll.max_attempts,
    );
    parse_into(
        &lookup,
        "APP__MEDIA_DOWNLOAD_DELAY_MS",
        &mut settings.media_download_poll.delay_ms,
    );
    parse_into(
        &lookup,
        "APP__UPLOAD_CLEANUP_ATTEMPTS",
        &mut settings.upload_cleanup_poll.max_attempts,
    );
    parse_into(
        &lookup,
        "APP__UPLOAD_CLEANUP_DELAY_MS",
        &mut settings.upload_cleanup_poll.delay_ms,
    );
    parse_into(
        &lookup,
        "APP__STAGED_CLEANUP_DELAY_MS",
        &mut settings.staged_cleanup_delay_ms,
    );
    parse_into(&lookup, "APP__MAX_IMAGE_EDGE", &mut settings.max_image_edge);

    if let Some(raw) = lookup("APP__CALL_TIMEOUT_MS") {
        match raw.trim().parse::<u64>() {
            Ok(ms) => settings.call_timeout_ms = Some(ms),
            Err(_) => warn!(value = %raw, "config: ignoring unparsable APP__CALL_TIMEOUT_MS"),
        }
    }
    if let Some(dir) = lookup("APP__STAGING_DIR") {
        settings.staging_dir = Some(PathBuf::from(dir));
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
