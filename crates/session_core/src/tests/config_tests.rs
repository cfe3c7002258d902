use super::*;
use std::collections::HashMap;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_match_documented_budgets() {
    let settings = Settings::default();
    assert_eq!(settings.profile_photo_poll, PollBudget::new(10, 300));
    assert_eq!(settings.media_download_poll, PollBudget::new(60, 1_000));
    assert_eq!(settings.upload_cleanup_poll, PollBudget::new(120, 1_000));
    assert_eq!(settings.staged_cleanup_delay(), Duration::from_secs(30));
    assert_eq!(settings.call_timeout(), None);
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = load_settings_from(&dir.path().join(SETTINGS_FILE));
    assert_eq!(settings, Settings::default());
}

#[test]
fn file_values_override_defaults_partially() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(SETTINGS_FILE);
    fs::write(
        &path,
        r#"
max_image_edge = 640
call_timeout_ms = 5000

[media_download_poll]
max_attempts = 3
delay_ms = 50
"#,
    )
    .expect("write settings");

    let settings = load_settings_from(&path);

    assert_eq!(settings.max_image_edge, 640);
    assert_eq!(settings.call_timeout(), Some(Duration::from_secs(5)));
    assert_eq!(settings.media_download_poll, PollBudget::new(3, 50));
    assert_eq!(settings.profile_photo_poll, PollBudget::new(10, 300));
}

#[test]
fn malformed_file_yields_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(SETTINGS_FILE);
    fs::write(&path, "max_image_edge = \"wide\"").expect("write settings");

    assert_eq!(load_settings_from(&path), Settings::default());
}

#[test]
fn env_overrides_apply_and_bad_values_are_ignored() {
    let mut settings = Settings::default();
    apply_overrides(
        &mut settings,
        lookup_from(&[
            ("APP__PROFILE_PHOTO_ATTEMPTS", "4"),
            ("APP__PROFILE_PHOTO_DELAY_MS", "soon"),
            ("APP__CALL_TIMEOUT_MS", "250"),
            ("APP__STAGING_DIR", "/var/spool/gateway"),
        ]),
    );

    assert_eq!(settings.profile_photo_poll, PollBudget::new(4, 300));
    assert_eq!(settings.call_timeout(), Some(Duration::from_millis(250)));
    assert_eq!(
        settings.staging_dir.as_deref(),
        Some(Path::new("/var/spool/gateway"))
    );
}

#[test]
fn partial_budget_table_keeps_its_own_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(SETTINGS_FILE);
    fs::write(
        &path,
        r#"
max_image_edge = 640

[media_download_poll]
max_attempts = 5

[upload_cleanup_poll]
delay_ms = 250
"#,
    )
    .expect("write settings");

    let settings = load_settings_from(&path);

    assert_eq!(settings.max_image_edge, 640);
    assert_eq!(settings.media_download_poll, PollBudget::new(5, 1_000));
    assert_eq!(settings.upload_cleanup_poll, PollBudget::new(120, 250));
    assert_eq!(settings.profile_photo_poll, PollBudget::new(10, 300));
}
