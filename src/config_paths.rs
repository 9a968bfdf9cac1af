//! Centralized configuration paths for Narrative_Edit
//!
//! All config files live under:
//! - Unix/macOS: `~/.config/Narrative_Edit/`
//! - Windows: `%APPDATA%\Narrative_Edit\`
//!
//! Installs from before the rename kept their data in a `TagSumi` directory
//! beside it; [`migrate_legacy_store`] copies that data over once.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

/// Application id written into every file this crate saves
pub const APP_ID: &str = "Narrative_Edit";

/// Application id of the legacy store, still accepted when reading sessions
pub const LEGACY_APP_ID: &str = "TagSumi";

const CONFIG_FILE: &str = "config.json";
const SESSIONS_DIR: &str = "sessions";
const LOG_FILE: &str = "narrative.log";

/// Directory that holds per-application config directories
fn base_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        env::var_os("APPDATA")
            .map(PathBuf::from)
            .or_else(dirs::config_dir)
    }

    #[cfg(not(target_os = "windows"))]
    {
        env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
    }
}

/// Base config directory for Narrative_Edit
pub fn config_dir() -> Option<PathBuf> {
    base_dir().map(|dir| dir.join(APP_ID))
}

/// Config directory of the legacy install
pub fn legacy_config_dir() -> Option<PathBuf> {
    base_dir().map(|dir| dir.join(LEGACY_APP_ID))
}

/// `<config>/config.json`
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE))
}

/// `<config>/logs/`
pub fn logs_dir() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("logs"))
}

/// File name prefix of the rolling log
pub fn log_file_prefix() -> &'static str {
    LOG_FILE
}

fn ensure_dir(path: &Path) -> Result<(), String> {
    fs::create_dir_all(path)
        .map_err(|e| format!("Failed to create directory {}: {}", path.display(), e))
}

/// Ensure the base config dir exists, returning it
pub fn ensure_config_dir() -> Result<PathBuf, String> {
    let dir = config_dir().ok_or_else(|| "No config directory available".to_string())?;
    ensure_dir(&dir)?;
    Ok(dir)
}

/// Ensure sessions dir exists, returning it
pub fn ensure_sessions_dir() -> Result<PathBuf, String> {
    let sessions = ensure_config_dir()?.join(SESSIONS_DIR);
    ensure_dir(&sessions)?;
    Ok(sessions)
}

/// Ensure logs dir exists, returning it
pub fn ensure_logs_dir() -> Result<PathBuf, String> {
    let logs = ensure_config_dir()?.join("logs");
    ensure_dir(&logs)?;
    Ok(logs)
}

/// Write through a temporary sibling and rename over `path`, so readers never
/// see a half-written file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

/// What [`migrate_legacy_store`] copied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegacyMigration {
    pub config_copied: bool,
    pub sessions_copied: bool,
}

/// Copy `config.json` and `sessions/` from the legacy store into `current`.
///
/// Each item is copied only when the legacy one exists and the current one
/// does not; existing current data is never overwritten.
pub fn migrate_legacy_store(current: &Path, legacy: &Path) -> io::Result<LegacyMigration> {
    let mut report = LegacyMigration::default();
    if !legacy.is_dir() {
        return Ok(report);
    }
    fs::create_dir_all(current)?;

    let legacy_config = legacy.join(CONFIG_FILE);
    let current_config = current.join(CONFIG_FILE);
    if legacy_config.is_file() && !current_config.exists() {
        fs::copy(&legacy_config, &current_config)?;
        report.config_copied = true;
    }

    let legacy_sessions = legacy.join(SESSIONS_DIR);
    let current_sessions = current.join(SESSIONS_DIR);
    if legacy_sessions.is_dir() && !current_sessions.exists() {
        copy_dir(&legacy_sessions, &current_sessions)?;
        report.sessions_copied = true;
    }

    if report.config_copied || report.sessions_copied {
        tracing::info!(
            "migrated legacy store {} (config: {}, sessions: {})",
            legacy.display(),
            report.config_copied,
            report.sessions_copied
        );
    }
    Ok(report)
}

/// Migrate the platform legacy store into the platform config dir
pub fn migrate_default_legacy_store() -> io::Result<LegacyMigration> {
    match (config_dir(), legacy_config_dir()) {
        (Some(current), Some(legacy)) => migrate_legacy_store(&current, &legacy),
        _ => Ok(LegacyMigration::default()),
    }
}

fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}
