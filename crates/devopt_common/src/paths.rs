//! Path helpers
//!
//! Editor settings live at a fixed per-platform location under the home
//! directory. The daemon config follows the XDG config directory.

use std::path::{Path, PathBuf};

/// Application directory name under the user config dir
pub const APP_DIR: &str = "devenv-optimizer";

/// Editor settings path for the running platform
pub fn default_settings_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    settings_path_for(std::env::consts::OS, &home)
}

/// Editor settings path for a given OS family
///
/// - windows: `AppData/Roaming/Code/User/settings.json`
/// - macos: `Library/Application Support/Code/User/settings.json`
/// - anything else: `.config/Code/User/settings.json`
pub fn settings_path_for(os: &str, home: &Path) -> PathBuf {
    let base = match os {
        "windows" => home.join("AppData").join("Roaming"),
        "macos" => home.join("Library").join("Application Support"),
        _ => home.join(".config"),
    };
    base.join("Code").join("User").join("settings.json")
}

/// Daemon config file location
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.toml")
}
