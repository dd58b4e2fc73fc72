//! Cross-platform path utilities for digitrec.
//!
//! Single place that decides where trained models and the config file live
//! on disk.
//!
//! # Platform Behavior
//!
//! | Platform | Data Directory | Config Directory |
//! |----------|----------------|------------------|
//! | Linux    | `~/.local/share/digitrec` | `~/.config/digitrec` |
//! | macOS    | `~/Library/Application Support/digitrec` | Same as data dir |
//! | Windows  | `%APPDATA%/digitrec` | Same as data dir |

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

/// Errors specific to path operations.
#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not determine data directory")]
    NoDataDirectory,

    #[error("Could not determine config directory")]
    NoConfigDirectory,
}

/// Application identifier used in path construction.
const APP_NAME: &str = "digitrec";

/// File name of the TOML configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Create `dir` (and parents) if missing, restricting it to the owner on Unix.
fn ensure_private_dir(dir: &Path, what: &str) -> Result<()> {
    if dir.exists() {
        return Ok(());
    }

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {} directory: {}", what, dir.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o700);
        fs::set_permissions(dir, perms)
            .with_context(|| format!("Failed to set permissions on {}", dir.display()))?;
    }

    Ok(())
}

/// Get the application data directory.
///
/// Creates the directory if it doesn't exist with secure permissions (0o700).
///
/// # Errors
/// Returns an error if the directory cannot be determined or created.
pub fn get_data_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().ok_or(PathError::NoDataDirectory)?;
    let data_dir = base_dir.join(APP_NAME);
    ensure_private_dir(&data_dir, "data")?;
    Ok(data_dir)
}

/// Get the directory holding trained digit models (`hmm_<digit>.json`).
///
/// # Platform Behavior
/// - All platforms: `<data_dir>/models`
pub fn get_models_dir() -> Result<PathBuf> {
    let models_dir = get_data_dir()?.join("models");
    ensure_private_dir(&models_dir, "models")?;
    Ok(models_dir)
}

/// Get the configuration directory.
///
/// # Platform Behavior
/// - **Linux**: `~/.config/digitrec`
/// - **macOS/Windows**: config lives with data
pub fn get_config_dir() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let config_base = dirs::config_dir().ok_or(PathError::NoConfigDirectory)?;
        let config_dir = config_base.join(APP_NAME);
        ensure_private_dir(&config_dir, "config")?;
        Ok(config_dir)
    }

    #[cfg(not(target_os = "linux"))]
    {
        get_data_dir()
    }
}

/// Path of the default `config.toml`.
pub fn get_config_file() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

/// File name used for the model of a single digit label.
pub fn model_file_name(digit: u8) -> String {
    format!("hmm_{}.json", digit)
}
