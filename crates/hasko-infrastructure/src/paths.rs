//! Unified path management for Hasko configuration and data files.
//!
//! All configuration and chat data live under a single per-user config
//! directory so every storage mechanism resolves paths the same way.

use std::path::PathBuf;

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Unified path management for Hasko.
///
/// # Directory Structure
///
/// ```text
/// ~/.config/hasko/             # Config directory
/// ├── config.toml              # Application configuration
/// ├── chats.json               # Persisted chat thread collection
/// └── logs/                    # Application logs
///     └── hasko.log
/// ```
pub struct HaskoPaths;

impl HaskoPaths {
    /// Returns the Hasko configuration directory.
    ///
    /// # Returns
    ///
    /// - `Ok(PathBuf)`: Path to config directory (e.g., `~/.config/hasko/`)
    /// - `Err(PathError::HomeDirNotFound)`: Could not determine directory
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join("hasko"))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the path to the main configuration file.
    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Returns the path to the persisted chat collection.
    pub fn chats_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("chats.json"))
    }

    /// Returns the directory for application logs.
    pub fn logs_dir() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("logs"))
    }
}
