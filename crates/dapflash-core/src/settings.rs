//! Programming session settings
//!
//! Settings can be loaded from a TOML file (with the `std` feature):
//!
//! ```toml
//! auto_reset = false
//! erase_mode = "page"
//! verify = true
//! detect_incompatible_target = true
//! ```
//!
//! Missing keys keep their defaults.

/// How the flash manager clears flash before programming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "std",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum EraseMode {
    /// Erase every region once when the session opens
    #[default]
    Chip,
    /// Erase each sector right before the first write into it
    Page,
}

/// Behaviour switches for a programming session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "std",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct Settings {
    /// Let the target run after programming instead of holding it halted
    pub auto_reset: bool,
    /// Erase strategy
    pub erase_mode: EraseMode,
    /// Verify every programmed page
    pub verify: bool,
    /// Refuse binary images whose vector table does not fit the target
    pub detect_incompatible_target: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_reset: true,
            erase_mode: EraseMode::Chip,
            verify: true,
            detect_incompatible_target: true,
        }
    }
}

#[cfg(feature = "std")]
pub use self::file::SettingsError;

#[cfg(feature = "std")]
mod file {
    use std::fs;
    use std::io;
    use std::path::Path;

    use thiserror::Error;

    use super::Settings;

    /// Error loading a settings file
    #[derive(Debug, Error)]
    pub enum SettingsError {
        /// I/O error reading the file
        #[error("I/O error: {0}")]
        Io(#[from] io::Error),
        /// TOML parsing error
        #[error("Parse error: {0}")]
        Parse(#[from] toml::de::Error),
    }

    impl Settings {
        /// Parse settings from a TOML string
        pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
            Ok(toml::from_str(content)?)
        }

        /// Load settings from a TOML file
        pub fn from_toml_file(path: &Path) -> Result<Self, SettingsError> {
            let content = fs::read_to_string(path)?;
            let settings = Self::from_toml_str(&content)?;
            log::debug!("Loaded settings from {}: {:?}", path.display(), settings);
            Ok(settings)
        }
    }
}
