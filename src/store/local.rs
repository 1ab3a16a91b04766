//! Fallback settings from the player's own INI file
//!
//! Older installs keep the receiver name in `~/.screenly/screenly.conf`
//! rather than in the store:
//!
//! ```ini
//! [airplay]
//! airplay_name = Lobby
//!
//! [viewer]
//! audio_output = headphones
//! ```

use std::path::{Path, PathBuf};

use ini::Ini;

use crate::error::{Result, SupervisorError};

/// Section and key holding the fallback device name
pub const NAME_SECTION: &str = "airplay";
/// Key under [`NAME_SECTION`]
pub const NAME_KEY: &str = "airplay_name";
/// Section and key holding the audio output
pub const AUDIO_SECTION: &str = "viewer";
/// Key under [`AUDIO_SECTION`]
pub const AUDIO_KEY: &str = "audio_output";

/// Values read from the local settings file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalSettings {
    /// `[airplay] airplay_name`
    pub airplay_name: Option<String>,
    /// `[viewer] audio_output`
    pub audio_output: Option<String>,
}

impl LocalSettings {
    /// Parse INI text
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::ConfigValidation` if the text is not valid INI.
    pub fn parse(contents: &str) -> Result<Self> {
        let ini = Ini::load_from_str(contents)
            .map_err(|e| SupervisorError::invalid("settings file", e.to_string()))?;

        let value = |section: &str, key: &str| {
            ini.get_from(Some(section), key)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Ok(Self {
            airplay_name: value(NAME_SECTION, NAME_KEY),
            audio_output: value(AUDIO_SECTION, AUDIO_KEY),
        })
    }

    /// Read `path`; a missing or unreadable file yields `None`
    pub async fn load(path: &Path) -> Option<Self> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Could not read {}: {}", path.display(), e);
                return None;
            }
        };

        match Self::parse(&contents) {
            Ok(settings) => Some(settings),
            Err(e) => {
                tracing::warn!("Ignoring {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// `~/.screenly/screenly.conf`, if there is a home directory
#[must_use]
pub fn default_settings_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".screenly").join("screenly.conf"))
}
