//! Receiver settings as written by the web UI

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SupervisorError;

/// Characters that must never reach the receiver's argument vector
const FORBIDDEN_NAME_CHARS: &[char] = &['"', '\'', '`', '$', ';', '&', '|', '<', '>', '\\'];

/// Display name advertised to senders
///
/// Always 1 to 32 characters, no control characters, no shell metacharacters
/// and no leading `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceName(String);

impl DeviceName {
    /// Maximum name length in characters
    pub const MAX_LEN: usize = 32;

    /// Validate and wrap a name
    ///
    /// Surrounding whitespace is trimmed first.
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::ConfigValidation` if the name is empty, too
    /// long, or contains characters unsafe for argument embedding.
    pub fn new(name: impl AsRef<str>) -> Result<Self, SupervisorError> {
        let name = name.as_ref().trim();

        if name.is_empty() {
            return Err(SupervisorError::invalid("name", "must not be empty"));
        }

        let len = name.chars().count();
        if len > Self::MAX_LEN {
            return Err(SupervisorError::invalid(
                "name",
                format!("{len} characters exceeds limit of {}", Self::MAX_LEN),
            ));
        }

        if name.starts_with('-') {
            return Err(SupervisorError::invalid("name", "must not start with '-'"));
        }

        if let Some(c) = name
            .chars()
            .find(|c| c.is_control() || FORBIDDEN_NAME_CHARS.contains(c))
        {
            return Err(SupervisorError::invalid(
                "name",
                format!("contains forbidden character {c:?}"),
            ));
        }

        Ok(Self(name.to_string()))
    }

    /// Borrow the name
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DeviceName {
    fn default() -> Self {
        Self("Checkin Cast".to_string())
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceName {
    type Err = SupervisorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DeviceName {
    type Error = SupervisorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceName> for String {
    fn from(name: DeviceName) -> Self {
        name.0
    }
}

/// Mirroring frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Framerate {
    /// 24 fps
    Fps24,
    /// 30 fps
    #[default]
    Fps30,
    /// 60 fps
    Fps60,
}

impl Framerate {
    /// All accepted values
    pub const ALL: [Framerate; 3] = [Framerate::Fps24, Framerate::Fps30, Framerate::Fps60];

    /// Frames per second
    #[must_use]
    pub fn as_u32(self) -> u32 {
        match self {
            Framerate::Fps24 => 24,
            Framerate::Fps30 => 30,
            Framerate::Fps60 => 60,
        }
    }
}

impl fmt::Display for Framerate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

impl TryFrom<u32> for Framerate {
    type Error = SupervisorError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            24 => Ok(Framerate::Fps24),
            30 => Ok(Framerate::Fps30),
            60 => Ok(Framerate::Fps60),
            other => Err(SupervisorError::invalid(
                "framerate",
                format!("{other} is not one of 24, 30, 60"),
            )),
        }
    }
}

impl From<Framerate> for u32 {
    fn from(rate: Framerate) -> Self {
        rate.as_u32()
    }
}

impl FromStr for Framerate {
    type Err = SupervisorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s
            .trim()
            .parse()
            .map_err(|_| SupervisorError::invalid("framerate", format!("{s:?} is not a number")))?;
        Self::try_from(value)
    }
}

/// Desired receiver configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Configuration {
    /// Whether the receiver should be running at all
    pub enabled: bool,
    /// Advertised device name
    pub name: DeviceName,
    /// Mirroring frame rate
    pub framerate: Framerate,
}

impl Configuration {
    /// Enabled configuration with the given name and frame rate
    #[must_use]
    pub fn enabled(name: DeviceName, framerate: Framerate) -> Self {
        Self {
            enabled: true,
            name,
            framerate,
        }
    }

    /// Disabled configuration (name and frame rate keep their defaults)
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// Parse a boolean flag the way the web UI stores them
///
/// # Errors
///
/// Returns `SupervisorError::ConfigValidation` for anything that is not a
/// recognized truthy/falsy spelling.
pub fn parse_flag(field: &str, value: &str) -> Result<bool, SupervisorError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(SupervisorError::invalid(
            field,
            format!("{other:?} is not a boolean"),
        )),
    }
}

/// Where the receiver sends audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AudioOutput {
    /// First HDMI port
    #[default]
    Hdmi,
    /// 3.5mm jack
    Headphones,
    /// ALSA default device
    Default,
}

impl AudioOutput {
    /// GStreamer sink description passed to the receiver
    #[must_use]
    pub fn sink(self) -> &'static str {
        match self {
            AudioOutput::Hdmi => "alsasink device=hw:0,0",
            AudioOutput::Headphones => "alsasink device=hw:1,0",
            AudioOutput::Default => "alsasink",
        }
    }
}

impl FromStr for AudioOutput {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "hdmi" => AudioOutput::Hdmi,
            "headphones" => AudioOutput::Headphones,
            _ => AudioOutput::Default,
        })
    }
}

/// Display resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Resolution {
    /// 1080p, used when nothing can be detected
    pub const FULL_HD: Resolution = Resolution {
        width: 1920,
        height: 1080,
    };

    /// Create a resolution
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = SupervisorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SupervisorError::invalid("resolution", format!("{s:?} is not WIDTHxHEIGHT"));

        let (width, height) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width: u32 = width.trim().parse().map_err(|_| invalid())?;
        let height: u32 = height.trim().parse().map_err(|_| invalid())?;

        if width == 0 || height == 0 {
            return Err(invalid());
        }

        Ok(Self { width, height })
    }
}
