//! Receiver command line

use std::fmt;
use std::path::{Path, PathBuf};

use crate::types::{Configuration, Resolution, SupervisorConfig};

/// Video sink the receiver renders through (direct to the display, no compositor)
pub const VIDEO_SINK: &str = "kmssink";

/// Full argument vector for one receiver launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverInvocation {
    program: PathBuf,
    args: Vec<String>,
}

impl ReceiverInvocation {
    /// Build the launch arguments for `cfg` on a display of `resolution`
    ///
    /// The name is passed as a single argument and never goes through a shell.
    #[must_use]
    pub fn build(cfg: &Configuration, launch: &SupervisorConfig, resolution: Resolution) -> Self {
        let fps = cfg.framerate.to_string();

        let mut args = vec![
            "-n".to_string(),
            cfg.name.as_str().to_string(),
            // Use the name exactly as given, no "@hostname" suffix
            "-nh".to_string(),
            "-s".to_string(),
            format!("{resolution}@{fps}"),
            "-fps".to_string(),
            fps,
            "-vsync".to_string(),
            "no".to_string(),
        ];

        if launch.software_decode {
            args.push("-avdec".to_string());
        }

        args.extend([
            "-vs".to_string(),
            VIDEO_SINK.to_string(),
            "-fs".to_string(),
            // Never drop a client for inactivity
            "-reset".to_string(),
            "0".to_string(),
            "-as".to_string(),
            launch.audio_output.sink().to_string(),
        ]);

        Self {
            program: launch.binary.clone(),
            args,
        }
    }

    /// Arbitrary command line, for running something other than the receiver
    #[must_use]
    pub fn new(
        program: impl Into<PathBuf>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Binary to execute
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments after the binary
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Binary followed by its arguments
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Look up the value following `flag`
    #[must_use]
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        let pos = self.args.iter().position(|a| a == flag)?;
        self.args.get(pos + 1).map(String::as_str)
    }
}

impl fmt::Display for ReceiverInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}
