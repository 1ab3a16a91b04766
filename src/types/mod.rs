//! Core types module

mod config;
mod settings;
#[cfg(test)]
mod tests;

pub use config::{SupervisorConfig, SupervisorConfigBuilder};
pub use settings::{
    AudioOutput, Configuration, DeviceName, Framerate, Resolution, parse_flag,
};
