//! Receiver process management
//!
//! Everything needed to launch the AirPlay receiver binary and make sense of
//! it while it runs: the command line, the display it renders to, the child
//! process itself and the session markers in its output.

pub mod display;
pub mod invocation;
pub mod log_parser;
pub mod process;

#[cfg(test)]
mod display_tests;
#[cfg(test)]
mod invocation_tests;

pub use display::detect_resolution;
pub use invocation::ReceiverInvocation;
pub use log_parser::{LogEvent, parse_line};
pub use process::ReceiverProcess;
