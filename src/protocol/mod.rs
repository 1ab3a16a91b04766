//! Wire protocols spoken by the supervisor
//!
//! The supervisor only talks to the settings store; the receiver itself is
//! driven through its command line and observed through its log output.

pub mod resp;
