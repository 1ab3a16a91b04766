//! RESP2 (Redis serialization protocol) implementation
//!
//! Only the subset needed to read settings, publish state and follow a
//! pub/sub channel is supported.

mod codec;
mod value;


pub use codec::{RespCodec, RespCodecError, encode_command};
pub use value::RespValue;
