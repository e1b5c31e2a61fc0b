// src/core/protocol/mod.rs

//! RESP (REdis Serialization Protocol) framing: C1.

mod resp_frame;

pub use resp_frame::{RespCodec, RespValue};
