// src/core/protocol/resp_frame.rs

//! The wire value type and the `tokio_util::codec` `Encoder`/`Decoder` pair
//! that frame it. RESP2 only: inline commands arrive from clients as
//! multi-bulk arrays of bulk strings, and that is the only shape this proxy
//! needs to both parse and synthesize.

use crate::core::errors::ProxyError;
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

const CRLF: &[u8] = b"\r\n";
const CRLF_LEN: usize = 2;

// Protocol-level limits, matched to what a single shard of a key/value
// workload should ever need; they exist to bound memory on a malformed or
// hostile frame, not as a feature.
const MAX_FRAME_ELEMENTS: usize = 1024 * 1024;
const MAX_BULK_STRING_SIZE: usize = 512 * 1024 * 1024;

/// A single RESP2 value, either inbound from a client/backend or outbound
/// to one. Tokens are owned `Bytes` (cheap clones via refcounting), not
/// borrows into the read buffer, since sub-packets routinely outlive the
/// buffer they were parsed from.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    SimpleString(Bytes),
    Error(Bytes),
    Integer(i64),
    BulkString(Bytes),
    Null,
    NullArray,
    Array(Vec<RespValue>),
}

impl RespValue {
    pub fn simple(s: impl Into<String>) -> Self {
        RespValue::SimpleString(Bytes::from(s.into()))
    }

    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(Bytes::from(s.into()))
    }

    pub fn bulk(b: impl Into<Bytes>) -> Self {
        RespValue::BulkString(b.into())
    }

    /// Encodes this value into a standalone byte vector. Used when
    /// synthesizing sub-packets (`MIGRATE`, fan-out `GET`/`SET`/`DEL`) that
    /// are dispatched without ever touching a live `Framed` stream.
    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        RespCodec.encode(self.clone(), &mut buf).expect("encoding a RespValue is infallible");
        buf.to_vec()
    }

    /// Interprets this value as a command: an array of bulk strings, first
    /// element the (case-folded by the caller) command name. Anything else
    /// a client could legally send as a top-level frame (inline simple
    /// strings, bare integers) is not a command this proxy accepts.
    pub fn as_command_tokens(&self) -> Result<Vec<Bytes>, ProxyError> {
        match self {
            RespValue::Array(items) if !items.is_empty() => items
                .iter()
                .map(|v| match v {
                    RespValue::BulkString(b) => Ok(b.clone()),
                    _ => Err(ProxyError::ProtoError),
                })
                .collect(),
            _ => Err(ProxyError::ProtoError),
        }
    }
}

/// `Encoder`/`Decoder` for `RespValue`, installed on a `Framed<TcpStream, _>`
/// on both the client-facing and backend-facing sides of the proxy.
#[derive(Debug, Default)]
pub struct RespCodec;

impl Encoder<RespValue> for RespCodec {
    type Error = ProxyError;

    fn encode(&mut self, item: RespValue, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            RespValue::SimpleString(s) => {
                dst.extend_from_slice(b"+");
                dst.extend_from_slice(&s);
                dst.extend_from_slice(CRLF);
            }
            RespValue::Error(s) => {
                dst.extend_from_slice(b"-");
                dst.extend_from_slice(&s);
                dst.extend_from_slice(CRLF);
            }
            RespValue::Integer(i) => {
                dst.extend_from_slice(b":");
                let mut ibuf = itoa::Buffer::new();
                dst.extend_from_slice(ibuf.format(i).as_bytes());
                dst.extend_from_slice(CRLF);
            }
            RespValue::BulkString(b) => {
                dst.extend_from_slice(b"$");
                let mut ibuf = itoa::Buffer::new();
                dst.extend_from_slice(ibuf.format(b.len()).as_bytes());
                dst.extend_from_slice(CRLF);
                dst.extend_from_slice(&b);
                dst.extend_from_slice(CRLF);
            }
            RespValue::Null => dst.extend_from_slice(b"$-1\r\n"),
            RespValue::NullArray => dst.extend_from_slice(b"*-1\r\n"),
            RespValue::Array(items) => {
                dst.extend_from_slice(b"*");
                let mut ibuf = itoa::Buffer::new();
                dst.extend_from_slice(ibuf.format(items.len()).as_bytes());
                dst.extend_from_slice(CRLF);
                for item in items {
                    self.encode(item, dst)?;
                }
            }
        }
        Ok(())
    }
}

impl Decoder for RespCodec {
    type Item = RespValue;
    type Error = ProxyError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match parse_value(src) {
            Ok((value, len)) => {
                src.advance(len);
                Ok(Some(value))
            }
            Err(ProxyError::IncompleteData) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn find_crlf(src: &[u8]) -> Option<usize> {
    src.windows(CRLF_LEN).position(|w| w == CRLF)
}

fn parse_line(src: &[u8]) -> Result<(&[u8], usize), ProxyError> {
    find_crlf(src)
        .map(|pos| (&src[..pos], pos + CRLF_LEN))
        .ok_or(ProxyError::IncompleteData)
}

fn parse_value(src: &[u8]) -> Result<(RespValue, usize), ProxyError> {
    if src.is_empty() {
        return Err(ProxyError::IncompleteData);
    }
    match src[0] {
        b'+' => parse_simple_string(src),
        b'-' => parse_error(src),
        b':' => parse_integer(src),
        b'$' => parse_bulk_string(src),
        b'*' => parse_array(src),
        _ => Err(ProxyError::ProtoError),
    }
}

fn parse_simple_string(src: &[u8]) -> Result<(RespValue, usize), ProxyError> {
    let (line, len) = parse_line(&src[1..])?;
    Ok((RespValue::SimpleString(Bytes::copy_from_slice(line)), len + 1))
}

fn parse_error(src: &[u8]) -> Result<(RespValue, usize), ProxyError> {
    let (line, len) = parse_line(&src[1..])?;
    Ok((RespValue::Error(Bytes::copy_from_slice(line)), len + 1))
}

fn parse_integer(src: &[u8]) -> Result<(RespValue, usize), ProxyError> {
    let (line, len) = parse_line(&src[1..])?;
    let s = std::str::from_utf8(line).map_err(|_| ProxyError::ProtoError)?;
    let i = s.parse::<i64>().map_err(|_| ProxyError::ProtoError)?;
    Ok((RespValue::Integer(i), len + 1))
}

fn parse_bulk_string(src: &[u8]) -> Result<(RespValue, usize), ProxyError> {
    let (line, len_of_line) = parse_line(&src[1..])?;
    let s = std::str::from_utf8(line).map_err(|_| ProxyError::ProtoError)?;
    let str_len = s.parse::<isize>().map_err(|_| ProxyError::ProtoError)?;

    // Null bulk string: $-1\r\n.
    if str_len == -1 {
        return Ok((RespValue::Null, len_of_line + 1));
    }
    if str_len < 0 {
        return Err(ProxyError::ProtoError);
    }

    let str_len = str_len as usize;
    if str_len > MAX_BULK_STRING_SIZE {
        return Err(ProxyError::ProtoError);
    }

    let prefix_len = len_of_line + 1;
    if src.len() < prefix_len + str_len + CRLF_LEN {
        return Err(ProxyError::IncompleteData);
    }
    if &src[prefix_len + str_len..prefix_len + str_len + CRLF_LEN] != CRLF {
        return Err(ProxyError::ProtoError);
    }

    let data = Bytes::copy_from_slice(&src[prefix_len..prefix_len + str_len]);
    Ok((RespValue::BulkString(data), prefix_len + str_len + CRLF_LEN))
}

fn parse_array(src: &[u8]) -> Result<(RespValue, usize), ProxyError> {
    let (line, len_of_line) = parse_line(&src[1..])?;
    let s = std::str::from_utf8(line).map_err(|_| ProxyError::ProtoError)?;
    let arr_len = s.parse::<isize>().map_err(|_| ProxyError::ProtoError)?;

    // Null array: *-1\r\n.
    if arr_len == -1 {
        return Ok((RespValue::NullArray, len_of_line + 1));
    }
    if arr_len < 0 {
        return Err(ProxyError::ProtoError);
    }

    let arr_len = arr_len as usize;
    if arr_len > MAX_FRAME_ELEMENTS {
        return Err(ProxyError::ProtoError);
    }

    let mut items = Vec::with_capacity(arr_len.min(4096));
    let mut cursor = len_of_line + 1;
    for _ in 0..arr_len {
        let (value, value_len) = parse_value(&src[cursor..])?;
        items.push(value);
        cursor += value_len;
    }
    Ok((RespValue::Array(items), cursor))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> RespValue {
        let mut buf = BytesMut::from(bytes);
        let mut codec = RespCodec;
        codec.decode(&mut buf).unwrap().unwrap()
    }

    #[test]
    fn decodes_simple_string() {
        assert_eq!(decode_all(b"+OK\r\n"), RespValue::SimpleString(Bytes::from_static(b"OK")));
    }

    #[test]
    fn decodes_null_bulk_string() {
        assert_eq!(decode_all(b"$-1\r\n"), RespValue::Null);
    }

    #[test]
    fn decodes_empty_multi_bulk() {
        assert_eq!(decode_all(b"*0\r\n"), RespValue::Array(vec![]));
    }

    #[test]
    fn decodes_null_array() {
        assert_eq!(decode_all(b"*-1\r\n"), RespValue::NullArray);
    }

    #[test]
    fn incomplete_frame_yields_none() {
        let mut buf = BytesMut::from(&b"*2\r\n$3\r\nfoo\r\n"[..]);
        let mut codec = RespCodec;
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn round_trips_command_array() {
        let mut buf = BytesMut::new();
        let cmd = RespValue::Array(vec![
            RespValue::bulk(&b"GET"[..]),
            RespValue::bulk(&b"foo"[..]),
        ]);
        RespCodec.encode(cmd.clone(), &mut buf).unwrap();
        let decoded = decode_all(&buf);
        assert_eq!(decoded, cmd);
        assert_eq!(
            decoded.as_command_tokens().unwrap(),
            vec![Bytes::from_static(b"GET"), Bytes::from_static(b"foo")]
        );
    }

    #[test]
    fn rejects_non_bulk_command_tokens() {
        let value = RespValue::Array(vec![RespValue::Integer(1)]);
        assert!(value.as_command_tokens().is_err());
    }
}
