//! Sentinel framed responses.
//!
//! A response is the JSON of a [`Layout`] with every `'` written as `\u0027`, followed by a
//! single `'` byte. A response carrying no layout is the sentinel alone.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::{
    layout::Layout,
    Error::{Json, ProtocolDesync},
    Result,
};

/// Terminates every response.
pub const SENTINEL: u8 = b'\'';

const ESCAPED_SENTINEL: &[u8] = b"\\u0027";

/// Serialize `layout` into one framed response.
///
/// # Errors
/// [`crate::Error::Json`] if the layout cannot be serialized.
pub fn encode_response(layout: Option<&Layout>) -> Result<Vec<u8>> {
    let Some(layout) = layout else {
        return Ok(vec![SENTINEL]);
    };

    let json = serde_json::to_vec(layout).map_err(Json)?;
    let mut framed = Vec::with_capacity(json.len() + 1);
    for byte in json {
        if byte == SENTINEL {
            framed.extend_from_slice(ESCAPED_SENTINEL);
        } else {
            framed.push(byte);
        }
    }
    framed.push(SENTINEL);
    Ok(framed)
}

/// Decode a response payload, sentinel already stripped.
///
/// An empty payload, or one that fails to parse right at its start, carries no layout.
///
/// # Errors
/// [`crate::Error::ProtocolDesync`] if the payload is JSON that breaks off or does not
/// describe a layout.
pub fn decode_response(payload: &[u8]) -> Result<Option<Layout>> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    match serde_json::from_slice::<Layout>(payload) {
        Ok(layout) => Ok(Some(layout)),
        Err(error) if error.line() == 1 && error.column() <= 1 => Ok(None),
        Err(error) => Err(ProtocolDesync(format!(
            "undecodable response of {} bytes: {error}",
            payload.len()
        ))),
    }
}

/// Read up to and including the next sentinel, returning the payload before it.
///
/// # Errors
/// [`crate::Error::ProtocolDesync`] if the stream ends before a sentinel arrives, and
/// [`crate::Error::FileError`] for I/O failures.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut frame = Vec::new();
    reader.read_until(SENTINEL, &mut frame).await?;
    if frame.pop() != Some(SENTINEL) {
        return Err(ProtocolDesync(format!(
            "channel closed after {} bytes without a sentinel",
            frame.len()
        )));
    }
    Ok(frame)
}
