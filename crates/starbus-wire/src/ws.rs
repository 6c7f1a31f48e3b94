//! WebSocket framing sublayer.
//!
//! Transport chunks are wrapped in data frames with a 2-14 byte header
//! covering the 7-bit, 16-bit-extended and 64-bit-extended payload length
//! encodings; masked payloads are unmasked with the 4-byte key using
//! index-modulo-4 XOR. Only the framing needed to carry the JSON protocol
//! is implemented: one complete message per unfragmented frame.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha1::{Digest, Sha1};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, WireError};

pub const OP_TEXT: u8 = 0x1;
pub const OP_BINARY: u8 = 0x2;
pub const OP_CLOSE: u8 = 0x8;
pub const OP_PING: u8 = 0x9;
pub const OP_PONG: u8 = 0xA;

const FIN: u8 = 0x80;
const MASK_BIT: u8 = 0x80;

/// A decoded frame: opcode plus unmasked payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: u8,
    pub payload: Vec<u8>,
}

/// Encode one unfragmented frame. A `mask` key is applied to the payload
/// the same way the decode path removes it.
pub fn encode_frame(opcode: u8, payload: &[u8], mask: Option<[u8; 4]>) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 14);
    out.push(FIN | (opcode & 0x0F));
    let mask_flag = if mask.is_some() { MASK_BIT } else { 0 };
    let len = payload.len();
    if len <= 125 {
        out.push(mask_flag | len as u8);
    } else if len <= u16::MAX as usize {
        out.push(mask_flag | 126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(mask_flag | 127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }
    match mask {
        Some(key) => {
            out.extend_from_slice(&key);
            out.extend(payload.iter().enumerate().map(|(i, b)| b ^ key[i % 4]));
        }
        None => out.extend_from_slice(payload),
    }
    out
}

/// Try to decode one frame from the start of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed; on success, the frame
/// and the number of bytes consumed.
pub fn decode_frame(buf: &[u8]) -> Result<Option<(Frame, usize)>> {
    if buf.len() < 2 {
        return Ok(None);
    }
    let opcode = buf[0] & 0x0F;
    let masked = buf[1] & MASK_BIT != 0;
    let mut offset = 2usize;
    let len = match buf[1] & 0x7F {
        126 => {
            if buf.len() < offset + 2 {
                return Ok(None);
            }
            let len = u16::from_be_bytes([buf[2], buf[3]]) as u64;
            offset += 2;
            len
        }
        127 => {
            if buf.len() < offset + 8 {
                return Ok(None);
            }
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&buf[2..10]);
            offset += 8;
            u64::from_be_bytes(bytes)
        }
        n => n as u64,
    };
    let len = usize::try_from(len).map_err(|_| WireError::Frame("payload too large".into()))?;
    let key = if masked {
        if buf.len() < offset + 4 {
            return Ok(None);
        }
        let key = [buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]];
        offset += 4;
        Some(key)
    } else {
        None
    };
    if buf.len() < offset + len {
        return Ok(None);
    }
    let mut payload = buf[offset..offset + len].to_vec();
    if let Some(key) = key {
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= key[i % 4];
        }
    }
    Ok(Some((Frame { opcode, payload }, offset + len)))
}

/// Read one complete frame from an async transport.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame> {
    let mut header = [0u8; 2];
    reader.read_exact(&mut header).await?;
    let opcode = header[0] & 0x0F;
    let masked = header[1] & MASK_BIT != 0;
    let len = match header[1] & 0x7F {
        126 => {
            let mut ext = [0u8; 2];
            reader.read_exact(&mut ext).await?;
            u16::from_be_bytes(ext) as u64
        }
        127 => {
            let mut ext = [0u8; 8];
            reader.read_exact(&mut ext).await?;
            u64::from_be_bytes(ext)
        }
        n => n as u64,
    };
    let len = usize::try_from(len).map_err(|_| WireError::Frame("payload too large".into()))?;
    let key = if masked {
        let mut key = [0u8; 4];
        reader.read_exact(&mut key).await?;
        Some(key)
    } else {
        None
    };
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    if let Some(key) = key {
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= key[i % 4];
        }
    }
    Ok(Frame { opcode, payload })
}

/// Write one complete frame to an async transport. The caller serializes
/// writes per socket; frames must never interleave.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    opcode: u8,
    payload: &[u8],
    mask: Option<[u8; 4]>,
) -> Result<()> {
    let frame = encode_frame(opcode, payload, mask);
    writer.write_all(&frame).await?;
    Ok(())
}

/// Compute the `Sec-WebSocket-Accept` value for a client key.
pub fn accept_key(client_key: &str) -> String {
    const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
    let mut hasher = Sha1::new();
    hasher.update(client_key.trim().as_bytes());
    hasher.update(GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_covers_all_length_encodings() {
        // 7-bit, 16-bit-extended and 64-bit-extended branches.
        for len in [10usize, 200, 70_000] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            for mask in [None, Some([0xA1, 0x02, 0x33, 0x7F])] {
                let encoded = encode_frame(OP_BINARY, &payload, mask);
                let (frame, consumed) = decode_frame(&encoded).unwrap().unwrap();
                assert_eq!(consumed, encoded.len());
                assert_eq!(frame.opcode, OP_BINARY);
                assert_eq!(frame.payload, payload, "length {len}, mask {mask:?}");
            }
        }
    }

    #[test]
    fn partial_header_asks_for_more() {
        let encoded = encode_frame(OP_TEXT, &[1u8; 300], Some([1, 2, 3, 4]));
        for cut in [1usize, 3, 7] {
            assert!(decode_frame(&encoded[..cut]).unwrap().is_none());
        }
    }

    #[test]
    fn known_accept_key() {
        // Value from RFC 6455 section 1.3.
        assert_eq!(
            accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[tokio::test]
    async fn async_read_matches_sync_decode() {
        let payload = b"{ \"getProperties\": { \"version\": \"2.0\" } }";
        let encoded = encode_frame(OP_TEXT, payload, Some([9, 8, 7, 6]));
        let mut cursor = std::io::Cursor::new(encoded);
        let frame = read_frame(&mut cursor).await.unwrap();
        assert_eq!(frame.opcode, OP_TEXT);
        assert_eq!(frame.payload, payload);
    }
}
