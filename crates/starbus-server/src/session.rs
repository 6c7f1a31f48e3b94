//! One client connection.
//!
//! Both transports run the same protocol: the session sniffs the first
//! bytes of the stream, upgrades HTTP requests to WebSocket and treats
//! everything else as a raw JSON stream. Inbound chunks go through this
//! connection's own [`RequestDecoder`]; outbound events come from the
//! session's bus subscription, filtered by whatever the client negotiated
//! with `getProperties` and `enableBLOB`.

use std::sync::Arc;

use anyhow::{bail, Context as _};
use starbus_core::{BlobMode, Bus, BusEvent, Client, PropertyFilter, PropertyKind};
use starbus_wire::ws;
use starbus_wire::{Encoder, Request, RequestDecoder};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

pub(crate) struct Session {
    bus: Bus,
    encoder: Arc<Encoder>,
    client: Mutex<Client>,
}

impl Session {
    pub(crate) fn new(bus: Bus, encoder: Arc<Encoder>) -> Self {
        Self {
            bus,
            encoder,
            client: Mutex::new(Client::new()),
        }
    }

    pub(crate) async fn run(self, mut stream: TcpStream) -> anyhow::Result<()> {
        let mut first = vec![0u8; 4096];
        let n = stream.read(&mut first).await?;
        if n == 0 {
            return Ok(());
        }
        first.truncate(n);
        // Raw protocol traffic always starts with an object; an HTTP
        // request line cannot.
        if first[0] == b'{' || first[0].is_ascii_whitespace() {
            self.run_raw(stream, first).await
        } else {
            self.run_websocket(stream, first).await
        }
    }

    async fn run_raw(self, stream: TcpStream, first: Vec<u8>) -> anyhow::Result<()> {
        let (mut reader, mut writer) = stream.into_split();
        let mut rx = self.bus.subscribe();
        let mut decoder = RequestDecoder::new();
        let mut text_buf = Utf8Buffer::default();

        let text = text_buf.push(&first)?;
        let requests = decoder.feed(&text).context("protocol error")?;
        self.dispatch(requests).await;

        let mut buf = vec![0u8; 4096];
        loop {
            tokio::select! {
                read = reader.read(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        return Ok(());
                    }
                    let text = text_buf.push(&buf[..n])?;
                    let requests = decoder.feed(&text).context("protocol error")?;
                    self.dispatch(requests).await;
                }
                event = rx.recv() => match event {
                    Ok(event) => {
                        if let Some(text) = self.outbound(&event).await {
                            writer.write_all(text.as_bytes()).await?;
                            writer.write_all(b"\n").await?;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "slow client lost events");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(()),
                },
            }
        }
    }

    async fn run_websocket(self, mut stream: TcpStream, first: Vec<u8>) -> anyhow::Result<()> {
        let mut head = first;
        let terminator = loop {
            if let Some(pos) = head.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos;
            }
            if head.len() > 8192 {
                bail!("oversized websocket handshake");
            }
            let mut buf = [0u8; 1024];
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                bail!("connection closed during handshake");
            }
            head.extend_from_slice(&buf[..n]);
        };

        let head_text = String::from_utf8_lossy(&head[..terminator]).into_owned();
        let Some(key) = header_value(&head_text, "sec-websocket-key") else {
            stream.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await?;
            bail!("handshake missing Sec-WebSocket-Key");
        };
        let response = format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {}\r\n\r\n",
            ws::accept_key(key)
        );
        stream.write_all(response.as_bytes()).await?;
        debug!("websocket handshake complete");

        let (mut reader, mut writer) = stream.into_split();
        let mut rx = self.bus.subscribe();
        let mut decoder = RequestDecoder::new();
        let mut text_buf = Utf8Buffer::default();
        // Bytes the client sent after its handshake, if any.
        let mut frame_buf: Vec<u8> = head[terminator + 4..].to_vec();
        let mut buf = vec![0u8; 4096];

        loop {
            // Drain every complete frame already buffered.
            while let Some((frame, used)) = ws::decode_frame(&frame_buf)? {
                frame_buf.drain(..used);
                match frame.opcode {
                    ws::OP_TEXT | ws::OP_BINARY => {
                        let text = text_buf.push(&frame.payload)?;
                        let requests = decoder.feed(&text).context("protocol error")?;
                        self.dispatch(requests).await;
                    }
                    ws::OP_PING => {
                        ws::write_frame(&mut writer, ws::OP_PONG, &frame.payload, None).await?;
                    }
                    ws::OP_CLOSE => {
                        let _ = ws::write_frame(&mut writer, ws::OP_CLOSE, &[], None).await;
                        return Ok(());
                    }
                    _ => {}
                }
            }
            tokio::select! {
                read = reader.read(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        return Ok(());
                    }
                    frame_buf.extend_from_slice(&buf[..n]);
                }
                event = rx.recv() => match event {
                    Ok(event) => {
                        if let Some(text) = self.outbound(&event).await {
                            ws::write_frame(&mut writer, ws::OP_TEXT, text.as_bytes(), None)
                                .await?;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "slow client lost events");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(()),
                },
            }
        }
    }

    /// Apply decoded requests to the bus and to this session's client
    /// state. Request failures are per-request: a bad device name must not
    /// kill the connection.
    async fn dispatch(&self, requests: Vec<Request>) {
        for request in requests {
            match request {
                Request::GetProperties {
                    version,
                    client,
                    device,
                    name,
                } => {
                    let filter = PropertyFilter {
                        device: device.unwrap_or_default(),
                        name: name.unwrap_or_default(),
                    };
                    {
                        let mut c = self.client.lock().await;
                        if let Some(name) = client {
                            c.name = name;
                        }
                        if let Some(version) = version {
                            c.version = version;
                        }
                        c.filter = filter.clone();
                    }
                    if let Err(e) = self.bus.enumerate_properties(&filter).await {
                        debug!(error = %e, "enumeration failed");
                    }
                }
                Request::Change(change) => {
                    if let Err(e) = self.bus.change_property(&change).await {
                        debug!(device = %change.device, property = %change.name, error = %e,
                            "change request failed");
                    }
                }
                Request::EnableBlob { device, mode, .. } => {
                    debug!(%device, ?mode, "blob mode negotiated");
                    self.client.lock().await.blob_mode = mode;
                }
            }
        }
    }

    /// Encode an event for this client, or `None` if its filter or blob
    /// mode excludes it.
    async fn outbound(&self, event: &BusEvent) -> Option<String> {
        let (filter, blob_mode) = {
            let client = self.client.lock().await;
            (client.filter.clone(), client.blob_mode)
        };
        if !event.matches(&filter) {
            return None;
        }
        // Blob traffic is opt-in; definitions still flow so the client
        // knows what it could enable.
        if blob_mode == BlobMode::Never {
            if let BusEvent::Update { property, .. } = event {
                if property.kind == PropertyKind::Blob {
                    return None;
                }
            }
        }
        Some(self.encoder.event(event, blob_mode))
    }
}

/// Buffers bytes until they form complete UTF-8, so a multibyte character
/// split across transport chunks never reaches the decoder torn.
#[derive(Default)]
struct Utf8Buffer {
    pending: Vec<u8>,
}

impl Utf8Buffer {
    /// Append `chunk` and take the longest complete prefix.
    fn push(&mut self, chunk: &[u8]) -> anyhow::Result<String> {
        self.pending.extend_from_slice(chunk);
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(s) => s.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => bail!("invalid UTF-8 in stream: {e}"),
        };
        let tail = self.pending.split_off(valid);
        let complete = std::mem::replace(&mut self.pending, tail);
        String::from_utf8(complete).map_err(|e| anyhow::anyhow!("invalid UTF-8 in stream: {e}"))
    }
}

fn header_value<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let head = "GET / HTTP/1.1\r\nHost: x\r\nSec-WebSocket-Key: abc==\r\n";
        assert_eq!(header_value(head, "sec-websocket-key"), Some("abc=="));
        assert_eq!(header_value(head, "host"), Some("x"));
        assert_eq!(header_value(head, "upgrade"), None);
    }

    #[test]
    fn utf8_buffer_holds_split_characters() {
        let mut buf = Utf8Buffer::default();
        let bytes = "grüße".as_bytes();
        // Split in the middle of the two-byte 'ü'.
        let first = buf.push(&bytes[..3]).unwrap();
        assert_eq!(first, "gr");
        let rest = buf.push(&bytes[3..]).unwrap();
        assert_eq!(rest, "üße");
    }

    #[test]
    fn utf8_buffer_rejects_garbage() {
        let mut buf = Utf8Buffer::default();
        assert!(buf.push(&[0xFF, 0xFE]).is_err());
    }
}
