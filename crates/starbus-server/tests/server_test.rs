//! Black-box tests against a live listener, covering both transports.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use starbus_core::Bus;
use starbus_devices::{ConfigStore, DeviceDescriptor, Driver};
use starbus_server::Server;
use starbus_wire::ws;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

struct NullDriver;

impl Driver for NullDriver {}

async fn start(devices: &[&str]) -> (SocketAddr, Server, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let server = Server::new(
        Bus::new("test"),
        ConfigStore::new(dir.path(), starbus_devices::DEFAULT_PORT),
    );
    for name in devices {
        server
            .attach_device(
                DeviceDescriptor::new(*name, "null_driver", "1.0"),
                Arc::new(NullDriver),
            )
            .await
            .unwrap();
    }
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let background = server.clone();
    tokio::spawn(async move { background.serve(listener).await });
    (addr, server, dir)
}

#[tokio::test]
async fn raw_client_discovers_and_connects() {
    let (addr, _server, _dir) = start(&["Test Camera"]).await;
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut writer) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    writer
        .write_all(br#"{ "getProperties": { "version": "2.0" } }"#)
        .await
        .unwrap();

    // Enumeration must include the connection vector definition.
    loop {
        let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
        if line.contains("defSwitchVector") && line.contains("\"CONNECTION\"") {
            assert!(line.contains("\"Test Camera\""));
            break;
        }
    }

    writer
        .write_all(
            br#"{ "newSwitchVector": { "device": "Test Camera", "name": "CONNECTION", "items": [ { "name": "CONNECTED", "value": true } ] } }"#,
        )
        .await
        .unwrap();

    // Busy first, then the settled Ok update.
    loop {
        let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
        if line.contains("setSwitchVector") && line.contains("\"Ok\"") {
            assert!(line.contains("\"CONNECTION\""));
            break;
        }
    }
}

#[tokio::test]
async fn device_filter_limits_enumeration() {
    let (addr, _server, _dir) = start(&["Cam A", "Cam B"]).await;
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut writer) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    writer
        .write_all(br#"{ "getProperties": { "version": "2.0", "device": "Cam B" } }"#)
        .await
        .unwrap();

    for _ in 0..5 {
        let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
        assert!(line.contains("\"Cam B\""), "unexpected event: {line}");
        assert!(!line.contains("\"Cam A\""));
    }
}

#[tokio::test]
async fn websocket_client_handshakes_and_discovers() {
    let (addr, _server, _dir) = start(&["Test Camera"]).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(
            b"GET / HTTP/1.1\r\n\
              Host: test\r\n\
              Upgrade: websocket\r\n\
              Connection: Upgrade\r\n\
              Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
              Sec-WebSocket-Version: 13\r\n\r\n",
        )
        .await
        .unwrap();

    // Accumulate the 101 response head.
    let mut head = Vec::new();
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let mut byte = [0u8; 1];
        timeout(WAIT, tokio::io::AsyncReadExt::read_exact(&mut stream, &mut byte))
            .await
            .unwrap()
            .unwrap();
        head.push(byte[0]);
    }
    let head = String::from_utf8(head).unwrap();
    assert!(head.starts_with("HTTP/1.1 101"));
    assert!(head.contains("s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));

    // Clients mask; the server must unmask before decoding.
    let request = ws::encode_frame(
        ws::OP_TEXT,
        br#"{ "getProperties": { "version": "2.0" } }"#,
        Some([0x37, 0xFA, 0x21, 0x3D]),
    );
    stream.write_all(&request).await.unwrap();

    loop {
        let frame = timeout(WAIT, ws::read_frame(&mut stream)).await.unwrap().unwrap();
        assert_eq!(frame.opcode, ws::OP_TEXT);
        let text = String::from_utf8(frame.payload).unwrap();
        if text.contains("defSwitchVector") && text.contains("\"CONNECTION\"") {
            break;
        }
    }
}
