//! # Server List Ping
//!
//! Asks the game server for its status (the request the multiplayer screen
//! makes) to learn how many players are online.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use serde::Deserialize;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::domain::traits::StatusSource;

/// Any version works for a status request; -1 asks the server to pick.
const PROTOCOL_VERSION: i32 = -1;
const MAX_RESPONSE: usize = 1 << 20;

#[derive(Deserialize)]
struct StatusResponse {
    players: Players,
}

#[derive(Deserialize)]
struct Players {
    online: u32,
}

pub fn put_varint(buf: &mut BytesMut, value: i32) {
    let mut v = value as u32;
    loop {
        if v & !0x7f == 0 {
            buf.put_u8(v as u8);
            return;
        }
        buf.put_u8((v & 0x7f) as u8 | 0x80);
        v >>= 7;
    }
}

pub async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32> {
    let mut value: u32 = 0;
    for i in 0..5 {
        let byte = reader.read_u8().await?;
        value |= u32::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    bail!("varint longer than 5 bytes")
}

fn put_string(buf: &mut BytesMut, s: &str) {
    put_varint(buf, s.len() as i32);
    buf.put_slice(s.as_bytes());
}

/// Length-prefixes a packet body.
fn frame(body: &BytesMut) -> BytesMut {
    let mut out = BytesMut::with_capacity(body.len() + 5);
    put_varint(&mut out, body.len() as i32);
    out.put_slice(body);
    out
}

fn handshake(host: &str, port: u16) -> BytesMut {
    let mut body = BytesMut::new();
    put_varint(&mut body, 0x00);
    put_varint(&mut body, PROTOCOL_VERSION);
    put_string(&mut body, host);
    body.put_u16(port);
    put_varint(&mut body, 1);
    frame(&body)
}

fn status_request() -> BytesMut {
    let mut body = BytesMut::new();
    put_varint(&mut body, 0x00);
    frame(&body)
}

pub struct StatusPinger {
    host: String,
    port: u16,
    timeout: Duration,
}

impl StatusPinger {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    async fn ping(&self) -> Result<u32> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .with_context(|| format!("connect to {}:{}", self.host, self.port))?;
        stream.write_all(&handshake(&self.host, self.port)).await?;
        stream.write_all(&status_request()).await?;

        let _packet_len = read_varint(&mut stream).await?;
        let packet_id = read_varint(&mut stream).await?;
        if packet_id != 0 {
            bail!("unexpected status packet id {packet_id}");
        }
        let json_len = usize::try_from(read_varint(&mut stream).await?)
            .ok()
            .filter(|l| *l <= MAX_RESPONSE)
            .context("invalid status length")?;
        let mut json = vec![0u8; json_len];
        stream.read_exact(&mut json).await?;

        let status: StatusResponse =
            serde_json::from_slice(&json).context("invalid status response")?;
        Ok(status.players.online)
    }
}

#[async_trait]
impl StatusSource for StatusPinger {
    async fn online_players(&self) -> Result<u32> {
        timeout(self.timeout, self.ping())
            .await
            .context("status ping timed out")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_varint_encoding() {
        let cases: [(i32, &[u8]); 5] = [
            (0, &[0x00]),
            (1, &[0x01]),
            (300, &[0xac, 0x02]),
            (25565, &[0xdd, 0xc7, 0x01]),
            (-1, &[0xff, 0xff, 0xff, 0xff, 0x0f]),
        ];
        for (value, expected) in cases {
            let mut buf = BytesMut::new();
            put_varint(&mut buf, value);
            assert_eq!(&buf[..], expected, "encoding {value}");
        }
    }

    #[tokio::test]
    async fn test_read_varint() {
        let mut input: &[u8] = &[0xdd, 0xc7, 0x01, 0xff, 0xff, 0xff, 0xff, 0x0f];
        assert_eq!(read_varint(&mut input).await.unwrap(), 25565);
        assert_eq!(read_varint(&mut input).await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_ping_reads_online_count() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            // handshake then request
            for _ in 0..2 {
                let len = read_varint(&mut stream).await.unwrap() as usize;
                let mut skip = vec![0u8; len];
                stream.read_exact(&mut skip).await.unwrap();
            }
            let mut body = BytesMut::new();
            put_varint(&mut body, 0);
            put_string(
                &mut body,
                r#"{"version":{"name":"1.20.4","protocol":765},"players":{"max":20,"online":4}}"#,
            );
            stream.write_all(&frame(&body)).await.unwrap();
        });

        let pinger = StatusPinger::new("127.0.0.1", port, Duration::from_secs(2));
        assert_eq!(pinger.online_players().await.unwrap(), 4);
    }
}
