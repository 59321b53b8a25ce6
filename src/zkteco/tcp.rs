//! ZKTeco TCP framing
//!
//! Primary transport. Every packet carries an 8-byte prefix (magic + length),
//! so replies are read as whole frames.

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::client::{TransportKind, Wire};
use super::error::{ZkError, ZkResult};
use super::protocol::{encode_tcp_packet, tcp_frame_len, HEADER_LEN, MAX_CHUNK, TCP_PREFIX_LEN};

/// Largest packet a device sends: one full chunk plus its header
const MAX_FRAME_LEN: usize = MAX_CHUNK + HEADER_LEN;

pub struct TcpWire {
    stream: TcpStream,
}

impl TcpWire {
    /// Open the socket; the connect wait is capped at 5s regardless of the read timeout
    pub async fn connect(addr: &str, wait: Duration) -> ZkResult<Self> {
        let stream = timeout(wait.min(Duration::from_secs(5)), TcpStream::connect(addr))
            .await
            .map_err(|_| ZkError::Timeout("TCP connect"))?
            .map_err(ZkError::io("TCP connect"))?;
        stream.set_nodelay(true).ok();
        Ok(Self { stream })
    }
}

fn read_error(what: &'static str) -> impl Fn(std::io::Error) -> ZkError {
    move |e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            ZkError::Closed(what)
        } else {
            ZkError::Io { context: what, source: e }
        }
    }
}

#[async_trait]
impl Wire for TcpWire {
    fn kind(&self) -> TransportKind {
        TransportKind::Tcp
    }

    fn frame(&self, command: u16, session_id: u16, reply_id: u16, data: &[u8]) -> Vec<u8> {
        encode_tcp_packet(command, session_id, reply_id, data)
    }

    async fn send(&mut self, packet: &[u8]) -> ZkResult<()> {
        self.stream
            .write_all(packet)
            .await
            .map_err(ZkError::io("TCP write"))
    }

    async fn recv(&mut self, wait: Duration, what: &'static str) -> ZkResult<Vec<u8>> {
        let stream = &mut self.stream;
        let frame = async {
            let mut prefix = [0u8; TCP_PREFIX_LEN];
            stream.read_exact(&mut prefix).await.map_err(read_error(what))?;
            let len = tcp_frame_len(&prefix).ok_or(ZkError::Malformed("TCP frame without magic prefix"))?;
            if len > MAX_FRAME_LEN {
                return Err(ZkError::Malformed("TCP frame length exceeds protocol maximum"));
            }

            let mut packet = vec![0u8; len];
            stream.read_exact(&mut packet).await.map_err(read_error(what))?;
            Ok::<_, ZkError>(packet)
        };

        timeout(wait, frame).await.map_err(|_| ZkError::Timeout(what))?
    }

    async fn shutdown(&mut self) {
        let _ = self.stream.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zkteco::protocol::TCP_MAGIC;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn oversized_frame_is_rejected_before_reading_the_body() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let device = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut prefix = TCP_MAGIC.to_vec();
            prefix.extend_from_slice(&0xF000_0000u32.to_le_bytes());
            socket.write_all(&prefix).await.unwrap();
            socket
        });

        let mut wire = TcpWire::connect(&addr, Duration::from_secs(1)).await.unwrap();
        let _socket = device.await.unwrap();
        let err = wire.recv(Duration::from_secs(1), "reply").await.unwrap_err();

        assert!(matches!(err, ZkError::Malformed(_)));
    }
}
