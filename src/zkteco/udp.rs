//! ZKTeco UDP framing
//!
//! Fallback transport, used when the TCP connection to the device is refused.
//! Each datagram holds exactly one packet.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use super::client::{TransportKind, Wire};
use super::error::{ZkError, ZkResult};
use super::protocol::encode_udp_packet;

pub struct UdpWire {
    socket: UdpSocket,
}

impl UdpWire {
    /// Bind an ephemeral local socket and associate it with the device
    pub async fn connect(addr: &str) -> ZkResult<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| ZkError::InvalidAddress(addr.to_string()))?;

        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(ZkError::io("UDP bind"))?;
        socket
            .connect(addr)
            .await
            .map_err(ZkError::io("UDP connect"))?;

        Ok(Self { socket })
    }
}

#[async_trait]
impl Wire for UdpWire {
    fn kind(&self) -> TransportKind {
        TransportKind::Udp
    }

    fn frame(&self, command: u16, session_id: u16, reply_id: u16, data: &[u8]) -> Vec<u8> {
        encode_udp_packet(command, session_id, reply_id, data)
    }

    async fn send(&mut self, packet: &[u8]) -> ZkResult<()> {
        self.socket
            .send(packet)
            .await
            .map(|_| ())
            .map_err(ZkError::io("UDP send"))
    }

    async fn recv(&mut self, wait: Duration, what: &'static str) -> ZkResult<Vec<u8>> {
        let mut buf = vec![0u8; 65536];
        let n = timeout(wait, self.socket.recv(&mut buf))
            .await
            .map_err(|_| ZkError::Timeout(what))?
            .map_err(ZkError::io("UDP recv"))?;
        buf.truncate(n);
        Ok(buf)
    }

    async fn shutdown(&mut self) {}
}
