//! High-level ZKTeco client
//!
//! Tries TCP first, falls back to UDP. Session bookkeeping (session/reply
//! ids, chunked table transfers, record decoding) lives here once; the
//! transports only frame and move packets.

use std::time::Duration;

use async_trait::async_trait;

use super::error::{ZkError, ZkResult};
use super::protocol::*;
use super::tcp::TcpWire;
use super::types::{DeviceIdentity, PunchEvent, UserRecord};
use super::udp::UdpWire;
use crate::config::DeviceConfig;

/// Which transport a session negotiated; record layouts differ between them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Tcp,
    Udp,
}

/// Packet framing and I/O for one transport
#[async_trait]
pub trait Wire: Send {
    fn kind(&self) -> TransportKind;

    fn frame(&self, command: u16, session_id: u16, reply_id: u16, data: &[u8]) -> Vec<u8>;

    async fn send(&mut self, packet: &[u8]) -> ZkResult<()>;

    /// Receive one packet with the transport framing removed
    async fn recv(&mut self, wait: Duration, what: &'static str) -> ZkResult<Vec<u8>>;

    async fn shutdown(&mut self);
}

/// Handshake and exit replies come back fast or not at all
const HANDSHAKE_WAIT: Duration = Duration::from_secs(2);

/// High-level ZKTeco device client
pub struct ZkClient {
    wire: Option<Box<dyn Wire>>,
    ip: String,
    port: u16,
    timeout: Duration,
    session_id: u16,
    reply_id: u16,
    enabled: bool,
}

impl ZkClient {
    /// Connect to the device, TCP first with UDP as fallback.
    pub async fn connect(config: &DeviceConfig) -> ZkResult<Self> {
        let addr = config.address();
        let timeout = config.timeout();

        log::info!("[zkteco] Attempting TCP connection to {}", addr);
        let tcp_err = match TcpWire::connect(&addr, timeout).await {
            Ok(wire) => {
                let mut client = Self::with_wire(Box::new(wire), config);
                match client.open(config.comm_key).await {
                    Ok(()) => {
                        log::info!("[zkteco] TCP connection established to {}", addr);
                        return Ok(client);
                    }
                    // a device that rejects the key over TCP rejects it over UDP too
                    Err(e @ ZkError::Auth(_)) => {
                        client.disconnect().await;
                        return Err(e);
                    }
                    Err(e) => {
                        client.disconnect().await;
                        e
                    }
                }
            }
            Err(e) => e,
        };
        log::warn!("[zkteco] TCP failed ({}), trying UDP...", tcp_err);

        log::info!("[zkteco] Attempting UDP connection to {}", addr);
        let wire = UdpWire::connect(&addr).await?;
        let mut client = Self::with_wire(Box::new(wire), config);
        match client.open(config.comm_key).await {
            Ok(()) => {
                log::info!("[zkteco] UDP connection established to {}", addr);
                Ok(client)
            }
            Err(e) => {
                client.disconnect().await;
                Err(e)
            }
        }
    }

    fn with_wire(wire: Box<dyn Wire>, config: &DeviceConfig) -> Self {
        Self {
            wire: Some(wire),
            ip: config.ip.clone(),
            port: config.port,
            timeout: config.timeout(),
            session_id: 0,
            reply_id: 0,
            enabled: false,
        }
    }

    /// CMD_CONNECT handshake, followed by CMD_AUTH when the device asks for it
    async fn open(&mut self, comm_key: Option<u32>) -> ZkResult<()> {
        let reply = self.execute(cmd::CMD_CONNECT, &[]).await?;
        self.session_id = reply.header.session_id;

        match (reply.command(), comm_key) {
            (cmd::CMD_ACK_OK, _) => {}
            (cmd::CMD_ACK_UNAUTH, Some(key)) => {
                let key = make_comm_key(key, self.session_id, 50);
                self.execute(cmd::CMD_AUTH, &key).await?.ensure_ok()?;
                log::info!("[zkteco] Authenticated with communication key");
            }
            (cmd::CMD_ACK_UNAUTH, None) => {
                return Err(ZkError::Auth("device requires a communication key".to_string()));
            }
            (other, _) => return Err(ZkError::unexpected(other)),
        }

        self.enabled = true;
        Ok(())
    }

    /// Whether the session is open and has not seen a transport failure
    pub fn is_enabled(&self) -> bool {
        self.enabled && self.wire.is_some()
    }

    fn transport(&self) -> Option<TransportKind> {
        self.wire.as_ref().map(|w| w.kind())
    }

    /// Send a command and wait for its reply
    async fn execute(&mut self, command: u16, data: &[u8]) -> ZkResult<Reply> {
        if command == cmd::CMD_CONNECT {
            self.session_id = 0;
            self.reply_id = 0;
        } else {
            self.reply_id = self.reply_id.wrapping_add(1);
        }

        let wait = match command {
            cmd::CMD_CONNECT | cmd::CMD_EXIT => HANDSHAKE_WAIT.min(self.timeout),
            _ => self.timeout,
        };

        self.send(command, data).await?;
        self.recv_reply(wait, "command reply").await
    }

    async fn send(&mut self, command: u16, data: &[u8]) -> ZkResult<()> {
        let (session_id, reply_id) = (self.session_id, self.reply_id);
        let wire = self.wire.as_mut().ok_or(ZkError::NotConnected)?;
        let packet = wire.frame(command, session_id, reply_id, data);
        let sent = wire.send(&packet).await;
        self.track(sent)
    }

    /// Next reply, skipping real-time event packets pushed by the device
    async fn recv_reply(&mut self, wait: Duration, what: &'static str) -> ZkResult<Reply> {
        loop {
            let wire = self.wire.as_mut().ok_or(ZkError::NotConnected)?;
            let received = wire.recv(wait, what).await;
            let packet = self.track(received)?;
            if is_realtime_event(&packet) {
                log::debug!("[zkteco] Skipping real-time event packet");
                continue;
            }
            return Reply::parse(&packet);
        }
    }

    /// Any transport failure leaves the session unusable
    fn track<T>(&mut self, result: ZkResult<T>) -> ZkResult<T> {
        if result.is_err() {
            self.enabled = false;
        }
        result
    }

    /// Read a data table (users or attendance). Returns the table bytes and
    /// whether the device answered inline rather than via a chunked transfer.
    async fn read_with_buffer(&mut self, request: &[u8]) -> ZkResult<(Vec<u8>, bool)> {
        let reply = self.execute(cmd::CMD_DATA_WRRQ, request).await?;

        match reply.command() {
            cmd::CMD_DATA => Ok((reply.payload, true)),
            cmd::CMD_ACK_OK | cmd::CMD_PREPARE_DATA => {
                let size = prepared_size(&reply.payload)?;
                let plan = chunk_plan(size);

                // base 60s + 30s per chunk; ~11k punches (~8 chunks) gets ~300s
                let budget = Duration::from_secs(60 + plan.len() as u64 * 30);
                log::info!(
                    "[zkteco] Expecting {} bytes in {} chunks, timeout {}s",
                    size,
                    plan.len(),
                    budget.as_secs()
                );
                let deadline = tokio::time::Instant::now() + budget;

                let mut table = Vec::with_capacity(size);
                for (start, len) in plan {
                    self.read_chunk(start, len as usize, deadline, &mut table).await?;
                }
                Ok((table, false))
            }
            other => Err(ZkError::unexpected(other)),
        }
    }

    /// Pull one chunk; the device answers with DATA packets and closes with ACK_OK
    async fn read_chunk(
        &mut self,
        start: u32,
        len: usize,
        deadline: tokio::time::Instant,
        table: &mut Vec<u8>,
    ) -> ZkResult<()> {
        self.reply_id = self.reply_id.wrapping_add(1);
        self.send(cmd::CMD_DATA_RDY, &chunk_request(start, len as u32)).await?;

        let mut received = 0usize;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(ZkError::Timeout("chunk data"));
            }

            let reply = self.recv_reply(remaining, "chunk data").await?;
            match reply.command() {
                cmd::CMD_DATA => {
                    received += reply.payload.len();
                    table.extend_from_slice(&reply.payload);
                }
                cmd::CMD_PREPARE_DATA => {}
                cmd::CMD_ACK_OK if received >= len => return Ok(()),
                cmd::CMD_ACK_OK => {}
                other => return Err(ZkError::unexpected(other)),
            }
        }
    }

    async fn free_data(&mut self) -> ZkResult<()> {
        self.execute(cmd::CMD_FREE_DATA, &[]).await?;
        Ok(())
    }

    async fn read_option(&mut self, key: &[u8]) -> ZkResult<String> {
        let reply = self.execute(cmd::CMD_OPTIONS_RRQ, key).await?.ensure_ok()?;
        Ok(parse_option_value(&reply.payload))
    }

    pub async fn device_name(&mut self) -> ZkResult<String> {
        self.read_option(request_data::DEVICE_NAME).await
    }

    pub async fn serial_number(&mut self) -> ZkResult<String> {
        self.read_option(request_data::SERIAL_NUMBER).await
    }

    pub async fn firmware_version(&mut self) -> ZkResult<String> {
        let reply = self.execute(cmd::CMD_GET_VERSION, &[]).await?.ensure_ok()?;
        Ok(extract_ascii_string(&reply.payload))
    }

    /// Device clock, device-local
    pub async fn device_time(&mut self) -> ZkResult<String> {
        let reply = self.execute(cmd::CMD_GET_TIME, &[]).await?.ensure_ok()?;
        match reply.payload.get(0..4) {
            Some(b) => Ok(decode_zk_time(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))),
            None => Err(ZkError::Malformed("time reply too short")),
        }
    }

    pub async fn identity(&mut self) -> ZkResult<DeviceIdentity> {
        Ok(DeviceIdentity {
            device_name: self.device_name().await?,
            serial_number: self.serial_number().await?,
            firmware_version: self.firmware_version().await?,
            device_time: self.device_time().await?,
            ip_address: self.ip.clone(),
            port: self.port,
        })
    }

    /// All enrolled users (72-byte records over TCP, 28-byte over UDP)
    pub async fn users(&mut self) -> ZkResult<Vec<UserRecord>> {
        let kind = self.transport().ok_or(ZkError::NotConnected)?;
        let _ = self.free_data().await;
        let (data, _inline) = self.read_with_buffer(request_data::GET_USERS).await?;
        let _ = self.free_data().await;

        let users: Vec<UserRecord> = match kind {
            TransportKind::Tcp => table_records(&data, 72).map(decode_user_72).collect(),
            TransportKind::Udp => table_records(&data, 28).map(decode_user_28).collect(),
        };
        log::info!("[zkteco] Retrieved {} users from device", users.len());
        Ok(users)
    }

    /// Every stored punch (40-byte records over TCP, 16 or 8 bytes over UDP)
    pub async fn punches(&mut self) -> ZkResult<Vec<PunchEvent>> {
        let kind = self.transport().ok_or(ZkError::NotConnected)?;
        let _ = self.free_data().await;
        let (data, inline) = self.read_with_buffer(request_data::GET_ATTENDANCE_LOGS).await?;
        let _ = self.free_data().await;

        let punches: Vec<PunchEvent> = match (kind, inline) {
            (TransportKind::Tcp, _) => table_records(&data, 40).map(decode_punch_40).collect(),
            (TransportKind::Udp, true) => {
                // short records carry the slot number, not the user id
                let mut punches: Vec<PunchEvent> = table_records(&data, 8).map(decode_punch_8).collect();
                match self.users().await {
                    Ok(users) => resolve_slot_ids(&mut punches, &users),
                    Err(e) => log::warn!("[zkteco] Roster unavailable, keeping slot numbers: {}", e),
                }
                punches
            }
            (TransportKind::Udp, false) => table_records(&data, 16).map(decode_punch_16).collect(),
        };
        log::info!("[zkteco] Retrieved {} attendance records from device", punches.len());
        Ok(punches)
    }

    /// Send CMD_EXIT on a healthy session and drop the socket; never fails
    pub async fn disconnect(&mut self) {
        if self.is_enabled() {
            let _ = self.execute(cmd::CMD_EXIT, &[]).await;
        }
        if let Some(mut wire) = self.wire.take() {
            wire.shutdown().await;
        }
        self.enabled = false;
    }
}

/// Scramble a numeric comm key with the session id as CMD_AUTH expects
pub fn make_comm_key(key: u32, session_id: u16, ticks: u8) -> [u8; 4] {
    let k = key.reverse_bits().wrapping_add(session_id as u32).to_le_bytes();
    let k = [k[0] ^ b'Z', k[1] ^ b'K', k[2] ^ b'S', k[3] ^ b'O'];
    // swap the two 16-bit halves
    let k = [k[2], k[3], k[0], k[1]];
    [k[0] ^ ticks, k[1] ^ ticks, ticks, k[3] ^ ticks]
}
