//! ZKTeco binary protocol: command codes, packet framing and record decoding

use std::collections::HashMap;

use super::error::{ZkError, ZkResult};
use super::types::{PunchEvent, UserRecord};

/// ZKTeco protocol command codes
pub mod cmd {
    pub const CMD_CONNECT: u16 = 1000;
    pub const CMD_EXIT: u16 = 1001;
    pub const CMD_GET_VERSION: u16 = 1100;
    pub const CMD_AUTH: u16 = 1102;
    pub const CMD_PREPARE_DATA: u16 = 1500;
    pub const CMD_DATA: u16 = 1501;
    pub const CMD_FREE_DATA: u16 = 1502;
    pub const CMD_DATA_WRRQ: u16 = 1503;
    pub const CMD_DATA_RDY: u16 = 1504;
    pub const CMD_OPTIONS_RRQ: u16 = 11;
    pub const CMD_GET_TIME: u16 = 201;
    pub const CMD_REG_EVENT: u16 = 500;

    // Response codes
    pub const CMD_ACK_OK: u16 = 2000;
    pub const CMD_ACK_ERROR: u16 = 2001;
    pub const CMD_ACK_DATA: u16 = 2002;
    pub const CMD_ACK_UNAUTH: u16 = 2005;
}

pub const USHRT_MAX: u32 = 65535;
pub const MAX_CHUNK: usize = 65472;

/// Length of the command header shared by both transports
pub const HEADER_LEN: usize = 8;
/// Length of the TCP framing prefix that precedes the command header
pub const TCP_PREFIX_LEN: usize = 8;

/// TCP packet magic bytes
pub const TCP_MAGIC: [u8; 4] = [0x50, 0x50, 0x82, 0x7d];

/// Pre-built request payloads
pub mod request_data {
    pub const GET_ATTENDANCE_LOGS: &[u8] = &[
        0x01, 0x0d, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];

    pub const GET_USERS: &[u8] = &[
        0x01, 0x09, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];

    pub const DEVICE_NAME: &[u8] = b"~DeviceName\0";
    pub const SERIAL_NUMBER: &[u8] = b"~SerialNumber\0";
}

/// Compute ZKTeco checksum over a packet buffer
pub fn create_checksum(buf: &[u8]) -> u16 {
    let mut chksum: u32 = 0;
    for pair in buf.chunks(2) {
        chksum += match pair {
            [lo, hi] => u16::from_le_bytes([*lo, *hi]) as u32,
            [last] => *last as u32,
            _ => 0,
        };
        chksum %= USHRT_MAX;
    }
    (USHRT_MAX - chksum - 1) as u16
}

/// Decoded command header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub command_id: u16,
    pub checksum: u16,
    pub session_id: u16,
    pub reply_id: u16,
}

impl PacketHeader {
    /// Decode the 8-byte command header at the start of `data`
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_LEN {
            return None;
        }
        let word = |i: usize| u16::from_le_bytes([data[i], data[i + 1]]);
        Some(Self {
            command_id: word(0),
            checksum: word(2),
            session_id: word(4),
            reply_id: word(6),
        })
    }
}

/// A command reply split into header and payload
#[derive(Debug, Clone)]
pub struct Reply {
    pub header: PacketHeader,
    pub payload: Vec<u8>,
}

impl Reply {
    /// Split a bare (prefix-free) packet
    pub fn parse(packet: &[u8]) -> ZkResult<Self> {
        let header = PacketHeader::decode(packet).ok_or(ZkError::Malformed("reply shorter than header"))?;
        Ok(Self {
            header,
            payload: packet[HEADER_LEN..].to_vec(),
        })
    }

    pub fn command(&self) -> u16 {
        self.header.command_id
    }

    /// Fail unless the device acknowledged the command
    pub fn ensure_ok(self) -> ZkResult<Self> {
        match self.header.command_id {
            cmd::CMD_ACK_OK | cmd::CMD_ACK_DATA | cmd::CMD_DATA => Ok(self),
            cmd::CMD_ACK_UNAUTH => Err(ZkError::Auth("device requires a communication key".to_string())),
            other => Err(ZkError::unexpected(other)),
        }
    }
}

/// Build the command header + data. The wire reply_id is `reply_id + 1`.
fn encode_command(command: u16, session_id: u16, reply_id: u16, data: &[u8]) -> Vec<u8> {
    let next_reply = reply_id.wrapping_add(1) % (USHRT_MAX as u16);

    let mut buf = Vec::with_capacity(HEADER_LEN + data.len());
    buf.extend_from_slice(&command.to_le_bytes());
    buf.extend_from_slice(&[0, 0]);
    buf.extend_from_slice(&session_id.to_le_bytes());
    buf.extend_from_slice(&next_reply.to_le_bytes());
    buf.extend_from_slice(data);

    let chksum = create_checksum(&buf);
    buf[2..4].copy_from_slice(&chksum.to_le_bytes());
    buf
}

/// Create a UDP packet: 8-byte header + data
pub fn encode_udp_packet(command: u16, session_id: u16, reply_id: u16, data: &[u8]) -> Vec<u8> {
    encode_command(command, session_id, reply_id, data)
}

/// Create a TCP packet: magic + u32 length, then the UDP-style packet
pub fn encode_tcp_packet(command: u16, session_id: u16, reply_id: u16, data: &[u8]) -> Vec<u8> {
    let inner = encode_command(command, session_id, reply_id, data);
    let mut buf = Vec::with_capacity(TCP_PREFIX_LEN + inner.len());
    buf.extend_from_slice(&TCP_MAGIC);
    buf.extend_from_slice(&(inner.len() as u32).to_le_bytes());
    buf.extend_from_slice(&inner);
    buf
}

/// Length of the packet announced by a TCP prefix, if `buf` starts with one
pub fn tcp_frame_len(buf: &[u8]) -> Option<usize> {
    if buf.len() < TCP_PREFIX_LEN || buf[0..4] != TCP_MAGIC {
        return None;
    }
    Some(u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize)
}

/// Remove TCP prefix (first 8 bytes) if present
pub fn strip_tcp_prefix(buf: &[u8]) -> &[u8] {
    match tcp_frame_len(buf) {
        Some(_) => &buf[TCP_PREFIX_LEN..],
        None => buf,
    }
}

/// Real-time event pushed by the device in the middle of a transfer
pub fn is_realtime_event(packet: &[u8]) -> bool {
    PacketHeader::decode(strip_tcp_prefix(packet))
        .map(|h| h.command_id == cmd::CMD_REG_EVENT)
        .unwrap_or(false)
}

/// Read the "total size" word of a PREPARE_DATA / ACK_OK reply payload
pub fn prepared_size(payload: &[u8]) -> ZkResult<usize> {
    if payload.len() < 5 {
        return Err(ZkError::Malformed("prepare data response too short"));
    }
    Ok(u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]) as usize)
}

/// Chunk requests (`start`, `size`) needed to pull `size` bytes
pub fn chunk_plan(size: usize) -> Vec<(u32, u32)> {
    (0..size)
        .step_by(MAX_CHUNK)
        .map(|start| (start as u32, MAX_CHUNK.min(size - start) as u32))
        .collect()
}

pub fn chunk_request(start: u32, size: u32) -> [u8; 8] {
    let mut req = [0u8; 8];
    req[0..4].copy_from_slice(&start.to_le_bytes());
    req[4..8].copy_from_slice(&size.to_le_bytes());
    req
}

// ============================================================================
// Data record decoders
// ============================================================================

/// Fixed-size records of a data table, skipping the leading u32 size word
pub fn table_records(data: &[u8], record_size: usize) -> std::slice::ChunksExact<'_, u8> {
    let body = if data.len() >= 4 { &data[4..] } else { &[][..] };
    body.chunks_exact(record_size)
}

/// Decode a 28-byte user record (UDP format)
pub fn decode_user_28(data: &[u8]) -> UserRecord {
    let uid = u16::from_le_bytes([data[0], data[1]]);
    let user_id = u32::from_le_bytes([data[24], data[25], data[26], data[27]]).to_string();
    UserRecord {
        name: display_name(extract_ascii_string(&data[8..16]), &user_id),
        card: u32::from_le_bytes([data[16], data[17], data[18], data[19]]),
        privilege: data[2],
        password: extract_ascii_string(&data[3..8]),
        group_id: data[21].to_string(),
        user_sns: vec![uid],
        work_code: 0,
        user_id,
    }
}

/// Decode a 72-byte user record (TCP format)
pub fn decode_user_72(data: &[u8]) -> UserRecord {
    let uid = u16::from_le_bytes([data[0], data[1]]);
    let user_id = extract_ascii_string(&data[48..72]);
    UserRecord {
        name: display_name(extract_ascii_string(&data[11..35]), &user_id),
        card: u32::from_le_bytes([data[35], data[36], data[37], data[38]]),
        privilege: data[2],
        password: extract_ascii_string(&data[3..11]),
        group_id: extract_ascii_string(&data[40..47]),
        user_sns: vec![uid],
        work_code: 0,
        user_id,
    }
}

fn display_name(name: String, user_id: &str) -> String {
    if name.is_empty() {
        format!("User {}", user_id)
    } else {
        name
    }
}

/// Decode a 40-byte attendance record (TCP format)
pub fn decode_punch_40(data: &[u8]) -> PunchEvent {
    PunchEvent {
        user_id: extract_ascii_string(&data[2..26]),
        status: data[26],
        timestamp: decode_zk_time(u32::from_le_bytes([data[27], data[28], data[29], data[30]])),
        punch: data[31],
    }
}

/// Decode a 16-byte attendance record (UDP large-response format)
pub fn decode_punch_16(data: &[u8]) -> PunchEvent {
    PunchEvent {
        user_id: u32::from_le_bytes([data[0], data[1], data[2], data[3]]).to_string(),
        timestamp: decode_zk_time(u32::from_le_bytes([data[4], data[5], data[6], data[7]])),
        status: data[8],
        punch: data[9],
    }
}

/// Decode an 8-byte attendance record (UDP small-response format)
pub fn decode_punch_8(data: &[u8]) -> PunchEvent {
    PunchEvent {
        user_id: u16::from_le_bytes([data[0], data[1]]).to_string(),
        status: data[2],
        timestamp: decode_zk_time(u32::from_le_bytes([data[3], data[4], data[5], data[6]])),
        punch: data[7],
    }
}

/// Swap the slot numbers carried by 8-byte records for roster user ids.
/// Slots missing from the roster keep their number.
pub fn resolve_slot_ids(punches: &mut [PunchEvent], users: &[UserRecord]) {
    let by_slot: HashMap<u16, &str> = users
        .iter()
        .flat_map(|u| u.user_sns.iter().map(move |sn| (*sn, u.user_id.as_str())))
        .collect();

    for punch in punches {
        let slot = punch.user_id.parse::<u16>().ok();
        if let Some(user_id) = slot.and_then(|sn| by_slot.get(&sn)) {
            punch.user_id = user_id.to_string();
        }
    }
}

/// Unpack a ZKTeco packed timestamp into `YYYY-MM-DD HH:MM:SS`.
///
/// The packing assumes 31-day months, so a corrupt value can name a day that
/// does not exist (e.g. Feb 31). Such values are rendered as-is and rejected
/// later by the date parser instead of being silently clamped.
pub fn decode_zk_time(mut time: u32) -> String {
    let second = time % 60;
    time /= 60;
    let minute = time % 60;
    time /= 60;
    let hour = time % 24;
    time /= 24;
    let day = time % 31 + 1;
    time /= 31;
    let month = time % 12 + 1;
    time /= 12;
    let year = time + 2000;

    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        year, month, day, hour, minute, second
    )
}

/// Value of a `key=value\0` option reply
pub fn parse_option_value(payload: &[u8]) -> String {
    let value = match payload.iter().position(|&b| b == b'=') {
        Some(eq) => &payload[eq + 1..],
        None => payload,
    };
    extract_ascii_string(value)
}

/// Extract a null-terminated ASCII string from a byte slice
pub fn extract_ascii_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).trim().to_string()
}

/// Map command ID to its protocol name
pub fn command_name(cmd_id: u16) -> &'static str {
    match cmd_id {
        2000 => "CMD_ACK_OK",
        2001 => "CMD_ACK_ERROR",
        2002 => "CMD_ACK_DATA",
        2003 => "CMD_ACK_RETRY",
        2004 => "CMD_ACK_REPEAT",
        2005 => "CMD_ACK_UNAUTH",
        0xFFFF => "CMD_ACK_UNKNOWN",
        0xFFFD => "CMD_ACK_ERROR_CMD",
        0xFFFC => "CMD_ACK_ERROR_INIT",
        0xFFFB => "CMD_ACK_ERROR_DATA",
        _ => "UNKNOWN_COMMAND",
    }
}
