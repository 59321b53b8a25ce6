//! ZKTeco device communication module
//!
//! Implements the ZKTeco binary protocol over both TCP and UDP.
//! Devices are tried over TCP first (port 4370), then UDP.

pub mod client;
pub mod error;
pub mod protocol;
pub mod session;
pub mod tcp;
pub mod types;
pub mod udp;

pub use client::ZkClient;
pub use error::{ZkError, ZkResult};
pub use session::{Connector, DeviceSession, ZkConnector};
pub use types::{DeviceIdentity, PunchEvent, UserRecord};
