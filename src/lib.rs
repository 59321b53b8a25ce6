//! Attendance synchronization for ZKTeco time clocks.
//!
//! Reads the roster and punch log from one device, groups the punches per
//! user and day into the partner API's record shape, and posts the result to
//! the remote import endpoint with bounded retries.

pub mod aggregate;
pub mod config;
pub mod delivery;
pub mod device;
pub mod error;
pub mod logging;
pub mod payload;
pub mod scheduler;
pub mod sync;
pub mod zkteco;

pub use aggregate::aggregate;
pub use crate::config::{AppConfig, DeviceConfig, ServerConfig, SyncConfig};
pub use delivery::DeliveryClient;
pub use device::{DeviceLink, DeviceReader, DeviceSnapshot, StatusBundle};
pub use error::{FailureKind, SyncError, SyncResult};
pub use payload::SyncPayload;
pub use scheduler::SyncScheduler;
pub use sync::{
    ConnectivityReport, DataSummary, PayloadPreview, StatusResponse, SyncOrchestrator, SyncOutcome,
};
pub use zkteco::{Connector, DeviceSession, ZkConnector};
