//! Session seams used by the device link.

use async_trait::async_trait;

use super::client::ZkClient;
use super::types::{DeviceIdentity, PunchEvent, UserRecord};
use crate::config::DeviceConfig;
use crate::error::SyncResult;

/// One open session with a device.
#[async_trait]
pub trait DeviceSession: Send {
    /// True while the session is usable.
    fn is_enabled(&self) -> bool;

    async fn device_name(&mut self) -> SyncResult<String>;

    async fn identity(&mut self) -> SyncResult<DeviceIdentity>;

    async fn users(&mut self) -> SyncResult<Vec<UserRecord>>;

    async fn punches(&mut self) -> SyncResult<Vec<PunchEvent>>;

    /// Best-effort teardown.
    async fn disconnect(&mut self);
}

/// Opens sessions against one fixed endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// `host:port`, for log lines.
    fn endpoint(&self) -> String;

    async fn connect(&self) -> SyncResult<Box<dyn DeviceSession>>;
}

/// Connector for a real ZKTeco device.
#[derive(Debug, Clone)]
pub struct ZkConnector {
    config: DeviceConfig,
}

impl ZkConnector {
    pub fn new(config: DeviceConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for ZkConnector {
    fn endpoint(&self) -> String {
        self.config.address()
    }

    async fn connect(&self) -> SyncResult<Box<dyn DeviceSession>> {
        let client = ZkClient::connect(&self.config).await?;
        Ok(Box::new(client))
    }
}

#[async_trait]
impl DeviceSession for ZkClient {
    fn is_enabled(&self) -> bool {
        ZkClient::is_enabled(self)
    }

    async fn device_name(&mut self) -> SyncResult<String> {
        Ok(ZkClient::device_name(self).await?)
    }

    async fn identity(&mut self) -> SyncResult<DeviceIdentity> {
        Ok(ZkClient::identity(self).await?)
    }

    async fn users(&mut self) -> SyncResult<Vec<UserRecord>> {
        Ok(ZkClient::users(self).await?)
    }

    async fn punches(&mut self) -> SyncResult<Vec<PunchEvent>> {
        Ok(ZkClient::punches(self).await?)
    }

    async fn disconnect(&mut self) {
        ZkClient::disconnect(self).await
    }
}
