//! Connection discipline for a single device endpoint.
//!
//! Reads go through [`DeviceLink::read`]: connect if the session is not
//! alive, attempt the read, and on failure run exactly one recovery cycle
//! (disconnect, connect, retry once). A second failure is returned to the
//! caller as a classified error; nothing panics or loops past that.

use std::future::Future;
use std::pin::Pin;

use crate::error::{SyncError, SyncResult};
use crate::zkteco::{Connector, DeviceSession};

/// Future returned by a read against a borrowed session
pub type SessionFuture<'a, T> = Pin<Box<dyn Future<Output = SyncResult<T>> + Send + 'a>>;

pub struct DeviceLink {
    connector: Box<dyn Connector>,
    session: Option<Box<dyn DeviceSession>>,
}

impl DeviceLink {
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self {
            connector: Box::new(connector),
            session: None,
        }
    }

    pub fn endpoint(&self) -> String {
        self.connector.endpoint()
    }

    /// Open a fresh session, closing any previous one first. Never fails;
    /// the outcome is logged and reported as a bool.
    pub async fn connect(&mut self) -> bool {
        self.disconnect().await;

        let endpoint = self.endpoint();
        log::info!("[device] Attempting to connect to device {}", endpoint);

        match self.connector.connect().await {
            Ok(session) => {
                self.session = Some(session);
                log::info!("[device] Connected to device {}", endpoint);
                true
            }
            Err(e) => {
                self.session = None;
                log::error!("[device] Error connecting to device {}: {}", endpoint, e);
                false
            }
        }
    }

    /// A session exists and reports itself enabled
    pub fn is_alive(&self) -> bool {
        self.session.as_ref().map_or(false, |s| s.is_enabled())
    }

    /// Best-effort teardown
    pub async fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.disconnect().await;
            log::info!("[device] Disconnected from device {}", self.endpoint());
        }
    }

    /// Run `op` against the session with the reconnect-once policy.
    pub async fn read<T, F>(&mut self, what: &'static str, op: F) -> SyncResult<T>
    where
        T: Send,
        F: for<'a> Fn(&'a mut (dyn DeviceSession + 'static)) -> SessionFuture<'a, T> + Send + Sync,
    {
        if !self.is_alive() && !self.connect().await {
            return Err(SyncError::Connection(format!(
                "cannot reach device {} to read {}",
                self.endpoint(),
                what
            )));
        }

        let first_err = match self.attempt(&op).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        log::error!("[device] Error reading {}: {}", what, first_err);

        self.disconnect().await;
        if !self.connect().await {
            return Err(SyncError::Connection(format!(
                "reconnect to {} failed after: {}",
                self.endpoint(),
                first_err
            )));
        }

        match self.attempt(&op).await {
            Ok(value) => {
                log::info!("[device] Retrieved {} after reconnection", what);
                Ok(value)
            }
            Err(e) => {
                log::error!("[device] Error reading {} after reconnection: {}", what, e);
                Err(e)
            }
        }
    }

    async fn attempt<T, F>(&mut self, op: &F) -> SyncResult<T>
    where
        F: for<'a> Fn(&'a mut (dyn DeviceSession + 'static)) -> SessionFuture<'a, T>,
    {
        match self.session.as_deref_mut() {
            Some(session) => op(session).await,
            None => Err(SyncError::Connection("not connected".to_string())),
        }
    }

    /// Open a fresh session and confirm the device answers a name query
    pub async fn test_connection(&mut self) -> bool {
        if !self.connect().await {
            return false;
        }
        let name = match self.session.as_deref_mut() {
            Some(session) => session.device_name().await,
            None => return false,
        };
        match name {
            Ok(name) => {
                log::info!("[device] Connection test successful - Device: {}", name);
                true
            }
            Err(e) => {
                log::error!("[device] Connection test failed - cannot get device info: {}", e);
                false
            }
        }
    }
}
