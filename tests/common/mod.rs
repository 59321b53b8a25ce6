#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;

use zk_attendance_sync::zkteco::{DeviceIdentity, PunchEvent, UserRecord};
use zk_attendance_sync::{AppConfig, Connector, DeviceSession, SyncError, SyncResult};

/// Shared state behind a scripted device
pub struct Script {
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub reads: AtomicUsize,
    pub refuse_connect: AtomicBool,
    failures: Mutex<HashMap<&'static str, usize>>,
    pub users: Mutex<Vec<UserRecord>>,
    pub punches: Mutex<Vec<PunchEvent>>,
    pub read_delay: Mutex<Duration>,
}

impl Script {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            refuse_connect: AtomicBool::new(false),
            failures: Mutex::new(HashMap::new()),
            users: Mutex::new(Vec::new()),
            punches: Mutex::new(Vec::new()),
            read_delay: Mutex::new(Duration::ZERO),
        })
    }

    pub fn with_data(users: Vec<UserRecord>, punches: Vec<PunchEvent>) -> Arc<Self> {
        let script = Self::new();
        *script.users.lock().unwrap() = users;
        *script.punches.lock().unwrap() = punches;
        script
    }

    /// Make the next `times` reads of `op` fail
    pub fn fail(&self, op: &'static str, times: usize) {
        self.failures.lock().unwrap().insert(op, times);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn should_fail(&self, op: &'static str) -> bool {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(op) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }
}

pub struct ScriptedConnector {
    pub script: Arc<Script>,
}

#[async_trait]
impl Connector for ScriptedConnector {
    fn endpoint(&self) -> String {
        "10.0.0.9:4370".to_string()
    }

    async fn connect(&self) -> SyncResult<Box<dyn DeviceSession>> {
        self.script.connects.fetch_add(1, Ordering::SeqCst);
        if self.script.refuse_connect.load(Ordering::SeqCst) {
            return Err(SyncError::Connection("connection refused".to_string()));
        }
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            enabled: true,
        }))
    }
}

pub struct ScriptedSession {
    script: Arc<Script>,
    enabled: bool,
}

impl ScriptedSession {
    async fn read(&mut self, op: &'static str) -> SyncResult<()> {
        self.script.reads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.script.read_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.script.should_fail(op) {
            self.enabled = false;
            return Err(SyncError::Connection(format!("{} read timed out", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceSession for ScriptedSession {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn device_name(&mut self) -> SyncResult<String> {
        self.read("name").await?;
        Ok("K40".to_string())
    }

    async fn identity(&mut self) -> SyncResult<DeviceIdentity> {
        self.read("identity").await?;
        Ok(DeviceIdentity {
            device_name: "K40".to_string(),
            serial_number: "A8N5230560123".to_string(),
            firmware_version: "Ver 6.60 Apr 28 2017".to_string(),
            device_time: "2024-01-01 18:00:00".to_string(),
            ip_address: "10.0.0.9".to_string(),
            port: 4370,
        })
    }

    async fn users(&mut self) -> SyncResult<Vec<UserRecord>> {
        self.read("users").await?;
        Ok(self.script.users.lock().unwrap().clone())
    }

    async fn punches(&mut self) -> SyncResult<Vec<PunchEvent>> {
        self.read("punches").await?;
        Ok(self.script.punches.lock().unwrap().clone())
    }

    async fn disconnect(&mut self) {
        self.enabled = false;
        self.script.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn sample_users() -> Vec<UserRecord> {
    vec![
        UserRecord::new("1", "John Doe"),
        UserRecord::new("2", "Jane Smith"),
    ]
}

pub fn sample_punches() -> Vec<PunchEvent> {
    vec![
        PunchEvent::new("1", "2024-01-01 08:00:00"),
        PunchEvent::new("1", "2024-01-01 17:00:00"),
        PunchEvent::new("2", "2024-01-01 09:00:00"),
    ]
}

/// What the mock import server saw
pub struct Recorder {
    statuses: Vec<u16>,
    pub posts: AtomicUsize,
    pub health_checks: AtomicUsize,
    pub bodies: Mutex<Vec<Value>>,
    pub headers: Mutex<Vec<HeaderMap>>,
}

impl Recorder {
    pub fn posts(&self) -> usize {
        self.posts.load(Ordering::SeqCst)
    }
}

pub const IMPORT_PATH: &str = "/api/attendance/device-import";

/// Serve an import endpoint on an ephemeral port. The n-th POST gets
/// `statuses[n]`, the last entry repeating.
pub async fn spawn_import_server(statuses: Vec<u16>, health: u16) -> (SocketAddr, Arc<Recorder>) {
    let recorder = Arc::new(Recorder {
        statuses,
        posts: AtomicUsize::new(0),
        health_checks: AtomicUsize::new(0),
        bodies: Mutex::new(Vec::new()),
        headers: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route(IMPORT_PATH, post(import))
        .route(
            "/api/attendance/health",
            get(move |State(rec): State<Arc<Recorder>>| async move {
                rec.health_checks.fetch_add(1, Ordering::SeqCst);
                StatusCode::from_u16(health).unwrap()
            }),
        )
        .with_state(recorder.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, recorder)
}

async fn import(
    State(rec): State<Arc<Recorder>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    let n = rec.posts.fetch_add(1, Ordering::SeqCst);
    rec.bodies.lock().unwrap().push(body);
    rec.headers.lock().unwrap().push(headers);
    let code = rec
        .statuses
        .get(n)
        .or_else(|| rec.statuses.last())
        .copied()
        .unwrap_or(200);
    StatusCode::from_u16(code).unwrap()
}

/// Config pointing at a mock server, with a one second retry delay
pub fn test_config(addr: SocketAddr) -> AppConfig {
    let mut config = AppConfig::default();
    config.server.url = format!("http://{}{}", addr, IMPORT_PATH);
    config.server.token = "secret-token".to_string();
    config.server.timeout_secs = 5;
    config.server.retry_attempts = 3;
    config.server.retry_delay_secs = 1;
    config
}
