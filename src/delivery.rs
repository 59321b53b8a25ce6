//! Delivery of aggregated payloads to the remote import endpoint.

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};

use crate::config::ServerConfig;
use crate::error::{SyncError, SyncResult};
use crate::payload::SyncPayload;

const JSON: &str = "application/json";

pub struct DeliveryClient {
    http: Client,
    url: Url,
    token: String,
    attempts: u32,
    retry_delay: Duration,
}

impl DeliveryClient {
    pub fn new(config: &ServerConfig) -> SyncResult<Self> {
        let url = Url::parse(&config.url)
            .map_err(|e| SyncError::Config(format!("Invalid server URL {}: {}", config.url, e)))?;
        let http = Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url,
            token: config.token.clone(),
            attempts: config.retry_attempts.max(1),
            retry_delay: config.retry_delay(),
        })
    }

    /// POST the payload, retrying with a fixed delay.
    ///
    /// Only HTTP 200 counts as delivered. Any other status or a transport
    /// error uses up one attempt; there is no pause after the last one.
    pub async fn send(&self, payload: &SyncPayload) -> SyncResult<()> {
        log::info!(
            "[delivery] Sending {} records to {}",
            payload.record_count(),
            self.url
        );

        let mut last_failure = String::new();
        for attempt in 1..=self.attempts {
            match self.post(payload).await {
                Ok(status) if status == StatusCode::OK => {
                    log::info!("[delivery] Data accepted by server on attempt {}", attempt);
                    return Ok(());
                }
                Ok(status) => {
                    last_failure = format!("server returned status {}", status);
                    log::warn!(
                        "[delivery] Attempt {}/{}: {}",
                        attempt,
                        self.attempts,
                        last_failure
                    );
                }
                Err(e) => {
                    last_failure = format!("request failed: {}", e);
                    log::warn!(
                        "[delivery] Attempt {}/{}: {}",
                        attempt,
                        self.attempts,
                        last_failure
                    );
                }
            }

            if let Some(pause) = self.pause_after(attempt) {
                tokio::time::sleep(pause).await;
            }
        }

        log::error!("[delivery] All {} attempts failed", self.attempts);
        Err(SyncError::Delivery {
            attempts: self.attempts,
            reason: last_failure,
        })
    }

    async fn post(&self, payload: &SyncPayload) -> Result<StatusCode, reqwest::Error> {
        let response = self
            .http
            .post(self.url.clone())
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, JSON)
            .header(ACCEPT, JSON)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            log::debug!("[delivery] Rejected with {}: {}", status, body);
        }
        Ok(status)
    }

    /// Delay to wait after a failed `attempt` (1-based), if another follows
    pub fn pause_after(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.attempts).then_some(self.retry_delay)
    }

    /// Sibling `health` path of the import URL
    pub fn health_url(&self) -> Url {
        let mut url = self.url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().pop().push("health");
        }
        url
    }

    /// GET the health path; 200 and 404 both mean a server answered
    pub async fn test_server_reachable(&self) -> bool {
        let url = self.health_url();
        let result = self
            .http
            .get(url.clone())
            .bearer_auth(&self.token)
            .header(ACCEPT, JSON)
            .send()
            .await;

        match result {
            Ok(response) if matches!(response.status(), StatusCode::OK | StatusCode::NOT_FOUND) => {
                log::info!("[delivery] Server reachable at {} ({})", url, response.status());
                true
            }
            Ok(response) => {
                log::error!("[delivery] Server check failed: {} returned {}", url, response.status());
                false
            }
            Err(e) => {
                log::error!("[delivery] Server check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery(url: &str, attempts: u32) -> DeliveryClient {
        let config = ServerConfig {
            url: url.to_string(),
            retry_attempts: attempts,
            retry_delay_secs: 5,
            ..ServerConfig::default()
        };
        DeliveryClient::new(&config).unwrap()
    }

    #[test]
    fn pauses_between_attempts_only() {
        let client = delivery("http://localhost:8000/api/attendance/device-import", 3);
        assert_eq!(client.pause_after(1), Some(Duration::from_secs(5)));
        assert_eq!(client.pause_after(2), Some(Duration::from_secs(5)));
        assert_eq!(client.pause_after(3), None);
    }

    #[test]
    fn single_attempt_never_pauses() {
        let client = delivery("http://localhost:8000/import", 1);
        assert_eq!(client.pause_after(1), None);
    }

    #[test]
    fn health_url_replaces_last_segment() {
        let client = delivery("http://localhost:8000/api/attendance/device-import", 3);
        assert_eq!(
            client.health_url().as_str(),
            "http://localhost:8000/api/attendance/health"
        );

        let client = delivery("https://hr.example.com/api/import/", 3);
        assert_eq!(client.health_url().as_str(), "https://hr.example.com/api/health");
    }

    #[test]
    fn rejects_unparseable_url() {
        let config = ServerConfig {
            url: "not a url".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(
            DeliveryClient::new(&config),
            Err(SyncError::Config(_))
        ));
    }
}
