//! Microsoft Graph client: OneDrive upload and Outlook calendar events.
//!
//! Authenticates with the OAuth 2.0 device-code flow. The user code is
//! logged once; the token is cached in memory and refreshed with the
//! refresh token when it expires.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{CalendarEvent, RemoteArchiveService, RemoteError};
use crate::config::{CalendarConfig, GraphConfig, OneDriveConfig};

pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
/// Refresh this long before the token actually expires.
const EXPIRY_SLACK: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    expires_in: u64,
    #[serde(default = "default_poll_interval")]
    interval: u64,
    #[serde(default)]
    message: Option<String>,
}

fn default_poll_interval() -> u64 {
    5
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Instant,
}

impl CachedToken {
    fn from_response(resp: TokenResponse) -> Self {
        let lifetime = Duration::from_secs(resp.expires_in).saturating_sub(EXPIRY_SLACK);
        Self {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            expires_at: Instant::now() + lifetime,
        }
    }

    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Graph-backed [`RemoteArchiveService`].
pub struct GraphClient {
    client_id: String,
    authority: String,
    scopes: Vec<String>,
    base_path: String,
    calendar_id: Option<String>,
    base_url: String,
    http: Client,
    token: Mutex<Option<CachedToken>>,
}

impl GraphClient {
    pub fn new(
        graph: &GraphConfig,
        onedrive: &OneDriveConfig,
        calendar: &CalendarConfig,
    ) -> Result<Self, RemoteError> {
        let client_id = graph
            .client_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                RemoteError::Config(
                    "graph.client_id is required; set graph.enabled = false to run without Graph"
                        .to_string(),
                )
            })?;

        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client_id,
            authority: graph.authority_url(),
            scopes: graph.scopes.clone(),
            base_path: onedrive.base_path.trim_end_matches('/').to_string(),
            calendar_id: calendar.calendar_id.clone().filter(|id| !id.is_empty()),
            base_url: GRAPH_BASE_URL.to_string(),
            http,
            token: Mutex::new(None),
        })
    }

    /// Point requests at a different Graph host.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Upload URL for a path relative to the OneDrive base folder.
    pub fn upload_url(&self, relative_path: &str) -> String {
        let encoded: Vec<String> = self
            .base_path
            .split('/')
            .chain(relative_path.split('/'))
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/me/drive/root:/{}:/content", self.base_url, encoded.join("/"))
    }

    /// Event collection URL for the configured calendar.
    pub fn events_url(&self) -> String {
        match &self.calendar_id {
            Some(id) => format!(
                "{}/me/calendars/{}/events",
                self.base_url,
                urlencoding::encode(id)
            ),
            None => format!("{}/me/events", self.base_url),
        }
    }

    async fn access_token(&self) -> Result<String, RemoteError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_valid() {
                return Ok(token.access_token.clone());
            }
        }

        let refresh = cached.as_ref().and_then(|t| t.refresh_token.clone());
        let fresh = match refresh {
            Some(refresh_token) => match self.refresh(&refresh_token).await {
                Ok(token) => token,
                Err(e) => {
                    warn!("Token refresh failed ({}), starting device login", e);
                    self.device_login().await?
                }
            },
            None => self.device_login().await?,
        };

        let access = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access)
    }

    async fn device_login(&self) -> Result<CachedToken, RemoteError> {
        let scope = self.scopes.join(" ");
        let resp = self
            .http
            .post(format!("{}/oauth2/v2.0/devicecode", self.authority))
            .form(&[("client_id", self.client_id.as_str()), ("scope", scope.as_str())])
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Auth(format!("device code request failed: HTTP {} {}", status, body)));
        }
        let flow: DeviceCodeResponse = resp
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;

        match &flow.message {
            Some(message) => info!("{}", message),
            None => info!(
                "Open {} and enter the code {}",
                flow.verification_uri, flow.user_code
            ),
        }

        let deadline = Instant::now() + Duration::from_secs(flow.expires_in);
        let mut interval = Duration::from_secs(flow.interval.max(1));

        loop {
            tokio::time::sleep(interval).await;
            if Instant::now() >= deadline {
                return Err(RemoteError::Auth("device code expired".to_string()));
            }

            let resp = self
                .http
                .post(format!("{}/oauth2/v2.0/token", self.authority))
                .form(&[
                    ("grant_type", DEVICE_CODE_GRANT),
                    ("client_id", self.client_id.as_str()),
                    ("device_code", flow.device_code.as_str()),
                ])
                .send()
                .await?;

            if resp.status().is_success() {
                let token: TokenResponse = resp
                    .json()
                    .await
                    .map_err(|e| RemoteError::Parse(e.to_string()))?;
                info!("Signed in to Microsoft Graph");
                return Ok(CachedToken::from_response(token));
            }

            let body = resp.text().await.unwrap_or_default();
            let error: TokenErrorResponse = serde_json::from_str(&body)
                .map_err(|_| RemoteError::Auth(format!("token request failed: {}", body)))?;
            match error.error.as_str() {
                "authorization_pending" => debug!("Waiting for device login"),
                "slow_down" => interval += Duration::from_secs(5),
                _ => {
                    return Err(RemoteError::Auth(format!(
                        "{}: {}",
                        error.error,
                        error.error_description.unwrap_or_default()
                    )))
                }
            }
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<CachedToken, RemoteError> {
        let scope = self.scopes.join(" ");
        let resp = self
            .http
            .post(format!("{}/oauth2/v2.0/token", self.authority))
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("refresh_token", refresh_token),
                ("scope", scope.as_str()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Auth(format!("refresh failed: HTTP {} {}", status, body)));
        }
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;
        debug!("Refreshed Graph access token");
        Ok(CachedToken::from_response(token))
    }
}

#[async_trait]
impl RemoteArchiveService for GraphClient {
    fn name(&self) -> &str {
        "graph"
    }

    async fn upload(&self, local_path: &Path, relative_path: &str) -> Result<String, RemoteError> {
        let url = self.upload_url(relative_path);
        let bytes = tokio::fs::read(local_path).await?;
        let token = self.access_token().await?;

        info!("Uploading {} to OneDrive", relative_path);
        let resp = self
            .http
            .put(&url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/pdf")
            .body(bytes)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let item: Value = resp
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;
        Ok(item
            .get("webUrl")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| relative_path.to_string()))
    }

    async fn create_event(&self, event: &CalendarEvent) -> Result<String, RemoteError> {
        let payload = json!({
            "subject": event.subject,
            "body": {"contentType": "text", "content": event.body},
            "start": {
                "dateTime": event.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
                "timeZone": event.time_zone,
            },
            "end": {
                "dateTime": event.end.format("%Y-%m-%dT%H:%M:%S").to_string(),
                "timeZone": event.time_zone,
            },
            "location": {"displayName": event.location},
        });
        let token = self.access_token().await?;

        info!("Creating calendar event '{}'", event.subject);
        let resp = self
            .http
            .post(self.events_url())
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let created: Value = resp
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;
        Ok(created
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(calendar_id: Option<&str>) -> GraphClient {
        let graph = GraphConfig {
            client_id: Some("abc".to_string()),
            ..GraphConfig::default()
        };
        let onedrive = OneDriveConfig {
            base_path: "/Dokumente/".to_string(),
        };
        let calendar = CalendarConfig {
            calendar_id: calendar_id.map(str::to_string),
            ..CalendarConfig::default()
        };
        GraphClient::new(&graph, &onedrive, &calendar).unwrap()
    }

    #[test]
    fn test_requires_client_id() {
        let err = GraphClient::new(
            &GraphConfig::default(),
            &OneDriveConfig::default(),
            &CalendarConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, RemoteError::Config(_)));
    }

    #[test]
    fn test_upload_url_encodes_segments() {
        let url = client(None).upload_url("Rechnung/2024/01/a b.pdf");
        assert_eq!(
            url,
            "https://graph.microsoft.com/v1.0/me/drive/root:/Dokumente/Rechnung/2024/01/a%20b.pdf:/content"
        );
    }

    #[test]
    fn test_events_url() {
        assert_eq!(
            client(None).events_url(),
            "https://graph.microsoft.com/v1.0/me/events"
        );
        assert_eq!(
            client(Some("cal-1")).with_base_url("http://localhost:9/").events_url(),
            "http://localhost:9/me/calendars/cal-1/events"
        );
    }
}
