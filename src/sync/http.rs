//! HTTP client for the remote file store.
//!
//! The store exposes a small JSON API:
//! - `POST /api/fs/list` with `{"path": ...}` lists a directory
//! - `POST /api/fs/get` with `{"path": ...}` resolves a file to a `raw_url`
//!
//! Both answer with an envelope `{"code": 200, "message": ..., "data": ...}`;
//! any other `code` is treated as a failure. The bytes themselves come from a
//! plain `GET` against the resolved `raw_url`.

use super::{RemoteError, RemoteStore};
use serde::Deserialize;
use std::io::Read;
use std::time::Duration;

/// User-Agent header sent with every request
const USER_AGENT: &str = "almanac-cli";

/// Timeout for listing and resolve calls
const API_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for bulk content downloads
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Envelope `code` meaning success
const SUCCESS_CODE: i64 = 200;

/// Connection settings for the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    /// Base address, e.g. `https://files.example.com`
    pub base_url: String,
    /// Auth token sent as the `Authorization` header
    pub token: String,
    /// Directory holding release reports on the remote
    pub path: String,
}

impl RemoteSettings {
    /// Remote path of a listed entry.
    pub fn entry_path(&self, name: &str) -> String {
        format!("{}/{}", self.path.trim_end_matches('/'), name)
    }

    fn endpoint(&self, api: &str) -> String {
        format!("{}/api/fs/{}", self.base_url.trim_end_matches('/'), api)
    }
}

/// Response envelope shared by all API calls.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

/// `data` of a directory listing.
#[derive(Debug, Deserialize)]
struct ListData {
    #[serde(default)]
    content: Option<Vec<ListEntry>>,
}

/// One entry of a directory listing (only fields we care about).
#[derive(Debug, Deserialize)]
struct ListEntry {
    name: String,
    #[serde(default)]
    is_dir: bool,
}

/// `data` of a resolve call.
#[derive(Debug, Deserialize)]
struct GetData {
    #[serde(default)]
    raw_url: Option<String>,
}

/// Blocking HTTP implementation of [`RemoteStore`].
pub struct HttpRemoteStore {
    agent: ureq::Agent,
    settings: RemoteSettings,
}

impl HttpRemoteStore {
    /// Create a client for the given settings.
    pub fn new(settings: RemoteSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(API_TIMEOUT)
            .user_agent(USER_AGENT)
            .build();
        Self { agent, settings }
    }

    fn post<T: for<'de> Deserialize<'de>>(
        &self,
        api: &str,
        body: serde_json::Value,
    ) -> Result<T, RemoteError> {
        let response = self
            .agent
            .post(&self.settings.endpoint(api))
            .set("Authorization", &self.settings.token)
            .set("Content-Type", "application/json")
            .send_json(body);

        let envelope: Envelope<T> = match response {
            Ok(resp) => resp
                .into_json()
                .map_err(|e| RemoteError::Malformed(e.to_string()))?,
            Err(ureq::Error::Status(code, resp)) => {
                let message = resp.into_string().unwrap_or_default();
                return Err(RemoteError::Status { code, message });
            }
            Err(e) => return Err(RemoteError::Http(e.to_string())),
        };

        unwrap_envelope(envelope)
    }
}

fn unwrap_envelope<T>(envelope: Envelope<T>) -> Result<T, RemoteError> {
    if envelope.code != SUCCESS_CODE {
        return Err(RemoteError::Status {
            code: u16::try_from(envelope.code).unwrap_or(0),
            message: envelope.message,
        });
    }
    envelope
        .data
        .ok_or_else(|| RemoteError::Malformed("response has no data".to_string()))
}

fn list_names(data: ListData) -> Vec<String> {
    data.content
        .unwrap_or_default()
        .into_iter()
        .filter(|entry| !entry.is_dir)
        .map(|entry| entry.name)
        .collect()
}

impl RemoteStore for HttpRemoteStore {
    fn list(&self) -> Result<Vec<String>, RemoteError> {
        let data: ListData = self.post(
            "list",
            serde_json::json!({
                "path": self.settings.path,
                "page": 1,
                "per_page": 0,
                "refresh": false,
            }),
        )?;
        Ok(list_names(data))
    }

    fn resolve(&self, name: &str) -> Result<String, RemoteError> {
        let data: GetData = self.post(
            "get",
            serde_json::json!({ "path": self.settings.entry_path(name) }),
        )?;
        data.raw_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| RemoteError::Malformed(format!("no raw_url for {}", name)))
    }

    fn fetch(&self, locator: &str) -> Result<Vec<u8>, RemoteError> {
        let response = self.agent.get(locator).timeout(DOWNLOAD_TIMEOUT).call();

        match response {
            Ok(resp) => {
                let mut bytes = Vec::new();
                resp.into_reader()
                    .read_to_end(&mut bytes)
                    .map_err(|e| RemoteError::Http(e.to_string()))?;
                Ok(bytes)
            }
            Err(ureq::Error::Status(code, resp)) => {
                let message = resp.into_string().unwrap_or_default();
                Err(RemoteError::Status { code, message })
            }
            Err(e) => Err(RemoteError::Http(e.to_string())),
        }
    }
}
