//! Audit-record backend client
//!
//! REST client for the checksheet store and the report generator. Every
//! call is a single request: no retries, and a failure leaves the caller's
//! in-memory record untouched.
//!
//! Saves of the same checksheet are serialized per (line, date, shift) so
//! the search-then-create/update sequence cannot race with itself.

use ipqc_common::time;
use ipqc_common::{AuditRecord, RecordIdentity};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

const AUDITS_PATH: &str = "/ipqc-audits";
const SEARCH_PATH: &str = "/ipqc-audits/search/by-filters";
const REPORT_PATH: &str = "/generate-audit-report";
const USER_AGENT: &str = concat!("ipqc/", env!("CARGO_PKG_VERSION"));

/// Backend client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("checksheet needs a line, date and shift before it can be saved")]
    MissingIdentity,
}

/// Request body for create and update
#[derive(Debug, Serialize)]
pub struct AuditPayload<'a> {
    pub name: String,
    pub timestamp: String,
    pub data: &'a AuditRecord,
}

impl<'a> AuditPayload<'a> {
    pub fn new(record: &'a AuditRecord) -> Self {
        Self {
            name: record.display_name(),
            timestamp: time::to_rfc3339(time::now()),
            data: record,
        }
    }
}

/// Record as stored by the backend
#[derive(Debug, Clone, Deserialize)]
pub struct StoredAudit {
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Absent in list responses fetched without data
    #[serde(default)]
    pub data: Option<AuditRecord>,
}

/// Ids arrive as numbers or strings depending on the backend
fn id_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(n) => n.to_string(),
    })
}

/// List responses come bare or wrapped
#[derive(Deserialize)]
#[serde(untagged)]
enum AuditList {
    Bare(Vec<StoredAudit>),
    Wrapped {
        #[serde(alias = "data", alias = "results")]
        audits: Vec<StoredAudit>,
    },
}

impl AuditList {
    fn into_audits(self) -> Vec<StoredAudit> {
        match self {
            AuditList::Bare(audits) | AuditList::Wrapped { audits } => audits,
        }
    }
}

#[derive(Serialize)]
struct ReportRequest<'a> {
    audit_id: &'a str,
}

/// Result of [`AuditClient::save`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Created(String),
    Updated(String),
}

impl SaveOutcome {
    pub fn id(&self) -> &str {
        match self {
            SaveOutcome::Created(id) | SaveOutcome::Updated(id) => id,
        }
    }
}

/// Audit-record backend client
pub struct AuditClient {
    http_client: reqwest::Client,
    base_url: String,
    save_locks: Mutex<HashMap<RecordIdentity, Arc<Mutex<()>>>>,
}

impl AuditClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            save_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Every stored audit; `include_data` asks for full records
    pub async fn list(&self, include_data: bool) -> Result<Vec<StoredAudit>, ClientError> {
        let request = self
            .http_client
            .get(self.url(AUDITS_PATH))
            .query(&[("include_data", include_data)]);
        let list: AuditList = self.send_json(request).await?;
        Ok(list.into_audits())
    }

    pub async fn fetch(&self, id: &str) -> Result<StoredAudit, ClientError> {
        let request = self
            .http_client
            .get(self.url(&format!("{}/{}", AUDITS_PATH, id)));
        self.send_json(request).await
    }

    pub async fn create(&self, record: &AuditRecord) -> Result<StoredAudit, ClientError> {
        let request = self
            .http_client
            .post(self.url(AUDITS_PATH))
            .json(&AuditPayload::new(record));
        let stored: StoredAudit = self.send_json(request).await?;
        info!(id = %stored.id, name = %record.display_name(), "Created audit record");
        Ok(stored)
    }

    pub async fn update(&self, id: &str, record: &AuditRecord) -> Result<StoredAudit, ClientError> {
        let request = self
            .http_client
            .put(self.url(&format!("{}/{}", AUDITS_PATH, id)))
            .json(&AuditPayload::new(record));
        let stored: StoredAudit = self.send_json(request).await?;
        info!(id = %stored.id, name = %record.display_name(), "Updated audit record");
        Ok(stored)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ClientError> {
        let request = self
            .http_client
            .delete(self.url(&format!("{}/{}", AUDITS_PATH, id)));
        self.send(request).await?;
        info!(id = %id, "Deleted audit record");
        Ok(())
    }

    /// Stored audits matching a (line, date, shift) triple
    pub async fn search_by_filters(
        &self,
        identity: &RecordIdentity,
    ) -> Result<Vec<StoredAudit>, ClientError> {
        let request = self.http_client.get(self.url(SEARCH_PATH)).query(&[
            ("lineNumber", identity.line.as_str()),
            ("date", identity.date.as_str()),
            ("shift", identity.shift.as_str()),
        ]);
        let list: AuditList = self.send_json(request).await?;
        Ok(list.into_audits())
    }

    /// Spreadsheet bytes for an unsaved record
    pub async fn generate_report(&self, record: &AuditRecord) -> Result<Vec<u8>, ClientError> {
        let request = self.http_client.post(self.url(REPORT_PATH)).json(record);
        self.send_bytes(request).await
    }

    /// Spreadsheet bytes for a stored record
    pub async fn generate_report_for(&self, audit_id: &str) -> Result<Vec<u8>, ClientError> {
        let request = self
            .http_client
            .post(self.url(REPORT_PATH))
            .json(&ReportRequest { audit_id });
        self.send_bytes(request).await
    }

    /// Create or update the stored copy of a checksheet
    ///
    /// Searches by identity first; the first hit is updated, otherwise a new
    /// record is created.
    pub async fn save(&self, record: &AuditRecord) -> Result<SaveOutcome, ClientError> {
        let identity = record.identity().ok_or(ClientError::MissingIdentity)?;
        let lock = self.save_lock(&identity).await;
        let result = {
            let _guard = lock.lock().await;
            self.save_unlocked(record, &identity).await
        };
        self.release_save_lock(&identity, lock).await;
        result
    }

    async fn save_unlocked(
        &self,
        record: &AuditRecord,
        identity: &RecordIdentity,
    ) -> Result<SaveOutcome, ClientError> {
        let existing = self.search_by_filters(identity).await?;
        match existing.first() {
            Some(stored) => {
                debug!(id = %stored.id, %identity, "Existing checksheet found");
                self.update(&stored.id, record).await?;
                Ok(SaveOutcome::Updated(stored.id.clone()))
            }
            None => {
                let stored = self.create(record).await?;
                Ok(SaveOutcome::Created(stored.id))
            }
        }
    }

    async fn save_lock(&self, identity: &RecordIdentity) -> Arc<Mutex<()>> {
        let mut locks = self.save_locks.lock().await;
        locks
            .entry(identity.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the identity's lock once no other save holds or awaits it
    async fn release_save_lock(&self, identity: &RecordIdentity, lock: Arc<Mutex<()>>) {
        let mut locks = self.save_locks.lock().await;
        drop(lock);
        if locks
            .get(identity)
            .map_or(false, |entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(identity);
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        debug!(status = %status, url = %response.url(), "Backend response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    async fn send_bytes(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, ClientError> {
        let bytes = self
            .send(request)
            .await?
            .bytes()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = AuditClient::new("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url(AUDITS_PATH), "http://localhost:8000/ipqc-audits");
    }

    #[test]
    fn test_stored_audit_id_forms() {
        let numeric: StoredAudit = serde_json::from_str(r#"{"id": 42, "name": "x"}"#).unwrap();
        assert_eq!(numeric.id, "42");
        let text: StoredAudit = serde_json::from_str(r#"{"id": "a1b2"}"#).unwrap();
        assert_eq!(text.id, "a1b2");
        assert!(text.data.is_none());
    }

    #[tokio::test]
    async fn test_save_locks_released_after_failed_saves() {
        // Nothing listens on the discard port
        let client = AuditClient::new("http://127.0.0.1:9", Duration::from_secs(5)).unwrap();
        let record = AuditRecord {
            line_number: Some(ipqc_common::ProductionLine::I),
            date: "2026-10-16".into(),
            shift: "A".into(),
            ..AuditRecord::default()
        };

        let (a, b) = tokio::join!(client.save(&record), client.save(&record));
        assert!(matches!(a, Err(ClientError::Network(_))));
        assert!(matches!(b, Err(ClientError::Network(_))));
        assert!(client.save_locks.lock().await.is_empty());
    }

    #[test]
    fn test_list_shapes() {
        let bare: AuditList = serde_json::from_str(r#"[{"id": 1}, {"id": 2}]"#).unwrap();
        assert_eq!(bare.into_audits().len(), 2);
        let wrapped: AuditList = serde_json::from_str(r#"{"audits": [{"id": 1}]}"#).unwrap();
        assert_eq!(wrapped.into_audits().len(), 1);
    }

    #[test]
    fn test_payload_layout() {
        let record = AuditRecord::default();
        let json = serde_json::to_value(AuditPayload::new(&record)).unwrap();
        assert_eq!(json["name"], "IPQC Audit - draft");
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
        assert_eq!(json["data"]["lineNumber"], "");
    }
}
