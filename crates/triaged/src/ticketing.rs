//! Ticketing-platform record store.
//!
//! The store is an external collaborator reached through the `CaseStore`
//! contract so the pipeline can run against a fake in tests. The HTTP
//! implementation speaks the platform's table API: basic auth,
//! `GET/PATCH /api/now/table/{table}/{sys_id}`, `sysparm_query` for
//! filtered reads.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;
use triage_common::{CaseEvent, ClassificationResult};

use crate::config::TicketingConfig;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("record store returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("case {0} not found")]
    NotFound(String),

    #[error("malformed record store response: {0}")]
    Malformed(String),
}

/// A case record as held by the ticketing platform.
#[derive(Debug, Clone)]
pub struct CaseRecord {
    pub sys_id: String,
    pub number: String,
    pub short_description: String,
    pub description: Option<String>,
    pub assignment_group: Option<String>,
    pub state: Option<String>,
    pub opened_at: Option<DateTime<Utc>>,
    pub extra: Map<String, Value>,
}

impl CaseRecord {
    /// Project the record into the pipeline's domain event. The worker uses
    /// this after re-fetching so classification never acts on stale job
    /// fields.
    pub fn to_event(&self) -> CaseEvent {
        CaseEvent {
            case_number: self.number.clone(),
            sys_id: self.sys_id.clone(),
            short_description: self.short_description.clone(),
            description: self.description.clone(),
            priority: None,
            urgency: None,
            category: None,
            assignment_group: self.assignment_group.clone(),
            company: None,
            state: self.state.clone(),
            routing_context: None,
            extra: self.extra.clone(),
        }
    }
}

/// Record store contract used by the dispatcher, worker, and sweeper.
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// Fetch the full record by sys_id.
    async fn fetch_case(&self, sys_id: &str) -> Result<CaseRecord, StoreError>;

    /// Open cases in `group` opened before `cutoff`, at most `limit`.
    async fn query_stale(
        &self,
        group: &str,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CaseRecord>, StoreError>;

    /// Append a work note to the record.
    async fn add_work_note(&self, sys_id: &str, note: &str) -> Result<(), StoreError>;

    /// Write classification fields back to the record. Re-writing the same
    /// classification is safe, which keeps retried jobs idempotent.
    async fn update_classification(
        &self,
        sys_id: &str,
        result: &ClassificationResult,
    ) -> Result<(), StoreError>;
}

/// HTTP implementation against the platform's table API.
pub struct HttpCaseStore {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    table: String,
}

impl HttpCaseStore {
    pub fn new(cfg: &TicketingConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            table: cfg.table.clone(),
        })
    }

    fn record_url(&self, sys_id: &str) -> String {
        format!("{}/api/now/table/{}/{}", self.base_url, self.table, sys_id)
    }

    async fn check(resp: reqwest::Response) -> Result<Value, StoreError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json::<Value>().await?)
    }

    fn parse_record(value: &Value) -> Result<CaseRecord, StoreError> {
        let obj = value
            .as_object()
            .ok_or_else(|| StoreError::Malformed("result is not an object".to_string()))?;

        let get = |k: &str| obj.get(k).and_then(|v| v.as_str()).map(|s| s.to_string());

        let sys_id = get("sys_id")
            .ok_or_else(|| StoreError::Malformed("record has no sys_id".to_string()))?;
        let number = get("number").unwrap_or_else(|| sys_id.clone());

        let opened_at = get("opened_at").and_then(|s| {
            chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.and_utc())
        });

        let known = [
            "sys_id",
            "number",
            "short_description",
            "description",
            "assignment_group",
            "state",
            "opened_at",
        ];
        let mut extra = Map::new();
        for (k, v) in obj {
            if !known.contains(&k.as_str()) {
                extra.insert(k.clone(), v.clone());
            }
        }

        Ok(CaseRecord {
            sys_id,
            number,
            short_description: get("short_description").unwrap_or_default(),
            description: get("description"),
            assignment_group: get("assignment_group"),
            state: get("state"),
            opened_at,
            extra,
        })
    }
}

#[async_trait]
impl CaseStore for HttpCaseStore {
    async fn fetch_case(&self, sys_id: &str) -> Result<CaseRecord, StoreError> {
        let resp = self
            .http
            .get(self.record_url(sys_id))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        if resp.status().as_u16() == 404 {
            return Err(StoreError::NotFound(sys_id.to_string()));
        }

        let body = Self::check(resp).await?;
        let result = body
            .get("result")
            .ok_or_else(|| StoreError::Malformed("missing result envelope".to_string()))?;
        Self::parse_record(result)
    }

    async fn query_stale(
        &self,
        group: &str,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CaseRecord>, StoreError> {
        let query = format!(
            "assignment_group.name={}^active=true^opened_at<{}",
            group,
            cutoff.format("%Y-%m-%d %H:%M:%S")
        );
        debug!("stale query on {}: {}", self.table, query);

        let resp = self
            .http
            .get(format!("{}/api/now/table/{}", self.base_url, self.table))
            .basic_auth(&self.username, Some(&self.password))
            .query(&[
                ("sysparm_query", query.as_str()),
                ("sysparm_limit", &limit.to_string()),
            ])
            .send()
            .await?;

        let body = Self::check(resp).await?;
        let results = body
            .get("result")
            .and_then(|r| r.as_array())
            .ok_or_else(|| StoreError::Malformed("missing result array".to_string()))?;

        results.iter().map(Self::parse_record).collect()
    }

    async fn add_work_note(&self, sys_id: &str, note: &str) -> Result<(), StoreError> {
        let resp = self
            .http
            .patch(self.record_url(sys_id))
            .basic_auth(&self.username, Some(&self.password))
            .json(&json!({ "work_notes": note }))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn update_classification(
        &self,
        sys_id: &str,
        result: &ClassificationResult,
    ) -> Result<(), StoreError> {
        let body = json!({
            "category": result.category,
            "subcategory": result.subcategory,
            "u_ai_confidence": format!("{:.2}", result.confidence),
            "u_ai_urgency": result.urgency_level.as_str(),
        });
        let resp = self
            .http
            .patch(self.record_url(sys_id))
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }
}
