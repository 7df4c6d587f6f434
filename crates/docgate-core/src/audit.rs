use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::ContextSnapshot;

pub const UNKNOWN_ACTION: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestInfo {
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl RequestInfo {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Fields shared by both record shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub user_id: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, Value>,
    pub request: RequestInfo,
}

impl RecordHeader {
    pub fn from_snapshot(
        snapshot: ContextSnapshot,
        request: RequestInfo,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let action = snapshot.action().unwrap_or(UNKNOWN_ACTION).to_string();
        Self {
            timestamp,
            action,
            user_id: snapshot.identity.user_id,
            role: snapshot.identity.policy,
            metadata: snapshot.identity.metadata,
            annotations: snapshot.annotations,
            request,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseInfo {
    pub status_code: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessRecord {
    #[serde(flatten)]
    pub header: RecordHeader,
    pub response: ResponseInfo,
    pub latency_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    #[serde(flatten)]
    pub header: RecordHeader,
    pub error: ErrorInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome")]
pub enum AuditRecord {
    Success(SuccessRecord),
    Failure(FailureRecord),
}

impl AuditRecord {
    pub fn success(header: RecordHeader, status_code: u16, latency_ms: f64) -> Self {
        AuditRecord::Success(SuccessRecord {
            header,
            response: ResponseInfo { status_code },
            latency_ms: round_latency(latency_ms),
        })
    }

    pub fn failure(
        header: RecordHeader,
        kind: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        AuditRecord::Failure(FailureRecord {
            header,
            error: ErrorInfo {
                kind: kind.into(),
                detail: detail.into(),
            },
        })
    }

    pub fn header(&self) -> &RecordHeader {
        match self {
            AuditRecord::Success(r) => &r.header,
            AuditRecord::Failure(r) => &r.header,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, AuditRecord::Failure(_))
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            AuditRecord::Success(_) => "Success",
            AuditRecord::Failure(_) => "Failure",
        }
    }
}

fn round_latency(ms: f64) -> f64 {
    (ms * 100.0).round() / 100.0
}
