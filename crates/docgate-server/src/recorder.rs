use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use docgate_core::{AuditRecord, ContextSnapshot, RecordHeader, RequestInfo};
use docgate_storage::{AuditStore, StorageError};

use crate::audit;
use crate::error::GatewayError;
use crate::metrics::Metrics;

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed { status_code: u16, latency_ms: f64 },
    Failed { kind: String, detail: String },
}

impl Outcome {
    pub fn failed(error: &GatewayError) -> Self {
        Outcome::Failed {
            kind: error.kind().to_string(),
            detail: error.to_string(),
        }
    }
}

/// Turns a finished call into at most one audit record. Successful calls to the
/// token endpoint are dropped; every failure is recorded.
pub struct AuditRecorder {
    token_path: String,
    persist_timeout: Duration,
    metrics: Arc<Metrics>,
}

impl AuditRecorder {
    pub fn new(
        token_path: impl Into<String>,
        persist_timeout: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            token_path: token_path.into(),
            persist_timeout,
            metrics,
        }
    }

    pub fn token_path(&self) -> &str {
        &self.token_path
    }

    pub fn build(
        &self,
        snapshot: ContextSnapshot,
        request: RequestInfo,
        outcome: Outcome,
    ) -> Option<AuditRecord> {
        match outcome {
            Outcome::Completed { .. } if request.path == self.token_path => None,
            Outcome::Completed {
                status_code,
                latency_ms,
            } => {
                let header = RecordHeader::from_snapshot(snapshot, request, Utc::now());
                Some(AuditRecord::success(header, status_code, latency_ms))
            }
            Outcome::Failed { kind, detail } => {
                let header = RecordHeader::from_snapshot(snapshot, request, Utc::now());
                Some(AuditRecord::failure(header, kind, detail))
            }
        }
    }

    /// Builds and appends the record. Append errors, and appends that outlast
    /// the persist timeout, are logged and swallowed. Returns whether a record
    /// was emitted.
    pub async fn record<A: AuditStore>(
        &self,
        sink: &A,
        snapshot: ContextSnapshot,
        request: RequestInfo,
        outcome: Outcome,
    ) -> bool {
        let path = request.path.clone();
        let Some(record) = self.build(snapshot, request, outcome) else {
            self.metrics.record_audit_suppressed();
            audit::audit_record_suppressed(&path);
            return false;
        };

        audit::audit_record_emitted(&record);
        self.metrics.record_audit_emitted();

        let appended = tokio::time::timeout(self.persist_timeout, sink.append(&record))
            .await
            .unwrap_or_else(|_| {
                Err(StorageError::Unavailable(format!(
                    "audit append timed out after {}ms",
                    self.persist_timeout.as_millis()
                )))
            });
        if let Err(e) = appended {
            self.metrics.record_audit_persist_failure();
            audit::audit_persist_failure(&record, &e);
        }
        true
    }
}
