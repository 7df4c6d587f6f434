use std::fmt::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

#[derive(Debug, Default)]
pub struct Metrics {
    request_total: AtomicU64,
    request_success: AtomicU64,
    request_error: AtomicU64,
    audit_emitted: AtomicU64,
    audit_suppressed: AtomicU64,
    audit_persist_failures: AtomicU64,
    authorization_denials: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.request_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.request_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.request_error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audit_emitted(&self) {
        self.audit_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audit_suppressed(&self) {
        self.audit_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audit_persist_failure(&self) {
        self.audit_persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_authorization_denial(&self) {
        self.authorization_denials.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_total(&self) -> u64 {
        self.request_total.load(Ordering::Relaxed)
    }

    pub fn request_success(&self) -> u64 {
        self.request_success.load(Ordering::Relaxed)
    }

    pub fn request_error(&self) -> u64 {
        self.request_error.load(Ordering::Relaxed)
    }

    pub fn audit_emitted(&self) -> u64 {
        self.audit_emitted.load(Ordering::Relaxed)
    }

    pub fn audit_suppressed(&self) -> u64 {
        self.audit_suppressed.load(Ordering::Relaxed)
    }

    pub fn audit_persist_failures(&self) -> u64 {
        self.audit_persist_failures.load(Ordering::Relaxed)
    }

    pub fn authorization_denials(&self) -> u64 {
        self.authorization_denials.load(Ordering::Relaxed)
    }

    pub fn render_prometheus(&self) -> String {
        let counters = [
            ("docgate_requests_total", "Total number of requests.", self.request_total()),
            (
                "docgate_requests_success_total",
                "Total successful requests.",
                self.request_success(),
            ),
            (
                "docgate_requests_error_total",
                "Total failed requests.",
                self.request_error(),
            ),
            (
                "docgate_audit_records_total",
                "Audit records handed to the audit store.",
                self.audit_emitted(),
            ),
            (
                "docgate_audit_records_suppressed_total",
                "Successful token issuances not recorded.",
                self.audit_suppressed(),
            ),
            (
                "docgate_audit_persist_failures_total",
                "Audit records the audit store failed to persist.",
                self.audit_persist_failures(),
            ),
            (
                "docgate_authorization_denials_total",
                "Calls denied by the permission model.",
                self.authorization_denials(),
            ),
        ];

        let mut output = String::new();
        for (name, help, value) in counters {
            let _ = writeln!(output, "# HELP {name} {help}");
            let _ = writeln!(output, "# TYPE {name} counter");
            let _ = writeln!(output, "{name} {value}");
        }
        output
    }
}

pub async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        metrics.render_prometheus(),
    )
}
