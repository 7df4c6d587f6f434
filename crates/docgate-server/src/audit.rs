use docgate_core::AuditRecord;
use docgate_storage::StorageError;

pub fn audit_record_emitted(record: &AuditRecord) {
    let header = record.header();
    match record {
        AuditRecord::Success(success) => tracing::info!(
            target: "audit",
            event = "call_succeeded",
            action = header.action.as_str(),
            user_id = header.user_id.as_str(),
            role = header.role.as_str(),
            method = header.request.method.as_str(),
            path = header.request.path.as_str(),
            status_code = success.response.status_code,
            latency_ms = success.latency_ms,
            "call succeeded"
        ),
        AuditRecord::Failure(failure) => tracing::warn!(
            target: "audit",
            event = "call_failed",
            action = header.action.as_str(),
            user_id = header.user_id.as_str(),
            role = header.role.as_str(),
            method = header.request.method.as_str(),
            path = header.request.path.as_str(),
            error_kind = failure.error.kind.as_str(),
            error_detail = failure.error.detail.as_str(),
            "call failed"
        ),
    }
}

pub fn audit_record_suppressed(path: &str) {
    tracing::debug!(
        target: "audit",
        event = "record_suppressed",
        path = path,
        "successful token issuance not recorded"
    );
}

pub fn audit_persist_failure(record: &AuditRecord, error: &StorageError) {
    let header = record.header();
    tracing::error!(
        target: "audit",
        event = "persist_failed",
        outcome = record.outcome(),
        action = header.action.as_str(),
        user_id = header.user_id.as_str(),
        error_kind = error.kind(),
        error = %error,
        "failed to persist audit record"
    );
}
