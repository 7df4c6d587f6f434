pub mod action;
pub mod audit;
pub mod context;
pub mod permission;

pub use action::{Action, PermissionClass, UnknownAction};
pub use audit::{AuditRecord, ErrorInfo, FailureRecord, RecordHeader, RequestInfo, SuccessRecord};
pub use context::{ContextSnapshot, RequestContext};
pub use permission::{Decision, DenyReason, Grant, Identity, PermissionSet, evaluate, evaluate_action};
