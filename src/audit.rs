//! Audit trail for gate decisions.
//!
//! Every public gate operation emits exactly one event via `tracing::info!`,
//! serialized as JSON in the `audit` field. Credentials are never included.
//!
//! | Event | When |
//! |-------|------|
//! | `gate.authorized` | AuthorizeAction allowed the requested action |
//! | `gate.denied` | AuthorizeAction refused the requested action |
//! | `gate.token_validated` | ValidateToken / LogIn accepted the credential |
//! | `gate.unauthenticated` | No credential, or the credential failed the probe |
//! | `gate.error` | Configuration fault or collaborator failure |

use serde::Serialize;

use crate::Error;
use crate::gate::{ActionDescriptor, RequestContext};

/// Structured audit event for one gate decision.
#[derive(Debug, Serialize)]
pub struct AuditEvent {
    /// Event type string (e.g., `"gate.denied"`)
    pub event: &'static str,
    /// Gate operation that produced the event
    pub operation: &'static str,
    /// Request id, when the transport supplied one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Caller-supplied username
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// The action asked about (AuthorizeAction only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionDescriptor>,
    /// Stable error code for failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    /// Human-readable reason for failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEvent {
    fn base(event: &'static str, operation: &'static str, ctx: Option<&RequestContext>) -> Self {
        Self {
            event,
            operation,
            request_id: ctx.and_then(RequestContext::request_id).map(str::to_string),
            username: ctx.and_then(RequestContext::username).map(str::to_string),
            action: None,
            code: None,
            reason: None,
        }
    }

    /// `gate.authorized`
    #[must_use]
    pub fn authorized(ctx: Option<&RequestContext>, action: &ActionDescriptor) -> Self {
        Self {
            action: Some(action.clone()),
            ..Self::base("gate.authorized", "authorize_action", ctx)
        }
    }

    /// `gate.token_validated`
    #[must_use]
    pub fn token_validated(operation: &'static str, ctx: Option<&RequestContext>) -> Self {
        Self::base("gate.token_validated", operation, ctx)
    }

    /// Failure event; the event type follows the error's code
    #[must_use]
    pub fn failed(
        operation: &'static str,
        ctx: Option<&RequestContext>,
        action: Option<&ActionDescriptor>,
        err: &Error,
    ) -> Self {
        let event = match err {
            Error::Unauthenticated => "gate.unauthenticated",
            Error::PermissionDenied { .. } => "gate.denied",
            _ => "gate.error",
        };
        Self {
            action: action.cloned(),
            code: Some(err.code().as_str()),
            reason: Some(err.to_string()),
            ..Self::base(event, operation, ctx)
        }
    }
}

/// Emit an audit event via `tracing::info!` with structured fields.
pub fn emit(event: &AuditEvent) {
    match serde_json::to_string(event) {
        Ok(ref json) => tracing::info!(audit = %json, "gate audit"),
        Err(ref e) => tracing::warn!(error = %e, "Failed to serialize audit event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RequestContext {
        RequestContext::new()
            .with_token("secret-token")
            .with_username("alice")
            .with_request_id("req-1")
    }

    #[test]
    fn authorized_event_carries_action_and_context() {
        let action = ActionDescriptor::new("team-a", "get", "", "pods", "");
        let ev = AuditEvent::authorized(Some(&ctx()), &action);
        assert_eq!(ev.event, "gate.authorized");
        assert_eq!(ev.request_id.as_deref(), Some("req-1"));
        assert_eq!(ev.username.as_deref(), Some("alice"));
        assert_eq!(ev.action, Some(action));
        assert!(ev.code.is_none());
    }

    #[test]
    fn failure_event_type_follows_error() {
        let action = ActionDescriptor::new("team-a", "get", "", "pods", "");

        let ev = AuditEvent::failed("validate_token", None, None, &Error::Unauthenticated);
        assert_eq!(ev.event, "gate.unauthenticated");
        assert_eq!(ev.code, Some("UNAUTHENTICATED"));
        assert!(ev.request_id.is_none());

        let err = Error::permission_denied(&action, "denied by cluster RBAC");
        let ev = AuditEvent::failed("authorize_action", Some(&ctx()), Some(&action), &err);
        assert_eq!(ev.event, "gate.denied");
        assert_eq!(ev.code, Some("PERMISSION_DENIED"));

        let err = Error::ConfigurationFault("no namespaces".into());
        let ev = AuditEvent::failed("validate_token", Some(&ctx()), None, &err);
        assert_eq!(ev.event, "gate.error");
    }

    #[test]
    fn serialized_event_never_contains_credential() {
        let ev = AuditEvent::token_validated("log_in", Some(&ctx()));
        let json = serde_json::to_string(&ev).unwrap();
        assert!(!json.contains("secret-token"));
        assert!(json.contains("\"event\":\"gate.token_validated\""));
        assert!(!json.contains("\"code\""));
        emit(&ev);
    }
}
