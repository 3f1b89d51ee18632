//! Structured security events
//!
//! Downstream log consumers alert on these, so the tag, audience, severity,
//! priority, and notification id of an event must stay stable across
//! releases. Events are emitted through `tracing` with one field per
//! attribute.

use serde::{Deserialize, Serialize};

/// Notification id for policy installation failures. Alerting rules key on
/// this value; do not change it.
pub const POLICY_INSTALLATION_NOTIFICATION_ID: &str = "4165c3b1-e9bc-44c3-888b-863e204c1bfb";

/// Event classification tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventTag {
    PolicyInstallation,
    Orchestration,
    Messaging,
}

/// Who the event is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventAudience {
    Security,
    Internal,
}

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSeverity {
    Critical,
    High,
    Medium,
    Low,
}

/// Delivery priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPriority {
    Urgent,
    High,
    Medium,
    Low,
}

/// A structured security event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// Classification tag
    pub tag: EventTag,
    /// Target audience
    pub audience: EventAudience,
    /// Severity
    pub severity: EventSeverity,
    /// Priority
    pub priority: EventPriority,
    /// Stable notification id, when alerting keys on this event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<String>,
    /// Human-readable message
    pub message: String,
}

impl SecurityEvent {
    /// Event reported when a policy fails to compile or install
    pub fn policy_installation_failure(message: impl Into<String>) -> Self {
        Self {
            tag: EventTag::PolicyInstallation,
            audience: EventAudience::Security,
            severity: EventSeverity::Critical,
            priority: EventPriority::Urgent,
            notification_id: Some(POLICY_INSTALLATION_NOTIFICATION_ID.to_string()),
            message: message.into(),
        }
    }

    /// Emit the event through the tracing subsystem
    pub fn report(&self) {
        tracing::error!(
            tag = ?self.tag,
            audience = ?self.audience,
            severity = ?self.severity,
            priority = ?self.priority,
            notification_id = self.notification_id.as_deref().unwrap_or(""),
            "{}",
            self.message
        );
    }
}
