//! Federation Event Logger
//!
//! Structured handshake events (partner added, key rotated, request rejected)
//! emitted under the `federation_events` target so they can be routed to an
//! audit sink separately from ordinary logs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::logger::FEDERATION_EVENTS_TARGET;
use crate::redact::redact_secrets;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FederationEvent {
    PartnerAdded { status: String },
    ContactFailed { reason: String },
    ContactDeferred { reason: String },
    KeyRotated { initiated_by_peer: bool },
    StatusChanged { status: String },
    PartnerRemoved,
    RequestRejected { reason: String },
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub partner_url: String,
    pub actor: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub event: FederationEvent,
}

pub struct EventLogger;

impl EventLogger {
    /// Log a federation event, redacting any secret material in free-text reasons.
    pub fn log_event(partner_url: &str, actor: Option<&str>, event: FederationEvent) -> EventLogEntry {
        let event = match event {
            FederationEvent::ContactFailed { reason } => FederationEvent::ContactFailed {
                reason: redact_secrets(&reason),
            },
            FederationEvent::ContactDeferred { reason } => FederationEvent::ContactDeferred {
                reason: redact_secrets(&reason),
            },
            FederationEvent::RequestRejected { reason } => FederationEvent::RequestRejected {
                reason: redact_secrets(&reason),
            },
            other => other,
        };

        let entry = EventLogEntry {
            partner_url: partner_url.into(),
            actor: actor.map(str::to_string),
            timestamp: Utc::now(),
            event,
        };

        let json = serde_json::to_string(&entry).unwrap_or_default();
        info!(target: FEDERATION_EVENTS_TARGET, partner = %entry.partner_url, event = %json, "Federation event");
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasons_are_redacted() {
        let key = "0123456789abcdef0123456789abcdef";
        let entry = EventLogger::log_event(
            "b.example.org",
            None,
            FederationEvent::ContactFailed {
                reason: format!("peer rejected key {key}"),
            },
        );
        match entry.event {
            FederationEvent::ContactFailed { reason } => assert!(!reason.contains(key)),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_event_serialization() {
        let entry = EventLogger::log_event("b.example.org", Some("admin"), FederationEvent::PartnerRemoved);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["event"]["type"], "partner_removed");
        assert_eq!(json["actor"], "admin");
    }
}
