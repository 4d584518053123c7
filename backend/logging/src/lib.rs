//! Structured logging for registry federation.
//!
//! Handles console/JSON output, secret redaction, and federation event logging.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{EventLogEntry, EventLogger, FederationEvent};
pub use logger::{init_logger, FEDERATION_EVENTS_TARGET};
pub use redact::redact_secrets;
