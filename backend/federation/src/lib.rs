//! Web-of-registries federation: the partner handshake, key rotation, and the
//! transports that carry partner calls between instances.

pub mod http;
pub mod loopback;
pub mod service;


pub use http::{HttpChannel, PARTNER_TOKEN_HEADER};
pub use loopback::{LoopbackChannel, LoopbackNetwork};
pub use service::{FederationService, DEFAULT_CONTACT_TIMEOUT};
