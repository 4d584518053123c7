//! Token material for web-of-registries handshakes.

pub mod crypto;
pub mod token_cache;

pub use crypto::{random_hex, tokens_match, HmacTokenCrypto};
pub use token_cache::{EphemeralTokenCache, DEFAULT_TOKEN_TTL};
