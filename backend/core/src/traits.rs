use anyhow::Result;
use async_trait::async_trait;

use crate::types::{PartnerDescriptor, PartnerRecord};

/// Persistent partner records, unique by url.
///
/// Each call is atomic for the record it touches; `update` replaces the whole
/// row, credentials included.
#[async_trait]
pub trait PartnerStore: Send + Sync {
    /// Case-insensitive lookup by partner url.
    async fn get_by_url(&self, url: &str) -> Result<Option<PartnerRecord>>;

    async fn get(&self, id: i64) -> Result<Option<PartnerRecord>>;

    async fn list(&self) -> Result<Vec<PartnerRecord>>;

    /// Insert a new record and return it with its assigned id.
    /// Fails if a record with the same url already exists.
    async fn create(&self, record: PartnerRecord) -> Result<PartnerRecord>;

    /// Replace an existing record (matched by id).
    async fn update(&self, record: PartnerRecord) -> Result<PartnerRecord>;

    /// Delete by id. Returns whether a record was removed.
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// Network leg of the handshake. Any `Err` is a contact failure.
#[async_trait]
pub trait RemoteChannel: Send + Sync {
    /// Ask `peer_url` to add this instance (`me`) as a partner; returns the
    /// peer's own descriptor carrying the key to use when calling it.
    async fn contact(&self, me: &PartnerDescriptor, peer_url: &str) -> Result<PartnerDescriptor>;

    /// Push a rotated key to an existing partner, authenticating with the key
    /// currently held for it.
    async fn refresh_key(
        &self,
        me: &PartnerDescriptor,
        peer_url: &str,
        current_api_key: Option<&str>,
    ) -> Result<PartnerDescriptor>;

    /// Ask the instance at `claimed.url` whether it issued `claimed.api_key`
    /// for `my_url`.
    async fn validate_api_key(&self, my_url: &str, claimed: &PartnerDescriptor) -> Result<bool>;
}

/// Admin privilege check for a user id.
pub trait AdminCapability: Send + Sync {
    fn is_administrator(&self, user_id: &str) -> bool;
}

/// Configuration reads the federation layer depends on.
pub trait InstanceConfig: Send + Sync {
    fn is_federation_enabled(&self) -> bool;

    /// This instance's address, without scheme (e.g. `registry.example.org`).
    fn this_instance_url(&self) -> String;

    fn this_instance_name(&self) -> String;
}

/// Secret generation and salted hashing.
pub trait TokenCrypto: Send + Sync {
    fn generate_salt(&self) -> String;

    /// A fresh random secret used as an instance api key.
    fn generate_api_key(&self) -> String;

    /// Deterministic one-way derivation of `secret` under `salt`.
    fn hash(&self, secret: &str, salt: &str) -> String;

    /// Check `secret` against a previously derived token.
    fn verify(&self, secret: &str, salt: &str, expected: &str) -> bool {
        self.hash(secret, salt).eq_ignore_ascii_case(expected)
    }
}

/// Short-lived url -> token map for in-flight outbound handshakes.
/// Last write wins per url.
pub trait TokenCache: Send + Sync {
    fn put(&self, url: &str, token: &str);

    fn get(&self, url: &str) -> Option<String>;

    fn remove(&self, url: &str);
}
