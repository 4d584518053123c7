//! Web-of-registries handshake orchestration.
//!
//! Two instances become partners through one round trip: the initiator issues
//! a key, remembers it in the ephemeral token cache under the peer's url, and
//! sends it to the peer. The peer calls back to confirm the initiator really
//! issued that key for it, stores it, and answers with a key of its own. Each
//! side then keeps the other's key for outbound calls and a salted hash of its
//! own key plus the peer's url for authenticating inbound ones.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tracing::{debug, error, info, warn};

use wor_core::{
    canonical_address, is_valid_address, same_address, AdminCapability, FederationError, InstanceConfig, PartnerCredentials,
    PartnerDescriptor, PartnerRecord, PartnerStatus, PartnerStore, RemoteChannel, TokenCache, TokenCrypto,
};
use wor_logging::{redact_secrets, EventLogger, FederationEvent};
use wor_security::{tokens_match, EphemeralTokenCache, HmacTokenCrypto};

pub const DEFAULT_CONTACT_TIMEOUT: Duration = Duration::from_secs(30);

type FedResult<T> = Result<T, FederationError>;

/// This instance's descriptor together with the key freshly issued for one exchange.
struct LocalIdentity {
    descriptor: PartnerDescriptor,
    api_key: String,
}

pub struct FederationService {
    store: Arc<dyn PartnerStore>,
    channel: Arc<dyn RemoteChannel>,
    config: Arc<dyn InstanceConfig>,
    admins: Arc<dyn AdminCapability>,
    crypto: Arc<dyn TokenCrypto>,
    tokens: Arc<dyn TokenCache>,
    contact_timeout: Duration,
}

impl FederationService {
    pub fn new(
        store: Arc<dyn PartnerStore>,
        channel: Arc<dyn RemoteChannel>,
        config: Arc<dyn InstanceConfig>,
        admins: Arc<dyn AdminCapability>,
    ) -> Self {
        Self {
            store,
            channel,
            config,
            admins,
            crypto: Arc::new(HmacTokenCrypto::new()),
            tokens: Arc::new(EphemeralTokenCache::default()),
            contact_timeout: DEFAULT_CONTACT_TIMEOUT,
        }
    }

    pub fn with_crypto(mut self, crypto: Arc<dyn TokenCrypto>) -> Self {
        self.crypto = crypto;
        self
    }

    pub fn with_token_cache(mut self, tokens: Arc<dyn TokenCache>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_contact_timeout(mut self, timeout: Duration) -> Self {
        self.contact_timeout = timeout;
        self
    }

    // -----------------------------------------------------------------------
    // Inbound: token lookup
    // -----------------------------------------------------------------------

    /// Confirm that `claimed_token` is the key this instance issued for
    /// `peer_url` in an in-flight handshake.
    ///
    /// `None` on any mismatch, without revealing whether a record exists. On a
    /// match, returns the stored partner or a url-only shell on first contact.
    pub async fn lookup_partner(&self, claimed_token: &str, peer_url: &str) -> FedResult<Option<PartnerDescriptor>> {
        self.ensure_enabled()?;

        let peer_url = canonical_address(peer_url);
        let issued = self.tokens.get(&peer_url);
        let valid = matches!(&issued, Some(token) if !claimed_token.is_empty() && tokens_match(token, claimed_token));
        if !valid {
            debug!(url = %peer_url, issued = issued.is_some(), "Handshake token lookup did not match");
            return Ok(None);
        }

        let descriptor = match self.store.get_by_url(&peer_url).await? {
            Some(record) => record.to_descriptor(),
            None => PartnerDescriptor::new(peer_url),
        };
        Ok(Some(descriptor))
    }

    // -----------------------------------------------------------------------
    // Outbound: add / rotate
    // -----------------------------------------------------------------------

    /// Add the registry at `partner.url` and exchange keys with it.
    ///
    /// Idempotent on url: an approved partner gets its key rotated instead, and
    /// a partner whose earlier contact failed is retried in place. Contact
    /// failures are recorded on the partner and returned with a non-approved
    /// status rather than as errors.
    pub async fn add_new_partner(&self, acting_user: &str, partner: PartnerDescriptor) -> FedResult<PartnerDescriptor> {
        self.ensure_enabled()?;
        self.ensure_admin(acting_user)?;

        let url = canonical_address(&partner.url);
        if url.is_empty() {
            return Err(FederationError::Validation("cannot add partner without url".into()));
        }
        if !is_valid_address(&url) {
            return Err(FederationError::Validation(format!("invalid partner url {url}")));
        }
        if same_address(&url, &self.config.this_instance_url()) {
            return Err(FederationError::SelfFederation(url));
        }

        let existing = self.store.get_by_url(&url).await?;
        if let Some(record) = &existing {
            if record.status == PartnerStatus::Approved {
                if let Some(id) = record.id {
                    info!(user = %acting_user, url = %url, "Partner already approved; rotating api key");
                    return self.update_api_key(acting_user, id).await;
                }
            }
        }

        info!(user = %acting_user, url = %url, "Adding web of registries partner");
        let record = existing.unwrap_or_else(|| PartnerRecord::unconfirmed(url, "", PartnerStatus::NotContacted));
        self.handshake(acting_user, record, partner.name.trim()).await
    }

    async fn handshake(&self, acting_user: &str, mut record: PartnerRecord, requested_name: &str) -> FedResult<PartnerDescriptor> {
        if !requested_name.is_empty() {
            record.name = requested_name.to_string();
        }

        let Some(me) = self.this_instance_with_new_api_key() else {
            error!(url = %record.url, "Cannot exchange api token with remote host due to invalid local url");
            record.set_status(PartnerStatus::NotContacted);
            let saved = self.save(record).await?;
            EventLogger::log_event(
                &saved.url,
                Some(acting_user),
                FederationEvent::ContactDeferred {
                    reason: "invalid local url".into(),
                },
            );
            return Ok(saved.to_descriptor());
        };

        self.tokens.put(&record.url, &me.api_key);
        let outcome = self
            .call_peer(&record.url, self.channel.contact(&me.descriptor, &record.url))
            .await
            .and_then(|peer| peer_api_key(&peer).map(|key| (peer.name, key)));
        self.tokens.remove(&record.url);

        match outcome {
            Ok((peer_name, peer_key)) => {
                if record.name.is_empty() {
                    record.name = peer_name;
                }
                let credentials = self.derive_credentials(&peer_key, &me.api_key, &record.url);
                record.approve(credentials);
                let saved = self.save(record).await?;
                info!(url = %saved.url, id = ?saved.id, "Partner approved");
                EventLogger::log_event(
                    &saved.url,
                    Some(acting_user),
                    FederationEvent::PartnerAdded {
                        status: saved.status.to_string(),
                    },
                );
                Ok(saved.to_descriptor())
            }
            Err(e) => {
                let reason = redact_secrets(&e.to_string());
                error!(url = %record.url, error = %reason, "Remote contact of partner failed");
                record.set_status(PartnerStatus::ContactFailed);
                let saved = self.save(record).await?;
                EventLogger::log_event(&saved.url, Some(acting_user), FederationEvent::ContactFailed { reason });
                Ok(saved.to_descriptor())
            }
        }
    }

    /// Rotate the key shared with an existing partner.
    ///
    /// All or nothing: if the partner cannot be reached the stored record is
    /// left as it was and `ContactFailed` is returned.
    pub async fn update_api_key(&self, acting_user: &str, partner_id: i64) -> FedResult<PartnerDescriptor> {
        self.ensure_enabled()?;
        self.ensure_admin(acting_user)?;

        let me = self.this_instance_with_new_api_key().ok_or_else(|| {
            error!("Cannot exchange api token with remote host due to invalid local url");
            FederationError::Configuration("this instance's url is not a valid address".into())
        })?;

        let mut record = self
            .store
            .get(partner_id)
            .await?
            .ok_or_else(|| FederationError::NotFound(format!("id {partner_id}")))?;

        let result = self
            .call_peer(&record.url, self.channel.refresh_key(&me.descriptor, &record.url, record.api_key()))
            .await
            .and_then(|peer| peer_api_key(&peer));

        let peer_key = match result {
            Ok(key) => key,
            Err(e) => {
                let reason = redact_secrets(&e.to_string());
                error!(url = %record.url, error = %reason, "Remote contact of partner to update api key failed");
                EventLogger::log_event(&record.url, Some(acting_user), FederationEvent::ContactFailed { reason });
                return Err(FederationError::ContactFailed(record.url));
            }
        };

        let credentials = self.derive_credentials(&peer_key, &me.api_key, &record.url);
        record.approve(credentials);
        let saved = self.store.update(record).await?;
        info!(user = %acting_user, url = %saved.url, "Rotated partner api key");
        EventLogger::log_event(
            &saved.url,
            Some(acting_user),
            FederationEvent::KeyRotated {
                initiated_by_peer: false,
            },
        );
        Ok(saved.to_descriptor())
    }

    // -----------------------------------------------------------------------
    // Inbound: add / rotate requests from peers
    // -----------------------------------------------------------------------

    /// Entry point for a peer asking to be added: checks the request shape
    /// before handing it to [`Self::handle_remote_add_request`].
    pub async fn process_remote_partner_add(&self, request: PartnerDescriptor) -> FedResult<PartnerDescriptor> {
        self.ensure_enabled()?;

        if request.api_key().is_none() {
            error!(url = %request.url, "Cannot add partner with no api key");
            return Err(FederationError::Validation("partner add request without api key".into()));
        }
        if !is_valid_address(request.url.trim()) {
            error!(url = %request.url, "Invalid url in partner add request");
            return Err(FederationError::Validation(format!("invalid partner url {}", request.url)));
        }

        self.handle_remote_add_request(request).await
    }

    /// Accept a peer's add request after confirming with the peer that it
    /// issued the presented key for this instance.
    ///
    /// Returns this instance's descriptor with a newly issued key: the key the
    /// peer must present when calling here.
    pub async fn handle_remote_add_request(&self, request: PartnerDescriptor) -> FedResult<PartnerDescriptor> {
        self.ensure_enabled()?;

        let Some(peer_key) = request.api_key().map(str::to_string) else {
            error!(url = %request.url, "Received invalid partner add request");
            return Err(FederationError::Validation("partner add request without api key".into()));
        };
        let peer_url = canonical_address(&request.url);
        info!(url = %peer_url, "Processing request to connect");

        let my_url = self.config.this_instance_url();
        if same_address(&peer_url, &my_url) {
            warn!(url = %peer_url, "Rejecting partner request carrying this instance's own url");
            self.log_rejection(&peer_url, "self federation");
            return Err(FederationError::SelfFederation(peer_url));
        }

        let me = self.this_instance_with_new_api_key().ok_or_else(|| {
            error!("Cannot answer partner request due to invalid local url");
            FederationError::Configuration("this instance's url is not a valid address".into())
        })?;

        let validated = self
            .call_peer(&peer_url, self.channel.validate_api_key(&my_url, &request))
            .await;
        match validated {
            Ok(true) => {}
            Ok(false) => {
                error!(url = %peer_url, "Received api token could not be validated");
                self.log_rejection(&peer_url, "token not issued by peer");
                return Err(FederationError::TokenRejected(peer_url));
            }
            Err(e) => {
                let reason = redact_secrets(&e.to_string());
                error!(url = %peer_url, error = %reason, "Could not validate api token with peer");
                self.log_rejection(&peer_url, &reason);
                return Err(FederationError::TokenRejected(peer_url));
            }
        }

        match self.store.get_by_url(&peer_url).await? {
            Some(mut record) => {
                info!(url = %record.url, "Updating authentication for existing partner");
                if !request.name.trim().is_empty() {
                    record.name = request.name.trim().to_string();
                }
                let credentials = self.derive_credentials(&peer_key, &me.api_key, &record.url);
                record.approve(credentials);
                self.store.update(record).await?;
            }
            None => {
                let credentials = self.derive_credentials(&peer_key, &me.api_key, &peer_url);
                self.store
                    .create(PartnerRecord::approved(peer_url.clone(), request.name.trim(), credentials))
                    .await?;
            }
        }

        info!(url = %peer_url, "Successfully added remote partner");
        EventLogger::log_event(
            &peer_url,
            None,
            FederationEvent::PartnerAdded {
                status: PartnerStatus::Approved.to_string(),
            },
        );
        Ok(me.descriptor)
    }

    /// A known partner pushes its rotated key.
    ///
    /// The caller's claim to own `peer_url` is trusted here; authenticating the
    /// caller is left to the transport (see [`Self::verify_partner_token`]).
    /// Returns this instance's descriptor with its own new key.
    pub async fn update_remote_api_key(&self, peer_url: &str, remote: PartnerDescriptor) -> FedResult<PartnerDescriptor> {
        self.ensure_enabled()?;

        let Some(peer_key) = remote.api_key().map(str::to_string) else {
            return Err(FederationError::Validation("key refresh without api key".into()));
        };

        let peer_url = canonical_address(peer_url);
        let mut record = self.store.get_by_url(&peer_url).await?.ok_or_else(|| {
            error!(url = %peer_url, "Could not find a local record of partner");
            FederationError::NotFound(peer_url.clone())
        })?;

        let me = self.this_instance_with_new_api_key().ok_or_else(|| {
            FederationError::Configuration("this instance's url is not a valid address".into())
        })?;

        info!(url = %record.url, "Refreshing local api key");
        if !remote.name.trim().is_empty() {
            record.name = remote.name.trim().to_string();
        }
        let credentials = self.derive_credentials(&peer_key, &me.api_key, &record.url);
        record.approve(credentials);
        let saved = self.store.update(record).await?;

        EventLogger::log_event(
            &saved.url,
            None,
            FederationEvent::KeyRotated {
                initiated_by_peer: true,
            },
        );
        Ok(me.descriptor)
    }

    /// Authenticate an inbound call from `peer_url` presenting `token` (the key
    /// this instance handed that partner).
    pub async fn verify_partner_token(&self, peer_url: &str, token: &str) -> FedResult<Option<PartnerDescriptor>> {
        self.ensure_enabled()?;
        if token.is_empty() {
            return Ok(None);
        }

        let Some(record) = self.store.get_by_url(&canonical_address(peer_url)).await? else {
            return Ok(None);
        };
        let Some(credentials) = record.credentials.as_ref() else {
            return Ok(None);
        };

        let secret = format!("{token}{}", record.url);
        if self.crypto.verify(&secret, &credentials.salt, &credentials.authentication_token) {
            Ok(Some(record.to_descriptor()))
        } else {
            warn!(url = %peer_url, "Partner token did not verify");
            Ok(None)
        }
    }

    // -----------------------------------------------------------------------
    // Admin record management
    // -----------------------------------------------------------------------

    /// Delete a partner record. The partner itself is not notified.
    pub async fn remove_partner(&self, acting_user: &str, partner_id: i64) -> FedResult<bool> {
        self.ensure_enabled()?;
        self.ensure_admin(acting_user)?;

        let Some(record) = self.store.get(partner_id).await? else {
            return Ok(false);
        };
        let removed = self.store.delete(partner_id).await?;
        if removed {
            info!(user = %acting_user, url = %record.url, "Removed partner");
            EventLogger::log_event(&record.url, Some(acting_user), FederationEvent::PartnerRemoved);
        }
        Ok(removed)
    }

    /// Change only the status of a partner.
    pub async fn update_partner_status(
        &self,
        acting_user: &str,
        partner_id: i64,
        status: PartnerStatus,
    ) -> FedResult<PartnerDescriptor> {
        self.ensure_enabled()?;
        self.ensure_admin(acting_user)?;

        let mut record = self
            .store
            .get(partner_id)
            .await?
            .ok_or_else(|| FederationError::NotFound(format!("id {partner_id}")))?;

        info!(user = %acting_user, url = %record.url, status = %status, "Updating partner status");
        record.set_status(status);
        let saved = self.store.update(record).await?;
        EventLogger::log_event(
            &saved.url,
            Some(acting_user),
            FederationEvent::StatusChanged {
                status: status.to_string(),
            },
        );
        Ok(saved.to_descriptor())
    }

    pub async fn list_partners(&self, acting_user: &str) -> FedResult<Vec<PartnerDescriptor>> {
        self.ensure_admin(acting_user)?;
        let records = self.store.list().await?;
        Ok(records.iter().map(PartnerRecord::to_descriptor).collect())
    }

    pub async fn get_partner(&self, acting_user: &str, partner_id: i64) -> FedResult<PartnerDescriptor> {
        self.ensure_admin(acting_user)?;
        self.store
            .get(partner_id)
            .await?
            .map(|r| r.to_descriptor())
            .ok_or_else(|| FederationError::NotFound(format!("id {partner_id}")))
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn ensure_enabled(&self) -> FedResult<()> {
        if self.config.is_federation_enabled() {
            Ok(())
        } else {
            debug!("Web of registries disabled; refusing federation operation");
            Err(FederationError::Disabled)
        }
    }

    fn ensure_admin(&self, user_id: &str) -> FedResult<()> {
        if self.admins.is_administrator(user_id) {
            Ok(())
        } else {
            warn!(user = %user_id, "Non admin attempting to manage web of registries partners");
            Err(FederationError::unauthorized(user_id))
        }
    }

    /// `None` when this instance's own url is not usable.
    fn this_instance_with_new_api_key(&self) -> Option<LocalIdentity> {
        let url = self.config.this_instance_url();
        if !is_valid_address(&url) {
            return None;
        }
        let api_key = self.crypto.generate_api_key();
        Some(LocalIdentity {
            descriptor: PartnerDescriptor::new(url)
                .with_name(self.config.this_instance_name())
                .with_api_key(api_key.clone()),
            api_key,
        })
    }

    /// New salt and token for `peer_url`, bound to the key this instance issued.
    fn derive_credentials(&self, peer_api_key: &str, local_api_key: &str, peer_url: &str) -> PartnerCredentials {
        let salt = self.crypto.generate_salt();
        let authentication_token = self.crypto.hash(&format!("{local_api_key}{peer_url}"), &salt);
        PartnerCredentials {
            api_key: peer_api_key.to_string(),
            salt,
            authentication_token,
        }
    }

    /// Await an outbound call, treating a timeout like any other failure.
    async fn call_peer<T, F>(&self, peer_url: &str, call: F) -> anyhow::Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.contact_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!("no response from {peer_url} within {:?}", self.contact_timeout)),
        }
    }

    async fn save(&self, record: PartnerRecord) -> FedResult<PartnerRecord> {
        let saved = if record.id.is_some() {
            self.store.update(record).await?
        } else {
            self.store.create(record).await?
        };
        Ok(saved)
    }

    fn log_rejection(&self, peer_url: &str, reason: &str) {
        EventLogger::log_event(
            peer_url,
            None,
            FederationEvent::RequestRejected {
                reason: reason.to_string(),
            },
        );
    }
}

fn peer_api_key(peer: &PartnerDescriptor) -> anyhow::Result<String> {
    peer.api_key()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("partner {} answered without an api key", peer.url))
}
