//! In-process transport that routes partner calls directly between
//! `FederationService` instances registered on a shared network.
//!
//! Used for multi-instance tests and for running several registries inside one
//! process. Calls go through the same authentication steps the HTTP transport
//! applies on the receiving side.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use tracing::debug;

use wor_core::{PartnerDescriptor, RemoteChannel};

use crate::service::FederationService;

#[derive(Default)]
pub struct LoopbackNetwork {
    instances: RwLock<HashMap<String, Weak<FederationService>>>,
}

impl LoopbackNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `service` reachable at `url`. Replaces any instance already there.
    pub fn attach(&self, url: &str, service: &Arc<FederationService>) {
        if let Ok(mut instances) = self.instances.write() {
            instances.insert(key(url), Arc::downgrade(service));
        }
    }

    /// Take the instance at `url` offline.
    pub fn detach(&self, url: &str) {
        if let Ok(mut instances) = self.instances.write() {
            instances.remove(&key(url));
        }
    }

    pub fn channel(self: &Arc<Self>) -> Arc<LoopbackChannel> {
        Arc::new(LoopbackChannel {
            network: Arc::clone(self),
        })
    }

    fn resolve(&self, url: &str) -> Result<Arc<FederationService>> {
        let instances = self
            .instances
            .read()
            .map_err(|_| anyhow!("loopback network lock poisoned"))?;
        instances
            .get(&key(url))
            .and_then(Weak::upgrade)
            .ok_or_else(|| anyhow!("connection refused: no instance at {url}"))
    }
}

fn key(url: &str) -> String {
    url.trim().trim_end_matches('/').to_ascii_lowercase()
}

pub struct LoopbackChannel {
    network: Arc<LoopbackNetwork>,
}

#[async_trait]
impl RemoteChannel for LoopbackChannel {
    async fn contact(&self, me: &PartnerDescriptor, peer_url: &str) -> Result<PartnerDescriptor> {
        let peer = self.network.resolve(peer_url)?;
        debug!(from = %me.url, to = %peer_url, "Loopback partner contact");
        Ok(peer.process_remote_partner_add(me.clone()).await?)
    }

    async fn refresh_key(
        &self,
        me: &PartnerDescriptor,
        peer_url: &str,
        current_api_key: Option<&str>,
    ) -> Result<PartnerDescriptor> {
        let peer = self.network.resolve(peer_url)?;
        let Some(current) = current_api_key else {
            bail!("no api key held for {peer_url}");
        };
        if peer.verify_partner_token(&me.url, current).await?.is_none() {
            bail!("{peer_url} rejected the presented partner token");
        }
        debug!(from = %me.url, to = %peer_url, "Loopback key refresh");
        Ok(peer.update_remote_api_key(&me.url, me.clone()).await?)
    }

    async fn validate_api_key(&self, my_url: &str, claimed: &PartnerDescriptor) -> Result<bool> {
        let issuer = self.network.resolve(&claimed.url)?;
        let token = claimed.api_key().unwrap_or_default();
        Ok(issuer.lookup_partner(token, my_url).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_ignore_case_and_trailing_slash() {
        assert_eq!(key("B.Example.org/"), "b.example.org");
        assert_eq!(key(" b.example.org "), "b.example.org");
    }

    #[tokio::test]
    async fn test_unknown_peer_refuses_connection() {
        let network = LoopbackNetwork::new();
        let channel = network.channel();
        let me = PartnerDescriptor::new("a.example.org").with_api_key("k");
        let err = channel.contact(&me, "nowhere.example.org").await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }
}
