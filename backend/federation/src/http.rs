//! HTTPS transport for partner calls.
//!
//! Routes, relative to the peer's url:
//! - `POST /rest/web/partner/remote`: ask the peer to add us (handshake)
//! - `PUT  /rest/web/partner/remote`: push a rotated key, authenticated with
//!   the `X-WOR-Partner-Token` header
//! - `GET  /rest/web/partner?url=<my_url>`: ask the issuer whether the token
//!   in the header was issued for `my_url`

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use wor_core::{PartnerDescriptor, RemoteChannel};

pub const PARTNER_TOKEN_HEADER: &str = "X-WOR-Partner-Token";

const REMOTE_PATH: &str = "/rest/web/partner/remote";
const VALIDATE_PATH: &str = "/rest/web/partner";

pub struct HttpChannel {
    client: Client,
    scheme: String,
}

impl HttpChannel {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            scheme: "https".to_string(),
        })
    }

    /// Override the scheme (plain `http` for local development).
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    fn endpoint(&self, peer_url: &str, path: &str) -> String {
        format!("{}://{}{}", self.scheme, peer_url.trim().trim_end_matches('/'), path)
    }

    async fn read_descriptor(response: reqwest::Response, peer_url: &str) -> Result<PartnerDescriptor> {
        let status = response.status();
        if !status.is_success() {
            bail!("{peer_url} answered {status}");
        }
        response
            .json::<PartnerDescriptor>()
            .await
            .with_context(|| format!("Invalid partner descriptor from {peer_url}"))
    }
}

#[async_trait]
impl RemoteChannel for HttpChannel {
    async fn contact(&self, me: &PartnerDescriptor, peer_url: &str) -> Result<PartnerDescriptor> {
        let url = self.endpoint(peer_url, REMOTE_PATH);
        debug!(url = %url, "Sending partner add request");
        let response = self
            .client
            .post(&url)
            .json(me)
            .send()
            .await
            .with_context(|| format!("Failed to reach {peer_url}"))?;
        Self::read_descriptor(response, peer_url).await
    }

    async fn refresh_key(
        &self,
        me: &PartnerDescriptor,
        peer_url: &str,
        current_api_key: Option<&str>,
    ) -> Result<PartnerDescriptor> {
        let Some(current) = current_api_key else {
            bail!("no api key held for {peer_url}");
        };
        let url = self.endpoint(peer_url, REMOTE_PATH);
        debug!(url = %url, "Sending partner key refresh");
        let response = self
            .client
            .put(&url)
            .header(PARTNER_TOKEN_HEADER, current)
            .json(me)
            .send()
            .await
            .with_context(|| format!("Failed to reach {peer_url}"))?;
        Self::read_descriptor(response, peer_url).await
    }

    async fn validate_api_key(&self, my_url: &str, claimed: &PartnerDescriptor) -> Result<bool> {
        let Some(token) = claimed.api_key() else {
            return Ok(false);
        };
        let url = self.endpoint(&claimed.url, VALIDATE_PATH);
        let response = self
            .client
            .get(&url)
            .query(&[("url", my_url)])
            .header(PARTNER_TOKEN_HEADER, token)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", claimed.url))?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(false),
            other => {
                warn!(peer = %claimed.url, status = %other, "Unexpected token validation response");
                bail!("{} answered {other}", claimed.url)
            }
        }
    }
}
