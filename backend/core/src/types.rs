use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Relationship state between this instance and a partner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartnerStatus {
    #[default]
    NotContacted,
    ContactFailed,
    Approved,
}

impl PartnerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotContacted => "NOT_CONTACTED",
            Self::ContactFailed => "CONTACT_FAILED",
            Self::Approved => "APPROVED",
        }
    }
}

impl fmt::Display for PartnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartnerStatus {
    type Err = String;

    /// Accepts both the wire form (`CONTACT_FAILED`) and the CLI form (`contact-failed`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "NOT_CONTACTED" => Ok(Self::NotContacted),
            "CONTACT_FAILED" => Ok(Self::ContactFailed),
            "APPROVED" => Ok(Self::Approved),
            other => Err(format!("unknown partner status: {other}")),
        }
    }
}

/// Handshake payload exchanged between instances.
///
/// `{ "name": .., "url": .., "apiKey": .., "status": .. }` on the wire. `id` is
/// only set on descriptors produced from a local record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub status: PartnerStatus,
}

impl PartnerDescriptor {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_status(mut self, status: PartnerStatus) -> Self {
        self.status = status;
        self
    }

    /// The api key, treating an empty string as absent.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

/// The secret material held for an approved partner.
///
/// Kept as one value so the key, salt and derived token can only ever be
/// replaced together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerCredentials {
    /// Key this instance presents when calling the partner.
    pub api_key: String,
    pub salt: String,
    /// `hash(local_api_key + partner_url, salt)`, checked on inbound calls.
    pub authentication_token: String,
}

/// Persisted state for one known partner, unique by `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerRecord {
    /// Assigned by the store on create.
    pub id: Option<i64>,
    pub url: String,
    pub name: String,
    pub status: PartnerStatus,
    pub credentials: Option<PartnerCredentials>,
    pub added_at: DateTime<Utc>,
}

impl PartnerRecord {
    /// A record for a partner that has not (yet) completed a handshake.
    pub fn unconfirmed(url: impl Into<String>, name: impl Into<String>, status: PartnerStatus) -> Self {
        let mut record = Self {
            id: None,
            url: url.into(),
            name: name.into(),
            status: PartnerStatus::NotContacted,
            credentials: None,
            added_at: Utc::now(),
        };
        record.set_status(status);
        record
    }

    pub fn approved(url: impl Into<String>, name: impl Into<String>, credentials: PartnerCredentials) -> Self {
        Self {
            id: None,
            url: url.into(),
            name: name.into(),
            status: PartnerStatus::Approved,
            credentials: Some(credentials),
            added_at: Utc::now(),
        }
    }

    /// Install freshly negotiated credentials and mark the partner approved.
    pub fn approve(&mut self, credentials: PartnerCredentials) {
        self.credentials = Some(credentials);
        self.status = PartnerStatus::Approved;
    }

    /// Change status. Leaving `Approved` drops the credentials.
    pub fn set_status(&mut self, status: PartnerStatus) {
        if status != PartnerStatus::Approved {
            self.credentials = None;
        }
        self.status = status;
    }

    pub fn api_key(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.api_key.as_str())
    }

    /// Wire view of this record. Salt and token never leave the instance.
    pub fn to_descriptor(&self) -> PartnerDescriptor {
        PartnerDescriptor {
            id: self.id,
            name: self.name.clone(),
            url: self.url.clone(),
            api_key: self.api_key().map(str::to_string),
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> PartnerCredentials {
        PartnerCredentials {
            api_key: "key".into(),
            salt: "salt".into(),
            authentication_token: "token".into(),
        }
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("APPROVED".parse::<PartnerStatus>().unwrap(), PartnerStatus::Approved);
        assert_eq!("contact-failed".parse::<PartnerStatus>().unwrap(), PartnerStatus::ContactFailed);
        assert_eq!("not_contacted".parse::<PartnerStatus>().unwrap(), PartnerStatus::NotContacted);
        assert!("pending".parse::<PartnerStatus>().is_err());
    }

    #[test]
    fn test_descriptor_wire_shape() {
        let d = PartnerDescriptor::new("b.example.org")
            .with_name("Registry B")
            .with_api_key("k1")
            .with_status(PartnerStatus::Approved);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "Registry B",
                "url": "b.example.org",
                "apiKey": "k1",
                "status": "APPROVED"
            })
        );

        let parsed: PartnerDescriptor =
            serde_json::from_str(r#"{"url":"a.example.org","status":"CONTACT_FAILED"}"#).unwrap();
        assert_eq!(parsed.url, "a.example.org");
        assert_eq!(parsed.status, PartnerStatus::ContactFailed);
        assert!(parsed.api_key().is_none());
    }

    #[test]
    fn test_empty_api_key_is_absent() {
        let d = PartnerDescriptor::new("x.example.org").with_api_key("");
        assert!(d.api_key().is_none());
    }

    #[test]
    fn test_leaving_approved_drops_credentials() {
        let mut record = PartnerRecord::approved("b.example.org", "B", creds());
        assert_eq!(record.api_key(), Some("key"));

        record.set_status(PartnerStatus::ContactFailed);
        assert!(record.credentials.is_none());
        assert_eq!(record.status, PartnerStatus::ContactFailed);
    }

    #[test]
    fn test_descriptor_hides_secrets() {
        let mut record = PartnerRecord::approved("b.example.org", "B", creds());
        record.id = Some(7);
        let json = serde_json::to_string(&record.to_descriptor()).unwrap();
        assert!(json.contains("\"apiKey\":\"key\""));
        assert!(!json.contains("salt"));
        assert!(!json.contains("token"));
    }
}
