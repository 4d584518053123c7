use thiserror::Error;

/// Outcome of a rejected federation operation.
///
/// Contact failures during an add are not errors: they are recorded on the
/// partner and returned as a descriptor with a non-approved status.
#[derive(Debug, Error)]
pub enum FederationError {
    #[error("web of registries is not enabled on this instance")]
    Disabled,

    #[error("{user} is not an administrator")]
    Unauthorized { user: String },

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("refusing to federate with own address {0}")]
    SelfFederation(String),

    #[error("api token for {0} could not be validated")]
    TokenRejected(String),

    #[error("could not contact partner {0}")]
    ContactFailed(String),

    #[error("local configuration error: {0}")]
    Configuration(String),

    #[error("partner not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl FederationError {
    pub fn unauthorized(user: impl Into<String>) -> Self {
        Self::Unauthorized { user: user.into() }
    }
}
