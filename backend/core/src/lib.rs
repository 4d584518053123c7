pub mod address;
pub mod error;
pub mod traits;
pub mod types;

pub use address::{canonical_address, is_valid_address, same_address};
pub use error::FederationError;
pub use traits::{AdminCapability, InstanceConfig, PartnerStore, RemoteChannel, TokenCache, TokenCrypto};
pub use types::{PartnerCredentials, PartnerDescriptor, PartnerRecord, PartnerStatus};
