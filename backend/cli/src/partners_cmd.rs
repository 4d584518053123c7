//! CLI partner subcommands.

use std::sync::Arc;

use anyhow::Result;
use clap::Subcommand;
use tracing::info;

use wor_config::{ensure_valid, StaticAdmins, WorConfig};
use wor_core::{PartnerDescriptor, PartnerStatus};
use wor_federation::{FederationService, HttpChannel};
use wor_security::EphemeralTokenCache;
use wor_store::SqlitePartnerStore;

#[derive(Subcommand)]
pub enum PartnersCommands {
    /// List known partners
    List,
    /// Show one partner
    Show { id: i64 },
    /// Add a partner registry and exchange keys with it
    Add {
        /// Partner address without scheme, e.g. registry.example.org
        url: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Rotate the key shared with a partner
    Rotate { id: i64 },
    /// Delete a partner record
    Remove { id: i64 },
    /// Set a partner's status (approved, contact-failed, not-contacted)
    Status { id: i64, status: PartnerStatus },
}

pub async fn run(cmd: PartnersCommands, config: &WorConfig, user: &str) -> Result<()> {
    ensure_valid(config)?;

    let service = build_service(config)?;

    match cmd {
        PartnersCommands::List => {
            let partners = service.list_partners(user).await?;
            println!("{}", serde_json::to_string_pretty(&partners)?);
        }
        PartnersCommands::Show { id } => {
            let partner = service.get_partner(user, id).await?;
            println!("{}", serde_json::to_string_pretty(&partner)?);
        }
        PartnersCommands::Add { url, name } => {
            let mut partner = PartnerDescriptor::new(url);
            if let Some(name) = name {
                partner = partner.with_name(name);
            }
            let added = service.add_new_partner(user, partner).await?;
            if added.status != PartnerStatus::Approved {
                eprintln!("{}", pending_handshake_notice(&added));
            }
            println!("{}", serde_json::to_string_pretty(&added)?);
        }
        PartnersCommands::Rotate { id } => {
            let rotated = service.update_api_key(user, id).await?;
            println!("{}", serde_json::to_string_pretty(&rotated)?);
        }
        PartnersCommands::Remove { id } => {
            if service.remove_partner(user, id).await? {
                println!("Removed partner {id}");
            } else {
                println!("No partner with id {id}");
            }
        }
        PartnersCommands::Status { id, status } => {
            let updated = service.update_partner_status(user, id, status).await?;
            println!("{}", serde_json::to_string_pretty(&updated)?);
        }
    }
    Ok(())
}

/// The peer confirms our key by calling back into this instance, which a
/// one-shot command cannot answer.
fn pending_handshake_notice(partner: &PartnerDescriptor) -> String {
    format!(
        "Partner {} saved as {}. Completing the handshake needs this instance's partner routes \
         to be served by a running registry that embeds the federation service; \
         run the add from there.",
        partner.url, partner.status
    )
}

fn build_service(config: &WorConfig) -> Result<FederationService> {
    let federation = &config.federation;
    info!(db = %config.storage.db_path, instance = %federation.instance_url, "Opening partner store");

    let store = SqlitePartnerStore::open(&config.storage.db_path)?;
    let channel = HttpChannel::new(federation.contact_timeout())?;
    let admins = StaticAdmins::new(&config.admins);

    Ok(FederationService::new(
        Arc::new(store),
        Arc::new(channel),
        Arc::new(config.clone()),
        Arc::new(admins),
    )
    .with_token_cache(Arc::new(EphemeralTokenCache::new(federation.token_ttl())))
    .with_contact_timeout(federation.contact_timeout()))
}
