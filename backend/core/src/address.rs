//! Partner address checks.
//!
//! Addresses are stored without a scheme (`registry.example.org`); validation
//! assumes `https://` the same way the outbound client does.

use url::{Host, Url};

/// Whether `address` forms a valid https URL once the scheme is prepended.
pub fn is_valid_address(address: &str) -> bool {
    let address = address.trim();
    if address.is_empty() || address.contains("://") || address.chars().any(char::is_whitespace) {
        return false;
    }

    let Ok(parsed) = Url::parse(&format!("https://{address}")) else {
        return false;
    };
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return false;
    }

    match parsed.host() {
        Some(Host::Domain(domain)) => is_valid_domain(domain),
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => true,
        None => false,
    }
}

/// The form a partner address is stored and keyed under: trimmed, lowercased,
/// without a trailing slash.
pub fn canonical_address(address: &str) -> String {
    address.trim().trim_end_matches('/').to_ascii_lowercase()
}

/// Whether two addresses name the same partner.
pub fn same_address(a: &str, b: &str) -> bool {
    canonical_address(a) == canonical_address(b)
}

fn is_valid_domain(domain: &str) -> bool {
    let labels: Vec<&str> = domain.trim_end_matches('.').split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    let labels_ok = labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });

    // Punycode TLDs are allowed; otherwise the TLD must be alphabetic.
    let tld = labels[labels.len() - 1];
    let tld_ok = tld.starts_with("xn--") || (tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()));

    labels_ok && tld_ok
}
