//! VNDB user-list labels
//!
//! Implements [`ulist_batch::RemoteLabeler`] against the VNDB kana API
//! (`PATCH /ulist/<id>`), plus the id parsing and target selection a caller
//! needs before starting a bulk run.

mod client;
mod id;
pub mod targets;

pub use client::{VndbClient, VndbClientConfig, DEFAULT_API_URL, DEFAULT_TIMEOUT};
pub use id::{normalize_vn_id, parse_vn_id, require_vn_id};
pub use targets::{select_targets, TargetRules, TargetSummary};

/// Built-in "Wishlist" label
pub const LABEL_WISHLIST: u32 = 5;

/// Built-in "Blacklist" label
pub const LABEL_BLACKLIST: u32 = 6;

/// Errors building requests or clients
#[derive(Debug, thiserror::Error)]
pub enum VndbError {
    /// HTTP client could not be constructed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Input is not a visual novel id
    #[error("not a visual novel id: {0}")]
    InvalidId(String),
}

/// Resolve a label name or number
///
/// Accepts `wishlist`, `blacklist` (case-insensitive), or a numeric label id.
pub fn parse_label(input: &str) -> Option<u32> {
    match input.trim().to_ascii_lowercase().as_str() {
        "wishlist" => Some(LABEL_WISHLIST),
        "blacklist" => Some(LABEL_BLACKLIST),
        other => other.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label() {
        assert_eq!(parse_label("wishlist"), Some(LABEL_WISHLIST));
        assert_eq!(parse_label("Blacklist"), Some(LABEL_BLACKLIST));
        assert_eq!(parse_label("7"), Some(7));
        assert_eq!(parse_label("finished?"), None);
    }
}
