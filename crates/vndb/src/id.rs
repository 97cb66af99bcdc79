//! Visual novel identifiers
//!
//! VNDB identifies visual novels as `v` followed by digits (`v17`). The API
//! path takes the bare number, while page links may be relative (`/v17`) or
//! absolute (`https://vndb.org/v17`).

use crate::VndbError;

const ORIGINS: [&str; 2] = ["https://vndb.org", "http://vndb.org"];

/// Strip a leading `v`/`V` from an id
///
/// ```
/// use ulist_vndb::normalize_vn_id;
///
/// assert_eq!(normalize_vn_id("v17"), "17");
/// assert_eq!(normalize_vn_id("17"), "17");
/// ```
pub fn normalize_vn_id(id: &str) -> &str {
    id.strip_prefix(['v', 'V']).unwrap_or(id)
}

/// Parse an id, path, or VNDB link into canonical `v<digits>` form
///
/// Accepts `v17`, `17`, `/v17`, and `https://vndb.org/v17`. Links to other
/// sites and sub-pages such as `/v17/chars` are rejected.
pub fn parse_vn_id(input: &str) -> Option<String> {
    let mut rest = input.trim();
    for origin in ORIGINS {
        if let Some(path) = rest.strip_prefix(origin) {
            if !path.starts_with('/') {
                return None;
            }
            rest = path;
            break;
        }
    }

    let rest = rest.strip_prefix('/').unwrap_or(rest);
    let digits = normalize_vn_id(rest);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some(format!("v{digits}"))
}

/// Like [`parse_vn_id`], but reports the rejected input
pub fn require_vn_id(input: &str) -> Result<String, VndbError> {
    parse_vn_id(input).ok_or_else(|| VndbError::InvalidId(input.to_string()))
}
