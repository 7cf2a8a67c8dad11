//! Cache key builders for all Canopy cache entries.
//!
//! Backends add their own namespace prefix; these builders only produce
//! the logical key.

use std::fmt;

use uuid::Uuid;

/// Which kind of signed URL a cache entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlKind {
    /// Attachment download.
    Download,
    /// Inline preview.
    Preview,
}

impl fmt::Display for UrlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download => write!(f, "download"),
            Self::Preview => write!(f, "preview"),
        }
    }
}

/// Cache key for a signed URL issued to `requester` for `node`.
pub fn signed_url(node_id: Uuid, requester_id: Uuid, kind: UrlKind) -> String {
    format!("url:{node_id}:{requester_id}:{kind}")
}

/// Pattern matching every signed URL cached for `node`.
pub fn signed_url_node_pattern(node_id: Uuid) -> String {
    format!("url:{node_id}:*")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_url_key() {
        let id = Uuid::nil();
        assert_eq!(
            signed_url(id, id, UrlKind::Preview),
            "url:00000000-0000-0000-0000-000000000000:00000000-0000-0000-0000-000000000000:preview"
        );
    }

    #[test]
    fn test_node_pattern_covers_every_requester() {
        let node = Uuid::new_v4();
        let key = signed_url(node, Uuid::new_v4(), UrlKind::Download);
        let pattern = signed_url_node_pattern(node);
        assert!(key.starts_with(pattern.trim_end_matches('*')));
    }
}
