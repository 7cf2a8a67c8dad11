//! Signed URL construction and verification.
//!
//! A signature is the hex HMAC-SHA256, keyed by the signing secret, over
//! the blob key, the content disposition, and the expiry timestamp. Anyone
//! serving blobs with the same secret can check a URL without shared state.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use canopy_core::error::AppError;
use canopy_core::result::AppResult;
use canopy_core::traits::SignedUrl;

/// How a signed URL asks the content to be presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Download as an attachment with this file name.
    Attachment(String),
    /// Render inline.
    Inline,
}

impl Disposition {
    fn as_signed_value(&self) -> String {
        match self {
            Self::Attachment(name) => format!("attachment:{name}"),
            Self::Inline => "inline".to_string(),
        }
    }
}

/// Issues and checks signed blob URLs.
#[derive(Debug, Clone)]
pub struct UrlSigner {
    base_url: String,
    secret: String,
}

impl UrlSigner {
    /// Create a signer for URLs rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret: secret.into(),
        }
    }

    fn mac(&self, key: &str, disposition: &Disposition, expires: i64) -> AppResult<Hmac<Sha256>> {
        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(self.secret.as_bytes())
            .map_err(|e| AppError::configuration(format!("Invalid signing secret: {e}")))?;
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(disposition.as_signed_value().as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    /// Sign a URL for `key` valid for `ttl` from `now`.
    pub fn sign(
        &self,
        key: &str,
        disposition: &Disposition,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> AppResult<SignedUrl> {
        let expires_at = now + ttl;
        let expires = expires_at.timestamp();
        let signature = hex::encode(self.mac(key, disposition, expires)?.finalize().into_bytes());
        let mut url = format!(
            "{}/{}?expires={expires}&sig={signature}",
            self.base_url, key
        );
        if let Disposition::Attachment(name) = disposition {
            url.push_str("&name=");
            url.push_str(&urlencoding::encode(name));
        }
        Ok(SignedUrl { url, expires_at })
    }

    /// Check a signature presented with a URL at `now`.
    pub fn verify(
        &self,
        key: &str,
        disposition: &Disposition,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> bool {
        if expires <= now.timestamp() {
            return false;
        }
        let Ok(presented) = hex::decode(signature) else {
            return false;
        };
        self.mac(key, disposition, expires)
            .is_ok_and(|mac| mac.verify_slice(&presented).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_param<'a>(url: &'a str, name: &str) -> Option<&'a str> {
        url.split_once('?')?
            .1
            .split('&')
            .find_map(|pair| pair.strip_prefix(name)?.strip_prefix('='))
    }

    #[test]
    fn test_signed_url_verifies_until_expiry() {
        let signer = UrlSigner::new("https://blobs.example/", "secret");
        let now = Utc::now();
        let disposition = Disposition::Attachment("report (1).pdf".into());
        let signed = signer.sign("ab/abcdef", &disposition, now, Duration::minutes(10)).unwrap();

        assert!(signed.url.starts_with("https://blobs.example/ab/abcdef?"));
        assert!(signed.url.contains("name=report%20%281%29.pdf"));

        let expires: i64 = query_param(&signed.url, "expires").unwrap().parse().unwrap();
        let sig = query_param(&signed.url, "sig").unwrap();
        assert!(signer.verify("ab/abcdef", &disposition, expires, sig, now));
        assert!(!signer.verify("ab/abcdef", &disposition, expires, sig, now + Duration::hours(1)));
        assert!(!signer.verify("ab/other", &disposition, expires, sig, now));
        assert!(!signer.verify("ab/abcdef", &Disposition::Inline, expires, sig, now));
    }

    #[test]
    fn test_different_secret_rejects() {
        let now = Utc::now();
        let a = UrlSigner::new("http://x", "one");
        let b = UrlSigner::new("http://x", "two");
        let signed = a.sign("k", &Disposition::Inline, now, Duration::minutes(1)).unwrap();
        let expires: i64 = query_param(&signed.url, "expires").unwrap().parse().unwrap();
        let sig = query_param(&signed.url, "sig").unwrap();
        assert!(!b.verify("k", &Disposition::Inline, expires, sig, now));
    }

    #[test]
    fn test_malformed_or_truncated_signature_rejects() {
        let now = Utc::now();
        let signer = UrlSigner::new("http://x", "secret");
        let signed = signer.sign("k", &Disposition::Inline, now, Duration::minutes(1)).unwrap();
        let expires: i64 = query_param(&signed.url, "expires").unwrap().parse().unwrap();
        let sig = query_param(&signed.url, "sig").unwrap();

        assert_eq!(sig.len(), 64);
        assert!(!signer.verify("k", &Disposition::Inline, expires, &sig[..32], now));
        assert!(!signer.verify("k", &Disposition::Inline, expires, "not-hex", now));
        assert!(!signer.verify("k", &Disposition::Inline, expires, "", now));
    }
}
