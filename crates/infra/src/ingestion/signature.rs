//! HMAC-SHA256 webhook signatures.
//!
//! The platform sends `base64(HMAC-SHA256(secret, raw_body))` in a header;
//! verification runs over the exact bytes received, before any parsing.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use stockroom_core::DomainError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "x-wc-webhook-signature";

#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Vec<u8>,
}

impl core::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WebhookVerifier").finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> Result<HmacSha256, DomainError> {
        // HMAC accepts keys of any length; this only fails on a broken backend.
        HmacSha256::new_from_slice(&self.secret).map_err(|_| DomainError::InvalidSignature)
    }

    /// Signature for `body`, as the platform would send it.
    pub fn sign(&self, body: &[u8]) -> Result<String, DomainError> {
        let mut mac = self.mac()?;
        mac.update(body);
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Constant-time check of `signature` against `body`.
    ///
    /// A missing or undecodable signature is an `InvalidSignature` like a wrong one.
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), DomainError> {
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(DomainError::InvalidSignature)?;
        let expected = STANDARD
            .decode(signature)
            .map_err(|_| DomainError::InvalidSignature)?;

        let mut mac = self.mac()?;
        mac.update(body);
        mac.verify_slice(&expected)
            .map_err(|_| DomainError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"id":1,"status":"processing","line_items":[]}"#;

    #[test]
    fn signed_body_verifies() {
        let verifier = WebhookVerifier::new("s3cret");
        let signature = verifier.sign(BODY).unwrap();
        assert!(verifier.verify(BODY, Some(&signature)).is_ok());
    }

    #[test]
    fn tampered_body_or_wrong_secret_fails() {
        let verifier = WebhookVerifier::new("s3cret");
        let signature = verifier.sign(BODY).unwrap();

        let tampered = br#"{"id":1,"status":"processing","line_items":[{}]}"#;
        assert_eq!(
            verifier.verify(tampered, Some(&signature)),
            Err(DomainError::InvalidSignature)
        );

        let other = WebhookVerifier::new("other");
        assert_eq!(
            other.verify(BODY, Some(&signature)),
            Err(DomainError::InvalidSignature)
        );
    }

    #[test]
    fn missing_or_garbage_header_fails() {
        let verifier = WebhookVerifier::new("s3cret");
        assert_eq!(verifier.verify(BODY, None), Err(DomainError::InvalidSignature));
        assert_eq!(verifier.verify(BODY, Some("")), Err(DomainError::InvalidSignature));
        assert_eq!(
            verifier.verify(BODY, Some("not base64!")),
            Err(DomainError::InvalidSignature)
        );
    }
}
