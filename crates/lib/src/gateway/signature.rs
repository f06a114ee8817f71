//! Payload signature check for `X-Hub-Signature-256: sha256=<hex hmac of body>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Verify `header` against HMAC-SHA256(`secret`, `body`). Comparison is constant-time.
pub fn verify_signature(secret: &str, body: &[u8], header: &str) -> Result<(), &'static str> {
    let hex_sig = header
        .trim()
        .strip_prefix("sha256=")
        .ok_or("unsupported_signature_scheme")?;
    let expected = hex::decode(hex_sig).map_err(|_| "malformed_signature")?;
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "bad_secret")?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| "invalid_signature")
}

#[cfg(test)]
pub(crate) fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac accepts any key");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_signature_passes() {
        let body = br#"{"object":"whatsapp_business_account"}"#;
        let header = sign("app-secret", body);
        assert_eq!(verify_signature("app-secret", body, &header), Ok(()));
    }

    #[test]
    fn tampered_body_or_wrong_secret_fails() {
        let header = sign("app-secret", b"original");
        assert_eq!(
            verify_signature("app-secret", b"tampered", &header),
            Err("invalid_signature")
        );
        assert_eq!(
            verify_signature("other-secret", b"original", &header),
            Err("invalid_signature")
        );
    }

    #[test]
    fn malformed_headers_fail() {
        assert_eq!(
            verify_signature("s", b"x", "sha1=abcd"),
            Err("unsupported_signature_scheme")
        );
        assert_eq!(
            verify_signature("s", b"x", "sha256=not-hex"),
            Err("malformed_signature")
        );
    }
}
