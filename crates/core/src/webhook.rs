use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Base64 HMAC-SHA256 of `body` under `secret`, as sent in billing webhook headers.
pub fn compute_signature(secret: &[u8], body: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Checks a base64 HMAC-SHA256 signature over the exact raw request body.
///
/// The digest comparison is constant time. Undecodable signatures are rejected.
pub fn verify_signature(secret: &[u8], body: &[u8], signature: &str) -> bool {
    let Ok(provided) = STANDARD.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}

#[cfg(test)]
mod tests {
    use super::{compute_signature, verify_signature};

    const BODY: &[u8] = br#"{"eventType":"invoice.paid","invoiceId":"INV-1"}"#;

    #[test]
    fn signature_round_trips_for_same_secret_and_body() {
        let signature = compute_signature(b"shared-secret", BODY);
        assert!(verify_signature(b"shared-secret", BODY, &signature));
    }

    #[test]
    fn signature_fails_for_other_secret() {
        let signature = compute_signature(b"other-secret", BODY);
        assert!(!verify_signature(b"shared-secret", BODY, &signature));
    }

    #[test]
    fn signature_covers_exact_body_bytes() {
        let signature = compute_signature(b"shared-secret", BODY);
        let reformatted = br#"{"eventType": "invoice.paid", "invoiceId": "INV-1"}"#;
        assert!(!verify_signature(b"shared-secret", reformatted, &signature));
    }

    #[test]
    fn garbage_signature_is_rejected() {
        assert!(!verify_signature(b"shared-secret", BODY, "not base64 !!"));
        assert!(!verify_signature(b"shared-secret", BODY, ""));
    }
}
