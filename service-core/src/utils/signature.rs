use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Sign a webhook delivery payload, returning the lowercase hex digest that
/// goes into the `X-Webhook-Signature: sha256=<hex>` header.
pub fn sign_payload(secret: &str, payload: &[u8]) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid signing secret length: {}", e))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time verification of a webhook signature header value (the hex
/// digest, without the `sha256=` prefix).
pub fn verify_signature(secret: &str, payload: &[u8], signature_hex: &str) -> Result<bool, anyhow::Error> {
    let expected = sign_payload(secret, payload)?;
    if expected.len() != signature_hex.len() {
        return Ok(false);
    }
    Ok(expected.as_bytes().ct_eq(signature_hex.as_bytes()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signs_and_verifies() {
        let secret = "whsec_test";
        let payload = br#"{"id":"evt_1","kind":"login.success"}"#;
        let sig = sign_payload(secret, payload).unwrap();
        assert!(!sig.is_empty());
        assert!(verify_signature(secret, payload, &sig).unwrap());
    }

    #[test]
    fn rejects_tampered_payload() {
        let secret = "whsec_test";
        let payload = br#"{"id":"evt_1"}"#;
        let sig = sign_payload(secret, payload).unwrap();
        let tampered = br#"{"id":"evt_2"}"#;
        assert!(!verify_signature(secret, tampered, &sig).unwrap());
    }

    #[test]
    fn rejects_wrong_secret() {
        let payload = br#"{"id":"evt_1"}"#;
        let sig = sign_payload("secret_a", payload).unwrap();
        assert!(!verify_signature("secret_b", payload, &sig).unwrap());
    }
}
