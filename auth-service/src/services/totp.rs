//! TOTP enrollment and verification, with AES-GCM sealing of the shared
//! secret and recovery codes at rest.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng as AesOsRng},
    Aes256Gcm, Nonce,
};
use rand::{distributions::Alphanumeric, Rng, RngCore};
use service_core::error::AppError;
use totp_rs::{Algorithm, Secret, TOTP};

const NONCE_LEN: usize = 12;
const RECOVERY_CODE_COUNT: usize = 8;

#[derive(Clone)]
pub struct TotpService {
    cipher: Aes256Gcm,
    issuer: String,
}

impl TotpService {
    /// `sealing_key` must be exactly 32 bytes (AES-256). Configuration loading
    /// rejects any other length.
    pub fn new(sealing_key: &[u8], issuer: String) -> Result<Self, anyhow::Error> {
        let cipher = Aes256Gcm::new_from_slice(sealing_key)
            .map_err(|e| anyhow::anyhow!("invalid MFA sealing key: {}", e))?;
        Ok(Self { cipher, issuer })
    }

    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, anyhow::Error> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        AesOsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| anyhow::anyhow!("failed to seal MFA material: {}", e))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn unseal(&self, sealed: &[u8]) -> Result<Vec<u8>, anyhow::Error> {
        if sealed.len() < NONCE_LEN {
            return Err(anyhow::anyhow!("sealed MFA material truncated"));
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| anyhow::anyhow!("failed to unseal MFA material: {}", e))
    }

    /// Generate a new shared secret plus recovery codes, sealed for storage.
    /// Returns the otpauth:// URI (shown once at enrollment) alongside the
    /// sealed blobs to persist.
    pub fn enroll(&self, account_name: &str) -> Result<TotpEnrollment, AppError> {
        let secret = Secret::generate_secret();
        let totp = TOTP::new(
            Algorithm::SHA1,
            6,
            1,
            30,
            secret.to_bytes().map_err(|e| AppError::Internal(anyhow::anyhow!("{e}")))?,
            Some(self.issuer.clone()),
            account_name.to_string(),
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!("{e}")))?;

        let otpauth_uri = totp.get_url();
        let secret_sealed = self
            .seal(totp.secret.as_slice())
            .map_err(AppError::Internal)?;

        let recovery_codes = generate_recovery_codes();
        let recovery_hashes: Vec<String> = recovery_codes
            .iter()
            .map(|code| hash_recovery_code(code))
            .collect();
        let recovery_codes_sealed = self
            .seal(serde_json::to_vec(&recovery_hashes).map_err(|e| AppError::Internal(e.into()))?.as_slice())
            .map_err(AppError::Internal)?;

        Ok(TotpEnrollment {
            otpauth_uri,
            recovery_codes,
            secret_sealed,
            recovery_codes_sealed,
        })
    }

    /// Verify a 6-digit TOTP code against a sealed secret.
    pub fn verify_code(&self, secret_sealed: &[u8], code: &str) -> Result<bool, AppError> {
        let secret_bytes = self.unseal(secret_sealed).map_err(AppError::Internal)?;
        let totp = TOTP::new(Algorithm::SHA1, 6, 1, 30, secret_bytes, None, "".to_string())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("{e}")))?;
        totp.check_current(code).map_err(|e| AppError::Internal(anyhow::anyhow!("{e}")))
    }

    /// Verify and consume a single-use recovery code. Returns the remaining,
    /// re-sealed code list whether or not the code matched, and whether it matched.
    pub fn verify_and_consume_recovery_code(
        &self,
        recovery_codes_sealed: &[u8],
        code: &str,
    ) -> Result<(bool, Vec<u8>), AppError> {
        let raw = self.unseal(recovery_codes_sealed).map_err(AppError::Internal)?;
        let mut hashes: Vec<String> =
            serde_json::from_slice(&raw).map_err(|e| AppError::Internal(e.into()))?;

        let target = hash_recovery_code(code);
        let matched_index = hashes.iter().position(|h| h == &target);

        let matched = matched_index.is_some();
        if let Some(idx) = matched_index {
            hashes.remove(idx);
        }

        let resealed = self
            .seal(serde_json::to_vec(&hashes).map_err(|e| AppError::Internal(e.into()))?.as_slice())
            .map_err(AppError::Internal)?;

        Ok((matched, resealed))
    }
}

pub struct TotpEnrollment {
    pub otpauth_uri: String,
    pub recovery_codes: Vec<String>,
    pub secret_sealed: Vec<u8>,
    pub recovery_codes_sealed: Vec<u8>,
}

fn generate_recovery_codes() -> Vec<String> {
    let mut rng = rand::thread_rng();
    (0..RECOVERY_CODE_COUNT)
        .map(|_| {
            (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(10)
                .map(char::from)
                .collect::<String>()
                .to_uppercase()
        })
        .collect()
}

fn hash_recovery_code(code: &str) -> String {
    use sha2::{Digest, Sha256};
    format!("{:x}", Sha256::digest(code.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> TotpService {
        TotpService::new(&[7u8; 32], "test-issuer".to_string()).unwrap()
    }

    #[test]
    fn enrolls_and_verifies_current_code() {
        let service = test_service();
        let enrollment = service.enroll("user@example.com").unwrap();
        assert!(enrollment.otpauth_uri.starts_with("otpauth://totp/"));
        assert_eq!(enrollment.recovery_codes.len(), RECOVERY_CODE_COUNT);

        // A freshly generated code of all zeros will not match; we only assert
        // that verification runs without sealing/unsealing errors.
        let result = service.verify_code(&enrollment.secret_sealed, "000000");
        assert!(result.is_ok());
    }

    #[test]
    fn recovery_code_is_single_use() {
        let service = test_service();
        let enrollment = service.enroll("user@example.com").unwrap();
        let code = enrollment.recovery_codes[0].clone();

        let (matched, resealed) = service
            .verify_and_consume_recovery_code(&enrollment.recovery_codes_sealed, &code)
            .unwrap();
        assert!(matched);

        let (matched_again, _) = service
            .verify_and_consume_recovery_code(&resealed, &code)
            .unwrap();
        assert!(!matched_again);
    }
}
