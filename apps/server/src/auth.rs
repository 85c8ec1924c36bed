use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};
use std::fmt;

/// The shared admin secret, held only as its SHA-256 digest.
#[derive(Clone)]
pub struct AdminCredential {
    digest: [u8; 32],
}

#[derive(Debug, PartialEq, Eq)]
pub enum AdminAuthError {
    /// No password sent yet. Not a failed attempt.
    Missing,
    Rejected,
}

impl AdminCredential {
    pub fn from_password(password: &str) -> Self {
        Self {
            digest: sha256(password),
        }
    }

    /// Accepts the hex SHA-256 of the password, so the plaintext never has to
    /// sit in the environment.
    pub fn from_sha256_hex(hex_digest: &str) -> anyhow::Result<Self> {
        let bytes = hex::decode(hex_digest.trim())?;
        let digest: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("expected 64 hex characters"))?;
        Ok(Self { digest })
    }

    /// Constant-time comparison of digests.
    pub fn verify(&self, candidate: &str) -> bool {
        let candidate = sha256(candidate);
        self.digest
            .iter()
            .zip(candidate.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl fmt::Debug for AdminCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AdminCredential(<redacted>)")
    }
}

fn sha256(value: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(value.as_bytes()));
    out
}

/// Check the `Authorization: Bearer <password>` header.
pub fn check_admin(headers: &HeaderMap, credential: &AdminCredential) -> Result<(), AdminAuthError> {
    let password = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .unwrap_or("");

    if password.is_empty() {
        return Err(AdminAuthError::Missing);
    }
    if !credential.verify(password) {
        tracing::warn!("Admin password mismatch");
        return Err(AdminAuthError::Rejected);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn test_verify_password() {
        let cred = AdminCredential::from_password("s3nha-forte");
        assert!(cred.verify("s3nha-forte"));
        assert!(!cred.verify("s3nha-fort"));
        assert!(!cred.verify(""));
    }

    #[test]
    fn test_sha256_hex_matches_plaintext() {
        // sha256("admin123")
        let cred = AdminCredential::from_sha256_hex(
            "240be518fabd2724ddb6f04eeb1da5967448d7e831c08c8fa822809f74c720a9",
        )
        .unwrap();
        assert!(cred.verify("admin123"));
        assert!(!cred.verify("admin1234"));
    }

    #[test]
    fn test_sha256_hex_rejects_bad_input() {
        assert!(AdminCredential::from_sha256_hex("zz").is_err());
        assert!(AdminCredential::from_sha256_hex("abcd").is_err());
    }

    #[test]
    fn test_debug_is_redacted() {
        let cred = AdminCredential::from_password("admin123");
        assert_eq!(format!("{:?}", cred), "AdminCredential(<redacted>)");
    }

    #[test]
    fn test_check_admin_missing_header() {
        let cred = AdminCredential::from_password("admin123");
        assert_eq!(check_admin(&HeaderMap::new(), &cred), Err(AdminAuthError::Missing));
        assert_eq!(check_admin(&headers("Bearer "), &cred), Err(AdminAuthError::Missing));
        assert_eq!(check_admin(&headers("Basic abc"), &cred), Err(AdminAuthError::Missing));
    }

    #[test]
    fn test_check_admin_wrong_password() {
        let cred = AdminCredential::from_password("admin123");
        assert_eq!(
            check_admin(&headers("Bearer nope"), &cred),
            Err(AdminAuthError::Rejected)
        );
    }

    #[test]
    fn test_check_admin_ok() {
        let cred = AdminCredential::from_password("admin123");
        assert_eq!(check_admin(&headers("Bearer admin123"), &cred), Ok(()));
        assert_eq!(check_admin(&headers("bearer admin123"), &cred), Ok(()));
    }
}
