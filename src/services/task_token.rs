//! Task-scoped bearer tokens for runner callbacks.
//!
//! A token is `base64url("{task_id}:{expiry}:{hex hmac}")` where the MAC is
//! HMAC-SHA256 over `"{task_id}:{expiry}"`. Tokens are stateless; validation
//! needs only the shared secret.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Why a runner task token was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Not `<task_id>.<expiry>.<signature>`
    #[error("Malformed task token")]
    Malformed,

    /// Signed for another task
    #[error("Token was issued for a different task")]
    TaskMismatch,

    /// Past its expiry
    #[error("Task token expired")]
    Expired,

    /// Signature does not verify
    #[error("Invalid token signature")]
    BadSignature,

    /// Secret rejected by HMAC
    #[error("Token secret is not usable as an HMAC key")]
    InvalidSecret,
}

/// Issues and checks HMAC-signed tokens that authorize result callbacks.
#[derive(Clone)]
pub struct TaskTokenService {
    keyed: HmacSha256,
    ttl: Duration,
}

impl TaskTokenService {
    /// Service signing with `secret`; tokens live for `ttl_minutes`.
    pub fn new(secret: impl AsRef<[u8]>, ttl_minutes: u64) -> Result<Self, TokenError> {
        let keyed = HmacSha256::new_from_slice(secret.as_ref()).map_err(|_| TokenError::InvalidSecret)?;
        let ttl_minutes = i64::try_from(ttl_minutes).unwrap_or(i64::MAX).min(i64::MAX / 60_000);
        Ok(Self { keyed, ttl: Duration::minutes(ttl_minutes) })
    }

    fn mac(&self, payload: &str) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(payload.as_bytes());
        mac
    }

    /// Token for `task_id`, valid from now.
    pub fn generate(&self, task_id: Uuid) -> String {
        self.generate_at(task_id, Utc::now())
    }

    /// Token issued at `now`, expiring one TTL later.
    pub fn generate_at(&self, task_id: Uuid, now: DateTime<Utc>) -> String {
        let expiry = (now + self.ttl).timestamp();
        let payload = format!("{task_id}:{expiry}");
        let signature = hex::encode(self.mac(&payload).finalize().into_bytes());
        URL_SAFE_NO_PAD.encode(format!("{payload}:{signature}"))
    }

    /// Check `token` for `task_id` against the current time.
    pub fn validate(&self, token: &str, task_id: Uuid) -> Result<(), TokenError> {
        self.validate_at(token, task_id, Utc::now())
    }

    /// Check `token` for `task_id` as of `now`.
    pub fn validate_at(&self, token: &str, task_id: Uuid, now: DateTime<Utc>) -> Result<(), TokenError> {
        let decoded = URL_SAFE_NO_PAD
            .decode(token.trim_end_matches('='))
            .map_err(|_| TokenError::Malformed)?;
        let decoded = String::from_utf8(decoded).map_err(|_| TokenError::Malformed)?;

        let mut parts = decoded.splitn(3, ':');
        let (Some(token_task), Some(expiry), Some(signature)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(TokenError::Malformed);
        };

        let token_task = Uuid::parse_str(token_task).map_err(|_| TokenError::Malformed)?;
        if token_task != task_id {
            return Err(TokenError::TaskMismatch);
        }

        let expiry: i64 = expiry.parse().map_err(|_| TokenError::Malformed)?;
        if now.timestamp() > expiry {
            return Err(TokenError::Expired);
        }

        let signature = hex::decode(signature).map_err(|_| TokenError::BadSignature)?;
        self.mac(&format!("{token_task}:{expiry}"))
            .verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TaskTokenService {
        TaskTokenService::new("a-sufficiently-long-test-secret", 60).unwrap()
    }

    #[test]
    fn test_generated_token_validates_for_its_task() {
        let service = service();
        let task = Uuid::new_v4();
        let token = service.generate(task);
        assert!(!token.contains('='));
        assert_eq!(service.validate(&token, task), Ok(()));
    }

    #[test]
    fn test_token_is_scoped_to_task() {
        let service = service();
        let token = service.generate(Uuid::new_v4());
        assert_eq!(service.validate(&token, Uuid::new_v4()), Err(TokenError::TaskMismatch));
    }

    #[test]
    fn test_expired_token() {
        let service = service();
        let task = Uuid::new_v4();
        let issued = Utc::now() - Duration::minutes(61);
        let token = service.generate_at(task, issued);
        assert_eq!(service.validate(&token, task), Err(TokenError::Expired));
    }

    #[test]
    fn test_forged_signature_and_other_secret() {
        let service = service();
        let task = Uuid::new_v4();
        let expiry = (Utc::now() + Duration::minutes(5)).timestamp();
        let forged = URL_SAFE_NO_PAD.encode(format!("{task}:{expiry}:{}", "00".repeat(32)));
        assert_eq!(service.validate(&forged, task), Err(TokenError::BadSignature));

        let other = TaskTokenService::new("another-secret-entirely", 60).unwrap().generate(task);
        assert_eq!(service.validate(&other, task), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_malformed_tokens() {
        let service = service();
        let task = Uuid::new_v4();
        assert_eq!(service.validate("not base64!", task), Err(TokenError::Malformed));
        assert_eq!(service.validate(&URL_SAFE_NO_PAD.encode("only:two"), task), Err(TokenError::Malformed));
        assert_eq!(service.validate("", task), Err(TokenError::Malformed));
    }
}
