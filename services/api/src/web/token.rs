//! services/api/src/web/token.rs
//!
//! Signs and verifies session tokens. Verification never fails with an error:
//! it returns a [`Verification`] that callers match on.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use newswatcher_core::SessionClaim;

/// Outcome of checking a presented token.
#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    Valid(SessionClaim),
    Invalid(String),
}

/// Why a session token could not be minted.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token lifetime runs past the end of the calendar")]
    LifetimeOverflow,
    #[error(transparent)]
    Encode(#[from] jsonwebtoken::errors::Error),
}

/// HS256 signer bound to the process-wide secret.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: chrono::Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, ttl: chrono::Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            ttl,
        }
    }

    /// Builds an authorized claim valid from now until the configured lifetime.
    pub fn claim_for(
        &self,
        user_id: String,
        display_name: String,
        session_ip: String,
        session_ua: String,
    ) -> Result<SessionClaim, TokenError> {
        let now = Utc::now();
        let expires = now
            .checked_add_signed(self.ttl)
            .ok_or(TokenError::LifetimeOverflow)?;
        Ok(SessionClaim {
            authorized: true,
            user_id,
            display_name,
            session_ip,
            session_ua,
            iat: now.timestamp(),
            exp: expires.timestamp(),
        })
    }

    pub fn sign(&self, claim: &SessionClaim) -> Result<String, TokenError> {
        Ok(encode(&Header::new(Algorithm::HS256), claim, &self.encoding)?)
    }

    /// Checks the signature, expiry and shape of `token`.
    pub fn verify(&self, token: &str) -> Verification {
        match decode::<SessionClaim>(token, &self.decoding, &self.validation) {
            Ok(data) if data.claims.is_authorized() => Verification::Valid(data.claims),
            Ok(_) => Verification::Invalid("claim is not authorized".to_string()),
            Err(e) => Verification::Invalid(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new("test-secret", chrono::Duration::hours(1))
    }

    fn claim(codec: &TokenCodec) -> SessionClaim {
        codec.claim_for(
            "6f1c3a52-8c1e-4c43-9a51-4a1d1b0c2e77".into(),
            "Al1ce".into(),
            "127.0.0.1".into(),
            "tests".into(),
        )
        .unwrap()
    }

    #[test]
    fn signed_claim_round_trips() {
        let codec = codec();
        let claim = claim(&codec);
        let token = codec.sign(&claim).unwrap();
        assert_eq!(codec.verify(&token), Verification::Valid(claim));
    }

    #[test]
    fn tampered_signature_is_invalid() {
        let codec = codec();
        let token = codec.sign(&claim(&codec)).unwrap();

        let sig_start = token.rfind('.').unwrap() + 1;
        let target = sig_start + 5;
        let mut bytes = token.into_bytes();
        bytes[target] = if bytes[target] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        assert!(matches!(codec.verify(&tampered), Verification::Invalid(_)));
    }

    #[test]
    fn token_from_another_secret_is_invalid() {
        let other = TokenCodec::new("other-secret", chrono::Duration::hours(1));
        let token = other.sign(&claim(&other)).unwrap();
        assert!(matches!(codec().verify(&token), Verification::Invalid(_)));
    }

    #[test]
    fn lifetime_past_the_calendar_is_an_error() {
        let codec = TokenCodec::new("test-secret", chrono::Duration::days(1_000_000_000));
        let minted = codec.claim_for(
            "6f1c3a52-8c1e-4c43-9a51-4a1d1b0c2e77".into(),
            "Al1ce".into(),
            "127.0.0.1".into(),
            "tests".into(),
        );
        assert!(matches!(minted, Err(TokenError::LifetimeOverflow)));
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(matches!(codec().verify("not.a.token"), Verification::Invalid(_)));
    }

    #[test]
    fn unauthorized_claim_is_invalid() {
        let codec = codec();
        let mut claim = claim(&codec);
        claim.authorized = false;
        let token = codec.sign(&claim).unwrap();
        assert_eq!(
            codec.verify(&token),
            Verification::Invalid("claim is not authorized".to_string())
        );
    }

    #[test]
    fn expired_claim_is_invalid() {
        let codec = codec();
        let mut claim = claim(&codec);
        claim.exp = Utc::now().timestamp() - 3600;
        let token = codec.sign(&claim).unwrap();
        assert!(matches!(codec.verify(&token), Verification::Invalid(_)));
    }
}
