//! Credential codec: issues and verifies HMAC-signed JWTs.

use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;

use crate::auth::claims::{Claims, Role};
use crate::auth::secret::SigningSecret;

/// Default lifetime of an issued token.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// The HMAC family. Anything else is treated as a malformed token.
const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Reasons a token is rejected. Distinguishable internally, collapsed for clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("token expired")]
    Expired,

    #[error("invalid token signature")]
    BadSignature,

    #[error("malformed token")]
    Malformed,

    #[error("failed to sign token: {0}")]
    Encoding(String),
}

impl CodecError {
    /// Short label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            CodecError::Expired => "expired",
            CodecError::BadSignature => "bad_signature",
            CodecError::Malformed => "malformed",
            CodecError::Encoding(_) => "encoding",
        }
    }
}

/// Issues and validates session tokens with a single server secret.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &SigningSecret, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Lifetime of tokens produced by this codec.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token valid from now for the configured lifetime.
    pub fn issue(&self, user_id: i64, role: Role) -> Result<String, CodecError> {
        self.issue_at(user_id, role, now_secs())
    }

    /// Issue a token with an explicit issued-at timestamp (seconds since epoch).
    pub fn issue_at(&self, user_id: i64, role: Role, issued_at: u64) -> Result<String, CodecError> {
        let claims = Claims {
            user_id,
            role,
            iat: issued_at,
            exp: issued_at.saturating_add(self.ttl.as_secs()),
        };

        debug!(user_id, role = %role, exp = claims.exp, "Issuing token");

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| CodecError::Encoding(e.to_string()))
    }

    /// Parse and verify a token.
    ///
    /// Order: algorithm, then expiry, then signature.
    pub fn verify(&self, token: &str) -> Result<Claims, CodecError> {
        let header = decode_header(token).map_err(|_| CodecError::Malformed)?;
        if !ACCEPTED_ALGORITHMS.contains(&header.alg) {
            return Err(CodecError::Malformed);
        }

        let mut unverified = Validation::new(header.alg);
        unverified.insecure_disable_signature_validation();
        unverified.leeway = 0;
        decode::<Claims>(token, &self.decoding_key, &unverified).map_err(classify)?;

        let mut validation = Validation::new(header.alg);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(classify)?;

        Ok(data.claims)
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> CodecError {
    match err.kind() {
        ErrorKind::ExpiredSignature => CodecError::Expired,
        ErrorKind::InvalidSignature => CodecError::BadSignature,
        _ => CodecError::Malformed,
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
