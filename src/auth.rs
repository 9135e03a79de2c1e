//! Connection authentication.
//!
//! A client presents a bearer credential at connection establishment: an
//! HMAC-SHA256 signed token of the form
//! `base64url(claims-json) "." base64url(mac)`. The [`Authenticator`]
//! verifies the signature in constant time, checks expiry, and resolves the
//! referenced identity in the identity store. Any failure refuses the
//! connection before state is created.

use crate::db::{Database, DbError};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Authentication errors. All refuse the connection pre-registration.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credential")]
    MissingCredential,
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("unknown identity: {0}")]
    UnknownIdentity(String),
    #[error("identity store unavailable: {0}")]
    Store(#[from] DbError),
}

impl AuthError {
    /// Static error code for logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::Malformed => "malformed_token",
            Self::BadSignature => "bad_signature",
            Self::Expired => "token_expired",
            Self::UnknownIdentity(_) => "unknown_identity",
            Self::Store(_) => "store_unavailable",
        }
    }
}

/// A verified user principal, attached to the connection after
/// authentication succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub display_name: String,
    pub role: String,
}

/// Signed token claims. Display name and role are resolved from the
/// identity store, not trusted from the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Identity id the token was issued for.
    pub sub: String,
    /// Expiry as a Unix timestamp.
    pub exp: i64,
}

/// Sign a token for the given claims.
///
/// Token issuance lives in the session service; this mirror of its signing
/// scheme is used by operator tooling and tests.
pub fn sign_token(secret: &str, claims: &Claims) -> String {
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::to_vec(claims).unwrap_or_default(),
    );
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    let sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    format!("{}.{}", payload, sig)
}

/// Verify signature and expiry, returning the embedded claims.
fn verify_token(secret: &str, token: &str) -> Result<Claims, AuthError> {
    let (payload, sig) = token.split_once('.').ok_or(AuthError::Malformed)?;

    let presented = URL_SAFE_NO_PAD
        .decode(sig.as_bytes())
        .map_err(|_| AuthError::Malformed)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    let expected = mac.finalize().into_bytes();

    let matches: bool = presented.ct_eq(expected.as_slice()).into();
    if !matches {
        return Err(AuthError::BadSignature);
    }

    let claims_bytes = URL_SAFE_NO_PAD
        .decode(payload.as_bytes())
        .map_err(|_| AuthError::Malformed)?;
    let claims: Claims =
        serde_json::from_slice(&claims_bytes).map_err(|_| AuthError::Malformed)?;

    if claims.exp <= Utc::now().timestamp() {
        return Err(AuthError::Expired);
    }

    Ok(claims)
}

/// Verifies bearer credentials against the signing secret and the identity
/// store.
pub struct Authenticator {
    secret: String,
    db: Database,
}

impl Authenticator {
    pub fn new(secret: impl Into<String>, db: Database) -> Self {
        Self {
            secret: secret.into(),
            db,
        }
    }

    /// Authenticate a credential, producing the verified identity.
    ///
    /// The identity's display name and role come from the store; the token
    /// only proves which identity the bearer is.
    pub async fn authenticate(&self, credential: Option<&str>) -> Result<Identity, AuthError> {
        let token = credential.ok_or(AuthError::MissingCredential)?;
        let claims = verify_token(&self.secret, token)?;

        let row = self
            .db
            .fetch_identity(&claims.sub)
            .await?
            .ok_or_else(|| AuthError::UnknownIdentity(claims.sub.clone()))?;

        Ok(Identity {
            id: row.id,
            display_name: row.display_name,
            role: row.role,
        })
    }
}
