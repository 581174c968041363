//! Bearer token verification
//!
//! ID tokens are compact JWS strings (`header.payload.signature`, each part
//! base64url without padding) signed with HMAC-SHA256. Verification checks
//! the signature, algorithm, expiry, issue time, and the optional audience
//! and issuer.
//!
//! # Pure Functions
//!
//! Apart from the signing secret management at the bottom, this module has
//! no HTTP framework or database dependencies. The service wraps it with
//! Axum middleware.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sqlx::SqlitePool;

use crate::db::{load_setting, store_setting};

type HmacSha256 = Hmac<Sha256>;

/// Settings table key holding the signing secret
pub const SIGNING_SECRET_KEY: &str = "token_signing_secret";

/// Tolerated clock difference between token issuer and this server
pub const CLOCK_SKEW_LEEWAY_SECS: i64 = 60;

const TOKEN_ALGORITHM: &str = "HS256";
const MAX_TOKEN_LEN: usize = 8 * 1024;

// ========================================
// Error Types
// ========================================

/// Authentication error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiAuthError {
    /// No Authorization header on the request
    MissingHeader,

    /// Authorization header is not `Bearer <token>`
    InvalidHeader,

    /// Token is not three base64url JSON parts
    MalformedToken(String),

    /// Header names an algorithm other than HS256
    UnsupportedAlgorithm(String),

    /// Signature does not match
    InvalidSignature,

    /// `exp` is in the past
    Expired { exp: i64, now: i64 },

    /// `iat` is in the future
    IssuedInFuture { iat: i64, now: i64 },

    /// `aud` does not contain the configured audience
    InvalidAudience,

    /// `iss` does not match the configured issuer
    InvalidIssuer,

    /// `sub` is missing or empty
    MissingSubject,

    /// Database error loading the signing secret
    DatabaseError(String),
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuthError::MissingHeader => write!(f, "Missing Authorization header"),
            ApiAuthError::InvalidHeader => write!(f, "Invalid Authorization header"),
            ApiAuthError::MalformedToken(reason) => write!(f, "Malformed token: {}", reason),
            ApiAuthError::UnsupportedAlgorithm(alg) => {
                write!(f, "Unsupported token algorithm: {}", alg)
            }
            ApiAuthError::InvalidSignature => write!(f, "Invalid token signature"),
            ApiAuthError::Expired { exp, now } => {
                write!(f, "Token expired at {} (now {})", exp, now)
            }
            ApiAuthError::IssuedInFuture { iat, now } => {
                write!(f, "Token issued in the future at {} (now {})", iat, now)
            }
            ApiAuthError::InvalidAudience => write!(f, "Token audience mismatch"),
            ApiAuthError::InvalidIssuer => write!(f, "Token issuer mismatch"),
            ApiAuthError::MissingSubject => write!(f, "Token has no subject"),
            ApiAuthError::DatabaseError(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl std::error::Error for ApiAuthError {}

// ========================================
// Token Types
// ========================================

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// `aud` may be a single string or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn contains(&self, expected: &str) -> bool {
        match self {
            Audience::One(aud) => aud == expected,
            Audience::Many(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

/// Claims carried by an ID token
///
/// Times are Unix epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// User id
    pub sub: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl TokenClaims {
    /// Claims for `uid` issued now and valid for `ttl_secs`
    pub fn new(uid: impl Into<String>, ttl_secs: i64) -> Self {
        let now = crate::time::now().timestamp();
        Self {
            sub: uid.into(),
            exp: now + ttl_secs,
            iat: Some(now),
            aud: None,
            iss: None,
            email: None,
        }
    }
}

/// Identity established by a verified token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub uid: String,
    pub email: Option<String>,
}

/// Verifies bearer tokens presented to the API
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<AuthenticatedUser, ApiAuthError>;
}

// ========================================
// Header Parsing
// ========================================

/// Extract the token from an `Authorization` header value
///
/// The scheme is matched case-insensitively.
///
/// # Examples
///
/// ```
/// use meterops_common::api::auth::parse_bearer;
///
/// assert_eq!(parse_bearer("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");
/// assert!(parse_bearer("Basic dXNlcjpwYXNz").is_err());
/// assert!(parse_bearer("Bearer ").is_err());
/// ```
pub fn parse_bearer(header_value: &str) -> Result<&str, ApiAuthError> {
    let (scheme, token) = header_value
        .trim()
        .split_once(' ')
        .ok_or(ApiAuthError::InvalidHeader)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ApiAuthError::InvalidHeader);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(ApiAuthError::InvalidHeader);
    }

    Ok(token)
}

// ========================================
// Signing and Verification
// ========================================

/// Sign `claims` into a compact token
///
/// # Examples
///
/// ```
/// use meterops_common::api::auth::{issue_token, HmacTokenVerifier, TokenClaims, TokenVerifier};
///
/// let secret = b"0123456789abcdef0123456789abcdef";
/// let token = issue_token(&TokenClaims::new("user-1", 3600), secret).unwrap();
///
/// let user = HmacTokenVerifier::new(secret.to_vec()).verify(&token).unwrap();
/// assert_eq!(user.uid, "user-1");
/// ```
pub fn issue_token(claims: &TokenClaims, secret: &[u8]) -> Result<String, ApiAuthError> {
    let header = TokenHeader {
        alg: TOKEN_ALGORITHM.to_string(),
        typ: Some("JWT".to_string()),
    };
    let header_json = serde_json::to_vec(&header)
        .map_err(|e| ApiAuthError::MalformedToken(e.to_string()))?;
    let claims_json = serde_json::to_vec(claims)
        .map_err(|e| ApiAuthError::MalformedToken(e.to_string()))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(claims_json)
    );
    let signature = sign(signing_input.as_bytes(), secret)?;

    Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
}

fn sign(input: &[u8], secret: &[u8]) -> Result<Vec<u8>, ApiAuthError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| ApiAuthError::MalformedToken(e.to_string()))?;
    mac.update(input);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// HMAC-SHA256 token verifier
#[derive(Clone)]
pub struct HmacTokenVerifier {
    secret: Vec<u8>,
    audience: Option<String>,
    issuer: Option<String>,
    leeway_secs: i64,
}

impl std::fmt::Debug for HmacTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacTokenVerifier")
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .field("leeway_secs", &self.leeway_secs)
            .finish_non_exhaustive()
    }
}

impl HmacTokenVerifier {
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            audience: None,
            issuer: None,
            leeway_secs: CLOCK_SKEW_LEEWAY_SECS,
        }
    }

    /// Require `aud` to contain `audience`
    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        self.audience = audience;
        self
    }

    /// Require `iss` to equal `issuer`
    pub fn with_issuer(mut self, issuer: Option<String>) -> Self {
        self.issuer = issuer;
        self
    }

    /// Verify `token` against a fixed clock (epoch seconds)
    pub fn verify_at(&self, token: &str, now: i64) -> Result<AuthenticatedUser, ApiAuthError> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(ApiAuthError::MalformedToken("token too long".to_string()));
        }

        let mut parts = token.split('.');
        let (header_part, claims_part, signature_part) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(h), Some(c), Some(s), None) => (h, c, s),
                _ => {
                    return Err(ApiAuthError::MalformedToken(
                        "expected three dot-separated parts".to_string(),
                    ))
                }
            };

        let header: TokenHeader = decode_part(header_part)?;
        if header.alg != TOKEN_ALGORITHM {
            return Err(ApiAuthError::UnsupportedAlgorithm(header.alg));
        }

        // Signature before claims: nothing from an unsigned payload is trusted
        let signature = URL_SAFE_NO_PAD
            .decode(signature_part)
            .map_err(|e| ApiAuthError::MalformedToken(e.to_string()))?;
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| ApiAuthError::MalformedToken(e.to_string()))?;
        mac.update(header_part.as_bytes());
        mac.update(b".");
        mac.update(claims_part.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| ApiAuthError::InvalidSignature)?;

        let claims: TokenClaims = decode_part(claims_part)?;

        if claims.exp + self.leeway_secs <= now {
            return Err(ApiAuthError::Expired {
                exp: claims.exp,
                now,
            });
        }

        if let Some(iat) = claims.iat {
            if iat - self.leeway_secs > now {
                return Err(ApiAuthError::IssuedInFuture { iat, now });
            }
        }

        if let Some(expected) = &self.audience {
            match &claims.aud {
                Some(aud) if aud.contains(expected) => {}
                _ => return Err(ApiAuthError::InvalidAudience),
            }
        }

        if let Some(expected) = &self.issuer {
            if claims.iss.as_deref() != Some(expected.as_str()) {
                return Err(ApiAuthError::InvalidIssuer);
            }
        }

        if claims.sub.trim().is_empty() {
            return Err(ApiAuthError::MissingSubject);
        }

        Ok(AuthenticatedUser {
            uid: claims.sub,
            email: claims.email,
        })
    }
}

impl TokenVerifier for HmacTokenVerifier {
    fn verify(&self, token: &str) -> Result<AuthenticatedUser, ApiAuthError> {
        self.verify_at(token, crate::time::now().timestamp())
    }
}

fn decode_part<T: serde::de::DeserializeOwned>(part: &str) -> Result<T, ApiAuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|e| ApiAuthError::MalformedToken(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ApiAuthError::MalformedToken(e.to_string()))
}

// ========================================
// Signing Secret Management
// ========================================

/// Load the signing secret from the settings table, generating and storing
/// one on first use
pub async fn load_signing_secret(db: &SqlitePool) -> Result<String, ApiAuthError> {
    let stored = load_setting(db, SIGNING_SECRET_KEY)
        .await
        .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    match stored {
        Some(secret) if !secret.is_empty() => Ok(secret),
        _ => initialize_signing_secret(db).await,
    }
}

/// Generate a random 256-bit secret and store it
pub async fn initialize_signing_secret(db: &SqlitePool) -> Result<String, ApiAuthError> {
    let secret = {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    };

    store_setting(db, SIGNING_SECRET_KEY, &secret)
        .await
        .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    Ok(secret)
}

// ========================================
// Tests
// ========================================
