//! Session authentication
//!
//! Issues, verifies and revokes the signed session token that gates the
//! admin API.
//!
//! Token format: `base64url(header).base64url(claims).base64url(signature)`
//! where the signature is HMAC-SHA256 over the first two segments and the
//! claims carry `{sub, email, iat, exp}`. Tokens are stateless: logging out
//! only clears the cookie, so a copied token stays valid until `exp`.

use crate::config::{AuthConfig, MAX_SESSION_DAYS};
use crate::db::repositories::AdminUserRepository;
use crate::models::{Principal, Session, OVERRIDE_PRINCIPAL_ID};
use crate::services::password::{dummy_verify, verify_password};
use anyhow::{anyhow, Context};
use argon2::password_hash::rand_core::{OsRng, RngCore};
use chrono::{DateTime, Duration, Utc};
use data_encoding::BASE64URL_NOPAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Shortest accepted signing key, in bytes
pub const MIN_SIGNING_KEY_LEN: usize = 32;

/// Default session lifetime
pub const DEFAULT_SESSION_DAYS: i64 = 7;

const TOKEN_ALG: &str = "HS256";
const TOKEN_TYP: &str = "JWT";

/// Authenticator settings, built once at startup
#[derive(Clone)]
pub struct AuthSettings {
    pub override_email: Option<String>,
    pub override_password: Option<String>,
    signing_key: Vec<u8>,
    pub cookie_secure: bool,
    pub session_ttl: Duration,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("override_email", &self.override_email)
            .field("override_password", &self.override_password.as_ref().map(|_| "***"))
            .field("signing_key", &"***")
            .field("cookie_secure", &self.cookie_secure)
            .field("session_ttl", &self.session_ttl)
            .finish()
    }
}

impl AuthSettings {
    /// Settings with the given key, no override credential and a 7-day lifetime
    pub fn new(signing_key: impl Into<Vec<u8>>) -> Self {
        Self {
            override_email: None,
            override_password: None,
            signing_key: signing_key.into(),
            cookie_secure: false,
            session_ttl: Duration::days(DEFAULT_SESSION_DAYS),
        }
    }

    /// Build settings from configuration.
    ///
    /// A missing or short signing key is replaced with a random one; sessions
    /// then do not survive a restart.
    pub fn from_config(config: &AuthConfig) -> Self {
        let signing_key = match config.signing_key.as_deref() {
            Some(key) if key.len() >= MIN_SIGNING_KEY_LEN => key.as_bytes().to_vec(),
            Some(_) => {
                tracing::warn!(
                    "Signing key shorter than {} bytes, using a random per-process key",
                    MIN_SIGNING_KEY_LEN
                );
                random_key()
            }
            None => {
                tracing::warn!("No signing key configured, using a random per-process key");
                random_key()
            }
        };

        let session_days = if (1..=MAX_SESSION_DAYS).contains(&config.session_days) {
            config.session_days
        } else {
            tracing::warn!(
                "session_days {} outside 1..={}, using {}",
                config.session_days,
                MAX_SESSION_DAYS,
                DEFAULT_SESSION_DAYS
            );
            DEFAULT_SESSION_DAYS
        };

        Self {
            override_email: config.override_email.clone().filter(|e| !e.is_empty()),
            override_password: config.override_password.clone().filter(|p| !p.is_empty()),
            signing_key,
            cookie_secure: config.cookie_secure,
            session_ttl: Duration::days(session_days),
        }
    }

    /// Set the override credential pair
    pub fn with_override(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.override_email = Some(email.into());
        self.override_password = Some(password.into());
        self
    }

    /// Set the session lifetime
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }
}

fn random_key() -> Vec<u8> {
    let mut key = vec![0u8; MIN_SIGNING_KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}

/// Error types for authentication.
///
/// Messages are deliberately uninformative: callers never learn which check
/// failed.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Login rejected
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Missing, malformed, tampered or expired session
    #[error("Authentication required")]
    Unauthenticated,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    iat: i64,
    exp: i64,
}

/// A freshly signed token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Session authenticator
pub struct Authenticator {
    settings: AuthSettings,
    users: Arc<dyn AdminUserRepository>,
}

impl Authenticator {
    /// Create a new authenticator
    pub fn new(settings: AuthSettings, users: Arc<dyn AdminUserRepository>) -> Self {
        Self { settings, users }
    }

    /// Check credentials: the configured override pair first, then the
    /// persisted admin account.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        if let (Some(override_email), Some(override_password)) = (
            self.settings.override_email.as_deref(),
            self.settings.override_password.as_deref(),
        ) {
            let email_ok = override_email.as_bytes().ct_eq(email.as_bytes());
            let password_ok = override_password.as_bytes().ct_eq(password.as_bytes());
            if bool::from(email_ok & password_ok) {
                tracing::info!("Admin login via override credential: {}", email);
                return Ok(Principal::new(OVERRIDE_PRINCIPAL_ID, email));
            }
        }

        let user = self
            .users
            .get_by_email(email)
            .await
            .context("Failed to look up admin user")?;

        let Some(user) = user else {
            dummy_verify(password);
            tracing::warn!("Rejected admin login for {}", email);
            return Err(AuthError::InvalidCredentials);
        };

        if verify_password(password, &user.password_hash)? {
            tracing::info!("Admin login: {}", user.email);
            Ok(Principal::new(user.id.to_string(), user.email))
        } else {
            tracing::warn!("Rejected admin login for {}", email);
            Err(AuthError::InvalidCredentials)
        }
    }

    /// Sign a session token for `principal`, valid for the configured lifetime
    pub fn issue(&self, principal: &Principal) -> Result<IssuedToken, AuthError> {
        self.issue_at(principal, Utc::now())
    }

    /// [`issue`](Self::issue) with an explicit clock
    pub fn issue_at(&self, principal: &Principal, now: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        let expires_at = now
            .checked_add_signed(self.settings.session_ttl)
            .ok_or_else(|| anyhow!("Session expiry out of range"))?;
        let header = TokenHeader {
            alg: TOKEN_ALG.to_string(),
            typ: TOKEN_TYP.to_string(),
        };
        let claims = Claims {
            sub: principal.id.clone(),
            email: principal.email.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let header = serde_json::to_vec(&header).context("Failed to encode token header")?;
        let claims = serde_json::to_vec(&claims).context("Failed to encode token claims")?;
        let signing_input = format!(
            "{}.{}",
            BASE64URL_NOPAD.encode(&header),
            BASE64URL_NOPAD.encode(&claims)
        );
        let signature = self.mac(&signing_input)?.finalize().into_bytes();

        Ok(IssuedToken {
            token: format!("{}.{}", signing_input, BASE64URL_NOPAD.encode(&signature)),
            expires_at: DateTime::from_timestamp(expires_at.timestamp(), 0).unwrap_or(expires_at),
        })
    }

    /// Verify a token's signature and expiry
    pub fn verify(&self, token: &str) -> Result<Session, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// [`verify`](Self::verify) with an explicit clock
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Session, AuthError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::Unauthenticated);
        };

        let signature = BASE64URL_NOPAD
            .decode(signature_b64.as_bytes())
            .map_err(|_| AuthError::Unauthenticated)?;
        let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];
        self.mac(signing_input)?
            .verify_slice(&signature)
            .map_err(|_| AuthError::Unauthenticated)?;

        let header: TokenHeader = decode_segment(header_b64)?;
        if header.alg != TOKEN_ALG {
            return Err(AuthError::Unauthenticated);
        }
        let claims: Claims = decode_segment(claims_b64)?;

        let issued_at =
            DateTime::from_timestamp(claims.iat, 0).ok_or(AuthError::Unauthenticated)?;
        let expires_at =
            DateTime::from_timestamp(claims.exp, 0).ok_or(AuthError::Unauthenticated)?;

        let session = Session {
            principal: Principal::new(claims.sub, claims.email),
            issued_at,
            expires_at,
        };
        if session.is_expired_at(now) {
            return Err(AuthError::Unauthenticated);
        }
        Ok(session)
    }

    /// `Set-Cookie` value carrying `issued`
    pub fn session_cookie(&self, issued: &IssuedToken) -> String {
        let max_age = self.settings.session_ttl.num_seconds();
        self.cookie(&issued.token, max_age)
    }

    /// `Set-Cookie` value that makes the client drop its session
    pub fn revoke_cookie(&self) -> String {
        self.cookie("", 0)
    }

    fn cookie(&self, value: &str, max_age: i64) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            SESSION_COOKIE, value, max_age
        );
        if self.settings.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    fn mac(&self, signing_input: &str) -> Result<HmacSha256, AuthError> {
        let mut mac = HmacSha256::new_from_slice(&self.settings.signing_key)
            .map_err(|e| anyhow!("Invalid signing key: {}", e))?;
        mac.update(signing_input.as_bytes());
        Ok(mac)
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, AuthError> {
    let bytes = BASE64URL_NOPAD
        .decode(segment.as_bytes())
        .map_err(|_| AuthError::Unauthenticated)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::Unauthenticated)
}
