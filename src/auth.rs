use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    clock::ClockState,
    config::{MAX_TOKEN_TTL_SECS, SigningSecret},
    error::{AuthError, Error, Result},
    observe::{Event, ObserverState},
    roles::Role,
};

/// Header carrying the access token on protected routes. `Authorization` is
/// not consulted.
pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";

/// Claims
///
/// Payload signed into every access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user id, as a decimal string per RFC 7519.
    pub sub: String,
    /// The account's role at the time of login.
    pub role: Role,
    /// Issued At (iat), seconds since the epoch.
    pub iat: i64,
    /// Expiration Time (exp), seconds since the epoch. Exclusive bound.
    pub exp: i64,
}

/// Principal
///
/// The identity recovered from a verified token. Rebuilt on every request and
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub subject_id: i64,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fails with `Forbidden` unless the principal holds `role`.
    pub fn require_role(&self, role: Role) -> Result<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(Error::Forbidden(format!("this action requires the {role} role")))
        }
    }

    /// Admins may act on anyone; everyone else only on themselves.
    pub fn require_self_or_admin(&self, subject_id: i64) -> Result<()> {
        if self.is_admin() || self.subject_id == subject_id {
            Ok(())
        } else {
            Err(Error::Forbidden(
                "you may only modify your own account".to_string(),
            ))
        }
    }
}

/// A freshly signed token and the instant it stops being accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// TokenIssuer
///
/// Signs access tokens with the shared secret. Stateless apart from its
/// read-only key material; cloning is cheap.
#[derive(Clone)]
pub struct TokenIssuer {
    key: Arc<EncodingKey>,
    ttl: Duration,
    observer: ObserverState,
}

impl TokenIssuer {
    /// Lifetimes above `MAX_TOKEN_TTL_SECS` are clamped to it.
    pub fn new(secret: &SigningSecret, ttl: std::time::Duration, observer: ObserverState) -> Self {
        let ttl = i64::try_from(ttl.as_secs().min(MAX_TOKEN_TTL_SECS))
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or_else(|| Duration::days(1));

        Self {
            key: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            ttl,
            observer,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// issue
    ///
    /// Produces a token valid over `[now, now + ttl)`, truncated to whole
    /// seconds. The role is checked against the registry again here even
    /// though callers normally pass a stored, already-valid role.
    pub fn issue(&self, subject_id: i64, role: &str, now: DateTime<Utc>) -> Result<IssuedToken> {
        let role: Role = role.parse()?;

        let iat = now.timestamp();
        let exp = iat
            .checked_add(self.ttl.num_seconds())
            .ok_or_else(|| Error::Internal(format!("token expiry for iat {iat} overflows")))?;
        let claims = Claims {
            sub: subject_id.to_string(),
            role,
            iat,
            exp,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| Error::Internal(format!("failed to sign access token: {e}")))?;

        let expires_at = DateTime::<Utc>::from_timestamp(exp, 0)
            .ok_or_else(|| Error::Internal(format!("token expiry {exp} is out of range")))?;

        self.observer.observe(&Event::TokenIssued { subject_id, role });

        Ok(IssuedToken { token, expires_at })
    }
}

/// TokenVerifier
///
/// The gate in front of every protected route. Decides once per request:
/// no token, bad token, or a `Principal`. It never writes anything.
#[derive(Clone)]
pub struct TokenVerifier {
    key: Arc<DecodingKey>,
    validation: Arc<Validation>,
    clock: ClockState,
    observer: ObserverState,
}

impl TokenVerifier {
    pub fn new(secret: &SigningSecret, clock: ClockState, observer: ObserverState) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock below, with no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            validation: Arc::new(validation),
            clock,
            observer,
        }
    }

    /// Verifies against the verifier's own clock.
    pub fn verify(&self, presented: Option<&str>) -> std::result::Result<Principal, AuthError> {
        self.verify_at(presented, self.clock.now())
    }

    /// verify_at
    ///
    /// 1. No token → `MissingCredential`.
    /// 2. Bad signature, malformed payload, unknown role, not yet valid or
    ///    `now >= exp` → `InvalidCredential`.
    /// 3. Otherwise the principal named in the payload.
    pub fn verify_at(
        &self,
        presented: Option<&str>,
        now: DateTime<Utc>,
    ) -> std::result::Result<Principal, AuthError> {
        let outcome = self.decide(presented, now);
        if let Err(reason) = outcome {
            self.observer.observe(&Event::CredentialRejected { reason });
        }
        outcome
    }

    fn decide(
        &self,
        presented: Option<&str>,
        now: DateTime<Utc>,
    ) -> std::result::Result<Principal, AuthError> {
        let token = match presented {
            Some(token) if !token.is_empty() => token,
            _ => return Err(AuthError::MissingCredential),
        };

        let claims = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|_| AuthError::InvalidCredential)?
            .claims;

        let now = now.timestamp();
        if now < claims.iat || now >= claims.exp {
            return Err(AuthError::InvalidCredential);
        }

        let subject_id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| AuthError::InvalidCredential)?;

        Ok(Principal {
            subject_id,
            role: claims.role,
        })
    }
}

/// Principal Extractor
///
/// Lets any handler take `Principal` as an argument. If the auth middleware
/// already verified this request the stored principal is reused; otherwise
/// the `x-access-token` header is verified here.
///
/// Rejection: `AuthError`, rendered as 403 (missing) or 401 (invalid).
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
    TokenVerifier: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(*principal);
        }

        let verifier = TokenVerifier::from_ref(state);

        let presented = match parts.headers.get(ACCESS_TOKEN_HEADER) {
            None => None,
            // A header that is not visible ASCII cannot be one of our tokens.
            Some(value) => Some(value.to_str().map_err(|_| AuthError::InvalidCredential)?),
        };

        let principal = verifier.verify(presented)?;
        parts.extensions.insert(principal);
        Ok(principal)
    }
}
