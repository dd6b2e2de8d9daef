//! Session tokens and the extractors that read them
//!
//! Tokens are HS256 JWTs binding the user ID and email. The auth endpoints
//! read them from the session cookie with an `Authorization` header
//! fallback, the diary endpoints are header-only — the split mirrors how the
//! frontend talks to each group.

use axum::Extension;
use axum::RequestPartsExt;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::extract::cookie::Cookie;
use axum_extra::extract::cookie::CookieJar;
use axum_extra::extract::cookie::SameSite;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use chrono::Utc;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Validation;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::api::Error;
use crate::users::User;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "auth_token";

/// One lifetime for both the token claim and the cookie
///
/// The two are deliberately kept in sync, a cookie that outlives its token
/// only produces confusing 401s
const SESSION_TTL_SECONDS: i64 = 60 * 60 * 24;

/// The keys used for encoding/decoding JWT tokens
#[derive(Clone)]
pub struct JwtKeys {
    /// The encoding key
    encoding: EncodingKey,

    /// The decoding key
    decoding: DecodingKey,
}

impl JwtKeys {
    /// Create new encoding/decoding keys, derived from a secret
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// The JWT claims that identify a user
#[derive(Debug, Deserialize, Serialize)]
pub struct Claims {
    /// The user ID
    pub sub: Uuid,

    /// The email address at issuance
    pub email: String,

    /// Issued at, seconds since the epoch
    pub iat: i64,

    /// Expiry, seconds since the epoch
    pub exp: i64,
}

/// Generate a session token for a given user
pub fn issue_token(jwt_keys: &JwtKeys, user: &User) -> Result<String, Error> {
    use jsonwebtoken::Header;
    use jsonwebtoken::encode;

    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        iat: now,
        exp: now + SESSION_TTL_SECONDS,
    };

    encode(&Header::default(), &claims, &jwt_keys.encoding).map_err(Error::internal_server_error)
}

/// Verify a token and return its claims
///
/// Rejects a bad signature, an unexpected algorithm ("none" included) and an
/// expired token, all as 401
fn decode_token(jwt_keys: &JwtKeys, token: &str) -> Result<Claims, Error> {
    use jsonwebtoken::decode;

    let validation = Validation::new(Algorithm::HS256);

    decode::<Claims>(token, &jwt_keys.decoding, &validation)
        .map(|data| data.claims)
        .map_err(|_| Error::unauthorized("invalid token"))
}

/// The session cookie for a freshly issued token
pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .max_age(time::Duration::seconds(SESSION_TTL_SECONDS))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .build()
}

/// A removal cookie for logout
pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .build()
}

/// Claims taken from the `Authorization: Bearer` header only
///
/// The diary endpoints authenticate this way, the token alone settles the
/// caller's identity — no user lookup happens here
pub struct BearerClaims(pub Claims);

impl<S> FromRequestParts<S> for BearerClaims
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| Error::unauthorized("authorization header missing"))?;

        let jwt_keys = extension_jwt_keys(parts).await?;

        decode_token(&jwt_keys, bearer.token()).map(BearerClaims)
    }
}

/// Claims taken from the session cookie, falling back to the header
///
/// Used by the `/auth` endpoints, which serve both cookie-carrying browsers
/// and bearer-style API clients
pub struct SessionClaims(pub Claims);

impl<S> FromRequestParts<S> for SessionClaims
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = parts
            .extract::<CookieJar>()
            .await
            .map_err(|_| Error::internal_server_error("Could not read cookies"))?;

        let cookie_token = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|token| !token.is_empty());

        let token = match cookie_token {
            Some(token) => token,
            None => parts
                .extract::<TypedHeader<Authorization<Bearer>>>()
                .await
                .map(|TypedHeader(Authorization(bearer))| bearer.token().to_string())
                .map_err(|_| Error::unauthorized("missing token"))?,
        };

        let jwt_keys = extension_jwt_keys(parts).await?;

        decode_token(&jwt_keys, &token).map(SessionClaims)
    }
}

async fn extension_jwt_keys(parts: &mut Parts) -> Result<JwtKeys, Error> {
    let Extension(jwt_keys) = parts
        .extract::<Extension<JwtKeys>>()
        .await
        .map_err(|_| Error::internal_server_error("Could not get JWT keys"))?;

    Ok(jwt_keys)
}
