//! Turns the `Authorization` header into a verified [`Identity`].
//!
//! Two callers are accepted: the Telegram login widget (a signed JSON payload
//! checked with HMAC-SHA256 keyed by SHA256 of the bot token) and the bot
//! itself, which sends its token and names the user it acts for in
//! `X-Acting-User`. Core operations only ever see the resulting `Identity`.

use actix_web::{
    dev::Payload,
    http::header::{AsHeaderName, HeaderValue, AUTHORIZATION},
    http::StatusCode,
    web, FromRequest, HttpRequest, HttpResponse, ResponseError,
};
use chrono::{DateTime, Duration, Utc};
use futures::future::{ready, Ready};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::{AuthConfig, Config};
use crate::schemas::UserId;

type HmacSha256 = Hmac<Sha256>;

pub const ACTING_USER: &str = "X-Acting-User";

/// How far ahead of our clock a login's `auth_date` may be.
const CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationLevel {
    Bot,
    Frontend,
}

/// A caller whose credentials have already been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
    pub level: AuthorizationLevel,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    Missing,
    #[error("malformed authorization data")]
    Malformed,
    #[error("login signature does not match")]
    BadSignature,
    #[error("login data is older than allowed")]
    Expired,
    #[error("login data is dated in the future")]
    FromTheFuture,
    #[error("bot requests must set X-Acting-User")]
    MissingActingUser,
    #[error("authentication is not configured")]
    Unconfigured,
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Unconfigured => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": "unauthorized",
            "message": self.to_string(),
        }))
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TelegramAuthData {
    pub auth_date: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub id: i64,
    pub photo_url: Option<String>,
    pub username: Option<String>,
    pub hash: String,
}

impl TelegramAuthData {
    // Sorted `key=value` lines of every present field except the hash.
    fn data_check_string(&self) -> String {
        [
            ("auth_date", Some(self.auth_date.to_string())),
            ("first_name", self.first_name.clone()),
            ("id", Some(self.id.to_string())),
            ("last_name", self.last_name.clone()),
            ("photo_url", self.photo_url.clone()),
            ("username", self.username.clone()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| format!("{key}={v}")))
        .collect::<Vec<_>>()
        .join("\n")
    }

    fn display_name(&self) -> String {
        self.username
            .clone()
            .or_else(|| self.first_name.clone())
            .unwrap_or_else(|| self.id.to_string())
    }
}

fn login_mac(bot_token: &str) -> Result<HmacSha256, AuthError> {
    let secret = Sha256::digest(bot_token.as_bytes());
    HmacSha256::new_from_slice(&secret).map_err(|_| AuthError::Unconfigured)
}

/// Hex signature the login widget would attach to `data`.
pub fn sign_login(data: &TelegramAuthData, bot_token: &str) -> Result<String, AuthError> {
    let mut mac = login_mac(bot_token)?;
    mac.update(data.data_check_string().as_bytes());
    Ok(mac
        .finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

fn verify_login(
    data: &TelegramAuthData,
    config: &AuthConfig,
    now: DateTime<Utc>,
) -> Result<Identity, AuthError> {
    let hash = decode_hex(&data.hash).ok_or(AuthError::Malformed)?;
    let mut mac = login_mac(&config.bot_token)?;
    mac.update(data.data_check_string().as_bytes());
    mac.verify_slice(&hash).map_err(|_| AuthError::BadSignature)?;

    let signed_at = DateTime::from_timestamp(data.auth_date, 0).ok_or(AuthError::Malformed)?;
    if signed_at - now > Duration::seconds(CLOCK_SKEW_SECS) {
        return Err(AuthError::FromTheFuture);
    }
    if now - signed_at > config.max_age {
        return Err(AuthError::Expired);
    }
    Ok(Identity {
        user_id: UserId(data.id),
        username: data.display_name(),
        level: AuthorizationLevel::Frontend,
    })
}

pub fn authenticate(
    authorization: Option<&str>,
    acting_user: Option<&str>,
    config: &AuthConfig,
    now: DateTime<Utc>,
) -> Result<Identity, AuthError> {
    let authorization = authorization.ok_or(AuthError::Missing)?.trim();
    if authorization == config.bot_token {
        let user_id: UserId = acting_user
            .ok_or(AuthError::MissingActingUser)?
            .parse()
            .map_err(|_| AuthError::Malformed)?;
        return Ok(Identity {
            user_id,
            username: user_id.to_string(),
            level: AuthorizationLevel::Bot,
        });
    }
    let data: TelegramAuthData =
        serde_json::from_str(authorization).map_err(|_| AuthError::Malformed)?;
    verify_login(&data, config, now)
}

fn header<'a>(
    request: &'a HttpRequest,
    name: impl AsHeaderName,
) -> Result<Option<&'a str>, AuthError> {
    request
        .headers()
        .get(name)
        .map(HeaderValue::to_str)
        .transpose()
        .map_err(|_| AuthError::Malformed)
}

fn identify(request: &HttpRequest) -> Result<Identity, AuthError> {
    let config = request
        .app_data::<web::Data<Config>>()
        .ok_or(AuthError::Unconfigured)?;
    authenticate(
        header(request, AUTHORIZATION)?,
        header(request, ACTING_USER)?,
        &config.auth,
        Utc::now(),
    )
}

impl FromRequest for Identity {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(request: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(identify(request).map_err(Into::into))
    }
}
