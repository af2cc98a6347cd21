// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unverified JWT claim reads — expiry scheduling and token inspection.
//
// Nothing here checks a signature. The remote service is the only party that
// can judge a token; these reads only decide *when* to ask it for a new one
// and what to show the user.

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use legible_core::error::{LegibleError, Result};
use serde::{Deserialize, Serialize};

/// Renew this long before the stated expiry.
pub const EXPIRY_BUFFER: TimeDelta = TimeDelta::minutes(5);

/// The claims Legible cares about. Unknown claims are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<f64>,
    #[serde(rename = "device-desc", default, skip_serializing_if = "Option::is_none")]
    pub device_desc: Option<String>,
    #[serde(rename = "device-id", default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<serde_json::Value>,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|secs| DateTime::from_timestamp(secs as i64, 0))
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.iat.and_then(|secs| DateTime::from_timestamp(secs as i64, 0))
    }

    /// Scopes as a display string, whether the token carries a string or a list.
    pub fn scopes_display(&self) -> String {
        match &self.scopes {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            _ => String::new(),
        }
    }
}

/// Decode the claim set of `token` WITHOUT verifying its signature.
///
/// This is a convenience read for expiry scheduling and display. It must never
/// be used to decide whether a token is trustworthy.
pub fn read_claims_unverified(token: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| LegibleError::Auth(format!("cannot read token claims: {e}")))
}

/// Which half of the credential a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// May legitimately carry no expiry.
    Device,
    /// Always carries an expiry; a missing one is treated as expired.
    User,
}

impl TokenKind {
    pub fn requires_expiry(&self) -> bool {
        matches!(self, Self::User)
    }
}

/// Whether `token` should be considered expired at `now`.
///
/// Empty or undecodable tokens are expired. A missing `exp` means "never
/// expires" for device tokens and "expired" for user tokens. Otherwise the
/// token is expired once fewer than `buffer` remain.
pub fn is_expired_at(token: &str, kind: TokenKind, now: DateTime<Utc>, buffer: TimeDelta) -> bool {
    if token.is_empty() {
        return true;
    }
    let Ok(claims) = read_claims_unverified(token) else {
        return true;
    };
    match claims.expires_at() {
        Some(exp) => exp - now <= buffer,
        None => kind.requires_expiry(),
    }
}

/// [`is_expired_at`] against the wall clock with the standard buffer.
pub fn is_expired(token: &str, kind: TokenKind) -> bool {
    is_expired_at(token, kind, Utc::now(), EXPIRY_BUFFER)
}

/// Expiry of `token`, if it has a readable one.
pub fn expiration(token: &str) -> Option<DateTime<Utc>> {
    read_claims_unverified(token).ok()?.expires_at()
}

/// Mask a secret for logs: first and last four characters only.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "****".into();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Summary state of a token as shown by `legible token info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Valid,
    /// Still usable but inside the renewal buffer.
    Expiring,
    Expired,
    NoExpiration,
    /// The claims could not be decoded.
    Invalid,
}

impl std::fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Valid => "valid",
            Self::Expiring => "expiring",
            Self::Expired => "expired",
            Self::NoExpiration => "no_expiration",
            Self::Invalid => "invalid",
        })
    }
}

/// Decoded, display-ready information about one token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub device_desc: String,
    pub device_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scopes: String,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Lifetime from issue to expiry, when both are known.
    pub valid_for: Option<String>,
    pub time_remaining: String,
    pub status: TokenStatus,
    pub token_length: usize,
    pub has_expiration: bool,
}

impl TokenInfo {
    /// Inspect `token` at the current time.
    pub fn inspect(token: &str, kind: TokenKind) -> Self {
        Self::inspect_at(token, kind, Utc::now())
    }

    pub fn inspect_at(token: &str, kind: TokenKind, now: DateTime<Utc>) -> Self {
        let mut info = TokenInfo {
            kind,
            device_desc: String::new(),
            device_id: String::new(),
            scopes: String::new(),
            issued_at: None,
            expires_at: None,
            valid_for: None,
            time_remaining: String::new(),
            status: TokenStatus::Invalid,
            token_length: token.len(),
            has_expiration: false,
        };

        let Ok(claims) = read_claims_unverified(token) else {
            return info;
        };

        info.device_desc = claims.device_desc.clone().unwrap_or_default();
        info.device_id = claims.device_id.clone().unwrap_or_default();
        info.scopes = claims.scopes_display();
        info.issued_at = claims.issued_at();
        info.expires_at = claims.expires_at();

        match info.expires_at {
            Some(exp) => {
                info.has_expiration = true;
                info.valid_for = info.issued_at.map(|iat| format_duration(exp - iat));
                let remaining = exp - now;
                if remaining <= TimeDelta::zero() {
                    info.time_remaining = "0s (expired)".into();
                    info.status = TokenStatus::Expired;
                } else {
                    info.time_remaining = format_duration(remaining);
                    info.status = if remaining <= EXPIRY_BUFFER {
                        TokenStatus::Expiring
                    } else {
                        TokenStatus::Valid
                    };
                }
            }
            None => {
                info.time_remaining = "indefinite".into();
                info.status = TokenStatus::NoExpiration;
            }
        }
        info
    }
}

/// Compact human duration, e.g. `1d 2h 5m`. Negative spans render as `0s`.
pub fn format_duration(d: TimeDelta) -> String {
    if d <= TimeDelta::zero() {
        return "0s".into();
    }
    let total = d.num_seconds();
    let (days, hours, minutes, seconds) = (
        total / 86_400,
        (total / 3_600) % 24,
        (total / 60) % 60,
        total % 60,
    );

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{seconds}s"));
    }
    parts.join(" ")
}
