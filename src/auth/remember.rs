use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::tokens;
use crate::db;
use crate::models::RememberToken;

pub const COOKIE_NAME: &str = "medboard_remember";

const SELECTOR_BYTES: usize = 12;
const VALIDATOR_BYTES: usize = 32;
const TTL_DAYS: i64 = 30;

/// A freshly issued selector/validator pair. The validator leaves the server
/// only inside the cookie; the database sees its hash.
#[derive(Debug, Clone)]
pub struct RememberPair {
    pub selector: String,
    pub validator: String,
}

impl RememberPair {
    pub fn generate() -> Self {
        Self {
            selector: tokens::generate(SELECTOR_BYTES),
            validator: tokens::generate(VALIDATOR_BYTES),
        }
    }

    pub fn cookie_value(&self) -> String {
        format!("{}:{}", self.selector, self.validator)
    }
}

/// Parse a `selector:validator` cookie value, rejecting anything malformed.
pub fn parse_cookie_value(value: &str) -> Option<(String, String)> {
    let (selector, validator) = value.split_once(':')?;
    if !tokens::is_hex_of_len(selector, SELECTOR_BYTES * 2) {
        return None;
    }
    if !tokens::is_hex_of_len(validator, VALIDATOR_BYTES * 2) {
        return None;
    }
    Some((selector.to_string(), validator.to_string()))
}

/// Create a token record for a user and return the pair plus its expiry.
pub async fn issue(
    pool: &PgPool,
    user_id: Uuid,
    user_agent: &str,
) -> Result<(RememberPair, DateTime<Utc>), sqlx::Error> {
    let pair = RememberPair::generate();
    let expires_at = Utc::now() + Duration::days(TTL_DAYS);
    db::remember_tokens::create(
        pool,
        user_id,
        &pair.selector,
        &tokens::hash(&pair.validator),
        &tokens::hash(user_agent),
        expires_at,
    )
    .await?;
    Ok((pair, expires_at))
}

/// Constant-time check of a presented validator and user-agent against a
/// stored record.
pub fn record_matches(record: &RememberToken, validator: &str, user_agent: &str) -> bool {
    let validator_ok = tokens::ct_eq(&tokens::hash(validator), &record.validator_hash);
    let agent_ok = tokens::ct_eq(&tokens::hash(user_agent), &record.user_agent_hash);
    validator_ok && agent_ok
}

pub fn cookie(pair: &RememberPair) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, pair.cookie_value()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::days(TTL_DAYS))
        .build()
}

pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(validator: &str, user_agent: &str) -> RememberToken {
        RememberToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            selector: tokens::generate(SELECTOR_BYTES),
            validator_hash: tokens::hash(validator),
            user_agent_hash: tokens::hash(user_agent),
            expires_at: Utc::now() + Duration::days(30),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn cookie_value_roundtrips() {
        let pair = RememberPair::generate();
        let (selector, validator) = parse_cookie_value(&pair.cookie_value()).unwrap();
        assert_eq!(selector, pair.selector);
        assert_eq!(validator, pair.validator);
    }

    #[test]
    fn malformed_cookie_values_are_rejected() {
        assert!(parse_cookie_value("").is_none());
        assert!(parse_cookie_value("no-delimiter").is_none());
        assert!(parse_cookie_value("short:short").is_none());
        // Wrong part order (validator-length selector)
        let pair = RememberPair::generate();
        let swapped = format!("{}:{}", pair.validator, pair.selector);
        assert!(parse_cookie_value(&swapped).is_none());
    }

    #[test]
    fn record_match_requires_both_hashes() {
        let rec = record("validator-secret", "Mozilla/5.0");
        assert!(record_matches(&rec, "validator-secret", "Mozilla/5.0"));
        assert!(!record_matches(&rec, "other-secret", "Mozilla/5.0"));
        assert!(!record_matches(&rec, "validator-secret", "curl/8.0"));
    }
}
