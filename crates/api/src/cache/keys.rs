//! Cache key derivation and per-namespace TTLs.
//!
//! Every function here is pure: the same semantic inputs always produce the
//! same key, so cache-aside lookups from different requests converge.

use std::time::Duration;

use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use agrisathi_core::FarmerId;

/// Prefix for cached farmer profiles.
pub const USER_PROFILE_PREFIX: &str = "user:profile:";
/// Prefix for cached general AI answers.
pub const AI_RESPONSE_PREFIX: &str = "ai:response:";
/// Prefix for cached weekly farming tips.
pub const WEEKLY_TIPS_PREFIX: &str = "ai:weekly-tips:";
/// Prefix for cached crop diagnoses.
pub const DIAGNOSIS_PREFIX: &str = "ai:diagnosis:";
/// Key of the static registration option lists.
pub const REGISTRATION_OPTIONS_KEY: &str = "registration:options";

/// Number of hex characters kept from the SHA-256 digest.
const SHORT_HASH_LEN: usize = 16;

/// Time-to-live for each cache namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    /// `user:profile:*`
    pub user_profile: Duration,
    /// `ai:response:*`
    pub ai_response: Duration,
    /// `registration:options`
    pub registration_options: Duration,
    /// `ai:weekly-tips:*` (the key itself rolls over weekly)
    pub weekly_tips: Duration,
    /// `ai:diagnosis:*`
    pub diagnosis: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            user_profile: Duration::from_secs(600),
            ai_response: Duration::from_secs(1800),
            registration_options: Duration::from_secs(3600),
            weekly_tips: Duration::from_secs(7 * 24 * 60 * 60),
            diagnosis: Duration::from_secs(1800),
        }
    }
}

/// `user:profile:<id>`
#[must_use]
pub fn user_profile_key(user_id: &FarmerId) -> String {
    format!("{USER_PROFILE_PREFIX}{user_id}")
}

/// `ai:response:<hash(question + profile)>`
///
/// Anonymous askers share a namespace distinct from any profile.
#[must_use]
pub fn ai_response_key<P: Serialize>(question: &str, profile: Option<&P>) -> String {
    let profile = profile
        .and_then(|p| serde_json::to_string(p).ok())
        .unwrap_or_else(|| "anonymous".to_string());
    format!("{AI_RESPONSE_PREFIX}{}", short_hash(&format!("{question}{profile}")))
}

/// `ai:weekly-tips:<id>:<iso year>-W<iso week>` for the given date.
///
/// Uses ISO-8601 week numbering, so the key rolls over every Monday and the
/// week of 29 Dec 2025 belongs to 2026-W01.
#[must_use]
pub fn weekly_tips_key_for(user_id: &FarmerId, date: NaiveDate) -> String {
    let week = date.iso_week();
    format!(
        "{WEEKLY_TIPS_PREFIX}{user_id}:{}-W{:02}",
        week.year(),
        week.week()
    )
}

/// `ai:weekly-tips:<id>:<current iso week>`
#[must_use]
pub fn weekly_tips_key(user_id: &FarmerId) -> String {
    weekly_tips_key_for(user_id, Utc::now().date_naive())
}

/// Pattern matching every weekly-tips key of one farmer.
#[must_use]
pub fn weekly_tips_pattern(user_id: &FarmerId) -> String {
    format!("{WEEKLY_TIPS_PREFIX}{user_id}:*")
}

/// `ai:diagnosis:<hash(description + crop type)>`
#[must_use]
pub fn diagnosis_key(description: &str, crop_type: Option<&str>) -> String {
    format!(
        "{DIAGNOSIS_PREFIX}{}",
        short_hash(&format!("{description}{}", crop_type.unwrap_or("")))
    )
}

/// `registration:options`
#[must_use]
pub const fn registration_options_key() -> &'static str {
    REGISTRATION_OPTIONS_KEY
}

/// First 16 hex characters of the SHA-256 digest.
fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(SHORT_HASH_LEN);
    hex
}
