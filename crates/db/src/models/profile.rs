use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

/// Persisted trial/subscription record for an authenticated identity.
///
/// `id` equals the identity provider's stable user id and never changes.
/// `trial_ends_at` is seeded once at creation and is never extended;
/// `is_subscribed` may be flipped later by the billing collaborator.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
pub struct Profile {
    pub id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub is_subscribed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub is_subscribed: bool,
}

/// Lifecycle phase of a profile's entitlement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntitlementPhase {
    Subscribed,
    Trial,
    Expired,
}

/// Derived access state for gated features. Never persisted; always computed
/// from a profile snapshot and a timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct EntitlementState {
    pub is_subscribed: bool,
    pub is_trial_active: bool,
    pub is_trial_expired: bool,
    pub remaining_trial_days: Option<i32>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub phase: EntitlementPhase,
}

impl EntitlementState {
    /// State for an identity with no profile (never provisioned, or the
    /// lookup failed). No profile means no access.
    pub fn denied() -> Self {
        Self {
            is_subscribed: false,
            is_trial_active: false,
            is_trial_expired: true,
            remaining_trial_days: Some(0),
            trial_ends_at: None,
            phase: EntitlementPhase::Expired,
        }
    }

    /// A feature is denied exactly when neither an active trial nor a
    /// subscription grants it.
    pub fn grants_access(&self) -> bool {
        self.is_trial_active || self.is_subscribed
    }
}

impl Profile {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(
            r#"SELECT id, display_name, avatar_url, trial_ends_at, is_subscribed, created_at, updated_at
               FROM profiles
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Insert-or-fail. A duplicate id surfaces as a database uniqueness
    /// violation; the provisioner treats that as "already provisioned".
    pub async fn create(pool: &SqlitePool, data: &CreateProfile) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Profile>(
            r#"INSERT INTO profiles (id, display_name, avatar_url, trial_ends_at, is_subscribed)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, display_name, avatar_url, trial_ends_at, is_subscribed, created_at, updated_at"#,
        )
        .bind(&data.id)
        .bind(&data.display_name)
        .bind(&data.avatar_url)
        .bind(data.trial_ends_at)
        .bind(data.is_subscribed)
        .fetch_one(pool)
        .await
    }

    /// Billing collaborator write path. Returns `None` when no profile with
    /// that id exists.
    pub async fn set_subscribed(
        pool: &SqlitePool,
        id: &str,
        is_subscribed: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(
            r#"UPDATE profiles
               SET is_subscribed = $2, updated_at = CURRENT_TIMESTAMP
               WHERE id = $1
               RETURNING id, display_name, avatar_url, trial_ends_at, is_subscribed, created_at, updated_at"#,
        )
        .bind(id)
        .bind(is_subscribed)
        .fetch_optional(pool)
        .await
    }
}
