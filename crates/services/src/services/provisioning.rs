//! First-login profile provisioning.

use chrono::{DateTime, Duration, Utc};
use db::models::profile::{CreateProfile, Profile};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};
use ts_rs::TS;

/// Trial window granted to a newly provisioned profile, in days.
pub const TRIAL_PERIOD_DAYS: i64 = 15;

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Authenticated identity descriptor as supplied by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct IdentityDescriptor {
    pub id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub email: Option<String>,
}

pub struct ProfileProvisioner;

impl ProfileProvisioner {
    /// Guarantee a profile exists for `identity`, seeding the trial window on
    /// first sight.
    ///
    /// Idempotent: an existing profile is returned unmodified, and a create
    /// that races a concurrent first login for the same id resolves to the
    /// winner's row via the store's primary-key uniqueness constraint.
    pub async fn ensure_profile(
        pool: &SqlitePool,
        identity: &IdentityDescriptor,
    ) -> Result<Profile, ProvisioningError> {
        Self::ensure_profile_at(pool, identity, Utc::now()).await
    }

    pub async fn ensure_profile_at(
        pool: &SqlitePool,
        identity: &IdentityDescriptor,
        now: DateTime<Utc>,
    ) -> Result<Profile, ProvisioningError> {
        if let Some(existing) = Profile::find_by_id(pool, &identity.id).await? {
            debug!(identity_id = %existing.id, "profile already provisioned");
            return Ok(existing);
        }

        let data = CreateProfile {
            id: identity.id.clone(),
            display_name: identity.display_name.clone(),
            avatar_url: identity.avatar_url.clone(),
            trial_ends_at: Some(now + Duration::days(TRIAL_PERIOD_DAYS)),
            is_subscribed: false,
        };

        match Profile::create(pool, &data).await {
            Ok(profile) => {
                info!(
                    identity_id = %profile.id,
                    trial_ends_at = ?profile.trial_ends_at,
                    "provisioned new profile"
                );
                Ok(profile)
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                // Lost the race against a concurrent first login; the row
                // that won the insert is the profile.
                debug!(identity_id = %identity.id, "concurrent provisioning detected");
                Ok(Profile::find_by_id(pool, &identity.id)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?)
            }
            Err(e) => Err(e.into()),
        }
    }
}
