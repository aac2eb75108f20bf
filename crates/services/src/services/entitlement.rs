//! Trial and subscription entitlement resolution.

use chrono::{DateTime, Utc};
use db::models::profile::{EntitlementPhase, EntitlementState, Profile};
use sqlx::SqlitePool;
use tracing::warn;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

pub struct EntitlementService;

impl EntitlementService {
    /// Map a profile snapshot and a timestamp to an entitlement state.
    ///
    /// Pure and total: an absent profile resolves to the fully denied state,
    /// a subscription overrides any trial data, and a missing trial window
    /// counts as an expired one.
    pub fn resolve(profile: Option<&Profile>, now: DateTime<Utc>) -> EntitlementState {
        let Some(profile) = profile else {
            return EntitlementState::denied();
        };

        if profile.is_subscribed {
            return EntitlementState {
                is_subscribed: true,
                is_trial_active: false,
                is_trial_expired: false,
                remaining_trial_days: None,
                trial_ends_at: profile.trial_ends_at,
                phase: EntitlementPhase::Subscribed,
            };
        }

        let Some(trial_ends_at) = profile.trial_ends_at else {
            return EntitlementState::denied();
        };

        let remaining_ms = trial_ends_at.signed_duration_since(now).num_milliseconds();
        // Ceiling division: any partial day left counts as a whole remaining
        // day. The boundary instant itself yields zero and is expired.
        let remaining_days = ceil_div(remaining_ms, MS_PER_DAY);

        if remaining_days > 0 {
            EntitlementState {
                is_subscribed: false,
                is_trial_active: true,
                is_trial_expired: false,
                remaining_trial_days: Some(remaining_days as i32),
                trial_ends_at: Some(trial_ends_at),
                phase: EntitlementPhase::Trial,
            }
        } else {
            EntitlementState {
                is_subscribed: false,
                is_trial_active: false,
                is_trial_expired: true,
                remaining_trial_days: Some(0),
                trial_ends_at: Some(trial_ends_at),
                phase: EntitlementPhase::Expired,
            }
        }
    }

    /// Fetch the identity's profile and resolve its entitlement.
    ///
    /// A failed lookup is logged and resolved as an absent profile, so a
    /// transient backend error can only ever deny access, never grant it.
    pub async fn resolve_for_identity(
        pool: &SqlitePool,
        identity_id: &str,
        now: DateTime<Utc>,
    ) -> EntitlementState {
        match Profile::find_by_id(pool, identity_id).await {
            Ok(profile) => Self::resolve(profile.as_ref(), now),
            Err(e) => {
                warn!(
                    identity_id,
                    error = %e,
                    "profile lookup failed, resolving entitlement as denied"
                );
                EntitlementState::denied()
            }
        }
    }
}

fn ceil_div(n: i64, d: i64) -> i64 {
    n.div_euclid(d) + i64::from(n.rem_euclid(d) != 0)
}
