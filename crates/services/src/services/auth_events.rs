//! Identity change events and the background provisioning listener.

use db::DBService;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use ts_rs::TS;

use super::provisioning::{IdentityDescriptor, ProfileProvisioner};

/// Event emitted whenever the identity provider's session state changes.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IdentityEvent {
    SignedIn(IdentityDescriptor),
    SignedOut { identity_id: String },
}

/// Broadcast stream of identity events. Cloneable handle; every subscriber
/// sees each event published after it subscribed.
#[derive(Debug, Clone)]
pub struct AuthEvents {
    tx: broadcast::Sender<IdentityEvent>,
}

impl AuthEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IdentityEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. A send with no live subscribers is not an error.
    pub fn publish(&self, event: IdentityEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Background service that provisions a profile for every sign-in event.
pub struct ProvisioningListener {
    db: DBService,
    rx: broadcast::Receiver<IdentityEvent>,
}

impl ProvisioningListener {
    /// Spawn the listener on the runtime. It runs until the event stream
    /// closes.
    pub fn spawn(db: DBService, events: &AuthEvents) -> tokio::task::JoinHandle<()> {
        let service = Self {
            db,
            rx: events.subscribe(),
        };
        tokio::spawn(async move {
            service.start().await;
        })
    }

    async fn start(mut self) {
        info!("starting provisioning listener");

        loop {
            match self.rx.recv().await {
                Ok(IdentityEvent::SignedIn(identity)) => {
                    match ProfileProvisioner::ensure_profile(&self.db.pool, &identity).await {
                        Ok(profile) => {
                            debug!(identity_id = %profile.id, "profile ensured for sign-in")
                        }
                        Err(e) => {
                            error!(
                                identity_id = %identity.id,
                                error = %e,
                                "provisioning failed for sign-in event"
                            )
                        }
                    }
                }
                Ok(IdentityEvent::SignedOut { identity_id }) => {
                    debug!(%identity_id, "identity signed out");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "identity event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }

        info!("identity event stream closed, provisioning listener stopping");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use db::models::profile::Profile;

    use super::*;

    fn identity(id: &str) -> IdentityDescriptor {
        IdentityDescriptor {
            id: id.to_string(),
            display_name: None,
            avatar_url: None,
            email: None,
        }
    }

    #[tokio::test]
    async fn sign_in_event_provisions_profile() {
        let db = DBService::new_in_memory().await.unwrap();
        let events = AuthEvents::default();
        let handle = ProvisioningListener::spawn(db.clone(), &events);

        events.publish(IdentityEvent::SignedIn(identity("u1")));

        let mut provisioned = None;
        for _ in 0..50 {
            if let Some(profile) = Profile::find_by_id(&db.pool, "u1").await.unwrap() {
                provisioned = Some(profile);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let profile = provisioned.expect("listener should have provisioned the profile");
        assert!(profile.trial_ends_at.is_some());
        assert!(!profile.is_subscribed);

        handle.abort();
    }

    #[tokio::test]
    async fn listener_stops_when_stream_closes() {
        let db = DBService::new_in_memory().await.unwrap();
        let events = AuthEvents::new(8);
        let handle = ProvisioningListener::spawn(db, &events);

        drop(events);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("listener should stop once the stream closes")
            .unwrap();
    }
}
