//! Background expiry sweeper.
//!
//! Complements the lazy revoke-on-check path: grants nobody checks still
//! get revoked and audited within one sweep interval. Both paths share
//! the same strict expiry rule, so they always agree.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use carekey_actors::ActorRegistry;
use carekey_core::Clock;

/// Revoke expired grants on every registered owner. Returns the total
/// swept.
pub async fn sweep_all(registry: &ActorRegistry, now_ms: i64) -> usize {
    let mut swept = 0;
    for id in registry.owner_ids().await {
        if let Ok(handle) = registry.owner(&id).await {
            swept += handle.lock().await.sweep(now_ms);
        }
    }
    swept
}

/// Handle to a running sweeper task.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal shutdown and wait for the task to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Spawn a periodic sweeper over a registry.
pub fn spawn_sweeper(
    registry: Arc<ActorRegistry>,
    clock: Arc<dyn Clock>,
    interval: Duration,
) -> SweeperHandle {
    let (shutdown, mut shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so a fresh broker
        // does not sweep before anything can expire.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let swept = sweep_all(&registry, clock.now_millis()).await;
                    if swept > 0 {
                        info!(swept, "expiry sweep revoked grants");
                    } else {
                        debug!("expiry sweep found nothing to revoke");
                    }
                }
                _ = shutdown_rx.changed() => {
                    debug!("sweeper shutting down");
                    break;
                }
            }
        }
    });
    SweeperHandle { shutdown, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carekey_actors::OwnerActor;
    use carekey_core::{
        AccessAction, AccessScope, DataCategory, FacilityId, ManualClock, OwnerId, ProfessionalId,
    };
    use carekey_vault::X25519StaticSecret;

    async fn registry_with_grant(clock: &ManualClock) -> (Arc<ActorRegistry>, OwnerId) {
        let registry = Arc::new(ActorRegistry::new());
        let id = OwnerId::from_bytes([1; 32]);
        let mut owner = OwnerActor::new(id, 100);
        owner
            .setup(X25519StaticSecret::generate(), b"wrapped".to_vec())
            .unwrap();
        owner
            .grant_access(
                ProfessionalId::from_bytes([2; 32]),
                FacilityId::from_bytes([3; 32]),
                AccessScope::new(
                    [DataCategory::Exams],
                    [AccessAction::Read],
                    60,
                    "routine follow-up",
                )
                .unwrap(),
                X25519StaticSecret::generate().public_key(),
                clock.now_millis(),
            )
            .unwrap();
        registry.insert_owner(owner).await;
        (registry, id)
    }

    #[tokio::test]
    async fn test_sweep_all_revokes_expired() {
        let clock = ManualClock::at(0);
        let (registry, id) = registry_with_grant(&clock).await;

        assert_eq!(sweep_all(&registry, 60_000).await, 0);
        assert_eq!(sweep_all(&registry, 60_001).await, 1);

        let owner = registry.owner(&id).await.unwrap();
        assert!(owner.lock().await.list_active_grants(60_001).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_sweeper_runs_on_interval() {
        let clock = ManualClock::at(0);
        let (registry, id) = registry_with_grant(&clock).await;

        let handle = spawn_sweeper(
            registry.clone(),
            Arc::new(clock.clone()),
            Duration::from_secs(30),
        );

        // Move simulated grant time past expiry, then let the ticker fire.
        clock.set(61_000);
        tokio::time::sleep(Duration::from_secs(31)).await;

        let owner = registry.owner(&id).await.unwrap();
        assert!(owner.lock().await.list_active_grants(61_000).is_empty());

        handle.stop().await;
    }
}
