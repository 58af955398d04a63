//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a fully wired three-actor
//! deployment on an in-memory store and a manual clock.

use std::sync::Arc;

use carekey::{CareKey, CareKeyConfig, FacilityConfig, HandshakeRequest};
use carekey_core::{
    AccessAction, AccessScope, DataCategory, FacilityId, ManualClock, OwnerId, ProfessionalId,
};
use carekey_store::MemoryStore;
use carekey_vault::X25519StaticSecret;

/// Default behavior enabled on the fixture facility.
pub const BEHAVIOR: &str = "triage";

/// Default persona registered on the fixture professional.
pub const PERSONA: &str = "diagnostics";

/// A wired broker with one owner, one linked professional, and one
/// facility.
pub struct TestDeployment {
    /// The broker under test.
    pub broker: CareKey<MemoryStore>,
    /// The simulated clock driving all expiry.
    pub clock: ManualClock,
    /// The registered owner.
    pub owner: OwnerId,
    /// The owner's unwrapped secret, for restore tests.
    pub owner_secret: X25519StaticSecret,
    /// The registered professional, linked to `facility`.
    pub professional: ProfessionalId,
    /// The registered facility with [`BEHAVIOR`] enabled.
    pub facility: FacilityId,
}

impl TestDeployment {
    /// Wire up a deployment. `emergency_access` controls the owner's
    /// auto-approval preference.
    pub async fn new(emergency_access: bool) -> Self {
        Self::with_seed([7; 32], emergency_access).await
    }

    /// Deterministic variant: the owner secret comes from `seed`.
    pub async fn with_seed(seed: [u8; 32], emergency_access: bool) -> Self {
        let clock = ManualClock::at(1_000_000);
        let broker = CareKey::new(
            MemoryStore::new(),
            Arc::new(clock.clone()),
            CareKeyConfig::default(),
        );

        let owner_secret = X25519StaticSecret::from_bytes(seed);
        let owner = broker
            .register_owner(
                "owner",
                owner_secret.clone(),
                b"wrapped-by-provider".to_vec(),
                emergency_access,
            )
            .await
            .expect("owner registration");

        let professional = broker
            .register_professional(
                "professional",
                X25519StaticSecret::generate().public_key(),
                "physician",
                vec!["board-cert".into()],
                vec![PERSONA.into()],
            )
            .await
            .expect("professional registration");

        let facility = broker
            .register_facility(
                "facility",
                &[11; 32],
                FacilityConfig {
                    name: "Riverside Clinic".into(),
                    location: "ward-2".into(),
                },
                vec![BEHAVIOR.into()],
            )
            .await
            .expect("facility registration");

        broker.link(professional, facility);

        Self {
            broker,
            clock,
            owner,
            owner_secret,
            professional,
            facility,
        }
    }

    /// A handshake request against the fixture actors.
    pub fn handshake(&self, scope: Option<AccessScope>) -> HandshakeRequest {
        HandshakeRequest {
            professional: self.professional,
            facility: self.facility,
            behavior: BEHAVIOR.into(),
            persona: PERSONA.into(),
            owner: scope.as_ref().map(|_| self.owner),
            scope,
        }
    }
}

/// A read-only scope over exams with the given duration and justification.
pub fn read_scope(duration_secs: u32, justification: &str) -> AccessScope {
    AccessScope::new(
        [DataCategory::Exams],
        [AccessAction::Read],
        duration_secs,
        justification,
    )
    .expect("valid scope")
}

/// A read/write scope over the given categories.
pub fn read_write_scope(
    categories: impl IntoIterator<Item = DataCategory>,
    duration_secs: u32,
    justification: &str,
) -> AccessScope {
    AccessScope::new(
        categories,
        [AccessAction::Read, AccessAction::Write],
        duration_secs,
        justification,
    )
    .expect("valid scope")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deployment_is_wired() {
        let deployment = TestDeployment::new(true).await;
        let session = deployment
            .broker
            .establish_session(&deployment.handshake(Some(read_scope(600, "EMERGENCY triage"))))
            .await
            .unwrap();
        assert!(session.grant.is_some());
    }
}
