//! In-process actor registry.
//!
//! Each actor lives behind its own `tokio::sync::Mutex`, so all
//! operations on one actor are serialized (single writer per actor)
//! while different actors proceed concurrently. The registry also owns
//! the shared linkage index.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use carekey_core::{FacilityId, OwnerId, ProfessionalId};

use crate::error::{ActorError, Result};
use crate::facility::FacilityActor;
use crate::linkage::LinkageIndex;
use crate::owner::OwnerActor;
use crate::professional::ProfessionalActor;

/// Shared handle to a registered actor.
pub type Shared<T> = Arc<Mutex<T>>;

/// Registry of all live actors plus the linkage index.
#[derive(Default)]
pub struct ActorRegistry {
    owners: RwLock<HashMap<OwnerId, Shared<OwnerActor>>>,
    professionals: RwLock<HashMap<ProfessionalId, Shared<ProfessionalActor>>>,
    facilities: RwLock<HashMap<FacilityId, Shared<FacilityActor>>>,
    links: Arc<LinkageIndex>,
}

impl ActorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared professional-facility linkage index.
    pub fn links(&self) -> &Arc<LinkageIndex> {
        &self.links
    }

    /// Register an owner, returning its shared handle.
    pub async fn insert_owner(&self, owner: OwnerActor) -> Shared<OwnerActor> {
        let id = owner.id();
        let handle = Arc::new(Mutex::new(owner));
        self.owners.write().await.insert(id, handle.clone());
        handle
    }

    /// Register a professional, returning its shared handle.
    pub async fn insert_professional(
        &self,
        professional: ProfessionalActor,
    ) -> Shared<ProfessionalActor> {
        let id = professional.id();
        let handle = Arc::new(Mutex::new(professional));
        self.professionals.write().await.insert(id, handle.clone());
        handle
    }

    /// Register a facility, returning its shared handle.
    pub async fn insert_facility(&self, facility: FacilityActor) -> Shared<FacilityActor> {
        let id = facility.id();
        let handle = Arc::new(Mutex::new(facility));
        self.facilities.write().await.insert(id, handle.clone());
        handle
    }

    /// Look up an owner.
    pub async fn owner(&self, id: &OwnerId) -> Result<Shared<OwnerActor>> {
        self.owners
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ActorError::ActorNotRegistered(id.to_hex()))
    }

    /// Look up a professional.
    pub async fn professional(&self, id: &ProfessionalId) -> Result<Shared<ProfessionalActor>> {
        self.professionals
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ActorError::ActorNotRegistered(id.to_hex()))
    }

    /// Look up a facility.
    pub async fn facility(&self, id: &FacilityId) -> Result<Shared<FacilityActor>> {
        self.facilities
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ActorError::ActorNotRegistered(id.to_hex()))
    }

    /// Ids of all registered owners.
    pub async fn owner_ids(&self) -> Vec<OwnerId> {
        self.owners.read().await.keys().copied().collect()
    }
}
