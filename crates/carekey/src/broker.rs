//! The CareKey broker: unified API over actors, vaults, and storage.
//!
//! The broker owns the registry, drives handshakes through the
//! coordinator, and persists each actor's state as a versioned record
//! after every mutation. Identity derivation, grant issuance, and
//! encryption all happen inside the component crates; this layer only
//! sequences them.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use carekey_actors::{
    ActorRegistry, EstablishedSession, FacilityActor, FacilityConfig, HandshakeRequest,
    OwnerActor, ProfessionalActor, SessionCoordinator,
};
use carekey_core::{
    AccessGrant, AuditEntry, Clock, DataCategory, FacilityId, GrantId, OwnerId, ProfessionalId,
    RequestId,
};
use carekey_store::{ActorKind, ActorRecord, ActorStore, PutResult, StoreError};
use carekey_vault::{X25519PublicKey, X25519StaticSecret};

use crate::config::CareKeyConfig;
use crate::error::{CareKeyError, Result};

/// Persisted professional profile.
#[derive(Debug, Serialize, Deserialize)]
struct ProfessionalBody {
    public_key: [u8; 32],
    role: String,
    credentials: Vec<String>,
    personas: Vec<String>,
}

fn cbor_encode<T: Serialize>(value: &T) -> Vec<u8> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).expect("CBOR serialization failed");
    buf
}

fn cbor_decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes)
        .map_err(|e| CareKeyError::Store(StoreError::Serialization(e.to_string())))
}

/// The main broker struct.
///
/// Generic over the storage backend, SQLite in deployments and in-memory
/// in tests.
pub struct CareKey<S: ActorStore> {
    store: Arc<S>,
    registry: Arc<ActorRegistry>,
    coordinator: SessionCoordinator,
    clock: Arc<dyn Clock>,
    config: CareKeyConfig,
}

impl<S: ActorStore> CareKey<S> {
    /// Create a broker over a store and a clock.
    pub fn new(store: S, clock: Arc<dyn Clock>, config: CareKeyConfig) -> Self {
        Self::with_shared_store(Arc::new(store), clock, config)
    }

    /// Create a broker over an already-shared store handle.
    pub fn with_shared_store(store: Arc<S>, clock: Arc<dyn Clock>, config: CareKeyConfig) -> Self {
        let registry = Arc::new(ActorRegistry::new());
        let coordinator =
            SessionCoordinator::new(registry.clone()).with_call_timeout(config.call_timeout);
        Self {
            store,
            registry,
            coordinator,
            clock,
            config,
        }
    }

    /// The actor registry.
    pub fn registry(&self) -> &Arc<ActorRegistry> {
        &self.registry
    }

    /// The storage backend.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// A cloneable handle to the storage backend.
    pub fn shared_store(&self) -> Arc<S> {
        self.store.clone()
    }

    /// The broker's current time in Unix milliseconds.
    pub fn now_ms(&self) -> i64 {
        self.clock.now_millis()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────

    /// Register an owner.
    ///
    /// `secret` is the unwrapped X25519 key from the external provider;
    /// `wrapped_private_key` is the provider's opaque wrapping, persisted
    /// as-is. The owner id is derived from the public key and the label.
    pub async fn register_owner(
        &self,
        label: &str,
        secret: X25519StaticSecret,
        wrapped_private_key: Vec<u8>,
        emergency_access: bool,
    ) -> Result<OwnerId> {
        let id = OwnerId::derive(secret.public_key().as_bytes(), label);
        let mut owner = OwnerActor::new(id, self.config.audit_cap);
        owner.setup(secret, wrapped_private_key)?;
        owner.set_emergency_access(emergency_access);

        let body = owner.snapshot();
        self.registry.insert_owner(owner).await;
        self.put_new(ActorRecord::new(*id.as_bytes(), ActorKind::Owner, body, self.now_ms()))
            .await?;
        info!(owner = %id, "owner registered");
        Ok(id)
    }

    /// Load a persisted owner into the registry.
    ///
    /// The secret never persists; the caller re-supplies it after the
    /// external provider unwraps the stored key material.
    pub async fn load_owner(&self, id: OwnerId, secret: X25519StaticSecret) -> Result<OwnerId> {
        let record = self
            .store
            .get_record(id.as_bytes())
            .await?
            .ok_or(CareKeyError::OwnerNotFound(id))?;
        let owner = OwnerActor::restore(&record.body, Some(secret))?;
        self.registry.insert_owner(owner).await;
        Ok(id)
    }

    /// Register a professional.
    pub async fn register_professional(
        &self,
        label: &str,
        public_key: X25519PublicKey,
        role: &str,
        credentials: Vec<String>,
        personas: Vec<String>,
    ) -> Result<ProfessionalId> {
        let id = ProfessionalId::derive(public_key.as_bytes(), label);
        let mut professional =
            ProfessionalActor::new(id, public_key, role, credentials.clone());
        for persona in &personas {
            professional.add_persona(persona.clone());
        }
        self.registry.insert_professional(professional).await;

        let body = cbor_encode(&ProfessionalBody {
            public_key: *public_key.as_bytes(),
            role: role.to_string(),
            credentials,
            personas,
        });
        self.put_new(ActorRecord::new(
            *id.as_bytes(),
            ActorKind::Professional,
            body,
            self.now_ms(),
        ))
        .await?;
        info!(professional = %id, role, "professional registered");
        Ok(id)
    }

    /// Register a facility.
    pub async fn register_facility(
        &self,
        label: &str,
        identity_key: &[u8; 32],
        config: FacilityConfig,
        behaviors: Vec<String>,
    ) -> Result<FacilityId> {
        let id = FacilityId::derive(identity_key, label);
        let mut facility = FacilityActor::new(id, config, self.config.audit_cap);
        for behavior in behaviors {
            facility.enable_behavior(behavior);
        }

        let body = facility.snapshot();
        self.registry.insert_facility(facility).await;
        self.put_new(ActorRecord::new(
            *id.as_bytes(),
            ActorKind::Facility,
            body,
            self.now_ms(),
        ))
        .await?;
        info!(facility = %id, "facility registered");
        Ok(id)
    }

    /// Load a persisted professional into the registry.
    pub async fn load_professional(&self, id: ProfessionalId) -> Result<ProfessionalId> {
        let record = self
            .store
            .get_record(id.as_bytes())
            .await?
            .ok_or_else(|| CareKeyError::Store(StoreError::NotFound(id.to_hex())))?;
        let body: ProfessionalBody = cbor_decode(&record.body)?;

        let mut professional = ProfessionalActor::new(
            id,
            X25519PublicKey::from_bytes(body.public_key),
            body.role,
            body.credentials,
        );
        for persona in body.personas {
            professional.add_persona(persona);
        }
        self.registry.insert_professional(professional).await;
        Ok(id)
    }

    /// Load a persisted facility into the registry, sessions and ledger
    /// included.
    pub async fn load_facility(&self, id: FacilityId) -> Result<FacilityId> {
        let record = self
            .store
            .get_record(id.as_bytes())
            .await?
            .ok_or_else(|| CareKeyError::Store(StoreError::NotFound(id.to_hex())))?;
        let facility = FacilityActor::restore(&record.body)?;
        self.registry.insert_facility(facility).await;
        Ok(id)
    }

    /// Establish a professional-facility linkage.
    pub fn link(&self, professional: ProfessionalId, facility: FacilityId) {
        self.registry.links().link(professional, facility);
    }

    /// Remove a linkage. Open sessions are unaffected; only new
    /// handshakes are refused.
    pub fn unlink(&self, professional: ProfessionalId, facility: FacilityId) -> bool {
        self.registry.links().unlink(professional, facility)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────

    /// Run the three-party handshake.
    pub async fn establish_session(
        &self,
        request: &HandshakeRequest,
    ) -> Result<EstablishedSession> {
        // A second handshake displaces the professional's prior session;
        // that session's facility mutates too and must be written back.
        let prior_facility = match self.registry.professional(&request.professional).await {
            Ok(handle) => {
                let guard = handle.lock().await;
                guard.session().map(|s| s.facility)
            }
            Err(_) => None,
        };

        let outcome = self
            .coordinator
            .establish_session(request, self.now_ms())
            .await;
        // The owner mutates even on failure: a pending approval parks a
        // request that must survive a restart.
        if let Some(owner) = request.owner {
            if self.registry.owner(&owner).await.is_ok() {
                self.persist_owner(&owner).await?;
            }
        }
        // The facility ledger mutates even on an unwound handshake.
        if self.registry.facility(&request.facility).await.is_ok() {
            self.persist_facility(&request.facility).await?;
        }
        if let Some(prior) = prior_facility {
            if prior != request.facility && self.registry.facility(&prior).await.is_ok() {
                self.persist_facility(&prior).await?;
            }
        }
        Ok(outcome?)
    }

    /// Close both sides of a session.
    pub async fn end_session(&self, session: &EstablishedSession) -> Result<()> {
        self.coordinator.end_session(session, self.now_ms()).await?;
        self.persist_facility(&session.facility).await
    }

    /// Resolve a parked access request with the owner.
    pub async fn resolve_pending(
        &self,
        owner: OwnerId,
        request_id: RequestId,
        approve: bool,
    ) -> Result<Option<AccessGrant>> {
        let handle = self.registry.owner(&owner).await?;
        let grant = handle
            .lock()
            .await
            .resolve_pending(request_id, approve, self.now_ms())?;
        self.persist_owner(&owner).await?;
        Ok(grant)
    }

    /// Attach a previously issued grant to a live session.
    pub async fn attach_grant(
        &self,
        owner: OwnerId,
        session: &EstablishedSession,
        grant_id: GrantId,
    ) -> Result<AccessGrant> {
        let outcome = self
            .coordinator
            .attach_grant(owner, session, grant_id, self.now_ms())
            .await;
        // The validity check may have lazily revoked an expired grant;
        // that audit entry must survive a restart even when the attach
        // itself fails.
        if self.registry.owner(&owner).await.is_ok() {
            self.persist_owner(&owner).await?;
        }
        let grant = outcome?;
        self.persist_facility(&session.facility).await?;
        Ok(grant)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Grants and data
    // ─────────────────────────────────────────────────────────────────────

    /// Explicitly revoke a grant.
    pub async fn revoke_access(
        &self,
        owner: OwnerId,
        grant_id: GrantId,
        reason: Option<String>,
    ) -> Result<()> {
        let handle = self.registry.owner(&owner).await?;
        handle
            .lock()
            .await
            .revoke_access(grant_id, reason, self.now_ms())?;
        self.persist_owner(&owner).await
    }

    /// Check grant validity with the owner.
    pub async fn check_access(&self, owner: OwnerId, grant_id: GrantId) -> Result<bool> {
        let handle = self.registry.owner(&owner).await?;
        let check = handle.lock().await.check_access(grant_id, self.now_ms());
        if !check.valid {
            // The check may have lazily revoked an expired grant.
            self.persist_owner(&owner).await?;
        }
        Ok(check.valid)
    }

    /// All grants currently valid for an owner.
    pub async fn list_active_grants(&self, owner: OwnerId) -> Result<Vec<AccessGrant>> {
        let handle = self.registry.owner(&owner).await?;
        let now = self.now_ms();
        let guard = handle.lock().await;
        Ok(guard.list_active_grants(now))
    }

    /// Read decrypted records through a grant.
    pub async fn read_data(
        &self,
        owner: OwnerId,
        grant_id: GrantId,
        categories: &[DataCategory],
    ) -> Result<BTreeMap<DataCategory, Vec<Vec<u8>>>> {
        let handle = self.registry.owner(&owner).await?;
        let data = handle
            .lock()
            .await
            .read_data(grant_id, categories, self.now_ms())?;
        self.persist_owner(&owner).await?;
        Ok(data)
    }

    /// Write a record through a grant.
    pub async fn write_data(
        &self,
        owner: OwnerId,
        grant_id: GrantId,
        category: DataCategory,
        payload: &[u8],
    ) -> Result<()> {
        let handle = self.registry.owner(&owner).await?;
        handle
            .lock()
            .await
            .write_data(grant_id, category, payload, self.now_ms())?;
        self.persist_owner(&owner).await
    }

    /// Recent entries from an owner's ledger, oldest first.
    pub async fn owner_audit_log(&self, owner: OwnerId, limit: usize) -> Result<Vec<AuditEntry>> {
        let handle = self.registry.owner(&owner).await?;
        let guard = handle.lock().await;
        Ok(guard.audit_log(limit))
    }

    /// Recent entries from a facility's ledger, oldest first.
    pub async fn facility_audit_log(
        &self,
        facility: FacilityId,
        limit: usize,
    ) -> Result<Vec<AuditEntry>> {
        let handle = self.registry.facility(&facility).await?;
        let guard = handle.lock().await;
        Ok(guard.audit_log(limit))
    }

    /// Revoke every expired grant across all registered owners.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let now = self.now_ms();
        let mut swept = 0;
        for id in self.registry.owner_ids().await {
            let handle = self.registry.owner(&id).await?;
            let count = handle.lock().await.sweep(now);
            if count > 0 {
                swept += count;
                self.persist_owner(&id).await?;
            }
        }
        Ok(swept)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────

    async fn put_new(&self, record: ActorRecord) -> Result<()> {
        match self.store.put_record(&record, Some(0)).await? {
            PutResult::VersionConflict { existing } => Err(CareKeyError::PersistenceConflict {
                actor: hex_id(&record.id),
                existing,
            }),
            _ => Ok(()),
        }
    }

    async fn persist_owner(&self, id: &OwnerId) -> Result<()> {
        let handle = self.registry.owner(id).await?;
        let body = handle.lock().await.snapshot();
        let now = self.now_ms();

        let record = match self.store.get_record(id.as_bytes()).await? {
            Some(existing) => existing.next(body, now),
            None => ActorRecord::new(*id.as_bytes(), ActorKind::Owner, body, now),
        };
        let expected = record.version - 1;

        match self.store.put_record(&record, Some(expected)).await? {
            PutResult::VersionConflict { existing } => Err(CareKeyError::PersistenceConflict {
                actor: id.to_hex(),
                existing,
            }),
            _ => Ok(()),
        }
    }

    async fn persist_facility(&self, id: &FacilityId) -> Result<()> {
        let handle = self.registry.facility(id).await?;
        let body = handle.lock().await.snapshot();
        let now = self.now_ms();

        let record = match self.store.get_record(id.as_bytes()).await? {
            Some(existing) => existing.next(body, now),
            None => ActorRecord::new(*id.as_bytes(), ActorKind::Facility, body, now),
        };
        let expected = record.version - 1;

        match self.store.put_record(&record, Some(expected)).await? {
            PutResult::VersionConflict { existing } => Err(CareKeyError::PersistenceConflict {
                actor: id.to_hex(),
                existing,
            }),
            _ => Ok(()),
        }
    }
}

fn hex_id(id: &[u8; 32]) -> String {
    id.iter().map(|b| format!("{b:02x}")).collect()
}
