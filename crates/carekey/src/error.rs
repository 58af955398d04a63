//! Error types for the broker.

use carekey_actors::ActorError;
use carekey_core::{CoreError, GrantId, OwnerId};
use carekey_store::StoreError;
use carekey_vault::VaultError;
use thiserror::Error;

/// Errors that can occur during broker operations.
#[derive(Debug, Error)]
pub enum CareKeyError {
    /// Actor-layer error.
    #[error("actor error: {0}")]
    Actor(#[from] ActorError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Vault error.
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    /// No persisted state for the owner.
    #[error("owner not found in store: {0}")]
    OwnerNotFound(OwnerId),

    /// Concurrent persistence collided; retry with fresh state.
    #[error("persisted state for {actor} moved underneath us (version {existing})")]
    PersistenceConflict {
        /// Hex id of the actor whose record conflicted.
        actor: String,
        /// Version currently in the store.
        existing: u64,
    },

    /// The grant is not usable for the requested operation.
    #[error("grant is not valid: {0}")]
    InvalidGrant(GrantId),
}

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, CareKeyError>;
