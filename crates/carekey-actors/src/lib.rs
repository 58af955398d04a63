//! Actor layer: owners, professionals, facilities, and the machinery
//! that connects them.
//!
//! Three actor kinds participate in every data access:
//!
//! - [`OwnerActor`]: issues, checks, and revokes grants over its own
//!   encrypted vault, and keeps the authoritative audit ledger.
//! - [`ProfessionalActor`]: operates under personas, one session at a
//!   time.
//! - [`FacilityActor`]: intermediates, running many concurrent sessions
//!   with its own ledger.
//!
//! The [`SessionCoordinator`] drives the three-party handshake over an
//! [`ActorRegistry`]; the [`GuardedLoop`] runs persona-constrained
//! model/tool execution behind [`Guardrail`] checks.
//!
//! Concurrency model: each actor lives behind its own async mutex, so
//! every operation on one actor is serialized while distinct actors
//! proceed in parallel. All time-dependent operations take an explicit
//! `now_ms`, keeping the layer deterministic under simulated clocks.

pub mod coordinator;
pub mod engine;
pub mod error;
pub mod facility;
pub mod guardrail;
pub mod linkage;
pub mod owner;
pub mod persona;
pub mod predicate;
pub mod professional;
pub mod registry;

pub use coordinator::{
    EstablishedSession, HandshakeRequest, SessionCoordinator, DEFAULT_CALL_TIMEOUT,
};
pub use engine::{
    GuardedLoop, LoopOutcome, LoopState, ModelClient, ModelReply, ToolCall, ToolExecutor,
    DEFAULT_MAX_ITERATIONS,
};
pub use error::{ActorError, Result};
pub use facility::{FacilityActor, FacilityConfig, FacilitySession};
pub use guardrail::{Guardrail, GuardrailContext, GuardrailDecision, GuardrailSet};
pub use linkage::LinkageIndex;
pub use owner::{AccessCheck, AccessDecision, OwnerActor, PendingRequest, EMERGENCY_MARKER};
pub use persona::Persona;
pub use predicate::{Predicate, PredicateContext, Value};
pub use professional::{ProfessionalActor, ProfessionalSession};
pub use registry::{ActorRegistry, Shared};
