//! The professional actor: role, credentials, personas, and the single
//! active session.
//!
//! A professional holds at most one session at a time. Starting a new
//! session implicitly closes the prior one and returns it so the caller
//! can settle the facility side.

use std::collections::BTreeSet;
use tracing::{debug, info};

use carekey_core::{AccessGrant, FacilityId, OwnerId, ProfessionalId, SessionId};
use carekey_vault::X25519PublicKey;

use crate::error::{ActorError, Result};
use crate::linkage::LinkageIndex;

/// The professional's side of an active session.
#[derive(Debug, Clone)]
pub struct ProfessionalSession {
    /// Session identifier, shared with the facility side.
    pub id: SessionId,
    /// The facility the session runs through.
    pub facility: FacilityId,
    /// The owner whose data is in play, once a grant is attached.
    pub owner: Option<OwnerId>,
    /// The attached grant, if any.
    pub grant: Option<AccessGrant>,
    /// The persona in effect.
    pub persona: String,
    /// When the session started (Unix milliseconds).
    pub started_at_ms: i64,
}

/// The professional actor.
pub struct ProfessionalActor {
    id: ProfessionalId,
    public_key: X25519PublicKey,
    role: String,
    credentials: Vec<String>,
    personas: BTreeSet<String>,
    session: Option<ProfessionalSession>,
}

impl ProfessionalActor {
    /// Create a professional with a role and credential list.
    pub fn new(
        id: ProfessionalId,
        public_key: X25519PublicKey,
        role: impl Into<String>,
        credentials: Vec<String>,
    ) -> Self {
        Self {
            id,
            public_key,
            role: role.into(),
            credentials,
            personas: BTreeSet::new(),
            session: None,
        }
    }

    /// The professional's identity.
    pub fn id(&self) -> ProfessionalId {
        self.id
    }

    /// The professional's X25519 public key.
    pub fn public_key(&self) -> X25519PublicKey {
        self.public_key
    }

    /// The declared role.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Declared credentials.
    pub fn credentials(&self) -> &[String] {
        &self.credentials
    }

    /// Replace the declared role.
    pub fn set_role(&mut self, role: impl Into<String>) {
        self.role = role.into();
    }

    /// Replace the credential list.
    pub fn set_credentials(&mut self, credentials: Vec<String>) {
        self.credentials = credentials;
    }

    /// Register a persona this professional can operate under.
    pub fn add_persona(&mut self, persona: impl Into<String>) {
        self.personas.insert(persona.into());
    }

    /// Replace the persona list wholesale. The active session keeps its
    /// persona; only future sessions see the new list.
    pub fn set_available_personas(&mut self, personas: Vec<String>) {
        self.personas = personas.into_iter().collect();
    }

    /// Whether a persona is registered.
    pub fn has_persona(&self, persona: &str) -> bool {
        self.personas.contains(persona)
    }

    /// The current session, if any.
    pub fn session(&self) -> Option<&ProfessionalSession> {
        self.session.as_ref()
    }

    /// Start a session with a facility under a persona.
    ///
    /// Requires an established linkage and a registered persona. If a
    /// session was already active it is closed and returned, so the
    /// facility side can be settled by the caller.
    pub fn start_session(
        &mut self,
        session_id: SessionId,
        facility: FacilityId,
        persona: &str,
        links: &LinkageIndex,
        now_ms: i64,
    ) -> Result<Option<ProfessionalSession>> {
        if !links.is_linked(&self.id, &facility) {
            return Err(ActorError::NotLinked {
                professional: self.id,
                facility,
            });
        }
        if !self.personas.contains(persona) {
            return Err(ActorError::PersonaNotAvailable(persona.to_string()));
        }

        let displaced = self.session.take();
        if let Some(prior) = &displaced {
            debug!(professional = %self.id, prior = %prior.id, "prior session displaced");
        }

        self.session = Some(ProfessionalSession {
            id: session_id,
            facility,
            owner: None,
            grant: None,
            persona: persona.to_string(),
            started_at_ms: now_ms,
        });
        info!(professional = %self.id, session = %session_id, facility = %facility, "session started");
        Ok(displaced)
    }

    fn active_session_mut(&mut self) -> Result<&mut ProfessionalSession> {
        self.session.as_mut().ok_or(ActorError::NoActiveSession)
    }

    /// Record the owner on the active session.
    pub fn attach_owner(&mut self, owner: OwnerId) -> Result<()> {
        self.active_session_mut()?.owner = Some(owner);
        Ok(())
    }

    /// Attach an issued grant to the active session.
    pub fn attach_grant(&mut self, grant: AccessGrant) -> Result<()> {
        let session = self.active_session_mut()?;
        session.owner = Some(grant.owner);
        session.grant = Some(grant);
        Ok(())
    }

    /// Detach the grant from the active session, if one is attached.
    pub fn detach_grant(&mut self) -> Result<Option<AccessGrant>> {
        let session = self.active_session_mut()?;
        session.owner = None;
        Ok(session.grant.take())
    }

    /// Switch the active session to another registered persona.
    pub fn switch_persona(&mut self, persona: &str) -> Result<()> {
        if !self.personas.contains(persona) {
            return Err(ActorError::PersonaNotAvailable(persona.to_string()));
        }
        self.active_session_mut()?.persona = persona.to_string();
        Ok(())
    }

    /// End the active session and return it.
    pub fn end_session(&mut self) -> Result<ProfessionalSession> {
        let session = self.session.take().ok_or(ActorError::NoActiveSession)?;
        info!(professional = %self.id, session = %session.id, "session ended");
        Ok(session)
    }
}
