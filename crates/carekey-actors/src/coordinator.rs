//! Session coordinator: the three-party handshake.
//!
//! Establishing a working session crosses three actors: the facility
//! opens its side, the professional opens its side, and, when data access
//! is requested, the owner issues a grant that is attached to both sides.
//! The coordinator drives these steps in order and unwinds the sessions
//! it opened when a later step fails, so no half-attached session
//! survives a failed handshake.
//!
//! Every cross-actor step runs under a timeout; a wedged actor surfaces
//! as [`ActorError::Timeout`] instead of stalling the handshake forever.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use carekey_core::{AccessGrant, AccessScope, FacilityId, GrantId, OwnerId, ProfessionalId, SessionId};

use crate::error::{ActorError, Result};
use crate::owner::AccessDecision;
use crate::registry::ActorRegistry;

/// Default per-step timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// What a caller asks the coordinator to set up.
#[derive(Debug, Clone)]
pub struct HandshakeRequest {
    /// The professional opening the session.
    pub professional: ProfessionalId,
    /// The facility to open it with.
    pub facility: FacilityId,
    /// The facility behavior to run under.
    pub behavior: String,
    /// The professional persona to operate as.
    pub persona: String,
    /// Owner whose data is requested, if any.
    pub owner: Option<OwnerId>,
    /// Requested scope; requires `owner` to be set.
    pub scope: Option<AccessScope>,
}

/// A fully established session.
#[derive(Debug, Clone)]
pub struct EstablishedSession {
    /// The session id shared by both sides.
    pub session_id: SessionId,
    /// The professional side's actor.
    pub professional: ProfessionalId,
    /// The facility side's actor.
    pub facility: FacilityId,
    /// The grant attached to both sides, when access was requested.
    pub grant: Option<AccessGrant>,
}

/// Drives handshakes over a registry.
pub struct SessionCoordinator {
    registry: Arc<ActorRegistry>,
    call_timeout: Duration,
}

impl SessionCoordinator {
    /// Create a coordinator with the default per-step timeout.
    pub fn new(registry: Arc<ActorRegistry>) -> Self {
        Self {
            registry,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Override the per-step timeout.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// The backing registry.
    pub fn registry(&self) -> &Arc<ActorRegistry> {
        &self.registry
    }

    async fn step<T>(
        &self,
        name: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(step = name, "handshake step timed out");
                Err(ActorError::Timeout(name.to_string()))
            }
        }
    }

    /// Run the full handshake.
    ///
    /// Order: linkage check, facility side, professional side, then the
    /// optional grant negotiation with the owner. A pending approval is a
    /// failure here: the sessions are unwound and the caller retries once
    /// the owner resolves the request.
    pub async fn establish_session(
        &self,
        request: &HandshakeRequest,
        now_ms: i64,
    ) -> Result<EstablishedSession> {
        let links = self.registry.links();
        if !links.is_linked(&request.professional, &request.facility) {
            return Err(ActorError::NotLinked {
                professional: request.professional,
                facility: request.facility,
            });
        }

        let facility = self.registry.facility(&request.facility).await?;
        let professional = self.registry.professional(&request.professional).await?;

        let session_id = self
            .step("facility session", async {
                facility
                    .lock()
                    .await
                    .start_session(request.professional, &request.behavior, links, now_ms)
            })
            .await?;

        let opened = self
            .step("professional session", async {
                professional
                    .lock()
                    .await
                    .start_session(session_id, request.facility, &request.persona, links, now_ms)
            })
            .await;
        let displaced = match opened {
            Ok(displaced) => displaced,
            Err(err) => {
                // Unwind the facility side.
                let _ = facility.lock().await.end_session(session_id, now_ms);
                return Err(err);
            }
        };
        if let Some(prior) = displaced {
            // The professional's old session is gone; close its facility
            // side too, which may live at a different facility.
            if let Ok(prior_facility) = self.registry.facility(&prior.facility).await {
                let _ = prior_facility.lock().await.end_session(prior.id, now_ms);
            }
            info!(session = %prior.id, facility = %prior.facility, "displaced session settled at facility");
        }

        let mut grant = None;
        if let (Some(owner_id), Some(scope)) = (request.owner, request.scope.clone()) {
            match self
                .negotiate_grant(owner_id, request, scope, session_id, now_ms)
                .await
            {
                Ok(issued) => grant = Some(issued),
                Err(err) => {
                    let _ = facility.lock().await.end_session(session_id, now_ms);
                    let _ = professional.lock().await.end_session();
                    return Err(err);
                }
            }
        }

        info!(session = %session_id, professional = %request.professional, facility = %request.facility, granted = grant.is_some(), "session established");
        Ok(EstablishedSession {
            session_id,
            professional: request.professional,
            facility: request.facility,
            grant,
        })
    }

    async fn negotiate_grant(
        &self,
        owner_id: OwnerId,
        request: &HandshakeRequest,
        scope: AccessScope,
        session_id: SessionId,
        now_ms: i64,
    ) -> Result<AccessGrant> {
        let owner = self.registry.owner(&owner_id).await?;
        let professional = self.registry.professional(&request.professional).await?;
        let facility = self.registry.facility(&request.facility).await?;

        let professional_public = self
            .step("professional key", async {
                Ok(professional.lock().await.public_key())
            })
            .await?;

        let decision = self
            .step("owner request", async {
                owner.lock().await.request_access(
                    request.professional,
                    request.facility,
                    scope,
                    professional_public,
                    now_ms,
                )
            })
            .await?;

        let grant = match decision {
            AccessDecision::AutoApproved(grant) => grant,
            AccessDecision::Pending(request_id) => {
                return Err(ActorError::ApprovalPending { request_id });
            }
        };

        self.step("facility attach", async {
            facility.lock().await.attach_grant(session_id, grant.clone())
        })
        .await?;
        self.step("professional attach", async {
            professional.lock().await.attach_grant(grant.clone())
        })
        .await?;

        Ok(grant)
    }

    /// Attach an already-issued grant to a live session.
    ///
    /// Recovery path for pending approvals: after the owner resolves the
    /// request and a grant exists, the caller re-establishes a session
    /// without a scope and attaches the grant here. The grant is
    /// re-checked with the owner first, so a revoked or expired grant is
    /// never attached.
    pub async fn attach_grant(
        &self,
        owner_id: OwnerId,
        session: &EstablishedSession,
        grant_id: GrantId,
        now_ms: i64,
    ) -> Result<AccessGrant> {
        let owner = self.registry.owner(&owner_id).await?;
        let check = self
            .step("owner check", async {
                Ok(owner.lock().await.check_access(grant_id, now_ms))
            })
            .await?;
        let Some(grant) = check.grant else {
            return Err(ActorError::InvalidGrant(grant_id));
        };

        let facility = self.registry.facility(&session.facility).await?;
        let professional = self.registry.professional(&session.professional).await?;

        self.step("facility attach", async {
            facility
                .lock()
                .await
                .attach_grant(session.session_id, grant.clone())
        })
        .await?;
        self.step("professional attach", async {
            professional.lock().await.attach_grant(grant.clone())
        })
        .await?;

        Ok(grant)
    }

    /// Close both sides of a session. The attached grant stays with the
    /// owner.
    pub async fn end_session(
        &self,
        session: &EstablishedSession,
        now_ms: i64,
    ) -> Result<()> {
        let facility = self.registry.facility(&session.facility).await?;
        let professional = self.registry.professional(&session.professional).await?;

        self.step("facility end", async {
            facility
                .lock()
                .await
                .end_session(session.session_id, now_ms)
                .map(|_| ())
        })
        .await?;
        self.step("professional end", async {
            professional.lock().await.end_session().map(|_| ())
        })
        .await?;
        Ok(())
    }
}
