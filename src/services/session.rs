//! Session → principal resolution.
//!
//! [`resolve_principal`] turns a session into a [`Principal`] by looking up
//! the account's membership joined to its firm. [`SessionResolver`] keeps a
//! single [`SessionState`] slot current for a user agent: it follows the
//! identity provider's change notifications and is the only writer of the
//! slot; everything else reads it through a [`SessionHandle`].

use std::sync::{Arc, Mutex};

use tokio::{
    sync::{broadcast::error::RecvError, watch},
    task::{JoinHandle, JoinSet},
};
use tracing::{debug, warn};

use crate::{
    db::store::{MembershipStore, StoreResult},
    models::{auth::Session, principal::Principal},
    services::identity::IdentityProvider,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// A session exists and its principal lookup is in flight.
    Resolving,
    Unauthenticated,
    Resolved(Principal),
}

impl SessionState {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            SessionState::Resolved(p) => Some(p),
            SessionState::Resolving | SessionState::Unauthenticated => None,
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self, SessionState::Resolving)
    }
}

/// `Ok(None)` when the account has no membership.
pub async fn resolve_principal(
    memberships: &dyn MembershipStore,
    session: &Session,
) -> StoreResult<Option<Principal>> {
    let Some(membership) = memberships.find_for_account(session.account_id).await? else {
        return Ok(None);
    };

    let (tenant_name, tenant_slug) = match membership.firm {
        Some(firm) => (Some(firm.name), Some(firm.slug)),
        None => (None, None),
    };

    Ok(Some(Principal {
        id: session.account_id,
        email: session.email.clone(),
        role: membership.role,
        tenant_name,
        tenant_slug,
    }))
}

/// Lookup outcome as a settled state: failures and missing memberships
/// both mean "no profile".
async fn settle(memberships: &dyn MembershipStore, session: &Session) -> SessionState {
    match resolve_principal(memberships, session).await {
        Ok(Some(principal)) => SessionState::Resolved(principal),
        Ok(None) => {
            warn!(account = %session.account_id, "no membership for signed-in account");
            SessionState::Unauthenticated
        }
        Err(e) => {
            warn!(account = %session.account_id, "principal lookup failed: {e}");
            SessionState::Unauthenticated
        }
    }
}

/// The state slot plus the generation of the latest session change.
/// A lookup may only publish if no newer change has arrived since it began.
struct Slot {
    tx: watch::Sender<SessionState>,
    generation: Mutex<u64>,
}

impl Slot {
    fn begin(&self, provisional: SessionState) -> u64 {
        let mut generation = self.generation.lock().unwrap_or_else(|e| e.into_inner());
        *generation += 1;
        self.tx.send_replace(provisional);
        *generation
    }

    fn publish(&self, generation: u64, state: SessionState) -> bool {
        let current = self.generation.lock().unwrap_or_else(|e| e.into_inner());
        if *current != generation {
            return false;
        }
        self.tx.send_replace(state);
        true
    }
}

pub struct SessionResolver {
    identity: Arc<dyn IdentityProvider>,
    memberships: Arc<dyn MembershipStore>,
    slot: Arc<Slot>,
    lookups: JoinSet<()>,
}

impl SessionResolver {
    /// Starts following `identity` and returns the read side of the slot.
    /// The slot starts out `Resolving` until the initial session is known.
    pub fn spawn(
        identity: Arc<dyn IdentityProvider>,
        memberships: Arc<dyn MembershipStore>,
    ) -> SessionHandle {
        let (tx, rx) = watch::channel(SessionState::Resolving);
        let resolver = SessionResolver {
            identity,
            memberships,
            slot: Arc::new(Slot { tx, generation: Mutex::new(0) }),
            lookups: JoinSet::new(),
        };
        let task = tokio::spawn(resolver.run());
        SessionHandle { rx, task }
    }

    async fn run(mut self) {
        // Subscribe before reading the initial session so no change slips between.
        let mut changes = self.identity.subscribe();
        let initial = self.identity.current_session().await;
        self.apply(initial);

        loop {
            tokio::select! {
                change = changes.recv() => match change {
                    Ok(change) => {
                        debug!(event = ?change.event, "session change");
                        self.apply(change.session);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("session resolver skipped {skipped} notifications, re-reading session");
                        let current = self.identity.current_session().await;
                        self.apply(current);
                    }
                    Err(RecvError::Closed) => break,
                },
                Some(joined) = self.lookups.join_next(), if !self.lookups.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            warn!("principal lookup panicked: {e}");
                        }
                    }
                }
            }
        }

        while self.lookups.join_next().await.is_some() {}
    }

    fn apply(&mut self, session: Option<Session>) {
        let Some(session) = session else {
            self.slot.begin(SessionState::Unauthenticated);
            return;
        };

        let generation = self.slot.begin(SessionState::Resolving);
        let slot = self.slot.clone();
        let memberships = self.memberships.clone();
        self.lookups.spawn(async move {
            let state = settle(memberships.as_ref(), &session).await;
            if !slot.publish(generation, state) {
                debug!(generation, "discarding stale principal lookup");
            }
        });
    }
}

/// Read side of the session slot. Dropping it stops the resolver and any
/// lookup still in flight.
pub struct SessionHandle {
    rx: watch::Receiver<SessionState>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn current(&self) -> SessionState {
        self.rx.borrow().clone()
    }

    /// A receiver that outlives this handle; it sees the channel close once
    /// the handle is dropped and the resolver has stopped.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.rx.clone()
    }

    /// Waits until the slot satisfies `predicate`. Returns the last known
    /// state if the resolver has stopped.
    pub async fn wait_for(&self, predicate: impl FnMut(&SessionState) -> bool) -> SessionState {
        let mut rx = self.subscribe();
        let result = rx.wait_for(predicate).await.map(|state| state.clone());
        match result {
            Ok(state) => state,
            Err(_) => self.current(),
        }
    }

    /// Waits until no lookup is in flight.
    pub async fn settled(&self) -> SessionState {
        self.wait_for(SessionState::is_settled).await
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
