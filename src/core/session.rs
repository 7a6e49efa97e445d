use tracing::{debug, warn};

use crate::backend::{Identity, IdentityService, Session};

/// Read copy of the identity collaborator's current session.
///
/// Passed explicitly to whatever needs the signed-in identity; kept fresh by
/// feeding it every change notification from [`IdentityService::subscribe`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStore {
    session: Option<Session>,
}

impl SessionStore {
    /// Populate from the collaborator at startup. A failed lookup starts
    /// signed out.
    pub async fn load<I: IdentityService>(identity: &I) -> Self {
        let session = match identity.get_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!("Failed to restore session: {e:#}");
                None
            }
        };
        Self { session }
    }

    /// Apply a change notification. Returns `true` when the signed-in
    /// identity changed.
    pub fn apply(&mut self, session: Option<Session>) -> bool {
        let before = self.identity().map(|identity| identity.id);
        let after = session.as_ref().map(|s| s.identity.id);
        debug!(signed_in = after.is_some(), "Session updated");
        self.session = session;
        before != after
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(|s| &s.identity)
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }
}
