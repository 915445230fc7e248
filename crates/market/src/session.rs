//! Caller context threaded into every marketplace operation.

use common::UserId;
use serde::{Deserialize, Serialize};

use crate::error::MarketError;

/// What a signed-in caller may do beyond acting on their own behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    /// Marketplace operator: may list and manage any domain.
    Admin,
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: UserId,
    pub email: Option<String>,
    pub role: Role,
}

/// The identity on whose behalf an operation runs.
///
/// Built by the transport layer and passed explicitly; nothing in the
/// marketplace looks the current user up on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    caller: Option<Caller>,
}

impl Session {
    /// A session with no signed-in user.
    pub fn anonymous() -> Self {
        Self { caller: None }
    }

    pub fn user(user_id: UserId, email: Option<String>) -> Self {
        Self {
            caller: Some(Caller {
                user_id,
                email,
                role: Role::Member,
            }),
        }
    }

    pub fn admin(user_id: UserId, email: Option<String>) -> Self {
        Self {
            caller: Some(Caller {
                user_id,
                email,
                role: Role::Admin,
            }),
        }
    }

    pub fn caller(&self) -> Option<&Caller> {
        self.caller.as_ref()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.caller.as_ref().map(|c| c.user_id)
    }

    pub fn is_admin(&self) -> bool {
        matches!(
            self.caller,
            Some(Caller {
                role: Role::Admin,
                ..
            })
        )
    }

    /// Returns the caller or fails with `Unauthenticated`.
    pub fn require_user(&self) -> Result<&Caller, MarketError> {
        self.caller.as_ref().ok_or(MarketError::Unauthenticated)
    }

    /// Returns the caller if they are an operator.
    pub fn require_admin(&self) -> Result<&Caller, MarketError> {
        let caller = self.require_user()?;
        if caller.role != Role::Admin {
            return Err(MarketError::Forbidden);
        }
        Ok(caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_session_is_unauthenticated() {
        let session = Session::anonymous();
        assert!(matches!(
            session.require_user(),
            Err(MarketError::Unauthenticated)
        ));
        assert!(session.user_id().is_none());
    }

    #[test]
    fn members_are_not_admins() {
        let session = Session::user(UserId::new(), None);
        assert!(session.require_user().is_ok());
        assert!(!session.is_admin());
        assert!(matches!(session.require_admin(), Err(MarketError::Forbidden)));
    }

    #[test]
    fn admin_session_passes_both_checks() {
        let id = UserId::new();
        let session = Session::admin(id, Some("ops@example.com".into()));
        assert_eq!(session.require_admin().unwrap().user_id, id);
    }
}
