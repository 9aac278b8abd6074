use std::sync::{Arc, RwLock};

use crate::models::UserResponse;

/// Signed-in account plus the token that proves it
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: UserResponse,
    pub token: String,
}

/// Session shared by everything holding a clone of the client.
/// Populated by signin, cleared by signout or any 401.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionContext {
    pub fn current(&self) -> Option<Session> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn user(&self) -> Option<UserResponse> {
        self.current().map(|s| s.user)
    }

    pub fn is_signed_in(&self) -> bool {
        self.current().is_some()
    }

    pub(crate) fn token(&self) -> Option<String> {
        self.current().map(|s| s.token)
    }

    pub(crate) fn establish(&self, session: Session) {
        *self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(session);
    }

    /// Replace the cached account after a profile change, keeping the token
    pub(crate) fn refresh_user(&self, user: UserResponse) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(session) = guard.as_mut() {
            session.user = user;
        }
    }

    pub fn invalidate(&self) {
        *self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> UserResponse {
        UserResponse {
            id: "u1".into(),
            username: name.into(),
            email: "ana@x.com".into(),
            avatar: "a.png".into(),
            created_at: "2025-01-01T00:00:00Z".into(),
            updated_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn clones_share_state() {
        let ctx = SessionContext::default();
        let view = ctx.clone();
        assert!(!view.is_signed_in());

        ctx.establish(Session {
            user: user("ana"),
            token: "t".into(),
        });
        assert_eq!(view.user().map(|u| u.username).as_deref(), Some("ana"));

        ctx.refresh_user(user("ana2"));
        assert_eq!(view.current().unwrap().token, "t");
        assert_eq!(view.user().unwrap().username, "ana2");

        view.invalidate();
        assert!(!ctx.is_signed_in());
    }

    #[test]
    fn refresh_without_session_is_noop() {
        let ctx = SessionContext::default();
        ctx.refresh_user(user("ana"));
        assert!(ctx.current().is_none());
    }
}
