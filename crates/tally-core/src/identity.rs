//! Identity provider seam
//!
//! The store only needs the id of the signed-in user to tag new rows.
//! Credential checks belong to the hosted auth provider and are not done here.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::models::User;

/// Source of the current signed-in user
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<User>;

    fn current_user_id(&self) -> Option<String> {
        self.current_user().map(|u| u.id)
    }
}

/// In-process session holding the signed-in user
#[derive(Clone, Default)]
pub struct SessionIdentity {
    user: Arc<RwLock<Option<User>>>,
}

impl SessionIdentity {
    /// A session with nobody signed in
    pub fn new() -> Self {
        Self::default()
    }

    /// A session already signed in as `user`
    pub fn signed_in(user: User) -> Self {
        let session = Self::new();
        session.sign_in(user);
        session
    }

    pub fn sign_in(&self, user: User) {
        info!(user_id = %user.id, "Signed in");
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user);
    }

    pub fn sign_out(&self) {
        let previous = self.user.write().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(user) = previous {
            info!(user_id = %user.id, "Signed out");
        }
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_user(&self) -> Option<User> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_sign_in_and_out() {
        let session = SessionIdentity::new();
        assert!(session.current_user().is_none());

        session.sign_in(User::new("user-1"));
        assert_eq!(session.current_user_id().as_deref(), Some("user-1"));

        session.sign_out();
        assert!(session.current_user_id().is_none());
    }

    #[test]
    fn test_clones_share_the_session() {
        let session = SessionIdentity::signed_in(User::new("a"));
        let other = session.clone();
        other.sign_out();
        assert!(session.current_user().is_none());
    }

    #[test]
    fn test_sign_in_after_poisoned_lock() {
        let session = SessionIdentity::signed_in(User::new("a"));
        let poisoner = session.clone();
        let result = std::thread::spawn(move || {
            let _guard = poisoner.user.write().unwrap();
            panic!("poison the session lock");
        })
        .join();
        assert!(result.is_err());

        assert_eq!(session.current_user_id().as_deref(), Some("a"));
        session.sign_in(User::new("b"));
        assert_eq!(session.current_user_id().as_deref(), Some("b"));
        session.sign_out();
        assert!(session.current_user().is_none());
    }
}
