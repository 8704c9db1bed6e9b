//! Session identity
//!
//! Authentication lives outside the core. The core only needs to know which
//! user, if any, is currently signed in so that user-scoped sync domains can
//! default their scope.

use std::sync::RwLock;

/// Source of the signed-in user's identifier.
pub trait IdentityProvider: Send + Sync {
    /// Identifier of the signed-in user, or `None` when signed out
    fn current_user_id(&self) -> Option<String>;
}

/// Identity provider holding a value set by the host.
///
/// Suitable for hosts that push session changes into the core rather than
/// exposing a queryable session object.
#[derive(Debug, Default)]
pub struct StaticIdentity {
    user_id: RwLock<Option<String>>,
}

impl StaticIdentity {
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            user_id: RwLock::new(user_id),
        }
    }

    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self::new(Some(user_id.into()))
    }

    pub fn set(&self, user_id: Option<String>) {
        if let Ok(mut guard) = self.user_id.write() {
            *guard = user_id;
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.read().ok().and_then(|guard| guard.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_identity_switches_user() {
        let identity = StaticIdentity::default();
        assert_eq!(identity.current_user_id(), None);

        identity.set(Some("user-1".to_string()));
        assert_eq!(identity.current_user_id(), Some("user-1".to_string()));

        identity.set(None);
        assert_eq!(identity.current_user_id(), None);
    }
}
