// Services module - transactional booking protocols and side effects

pub mod bookings;
pub mod dispatch;
pub mod holds;
pub mod mailer;
pub mod waitlist;

use uuid::Uuid;

use crate::models::user::Role;

/// Authenticated request identity, passed explicitly into every service
/// call rather than stashed in task-local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Option<Uuid>,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: Option<Uuid>, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// True when the caller is the given user or carries the admin role.
    pub fn owns_or_admin(&self, owner: Option<Uuid>) -> bool {
        match owner {
            Some(owner) => self.user_id == Some(owner) || self.is_admin(),
            None => self.is_admin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_passes_ownership_check() {
        let uid = Uuid::new_v4();
        let caller = Caller::new(Some(uid), Role::User);
        assert!(caller.owns_or_admin(Some(uid)));
        assert!(!caller.owns_or_admin(Some(Uuid::new_v4())));
    }

    #[test]
    fn admin_passes_any_ownership_check() {
        let caller = Caller::new(Some(Uuid::new_v4()), Role::Admin);
        assert!(caller.owns_or_admin(Some(Uuid::new_v4())));
        assert!(caller.owns_or_admin(None));
    }

    #[test]
    fn plain_user_cannot_claim_anonymous_resources() {
        let caller = Caller::new(Some(Uuid::new_v4()), Role::User);
        assert!(!caller.owns_or_admin(None));
    }
}
