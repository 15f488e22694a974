use crate::model::db::user::Role;

/// A level of access that an endpoint can demand through
/// [`AuthToken`](super::AuthToken).
pub trait Access: Send + Sync + 'static {
    /// Human-readable name, used in rejection messages.
    const NAME: &'static str;

    /// Does a user with the given role have this level of access?
    fn permits(role: Role) -> bool;
}

/// Admins only: managing elections, candidates and voters.
pub struct Admin;

impl Access for Admin {
    const NAME: &'static str = "admin";

    fn permits(role: Role) -> bool {
        role == Role::Admin
    }
}

/// Anyone who is signed in.
pub struct AnyUser;

impl Access for AnyUser {
    const NAME: &'static str = "signed-in user";

    fn permits(_role: Role) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_access() {
        assert!(Admin::permits(Role::Admin));
        assert!(!Admin::permits(Role::Candidate));
        assert!(!Admin::permits(Role::Voter));
    }

    #[test]
    fn any_user_access() {
        assert!(AnyUser::permits(Role::Admin));
        assert!(AnyUser::permits(Role::Candidate));
        assert!(AnyUser::permits(Role::Voter));
    }
}
