use serde::{Deserialize, Serialize};

/// Sign-in credentials. Never stored; the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct LoginRequest {
    pub student_id: String,
    pub password: String,
}

#[cfg(test)]
mod examples {
    use super::*;
    use crate::model::db::user::{examples::EXAMPLE_PASSWORD, NewUser};

    impl LoginRequest {
        pub fn example_admin() -> Self {
            Self {
                student_id: NewUser::example_admin().student_id,
                password: EXAMPLE_PASSWORD.to_string(),
            }
        }

        pub fn example_voter() -> Self {
            Self {
                student_id: NewUser::example_voter().student_id,
                password: EXAMPLE_PASSWORD.to_string(),
            }
        }
    }
}
