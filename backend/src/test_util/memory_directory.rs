use std::sync::Mutex;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::directory::{DirectoryError, NewUser, UserDirectory};
use crate::models::{User, UserRole};

/// In-memory [`UserDirectory`] with the same uniqueness rules as the SQLite
/// store, plus helpers for seeding users that the API cannot create.
pub struct InMemoryDirectory {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    users: Vec<User>,
    roles: Vec<UserRole>,
    fail_next: Option<String>,
}

impl MemoryState {
    fn check_failure(&mut self) -> Result<(), DirectoryError> {
        match self.fail_next.take() {
            Some(msg) => Err(DirectoryError::DatabaseError(msg)),
            None => Ok(()),
        }
    }
}

impl InMemoryDirectory {
    pub fn new(role_codes: &[&str]) -> Self {
        let roles = role_codes
            .iter()
            .zip(1..)
            .map(|(code, id)| UserRole { id, code: code.to_string() })
            .collect();

        Self {
            state: Mutex::new(MemoryState {
                roles,
                ..Default::default()
            }),
        }
    }

    /// Directory seeded with the `USER` role.
    pub fn with_default_role() -> Self {
        Self::new(&["USER"])
    }

    /// Make the next directory call fail with a database error.
    pub fn fail_next(&self, msg: &str) {
        self.state.lock().unwrap().fail_next = Some(msg.to_string());
    }

    pub fn insert_complete_user(&self, external_auth_id: &str, username: &str, email: &str) -> User {
        self.insert_raw(external_auth_id, Some(username), email)
    }

    /// Insert a user that has not finished profile setup (no username).
    pub fn insert_incomplete_user(&self, external_auth_id: &str, email: &str) -> User {
        self.insert_raw(external_auth_id, None, email)
    }

    /// Replace a user's role; `None` leaves the user without one.
    pub fn set_role(&self, external_auth_id: &str, code: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        let role = code.and_then(|c| state.roles.iter().find(|r| r.code == c).cloned());
        if let Some(user) = state
            .users
            .iter_mut()
            .find(|u| u.external_auth_id == external_auth_id)
        {
            user.role = role;
        }
    }

    fn insert_raw(&self, external_auth_id: &str, username: Option<&str>, email: &str) -> User {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let user = User {
            id: state.users.len() as i64 + 1,
            uuid: Uuid::new_v4(),
            external_auth_id: external_auth_id.to_string(),
            username: username.map(String::from),
            email: email.to_string(),
            first_name: None,
            last_name: None,
            birthdate: NaiveDate::from_ymd_opt(1990, 1, 1).expect("valid date"),
            picture_url: None,
            role: state.roles.first().cloned(),
            is_enabled: true,
            is_non_locked: true,
            created_at: now,
            updated_at: now,
        };
        state.users.push(user.clone());
        user
    }
}

impl UserDirectory for InMemoryDirectory {
    fn find_by_external_id(&self, external_auth_id: &str) -> Result<Option<User>, DirectoryError> {
        let mut state = self.state.lock().unwrap();
        state.check_failure()?;
        Ok(state
            .users
            .iter()
            .find(|u| u.external_auth_id == external_auth_id)
            .cloned())
    }

    fn find_role_by_code(&self, code: &str) -> Result<Option<UserRole>, DirectoryError> {
        let mut state = self.state.lock().unwrap();
        state.check_failure()?;
        Ok(state.roles.iter().find(|r| r.code == code).cloned())
    }

    fn list_roles(&self) -> Result<Vec<UserRole>, DirectoryError> {
        let mut state = self.state.lock().unwrap();
        state.check_failure()?;
        Ok(state.roles.clone())
    }

    fn count_users(&self) -> Result<u64, DirectoryError> {
        let mut state = self.state.lock().unwrap();
        state.check_failure()?;
        Ok(state.users.len() as u64)
    }

    fn create_user(&self, new_user: NewUser) -> Result<User, DirectoryError> {
        let mut state = self.state.lock().unwrap();
        state.check_failure()?;

        if state.users.iter().any(|u| u.external_auth_id == new_user.external_auth_id) {
            return Err(DirectoryError::ExternalIdTaken);
        }
        if state
            .users
            .iter()
            .any(|u| u.username.as_deref() == Some(new_user.username.as_str()))
        {
            return Err(DirectoryError::UsernameTaken(new_user.username));
        }
        if state.users.iter().any(|u| u.email.eq_ignore_ascii_case(&new_user.email)) {
            return Err(DirectoryError::EmailTaken(new_user.email));
        }

        let role = state
            .roles
            .iter()
            .find(|r| r.code == new_user.role_code)
            .cloned()
            .ok_or_else(|| DirectoryError::RoleNotFound(new_user.role_code.clone()))?;

        let now = Utc::now();
        let user = User {
            id: state.users.len() as i64 + 1,
            uuid: Uuid::new_v4(),
            external_auth_id: new_user.external_auth_id,
            username: Some(new_user.username),
            email: new_user.email,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            birthdate: new_user.birthdate,
            picture_url: new_user.picture_url,
            role: Some(role),
            is_enabled: true,
            is_non_locked: true,
            created_at: now,
            updated_at: now,
        };
        state.users.push(user.clone());
        Ok(user)
    }
}
