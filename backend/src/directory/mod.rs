//! User directory: the local store of users and roles.
//!
//! The directory is injected into the authentication middleware, the profile
//! gate and the profile service as an `Arc<dyn UserDirectory>`, so tests can
//! swap the SQLite store for [`crate::test_util::InMemoryDirectory`].

pub mod sqlite;

use chrono::NaiveDate;

use crate::models::{User, UserRole};

pub use sqlite::SqliteDirectory;

/// Fields for a user about to be inserted. The store assigns id, UUID,
/// flags and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub external_auth_id: String,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birthdate: NaiveDate,
    pub picture_url: Option<String>,
    /// Code of the role to assign, looked up inside the insert transaction.
    pub role_code: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("User with this external ID already exists.")]
    ExternalIdTaken,
    #[error("Username '{0}' is already taken.")]
    UsernameTaken(String),
    #[error("Email '{0}' is already registered.")]
    EmailTaken(String),
    #[error("Role '{0}' not found in database.")]
    RoleNotFound(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl DirectoryError {
    /// Uniqueness conflicts a caller can fix by changing their input.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DirectoryError::ExternalIdTaken
                | DirectoryError::UsernameTaken(_)
                | DirectoryError::EmailTaken(_)
        )
    }
}

/// Point lookups and inserts over users and roles.
pub trait UserDirectory: Send + Sync {
    /// Find the user bound to an external identity.
    fn find_by_external_id(&self, external_auth_id: &str) -> Result<Option<User>, DirectoryError>;

    fn find_role_by_code(&self, code: &str) -> Result<Option<UserRole>, DirectoryError>;

    fn list_roles(&self) -> Result<Vec<UserRole>, DirectoryError>;

    fn count_users(&self) -> Result<u64, DirectoryError>;

    /// Atomically create a user.
    ///
    /// Fails with `ExternalIdTaken`, `UsernameTaken` or `EmailTaken` (checked
    /// in that order) if another row already owns the value, and with
    /// `RoleNotFound` if `role_code` does not exist. Nothing is written on
    /// failure.
    fn create_user(&self, new_user: NewUser) -> Result<User, DirectoryError>;
}
