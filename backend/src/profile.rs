//! Profile creation for authenticated identities without a local user.

use std::sync::Arc;

use crate::directory::{DirectoryError, NewUser, UserDirectory};
use crate::models::{User, UserProfileDto, UserRole};

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Email mismatch between token and request.")]
    EmailMismatch,
    #[error("Email is required.")]
    EmailRequired,
    #[error("Username must not be blank.")]
    BlankUsername,
    #[error("Default role '{0}' not found in database.")]
    DefaultRoleMissing(String),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Creates local profiles and assigns them the default role.
pub struct ProfileService {
    directory: Arc<dyn UserDirectory>,
    default_role: String,
}

impl ProfileService {
    pub fn new(directory: Arc<dyn UserDirectory>, default_role: impl Into<String>) -> Self {
        Self {
            directory,
            default_role: default_role.into(),
        }
    }

    pub fn default_role(&self) -> &str {
        &self.default_role
    }

    /// Check that the default role exists.
    pub fn verify_default_role(&self) -> Result<UserRole, ProfileError> {
        self.directory
            .find_role_by_code(&self.default_role)?
            .ok_or_else(|| ProfileError::DefaultRoleMissing(self.default_role.clone()))
    }

    /// Create the profile for `external_auth_id`.
    ///
    /// The submitted email falls back to the token's email and must match it
    /// (case-insensitively) when both are present. Existence checks and the
    /// insert run in one directory transaction.
    pub fn create_profile(
        &self,
        external_auth_id: &str,
        token_email: Option<&str>,
        profile: UserProfileDto,
    ) -> Result<User, ProfileError> {
        let email = reconcile_email(profile.email.as_deref(), token_email)?;

        let username = profile.username.trim();
        if username.is_empty() {
            return Err(ProfileError::BlankUsername);
        }

        let new_user = NewUser {
            external_auth_id: external_auth_id.to_string(),
            username: username.to_string(),
            email,
            first_name: profile.first_name,
            last_name: profile.last_name,
            birthdate: profile.birthdate,
            picture_url: profile.picture_url,
            role_code: self.default_role.clone(),
        };

        match self.directory.create_user(new_user) {
            Ok(user) => Ok(user),
            Err(DirectoryError::RoleNotFound(code)) => {
                tracing::error!(
                    "Default role '{}' is missing; the role table was not seeded",
                    code
                );
                Err(ProfileError::DefaultRoleMissing(code))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn reconcile_email(submitted: Option<&str>, from_token: Option<&str>) -> Result<String, ProfileError> {
    let submitted = submitted.map(str::trim).filter(|e| !e.is_empty());

    match (submitted, from_token) {
        (None, Some(token)) => Ok(token.to_string()),
        (None, None) => Err(ProfileError::EmailRequired),
        (Some(email), Some(token)) if email.to_lowercase() != token.to_lowercase() => {
            Err(ProfileError::EmailMismatch)
        }
        (Some(email), _) => Ok(email.to_string()),
    }
}
