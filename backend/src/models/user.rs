use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::role::UserRole;

/// Local user record bound to one external identity (`sub` claim).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub uuid: Uuid,
    /// Subject claim from the identity provider.
    pub external_auth_id: String,
    /// `None` until profile setup.
    pub username: Option<String>,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birthdate: NaiveDate,
    pub picture_url: Option<String>,
    pub role: Option<UserRole>,
    #[serde(rename = "enabled")]
    pub is_enabled: bool,
    #[serde(rename = "nonLocked")]
    pub is_non_locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the profile has every field required to use the API.
    pub fn is_complete(&self) -> bool {
        self.username.is_some()
    }
}
