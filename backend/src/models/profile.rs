use chrono::NaiveDate;
use serde::Deserialize;

/// Profile fields submitted to `POST /api/users/profile`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileDto {
    pub username: String,
    /// Falls back to the token's `email` claim when absent.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub birthdate: NaiveDate,
    #[serde(default)]
    pub picture_url: Option<String>,
}
