use serde::Serialize;

/// Authorization role. Rows are administered out of band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRole {
    pub id: i64,
    /// Unique role code, e.g. `USER`.
    pub code: String,
}
