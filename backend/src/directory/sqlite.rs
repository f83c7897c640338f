use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use uuid::Uuid;

use super::{DirectoryError, NewUser, UserDirectory};
use crate::models::{User, UserRole};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS user_roles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        code TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        uuid TEXT NOT NULL UNIQUE,
        external_auth_id TEXT NOT NULL UNIQUE,
        username TEXT UNIQUE,
        email TEXT NOT NULL UNIQUE COLLATE NOCASE,
        first_name TEXT,
        last_name TEXT,
        birthdate TEXT NOT NULL,
        picture_url TEXT,
        role_id INTEGER REFERENCES user_roles(id),
        is_enabled INTEGER NOT NULL DEFAULT 1,
        is_non_locked INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
";

const SELECT_USER: &str = "
    SELECT u.id, u.uuid, u.external_auth_id, u.username, u.email, u.first_name,
           u.last_name, u.birthdate, u.picture_url, u.is_enabled, u.is_non_locked,
           u.created_at, u.updated_at, r.id, r.code
    FROM users u
    LEFT JOIN user_roles r ON r.id = u.role_id
";

/// SQLite-backed user directory.
pub struct SqliteDirectory {
    conn: Mutex<Connection>,
}

impl From<rusqlite::Error> for DirectoryError {
    fn from(e: rusqlite::Error) -> Self {
        DirectoryError::DatabaseError(e.to_string())
    }
}

impl SqliteDirectory {
    pub fn open(database_url: &str) -> Result<Self, DirectoryError> {
        // Parse sqlite: prefix if present
        let path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);

        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DirectoryError::DatabaseError(e.to_string()))?;
            }
            Connection::open(path)?
        };

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        tracing::info!("User directory initialized with database: {}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, DirectoryError> {
        Self::open(":memory:")
    }

    /// Insert any role codes that do not exist yet.
    pub fn seed_roles(&self, codes: &[String]) -> Result<(), DirectoryError> {
        let conn = self.lock()?;
        for code in codes {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO user_roles (code) VALUES (?1)",
                params![code],
            )?;
            if inserted > 0 {
                tracing::info!("Seeded role {}", code);
            }
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, DirectoryError> {
        self.conn
            .lock()
            .map_err(|e| DirectoryError::DatabaseError(e.to_string()))
    }
}

impl UserDirectory for SqliteDirectory {
    fn find_by_external_id(&self, external_auth_id: &str) -> Result<Option<User>, DirectoryError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("{SELECT_USER} WHERE u.external_auth_id = ?1"),
                params![external_auth_id],
                UserRow::from_row,
            )
            .optional()?;

        row.map(UserRow::into_user).transpose()
    }

    fn find_role_by_code(&self, code: &str) -> Result<Option<UserRole>, DirectoryError> {
        let conn = self.lock()?;
        let role = conn
            .query_row(
                "SELECT id, code FROM user_roles WHERE code = ?1",
                params![code],
                |row| Ok(UserRole { id: row.get(0)?, code: row.get(1)? }),
            )
            .optional()?;
        Ok(role)
    }

    fn list_roles(&self) -> Result<Vec<UserRole>, DirectoryError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, code FROM user_roles ORDER BY id")?;
        let roles = stmt
            .query_map([], |row| Ok(UserRole { id: row.get(0)?, code: row.get(1)? }))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(roles)
    }

    fn count_users(&self) -> Result<u64, DirectoryError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn create_user(&self, new_user: NewUser) -> Result<User, DirectoryError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let exists = |sql: &str, value: &str| -> Result<bool, DirectoryError> {
            Ok(tx.query_row(sql, params![value], |row| row.get::<_, bool>(0))?)
        };

        if exists(
            "SELECT EXISTS(SELECT 1 FROM users WHERE external_auth_id = ?1)",
            &new_user.external_auth_id,
        )? {
            return Err(DirectoryError::ExternalIdTaken);
        }
        if exists("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)", &new_user.username)? {
            return Err(DirectoryError::UsernameTaken(new_user.username));
        }
        if exists("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)", &new_user.email)? {
            return Err(DirectoryError::EmailTaken(new_user.email));
        }

        let role = tx
            .query_row(
                "SELECT id, code FROM user_roles WHERE code = ?1",
                params![new_user.role_code],
                |row| Ok(UserRole { id: row.get(0)?, code: row.get(1)? }),
            )
            .optional()?
            .ok_or_else(|| DirectoryError::RoleNotFound(new_user.role_code.clone()))?;

        let now = Utc::now();
        let uuid = Uuid::new_v4();

        tx.execute(
            "INSERT INTO users (uuid, external_auth_id, username, email, first_name, last_name,
                                birthdate, picture_url, role_id, is_enabled, is_non_locked,
                                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, 1, ?10, ?10)",
            params![
                uuid.to_string(),
                new_user.external_auth_id,
                new_user.username,
                new_user.email,
                new_user.first_name,
                new_user.last_name,
                new_user.birthdate.to_string(),
                new_user.picture_url,
                role.id,
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| map_constraint_violation(e, &new_user))?;

        let id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::info!("Created user {} for {}", new_user.username, new_user.external_auth_id);

        Ok(User {
            id,
            uuid,
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
        })
    }
}

/// UNIQUE violations from a concurrent insert surface as the same conflicts
/// as the pre-checks.
fn map_constraint_violation(e: rusqlite::Error, new_user: &NewUser) -> DirectoryError {
    if let rusqlite::Error::SqliteFailure(err, Some(msg)) = &e {
        if err.code == ErrorCode::ConstraintViolation {
            if msg.contains("users.external_auth_id") {
                return DirectoryError::ExternalIdTaken;
            }
            if msg.contains("users.username") {
                return DirectoryError::UsernameTaken(new_user.username.clone());
            }
            if msg.contains("users.email") {
                return DirectoryError::EmailTaken(new_user.email.clone());
            }
        }
    }
    e.into()
}

/// Raw column values, converted outside the rusqlite row callback.
struct UserRow {
    id: i64,
    uuid: String,
    external_auth_id: String,
    username: Option<String>,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    birthdate: String,
    picture_url: Option<String>,
    is_enabled: bool,
    is_non_locked: bool,
    created_at: String,
    updated_at: String,
    role_id: Option<i64>,
    role_code: Option<String>,
}

impl UserRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            uuid: row.get(1)?,
            external_auth_id: row.get(2)?,
            username: row.get(3)?,
            email: row.get(4)?,
            first_name: row.get(5)?,
            last_name: row.get(6)?,
            birthdate: row.get(7)?,
            picture_url: row.get(8)?,
            is_enabled: row.get(9)?,
            is_non_locked: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
            role_id: row.get(13)?,
            role_code: row.get(14)?,
        })
    }

    fn into_user(self) -> Result<User, DirectoryError> {
        let corrupt = |field: &str, e: String| {
            DirectoryError::DatabaseError(format!("Invalid {} for user {}: {}", field, self.id, e))
        };

        let uuid = Uuid::parse_str(&self.uuid).map_err(|e| corrupt("uuid", e.to_string()))?;
        let birthdate = NaiveDate::parse_from_str(&self.birthdate, "%Y-%m-%d")
            .map_err(|e| corrupt("birthdate", e.to_string()))?;
        let created_at = parse_timestamp(&self.created_at)
            .map_err(|e| corrupt("created_at", e.to_string()))?;
        let updated_at = parse_timestamp(&self.updated_at)
            .map_err(|e| corrupt("updated_at", e.to_string()))?;

        let role = match (self.role_id, self.role_code) {
            (Some(id), Some(code)) => Some(UserRole { id, code }),
            _ => None,
        };

        Ok(User {
            id: self.id,
            uuid,
            external_auth_id: self.external_auth_id,
            username: self.username,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            birthdate,
            picture_url: self.picture_url,
            role,
            is_enabled: self.is_enabled,
            is_non_locked: self.is_non_locked,
            created_at,
            updated_at,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc))
}
