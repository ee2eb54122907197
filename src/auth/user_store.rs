//! User Storage
//! Mission: Securely store user accounts and roles with SQLite

use crate::auth::models::{RoleName, User};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::info;

/// Insert failure classes surfaced by the store.
///
/// The UNIQUE constraints are the final authority on identity uniqueness:
/// a concurrent registration that slips past the pre-checks still fails
/// here with the same duplicate kind, never a crash or a silent overwrite.
#[derive(Debug)]
pub enum InsertError {
    DuplicateUsername,
    DuplicateEmail,
    Db(anyhow::Error),
}

impl std::fmt::Display for InsertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InsertError::DuplicateUsername => write!(f, "username is already taken"),
            InsertError::DuplicateEmail => write!(f, "email is already in use"),
            InsertError::Db(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for InsertError {}

/// Fields persisted for a new user; the password arrives pre-hashed
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub password_hash: String,
}

/// User and role storage with SQLite backend
pub struct UserStore {
    db_path: String,
}

impl UserStore {
    /// Create a store, initialize the schema, and seed the role table
    pub fn new(db_path: &str) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<()> {
        let conn = self.connect()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT UNIQUE NOT NULL,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                phone_number TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS roles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS user_roles (
                user_id INTEGER NOT NULL,
                role_id INTEGER NOT NULL,
                PRIMARY KEY (user_id, role_id),
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (role_id) REFERENCES roles(id)
            )",
            [],
        )?;

        self.seed_roles(&conn)?;

        Ok(())
    }

    /// Seed the fixed role set on first startup; immutable thereafter
    fn seed_roles(&self, conn: &Connection) -> Result<()> {
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM roles", [], |row| row.get(0))
            .context("Failed to count roles")?;

        if count == 0 {
            info!("No roles found in the database, seeding initial roles");
            for role in RoleName::ALL {
                conn.execute(
                    "INSERT INTO roles (name) VALUES (?1)",
                    params![role.as_str()],
                )
                .context("Failed to seed role")?;
                info!("Seeded role: {}", role.as_str());
            }
        }

        Ok(())
    }

    fn connect(&self) -> Result<Connection> {
        Connection::open(&self.db_path).context("Failed to open auth database")
    }

    /// Look up a role id by name; `None` signals a missing seed
    pub fn find_role(&self, name: RoleName) -> Result<Option<i64>> {
        let conn = self.connect()?;

        let result = conn.query_row(
            "SELECT id FROM roles WHERE name = ?1",
            params![name.as_str()],
            |row| row.get::<_, i64>(0),
        );

        match result {
            Ok(id) => Ok(Some(id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get a user by username with roles loaded eagerly in a single query
    pub fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.connect()?;

        let mut stmt = conn.prepare(
            "SELECT u.id, u.username, u.first_name, u.last_name, u.email,
                    u.phone_number, u.password_hash, u.created_at, r.name
             FROM users u
             JOIN user_roles ur ON ur.user_id = u.id
             JOIN roles r ON r.id = ur.role_id
             WHERE u.username = ?1
             ORDER BY r.id",
        )?;

        let mut rows = stmt.query(params![username])?;
        let mut user: Option<User> = None;

        while let Some(row) = rows.next()? {
            let role_str: String = row.get(8)?;
            let role = RoleName::from_str(&role_str)
                .with_context(|| format!("Unknown role in database: {}", role_str))?;

            match &mut user {
                Some(u) => u.roles.push(role),
                None => {
                    user = Some(User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        first_name: row.get(2)?,
                        last_name: row.get(3)?,
                        email: row.get(4)?,
                        phone_number: row.get(5)?,
                        password_hash: row.get(6)?,
                        created_at: row.get(7)?,
                        roles: vec![role],
                    });
                }
            }
        }

        Ok(user)
    }

    pub fn exists_by_username(&self, username: &str) -> Result<bool> {
        let conn = self.connect()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
            params![username],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn exists_by_email(&self, email: &str) -> Result<bool> {
        let conn = self.connect()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
            params![email],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Persist a new user and its role assignments in one transaction
    pub fn create_user(&self, new_user: &NewUser, role_ids: &[i64]) -> Result<User, InsertError> {
        let mut conn = self.connect().map_err(InsertError::Db)?;
        let tx = conn.transaction().map_err(|e| InsertError::Db(e.into()))?;

        let created_at = Utc::now().to_rfc3339();

        tx.execute(
            "INSERT INTO users (username, first_name, last_name, email,
                                phone_number, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                new_user.username,
                new_user.first_name,
                new_user.last_name,
                new_user.email,
                new_user.phone_number,
                new_user.password_hash,
                created_at,
            ],
        )
        .map_err(classify_insert_error)?;

        let user_id = tx.last_insert_rowid();

        for role_id in role_ids {
            tx.execute(
                "INSERT INTO user_roles (user_id, role_id) VALUES (?1, ?2)",
                params![user_id, role_id],
            )
            .map_err(|e| InsertError::Db(e.into()))?;
        }

        tx.commit().map_err(classify_insert_error)?;

        info!("Created user: {} (id {})", new_user.username, user_id);

        self.find_by_username(&new_user.username)
            .map_err(InsertError::Db)?
            .ok_or_else(|| InsertError::Db(anyhow::anyhow!("User vanished after insert")))
    }

    /// List all users with their roles (admin only)
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.connect()?;

        let mut stmt = conn.prepare(
            "SELECT u.id, u.username, u.first_name, u.last_name, u.email,
                    u.phone_number, u.password_hash, u.created_at, r.name
             FROM users u
             JOIN user_roles ur ON ur.user_id = u.id
             JOIN roles r ON r.id = ur.role_id
             ORDER BY u.id, r.id",
        )?;

        let mut rows = stmt.query([])?;
        let mut users: Vec<User> = Vec::new();

        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let role_str: String = row.get(8)?;
            let role = RoleName::from_str(&role_str)
                .with_context(|| format!("Unknown role in database: {}", role_str))?;

            match users.last_mut() {
                Some(u) if u.id == id => u.roles.push(role),
                _ => users.push(User {
                    id,
                    username: row.get(1)?,
                    first_name: row.get(2)?,
                    last_name: row.get(3)?,
                    email: row.get(4)?,
                    phone_number: row.get(5)?,
                    password_hash: row.get(6)?,
                    created_at: row.get(7)?,
                    roles: vec![role],
                }),
            }
        }

        Ok(users)
    }
}

/// Map a SQLite uniqueness violation onto the conflicting field
fn classify_insert_error(err: rusqlite::Error) -> InsertError {
    if let rusqlite::Error::SqliteFailure(e, Some(msg)) = &err {
        if e.code == rusqlite::ErrorCode::ConstraintViolation {
            if msg.contains("users.username") {
                return InsertError::DuplicateUsername;
            }
            if msg.contains("users.email") {
                return InsertError::DuplicateEmail;
            }
        }
    }
    InsertError::Db(err.into())
}
