//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. All statements share one
//! connection; multi-row writes run inside a transaction.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, Transaction, params};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::accounts::{
    Account, NewAccount, PatientDetails, PatientProfile, PatientUpdate, Session, User,
};
use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// A transaction on the shared connection would see statements issued by
/// other tasks, so every operation holds `lock` while it talks to the
/// connection.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    lock: Mutex<()>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        Ok(Self {
            db: Arc::new(db),
            conn,
            lock: Mutex::new(()),
        })
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn begin(&self, context: &str) -> Result<Transaction, DatabaseError> {
        self.conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("{context} begin: {e}")))
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Canonical write format. Fixed precision keeps text comparison in SQL
/// consistent with time order.
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

fn parse_uuid(s: &str, column: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s)
        .map_err(|e| DatabaseError::Serialization(format!("invalid {column} '{s}': {e}")))
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

const USER_COLUMNS: &str = "id, name, email, role, image, created_at, updated_at";

const PROFILE_COLUMNS: &str =
    "id, user_id, phone, details, onboarding_completed_at, created_at, updated_at";

const SESSION_COLUMNS: &str = "token, user_id, expires_at, created_at";

/// Map a libsql Row to a User. Column order matches USER_COLUMNS.
fn row_to_user(row: &libsql::Row) -> Result<User, DatabaseError> {
    let get = |e: libsql::Error| DatabaseError::Query(format!("user row parse: {e}"));

    let id: String = row.get(0).map_err(get)?;
    let role: String = row.get(3).map_err(get)?;
    let created: String = row.get(5).map_err(get)?;
    let updated: String = row.get(6).map_err(get)?;

    Ok(User {
        id: parse_uuid(&id, "users.id")?,
        name: row.get(1).map_err(get)?,
        email: row.get(2).map_err(get)?,
        role: role.parse().map_err(DatabaseError::Serialization)?,
        image: row.get(4).ok(),
        created_at: parse_datetime(&created),
        updated_at: parse_datetime(&updated),
    })
}

/// Map a libsql Row to a PatientProfile. Column order matches PROFILE_COLUMNS.
fn row_to_profile(row: &libsql::Row) -> Result<PatientProfile, DatabaseError> {
    let get = |e: libsql::Error| DatabaseError::Query(format!("profile row parse: {e}"));

    let id: String = row.get(0).map_err(get)?;
    let user_id: String = row.get(1).map_err(get)?;
    let details: Option<String> = row.get(3).ok();
    let completed: Option<String> = row.get(4).ok();
    let created: String = row.get(5).map_err(get)?;
    let updated: String = row.get(6).map_err(get)?;

    let details = details
        .map(|json| serde_json::from_str::<PatientDetails>(&json))
        .transpose()
        .map_err(|e| DatabaseError::Serialization(format!("patient_profiles.details: {e}")))?;

    Ok(PatientProfile {
        id: parse_uuid(&id, "patient_profiles.id")?,
        user_id: parse_uuid(&user_id, "patient_profiles.user_id")?,
        phone: row.get(2).ok(),
        details,
        onboarding_completed_at: parse_optional_datetime(&completed),
        created_at: parse_datetime(&created),
        updated_at: parse_datetime(&updated),
    })
}

/// Map a libsql Row to a Session. Column order matches SESSION_COLUMNS.
fn row_to_session(row: &libsql::Row) -> Result<Session, DatabaseError> {
    let get = |e: libsql::Error| DatabaseError::Query(format!("session row parse: {e}"));

    let user_id: String = row.get(1).map_err(get)?;
    let expires: String = row.get(2).map_err(get)?;
    let created: String = row.get(3).map_err(get)?;

    Ok(Session {
        token: row.get(0).map_err(get)?,
        user_id: parse_uuid(&user_id, "sessions.user_id")?,
        expires_at: parse_datetime(&expires),
        created_at: parse_datetime(&created),
    })
}

async fn fetch_profile(
    conn: &Connection,
    user_id: Uuid,
) -> Result<Option<PatientProfile>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {PROFILE_COLUMNS} FROM patient_profiles WHERE user_id = ?1"),
            params![user_id.to_string()],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("get_patient_profile: {e}")))?;

    match rows.next().await {
        Ok(Some(row)) => Ok(Some(row_to_profile(&row)?)),
        Ok(None) => Ok(None),
        Err(e) => Err(DatabaseError::Query(format!("get_patient_profile: {e}"))),
    }
}

/// Commit on success, roll back on failure.
async fn finish<T>(
    tx: Transaction,
    context: &str,
    result: Result<T, DatabaseError>,
) -> Result<T, DatabaseError> {
    match result {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| DatabaseError::from_write(&format!("{context} commit"), e))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(e) = tx.rollback().await {
                warn!(error = %e, "{context}: rollback failed");
            }
            Err(err)
        }
    }
}

async fn insert_account(conn: &Connection, account: &NewAccount) -> Result<Account, DatabaseError> {
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        name: account.name.clone(),
        email: account.email.clone(),
        role: account.role,
        image: account.image.clone(),
        created_at: now,
        updated_at: now,
    };
    let profile = PatientProfile {
        id: Uuid::new_v4(),
        user_id: user.id,
        phone: account.phone.clone(),
        details: None,
        onboarding_completed_at: None,
        created_at: now,
        updated_at: now,
    };

    conn.execute(
        &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        params![
            user.id.to_string(),
            user.name.as_str(),
            user.email.as_str(),
            user.role.to_string(),
            opt_text(user.image.as_deref()),
            timestamp(&now),
            timestamp(&now),
        ],
    )
    .await
    .map_err(|e| DatabaseError::from_write("create_account users", e))?;

    conn.execute(
        &format!(
            "INSERT INTO patient_profiles ({PROFILE_COLUMNS}) VALUES (?1, ?2, ?3, NULL, NULL, ?4, ?5)"
        ),
        params![
            profile.id.to_string(),
            user.id.to_string(),
            opt_text(profile.phone.as_deref()),
            timestamp(&now),
            timestamp(&now),
        ],
    )
    .await
    .map_err(|e| DatabaseError::from_write("create_account patient_profiles", e))?;

    Ok(Account { user, profile })
}

async fn write_patient_update(
    conn: &Connection,
    user_id: Uuid,
    update: &PatientUpdate,
) -> Result<PatientProfile, DatabaseError> {
    let now = timestamp(&Utc::now());
    let details = serde_json::to_string(&update.details)
        .map_err(|e| DatabaseError::Serialization(format!("patient details: {e}")))?;

    let updated = conn
        .execute(
            "UPDATE users SET name = ?1, email = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                update.name.as_str(),
                update.email.as_str(),
                now.as_str(),
                user_id.to_string()
            ],
        )
        .await
        .map_err(|e| DatabaseError::from_write("complete_patient_profile users", e))?;

    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity: "user".into(),
            id: user_id.to_string(),
        });
    }

    // A completed profile is left as is; zero rows means someone got here first.
    let written = conn
        .execute(
            &format!(
                "INSERT INTO patient_profiles ({PROFILE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?5) \
                 ON CONFLICT(user_id) DO UPDATE SET \
                    phone = excluded.phone, \
                    details = excluded.details, \
                    onboarding_completed_at = excluded.onboarding_completed_at, \
                    updated_at = excluded.updated_at \
                 WHERE patient_profiles.onboarding_completed_at IS NULL"
            ),
            params![
                Uuid::new_v4().to_string(),
                user_id.to_string(),
                update.phone.as_str(),
                details,
                now.as_str(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::from_write("complete_patient_profile patient_profiles", e))?;

    if written == 0 {
        return Err(DatabaseError::AlreadyCompleted {
            entity: "patient_profile".into(),
            id: user_id.to_string(),
        });
    }

    fetch_profile(conn, user_id)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "patient_profile".into(),
            id: user_id.to_string(),
        })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        let _guard = self.lock.lock().await;
        self.conn()
            .execute_batch("PRAGMA foreign_keys = ON;")
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to enable foreign keys: {e}")))?;
        migrations::run_migrations(self.conn()).await
    }

    // ── Accounts ────────────────────────────────────────────────────

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let _guard = self.lock.lock().await;
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_user_by_email: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_user(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("find_user_by_email: {e}"))),
        }
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let _guard = self.lock.lock().await;
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_user(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_user: {e}"))),
        }
    }

    async fn get_patient_profile(
        &self,
        user_id: Uuid,
    ) -> Result<Option<PatientProfile>, DatabaseError> {
        let _guard = self.lock.lock().await;
        fetch_profile(self.conn(), user_id).await
    }

    async fn create_account(&self, account: &NewAccount) -> Result<Account, DatabaseError> {
        let _guard = self.lock.lock().await;
        let tx = self.begin("create_account").await?;
        let result = insert_account(&tx, account).await;
        let account = finish(tx, "create_account", result).await?;

        debug!(user_id = %account.user.id, "Account created");
        Ok(account)
    }

    async fn complete_patient_profile(
        &self,
        user_id: Uuid,
        update: &PatientUpdate,
    ) -> Result<PatientProfile, DatabaseError> {
        let _guard = self.lock.lock().await;
        let tx = self.begin("complete_patient_profile").await?;
        let result = write_patient_update(&tx, user_id, update).await;
        let profile = finish(tx, "complete_patient_profile", result).await?;

        debug!(%user_id, profile_id = %profile.id, "Patient profile completed");
        Ok(profile)
    }

    // ── Sessions ────────────────────────────────────────────────────

    async fn create_session(&self, session: &Session) -> Result<(), DatabaseError> {
        let _guard = self.lock.lock().await;
        self.conn()
            .execute(
                &format!("INSERT INTO sessions ({SESSION_COLUMNS}) VALUES (?1, ?2, ?3, ?4)"),
                params![
                    session.token.as_str(),
                    session.user_id.to_string(),
                    timestamp(&session.expires_at),
                    timestamp(&session.created_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::from_write("create_session", e))?;

        debug!(user_id = %session.user_id, "Session created");
        Ok(())
    }

    async fn get_session(&self, token: &str) -> Result<Option<Session>, DatabaseError> {
        let _guard = self.lock.lock().await;
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE token = ?1"),
                params![token],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_session(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_session: {e}"))),
        }
    }

    async fn delete_session(&self, token: &str) -> Result<bool, DatabaseError> {
        let _guard = self.lock.lock().await;
        let deleted = self
            .conn()
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_session: {e}")))?;
        Ok(deleted > 0)
    }

    async fn prune_expired_sessions(&self) -> Result<usize, DatabaseError> {
        let _guard = self.lock.lock().await;
        let now = timestamp(&Utc::now());
        let deleted = self
            .conn()
            .execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])
            .await
            .map_err(|e| DatabaseError::Query(format!("prune_expired_sessions: {e}")))?;

        if deleted > 0 {
            info!(count = deleted, "Pruned expired sessions");
        }
        Ok(deleted as usize)
    }
}
