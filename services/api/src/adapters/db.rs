//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medassist_core::domain::{QueryRecord, Role, SearchContext, UserAccount, UserCredentials};
use medassist_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const USER_COLUMNS: &str = "id, email, role, enabled, created_at";
const QUERY_COLUMNS: &str = "id, user_id, prompt, response, summary, bibliographic_references, \
                             keywords, translated_query, model, created_at";

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    role: String,
    enabled: bool,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<UserAccount> {
        let role = self
            .role
            .parse::<Role>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(UserAccount {
            id: self.id,
            email: self.email,
            role,
            enabled: self.enabled,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    hashed_password: String,
    enabled: bool,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.id,
            email: self.email,
            hashed_password: self.hashed_password,
            enabled: self.enabled,
        }
    }
}

#[derive(FromRow)]
struct QueryRow {
    id: Uuid,
    user_id: Option<Uuid>,
    prompt: String,
    response: Option<String>,
    summary: Option<String>,
    bibliographic_references: Option<Json<SearchContext>>,
    keywords: Vec<String>,
    translated_query: Option<String>,
    model: String,
    created_at: DateTime<Utc>,
}
impl QueryRow {
    fn to_domain(self) -> QueryRecord {
        QueryRecord {
            id: self.id,
            user_id: self.user_id,
            prompt: self.prompt,
            response: self.response,
            summary: self.summary,
            model: self.model,
            created_at: self.created_at,
            bibliographic_references: self.bibliographic_references.map(|Json(c)| c),
            keywords: self.keywords,
            translated_query: self.translated_query,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<UserAccount> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (id, email, hashed_password, role) VALUES ($1, $2, $3, $4) \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .bind(Role::Free.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, hashed_password, enabled FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("User {}", email)))?;
        Ok(record.to_domain())
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<UserAccount> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("User {}", user_id)))?;
        record.to_domain()
    }

    async fn list_users(&self) -> PortResult<Vec<UserAccount>> {
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users ORDER BY created_at ASC",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(UserRecord::to_domain).collect()
    }

    async fn update_user_role(&self, user_id: Uuid, role: Role) -> PortResult<UserAccount> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE users SET role = $1 WHERE id = $2 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(role.as_str())
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("User {}", user_id)))?;
        record.to_domain()
    }

    async fn set_user_enabled(&self, user_id: Uuid, enabled: bool) -> PortResult<UserAccount> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE users SET enabled = $1 WHERE id = $2 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(enabled)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("User {}", user_id)))?;
        record.to_domain()
    }

    async fn delete_user(&self, user_id: Uuid) -> PortResult<()> {
        // Sessions and queries go with it (ON DELETE CASCADE).
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {}", user_id)));
        }
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        user_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn save_query(&self, record: &QueryRecord) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO queries (id, user_id, prompt, response, summary, bibliographic_references, \
             keywords, translated_query, model, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.prompt)
        .bind(&record.response)
        .bind(&record.summary)
        .bind(record.bibliographic_references.as_ref().map(Json))
        .bind(&record.keywords)
        .bind(&record.translated_query)
        .bind(&record.model)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_query(&self, query_id: Uuid) -> PortResult<QueryRecord> {
        let row = sqlx::query_as::<_, QueryRow>(&format!(
            "SELECT {} FROM queries WHERE id = $1",
            QUERY_COLUMNS
        ))
        .bind(query_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("Query {}", query_id)))?;
        Ok(row.to_domain())
    }

    async fn update_query_summary(&self, query_id: Uuid, summary: &str) -> PortResult<()> {
        let result = sqlx::query("UPDATE queries SET summary = $1 WHERE id = $2")
            .bind(summary)
            .bind(query_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Query {}", query_id)));
        }
        Ok(())
    }

    async fn list_queries_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> PortResult<Vec<QueryRecord>> {
        let rows = sqlx::query_as::<_, QueryRow>(&format!(
            "SELECT {} FROM queries WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
            QUERY_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(rows.into_iter().map(QueryRow::to_domain).collect())
    }

    async fn count_queries_between(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PortResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM queries WHERE user_id = $1 AND created_at >= $2 AND created_at < $3",
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(count.max(0) as u64)
    }
}
