//! User Repository
//!
//! Account lookup and creation. Soft-deleted accounts are treated as absent.

use sqlx::PgPool;
use uuid::Uuid;

use stratus_models::User;
use stratus_utils::{NotifyError, NotifyResult};

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user. A duplicate email surfaces as a conflict.
    pub async fn create(&self, email: &str, password_hash: &str) -> NotifyResult<User> {
        let result: Result<User, sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO users (id, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, created_at, updated_at, deleted_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await;

        result.map_err(|error| {
            if is_unique_violation(&error) {
                NotifyError::conflict("User already exists")
            } else {
                NotifyError::from(error)
            }
        })
    }

    pub async fn find_by_id(&self, id: Uuid) -> NotifyResult<Option<User>> {
        let user: Option<User> = sqlx::query_as(
            r#"
            SELECT id, email, password_hash, created_at, updated_at, deleted_at
            FROM users
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> NotifyResult<Option<User>> {
        let user: Option<User> = sqlx::query_as(
            r#"
            SELECT id, email, password_hash, created_at, updated_at, deleted_at
            FROM users
            WHERE email = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

/// PostgreSQL unique_violation, raised on duplicate account emails.
fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error.as_database_error().and_then(|e| e.code()),
        Some(code) if code == "23505"
    )
}
