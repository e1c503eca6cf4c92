use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use super::repo_types::{NewUser, Status, User, UserRow};

const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_key";

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, status, is_blocked, \
                            last_logged_in_at, last_activity_at";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    EmailTaken,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence for the `users` table.
///
/// Bulk operations return the ids they actually touched, so callers can
/// report accurate counts and detect self-actions.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. A duplicate email yields `StoreError::EmailTaken`.
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// All users, most recent login first, never-logged-in last.
    async fn list_by_last_login(&self) -> Result<Vec<User>, StoreError>;
    /// Set both `last_logged_in_at` and `last_activity_at`.
    async fn record_login(&self, id: i64, at: OffsetDateTime) -> Result<(), StoreError>;
    async fn touch_activity(&self, id: i64, at: OffsetDateTime) -> Result<(), StoreError>;
    async fn set_status(&self, id: i64, status: Status) -> Result<(), StoreError>;
    /// Block every listed user that exists and is not blocked yet.
    async fn block_many(&self, ids: &[i64]) -> Result<Vec<i64>, StoreError>;
    /// Unblock every listed user that is blocked; unblocked users become `Verified`.
    async fn unblock_many(&self, ids: &[i64]) -> Result<Vec<i64>, StoreError>;
    async fn delete_many(&self, ids: &[i64]) -> Result<Vec<i64>, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn bulk(&self, sql: &str, ids: &[i64]) -> Result<Vec<i64>, StoreError> {
        let mut tx = self.db.begin().await?;
        let touched: Vec<i64> = sqlx::query_scalar(sql)
            .bind(ids)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(touched)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (name, email, password_hash, created_at, status, is_blocked,
                               last_logged_in_at, last_activity_at)
            VALUES ($1, $2, $3, $4, $5, FALSE, $4, $4)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&new_user.name)
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(new_user.created_at)
            .bind(Status::Unverified.as_str())
            .fetch_one(&self.db)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err)
                    if db_err.constraint() == Some(EMAIL_UNIQUE_CONSTRAINT) =>
                {
                    StoreError::EmailTaken
                }
                _ => StoreError::Database(e),
            })?;
        Ok(row.into())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn list_by_last_login(&self) -> Result<Vec<User>, StoreError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY last_logged_in_at DESC NULLS LAST, id ASC"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql).fetch_all(&self.db).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn record_login(&self, id: i64, at: OffsetDateTime) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET last_logged_in_at = $2, last_activity_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn touch_activity(&self, id: i64, at: OffsetDateTime) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET last_activity_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn set_status(&self, id: i64, status: Status) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn block_many(&self, ids: &[i64]) -> Result<Vec<i64>, StoreError> {
        self.bulk(
            r#"
            UPDATE users SET is_blocked = TRUE
             WHERE id = ANY($1) AND NOT is_blocked
            RETURNING id
            "#,
            ids,
        )
        .await
    }

    async fn unblock_many(&self, ids: &[i64]) -> Result<Vec<i64>, StoreError> {
        self.bulk(
            r#"
            UPDATE users SET is_blocked = FALSE, status = 'verified'
             WHERE id = ANY($1) AND is_blocked
            RETURNING id
            "#,
            ids,
        )
        .await
    }

    async fn delete_many(&self, ids: &[i64]) -> Result<Vec<i64>, StoreError> {
        self.bulk("DELETE FROM users WHERE id = ANY($1) RETURNING id", ids)
            .await
    }
}
