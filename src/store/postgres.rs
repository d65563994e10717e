use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use super::{CycleStore, StoreError};
use crate::models::{NewUser, Period, User, UserUpdate};

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, timezone, send_emails, birth_date, luteal_phase_length, created_at";

const PERIOD_COLUMNS: &str = r#"id, user_id, occurred_at AS "timestamp", first_day, created_at"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the embedded schema in `migrations/`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn map_user_write_error(e: sqlx::Error) -> StoreError {
    match e.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => StoreError::duplicate_email(),
        _ => StoreError::Database(e),
    }
}

#[async_trait]
impl CycleStore for PgStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (id, email, first_name, last_name, timezone, send_emails, birth_date, luteal_phase_length)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_user.email)
            .bind(&new_user.first_name)
            .bind(&new_user.last_name)
            .bind(&new_user.timezone)
            .bind(new_user.send_emails)
            .bind(new_user.birth_date)
            .bind(new_user.luteal_phase_length)
            .fetch_one(&self.pool)
            .await
            .map_err(map_user_write_error)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> Result<Option<User>, StoreError> {
        // Nullable columns take a "present" flag so an explicit null clears them.
        let sql = format!(
            "UPDATE users SET
                email = COALESCE($2, email),
                first_name = CASE WHEN $3 THEN $4 ELSE first_name END,
                last_name = CASE WHEN $5 THEN $6 ELSE last_name END,
                timezone = COALESCE($7, timezone),
                send_emails = COALESCE($8, send_emails),
                birth_date = CASE WHEN $9 THEN $10 ELSE birth_date END,
                luteal_phase_length = COALESCE($11, luteal_phase_length)
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .bind(update.email)
            .bind(update.first_name.is_some())
            .bind(update.first_name.flatten())
            .bind(update.last_name.is_some())
            .bind(update.last_name.flatten())
            .bind(update.timezone)
            .bind(update.send_emails)
            .bind(update.birth_date.is_some())
            .bind(update.birth_date.flatten())
            .bind(update.luteal_phase_length)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_user_write_error)
    }

    async fn append_event(
        &self,
        user_id: Uuid,
        timestamp: DateTime<Utc>,
        first_day: bool,
    ) -> Result<Period, StoreError> {
        // Rolled back on drop if any step below returns early.
        let mut tx = self.pool.begin().await?;

        // Serialises appends per user so the duplicate check below cannot race.
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        if first_day {
            let duplicate: bool = sqlx::query_scalar(
                "SELECT EXISTS (
                    SELECT 1 FROM periods
                    WHERE user_id = $1 AND first_day AND (occurred_at AT TIME ZONE 'UTC')::date = $2
                 )",
            )
            .bind(user_id)
            .bind(timestamp.date_naive())
            .fetch_one(&mut *tx)
            .await?;

            if duplicate {
                return Err(StoreError::duplicate_first_day(timestamp));
            }
        }

        let sql = format!(
            "INSERT INTO periods (id, user_id, occurred_at, first_day)
             VALUES ($1, $2, $3, $4)
             RETURNING {PERIOD_COLUMNS}"
        );
        let period = sqlx::query_as::<_, Period>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(timestamp)
            .bind(first_day)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(period)
    }

    async fn list_events(&self, user_id: Uuid) -> Result<Vec<Period>, StoreError> {
        let sql = format!(
            "SELECT {PERIOD_COLUMNS} FROM periods
             WHERE user_id = $1
             ORDER BY occurred_at ASC, seq ASC"
        );
        let events = sqlx::query_as::<_, Period>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(events)
    }
}
