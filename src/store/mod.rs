//! Persistence for users and their period events.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewUser, Period, User, UserUpdate};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type SharedStore = Arc<dyn CycleStore>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The write would break a uniqueness rule (email, one first day per date)
    #[error("{message}")]
    Conflict { message: String },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub(crate) fn duplicate_first_day(timestamp: DateTime<Utc>) -> Self {
        StoreError::Conflict {
            message: format!(
                "A first-day event is already recorded on {}",
                timestamp.date_naive()
            ),
        }
    }

    pub(crate) fn duplicate_email() -> Self {
        StoreError::Conflict {
            message: "An account with this email address already exists".to_string(),
        }
    }
}

#[async_trait]
pub trait CycleStore: Send + Sync {
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError>;

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> Result<Option<User>, StoreError>;

    /// Records an event for an existing user.
    ///
    /// A second `first_day` event on a UTC date that already has one is a
    /// [`StoreError::Conflict`].
    async fn append_event(
        &self,
        user_id: Uuid,
        timestamp: DateTime<Utc>,
        first_day: bool,
    ) -> Result<Period, StoreError>;

    /// All events of one user, ascending by timestamp, ties in insertion order.
    async fn list_events(&self, user_id: Uuid) -> Result<Vec<Period>, StoreError>;
}
