use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CycleStore, StoreError};
use crate::models::{NewUser, Period, User, UserUpdate};

/// Process-local store, used by tests and `--storage memory`.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    periods: Vec<Period>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryState {
    /// Matches the `lower(email)` unique index of the postgres schema.
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        let email = email.to_lowercase();
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.email.to_lowercase() == email)
    }
}

#[async_trait]
impl CycleStore for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut state = self.state.write().await;
        if state.email_taken(&new_user.email, None) {
            return Err(StoreError::duplicate_email());
        }

        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            timezone: new_user.timezone,
            send_emails: new_user.send_emails,
            birth_date: new_user.birth_date,
            luteal_phase_length: new_user.luteal_phase_length,
            created_at: Utc::now(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> Result<Option<User>, StoreError> {
        let mut state = self.state.write().await;
        if let Some(email) = &update.email {
            if state.email_taken(email, Some(user_id)) {
                return Err(StoreError::duplicate_email());
            }
        }

        let Some(user) = state.users.get_mut(&user_id) else {
            return Ok(None);
        };
        user.apply(update);
        Ok(Some(user.clone()))
    }

    async fn append_event(
        &self,
        user_id: Uuid,
        timestamp: DateTime<Utc>,
        first_day: bool,
    ) -> Result<Period, StoreError> {
        let mut state = self.state.write().await;

        if first_day {
            let date = timestamp.date_naive();
            let duplicate = state
                .periods
                .iter()
                .any(|p| p.user_id == user_id && p.first_day && p.timestamp.date_naive() == date);
            if duplicate {
                return Err(StoreError::duplicate_first_day(timestamp));
            }
        }

        let period = Period {
            id: Uuid::new_v4(),
            user_id,
            timestamp,
            first_day,
            created_at: Utc::now(),
        };
        state.periods.push(period.clone());
        Ok(period)
    }

    async fn list_events(&self, user_id: Uuid) -> Result<Vec<Period>, StoreError> {
        let state = self.state.read().await;
        let mut events: Vec<Period> = state
            .periods
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        // Stable, so equal timestamps keep insertion order.
        events.sort_by_key(|p| p.timestamp);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn new_user(email: &str) -> NewUser {
        serde_json::from_value(serde_json::json!({ "email": email })).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn events_are_listed_in_timestamp_order() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("ada@example.com")).await.unwrap();

        store.append_event(user.id, at(2024, 1, 29, 8), true).await.unwrap();
        store.append_event(user.id, at(2024, 1, 1, 8), true).await.unwrap();
        store.append_event(user.id, at(2024, 1, 10, 8), false).await.unwrap();

        let dates: Vec<_> = store
            .list_events(user.id)
            .await
            .unwrap()
            .iter()
            .map(|p| p.timestamp)
            .collect();
        assert_eq!(dates, vec![at(2024, 1, 1, 8), at(2024, 1, 10, 8), at(2024, 1, 29, 8)]);
    }

    #[tokio::test]
    async fn events_are_scoped_to_their_user() {
        let store = MemoryStore::new();
        let ada = store.create_user(new_user("ada@example.com")).await.unwrap();
        let grace = store.create_user(new_user("grace@example.com")).await.unwrap();

        store.append_event(ada.id, at(2024, 1, 1, 8), true).await.unwrap();

        assert_eq!(store.list_events(ada.id).await.unwrap().len(), 1);
        assert!(store.list_events(grace.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_first_day_on_same_date_conflicts() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("ada@example.com")).await.unwrap();

        store.append_event(user.id, at(2024, 1, 1, 8), true).await.unwrap();
        store.append_event(user.id, at(2024, 1, 1, 12), false).await.unwrap();
        let err = store.append_event(user.id, at(2024, 1, 1, 20), true).await.unwrap_err();

        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(store.list_events(user.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = MemoryStore::new();
        store.create_user(new_user("ada@example.com")).await.unwrap();
        let err = store.create_user(new_user("ADA@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_for_non_ascii_case() {
        let store = MemoryStore::new();
        store.create_user(new_user("élise@example.com")).await.unwrap();
        let err = store.create_user(new_user("ÉLISE@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn update_changes_profile_of_existing_user_only() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("ada@example.com")).await.unwrap();

        let update = UserUpdate {
            luteal_phase_length: Some(11),
            ..Default::default()
        };
        let updated = store.update_user(user.id, update.clone()).await.unwrap().unwrap();
        assert_eq!(updated.luteal_phase_length, 11);
        assert_eq!(updated.id, user.id);

        assert!(store.update_user(Uuid::new_v4(), update).await.unwrap().is_none());
    }
}
