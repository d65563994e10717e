use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::errors::Error;
use crate::models::User;
use crate::store::SharedStore;

pub mod periods;
pub mod statistics;
pub mod users;

pub fn app(store: SharedStore) -> Router {
    Router::new()
        .merge(users::routes(store.clone()))
        .merge(periods::routes(store.clone()))
        .merge(statistics::routes(store))
        .route("/health", get(|| async { "✅ Backend up" }))
        .layer(TraceLayer::new_for_http())
}

async fn require_user(store: &SharedStore, user_id: Uuid) -> Result<User, Error> {
    store.get_user(user_id).await?.ok_or_else(|| Error::NotFound {
        resource: "User",
        id: user_id.to_string(),
    })
}


#[cfg(test)]
mod tests {
    use super::test_utils::*;

    #[test_log::test(tokio::test)]
    async fn health_reports_up() {
        let server = create_test_app();
        let response = server.get("/health").await;
        response.assert_status_ok();
        response.assert_text("✅ Backend up");
    }
}
