use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use super::require_user;
use crate::errors::Error;
use crate::models::{NewUser, User, UserUpdate};
use crate::store::SharedStore;

pub fn routes(store: SharedStore) -> Router {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/", post(create_user))
        .route("/users/:user_id", get(get_user).patch(update_user))
        .with_state(store)
}

async fn create_user(
    State(store): State<SharedStore>,
    Json(body): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), Error> {
    body.validate(Utc::now().date_naive())?;

    let user = store.create_user(body).await?;
    tracing::info!(user_id = %user.id, "👤 User created");

    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(store): State<SharedStore>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<User>, Error> {
    Ok(Json(require_user(&store, user_id).await?))
}

async fn update_user(
    State(store): State<SharedStore>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<UserUpdate>,
) -> Result<Json<User>, Error> {
    body.validate(Utc::now().date_naive())?;

    let user = store.update_user(user_id, body).await?.ok_or_else(|| Error::NotFound {
        resource: "User",
        id: user_id.to_string(),
    })?;

    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use crate::models::User;
    use crate::routes::test_utils::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use uuid::Uuid;

    #[test_log::test(tokio::test)]
    async fn create_user_assigns_id_and_defaults() {
        let server = create_test_app();

        let response = server
            .post("/users/")
            .json(&json!({
                "email": "ada@example.com",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "birth_date": "1990-12-10",
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let user: User = response.json();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.first_name.as_deref(), Some("Ada"));
        assert_eq!(user.timezone, "America/New_York");
        assert!(user.send_emails);
        assert_eq!(user.luteal_phase_length, 14);

        let fetched: User = server.get(&format!("/users/{}", user.id)).await.json();
        assert_eq!(fetched, user);
    }

    #[test_log::test(tokio::test)]
    async fn create_user_without_trailing_slash() {
        let server = create_test_app();
        server
            .post("/users")
            .json(&json!({ "email": "ada@example.com" }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    #[test_log::test(tokio::test)]
    async fn invalid_user_is_rejected() {
        let server = create_test_app();

        let response = server
            .post("/users/")
            .json(&json!({ "email": "not-an-email" }))
            .await;
        response.assert_status_bad_request();

        let response = server
            .post("/users/")
            .json(&json!({ "email": "ada@example.com", "luteal_phase_length": -3 }))
            .await;
        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "luteal_phase_length must be between 1 and 30 days");

        server
            .post("/users/")
            .json(&json!({ "email": "grace@example.com", "luteal_phase_length": 200_000_000 }))
            .await
            .assert_status_bad_request();
    }

    #[test_log::test(tokio::test)]
    async fn missing_email_is_a_client_error() {
        let server = create_test_app();
        let response = server.post("/users/").json(&json!({ "first_name": "Ada" })).await;
        assert!(response.status_code().is_client_error());
    }

    #[test_log::test(tokio::test)]
    async fn duplicate_email_conflicts() {
        let server = create_test_app();
        create_test_user(&server, "ada@example.com").await;

        server
            .post("/users/")
            .json(&json!({ "email": "ada@example.com" }))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[test_log::test(tokio::test)]
    async fn update_user_changes_luteal_phase() {
        let server = create_test_app();
        let user = create_test_user(&server, "ada@example.com").await;

        let response = server
            .patch(&format!("/users/{}", user.id))
            .json(&json!({ "luteal_phase_length": 12, "timezone": "Europe/Berlin" }))
            .await;

        response.assert_status_ok();
        let updated: User = response.json();
        assert_eq!(updated.luteal_phase_length, 12);
        assert_eq!(updated.timezone, "Europe/Berlin");
        assert_eq!(updated.email, user.email);
    }

    #[test_log::test(tokio::test)]
    async fn update_user_null_clears_name() {
        let server = create_test_app();
        let user: User = server
            .post("/users/")
            .json(&json!({ "email": "ada@example.com", "first_name": "Ada", "last_name": "Lovelace" }))
            .await
            .json();

        let updated: User = server
            .patch(&format!("/users/{}", user.id))
            .json(&json!({ "first_name": null }))
            .await
            .json();

        assert_eq!(updated.first_name, None);
        assert_eq!(updated.last_name.as_deref(), Some("Lovelace"));
    }

    #[test_log::test(tokio::test)]
    async fn unknown_user_is_not_found() {
        let server = create_test_app();
        let id = Uuid::new_v4();

        server.get(&format!("/users/{id}")).await.assert_status_not_found();
        server
            .patch(&format!("/users/{id}"))
            .json(&json!({ "send_emails": false }))
            .await
            .assert_status_not_found();
    }
}
