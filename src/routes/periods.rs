use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};

use super::require_user;
use crate::errors::Error;
use crate::models::{NewPeriod, Period, UserQuery};
use crate::store::SharedStore;

pub fn routes(store: SharedStore) -> Router {
    Router::new()
        .route("/periods", post(create_period).get(list_periods))
        .route("/periods/", post(create_period).get(list_periods))
        .with_state(store)
}

async fn create_period(
    State(store): State<SharedStore>,
    Json(body): Json<NewPeriod>,
) -> Result<(StatusCode, Json<Period>), Error> {
    require_user(&store, body.user_id).await?;

    let period = store
        .append_event(body.user_id, body.timestamp, body.first_day)
        .await?;
    tracing::info!(
        user_id = %period.user_id,
        period_id = %period.id,
        first_day = period.first_day,
        "🩸 Period event recorded"
    );

    Ok((StatusCode::CREATED, Json(period)))
}

async fn list_periods(
    State(store): State<SharedStore>,
    Query(params): Query<UserQuery>,
) -> Result<Json<Vec<Period>>, Error> {
    require_user(&store, params.user_id).await?;
    Ok(Json(store.list_events(params.user_id).await?))
}
