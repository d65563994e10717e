use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use super::require_user;
use crate::errors::Error;
use crate::stats::{self, CycleStatistics, Observation};
use crate::store::SharedStore;

pub fn routes(store: SharedStore) -> Router {
    Router::new()
        .route("/statistics/:user_id", get(get_statistics))
        .with_state(store)
}

async fn get_statistics(
    State(store): State<SharedStore>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<CycleStatistics>, Error> {
    let user = require_user(&store, user_id).await?;
    let events = store.list_events(user_id).await?;

    let observations: Vec<Observation> = events.iter().map(Observation::from).collect();
    let statistics = stats::compute(
        &observations,
        user.luteal_phase_length,
        Utc::now().date_naive(),
    )?;

    tracing::debug!(%user_id, events = events.len(), "📊 Statistics computed");
    Ok(Json(statistics))
}
