use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::dto::OrderResponse;
use crate::{auth::extractors::AuthUser, error::AppResult, state::AppState};

pub fn order_routes() -> Router<AppState> {
    Router::new().route("/orders/:bot_id", get(list_orders))
}

#[instrument(skip(state))]
pub async fn list_orders(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(bot_id): Path<String>,
) -> AppResult<Json<Vec<OrderResponse>>> {
    state.bots.ensure_owner(&user_id, &bot_id).await?;
    let orders = state
        .orders
        .list_orders(&bot_id)
        .await?
        .into_iter()
        .map(|(order, items)| OrderResponse { order, items })
        .collect();
    Ok(Json(orders))
}
