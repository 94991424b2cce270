use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::dto::{MenuRequest, MenuResponse, PublishedMenuResponse};
use crate::{auth::extractors::AuthUser, error::AppResult, state::AppState};

pub fn menu_routes() -> Router<AppState> {
    Router::new()
        .route("/menus", post(create_menu).put(update_menu))
        .route("/menus/:bot_id", get(get_menu))
        .route("/menus/:bot_id/publish", post(publish_menu))
        .route("/menus/:bot_id/published", get(get_published_menu))
}

#[instrument(skip(state, body), fields(bot_id = %body.bot_id))]
pub async fn create_menu(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<MenuRequest>,
) -> AppResult<(StatusCode, Json<MenuResponse>)> {
    state.bots.ensure_owner(&user_id, &body.bot_id).await?;
    let created = state.menus.create_menu(&body.bot_id, body.items).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[instrument(skip(state))]
pub async fn get_menu(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(bot_id): Path<String>,
) -> AppResult<Json<MenuResponse>> {
    state.bots.ensure_owner(&user_id, &bot_id).await?;
    Ok(Json(state.menus.get_menu(&bot_id).await?.into()))
}

#[instrument(skip(state, body), fields(bot_id = %body.bot_id))]
pub async fn update_menu(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<MenuRequest>,
) -> AppResult<Json<MenuResponse>> {
    state.bots.ensure_owner(&user_id, &body.bot_id).await?;
    let updated = state.menus.update_menu(&body.bot_id, body.items).await?;
    Ok(Json(updated.into()))
}

#[instrument(skip(state))]
pub async fn publish_menu(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(bot_id): Path<String>,
) -> AppResult<Json<PublishedMenuResponse>> {
    state.bots.ensure_owner(&user_id, &bot_id).await?;
    let published = state.menus.publish_menu(&bot_id).await?;
    Ok(Json(published.into()))
}

#[instrument(skip(state))]
pub async fn get_published_menu(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(bot_id): Path<String>,
) -> AppResult<Json<PublishedMenuResponse>> {
    state.bots.ensure_owner(&user_id, &bot_id).await?;
    let published = state.menus.published_menu(&bot_id).await?;
    Ok(Json(published.into()))
}
