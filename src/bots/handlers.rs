use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    error::{AppResult, ErrorKind},
    state::AppState,
};

pub fn bot_routes() -> Router<AppState> {
    Router::new().route("/bot", get(get_bot))
}

#[derive(Debug, Serialize)]
pub struct BotResponse {
    pub bot_id: String,
    pub name: String,
    pub menu_id: Option<String>,
}

/// The caller's bot and, once created, its menu.
#[instrument(skip(state))]
pub async fn get_bot(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<BotResponse>> {
    let bot_id = state.bots.bot_for_user(&user_id).await?;
    let bot = state.bots.find_bot(&bot_id).await?;
    let menu_id = match state.menus.get_menu(&bot.id).await {
        Ok((menu, _)) => Some(menu.id),
        Err(e) if e.is(ErrorKind::MenuNotFound) => None,
        Err(e) => return Err(e),
    };
    Ok(Json(BotResponse {
        bot_id: bot.id,
        name: bot.name,
        menu_id,
    }))
}
