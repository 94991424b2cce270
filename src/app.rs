use std::{future::Future, net::SocketAddr};

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{auth, bots, error::AppResult, menus, orders, relay, state::AppState};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/orderbotmgmt",
            Router::new()
                .merge(auth::router())
                .merge(bots::router())
                .merge(menus::router())
                .merge(orders::router())
                .route("/health", get(health)),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(trace_layer())
}

/// Relay server: `SubmitOrder` lands in the order service.
pub fn build_relay(state: &AppState) -> Router {
    relay::server::router(std::sync::Arc::new(state.orders.clone())).layer(trace_layer())
}

fn trace_layer() -> TraceLayer<
    tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>,
    impl Fn(&axum::http::Request<axum::body::Body>) -> tracing::Span + Clone,
    tower_http::trace::DefaultOnRequest,
    impl Fn(&axum::http::Response<axum::body::Body>, std::time::Duration, &tracing::Span) + Clone,
> {
    TraceLayer::new_for_http()
        .make_span_with(|req: &axum::http::Request<axum::body::Body>| {
            let method = req.method().clone();
            let uri = req.uri().clone();
            tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
        })
        .on_response(
            |res: &axum::http::Response<axum::body::Body>,
             _latency: std::time::Duration,
             span: &tracing::Span| {
                let status = res.status();
                span.record("status", tracing::field::display(status));
                if status.is_server_error() {
                    tracing::error!(%status, "response");
                } else {
                    tracing::info!(%status, "response");
                }
            },
        )
}

async fn health(State(state): State<AppState>) -> AppResult<Json<Value>> {
    state.db.ping().await?;
    state.published_db.ping().await?;
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn serve(
    name: &'static str,
    addr: SocketAddr,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("{} listening on {}", name, addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
