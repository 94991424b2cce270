use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Request, State},
    response::Response,
    routing::post,
    Router,
};
use futures::future::BoxFuture;
use tonic::{metadata::MetadataMap, server::UnaryService, Status};
use tracing::{info, instrument, warn};

use super::{
    codec::JsonCodec,
    types::{SubmitOrderRequest, SubmitOrderResponse, PROTOCOL_VERSION, SUBMIT_ORDER_PATH, VERSION_HEADER},
};
use crate::error::{AppError, AppResult, ErrorKind};

/// Inbound half of the relay.
#[async_trait]
pub trait OrderReceiver: Send + Sync {
    async fn receive_order(&self, req: SubmitOrderRequest) -> AppResult<bool>;
}

/// gRPC router; needs an HTTP/2 capable listener.
pub fn router(receiver: Arc<dyn OrderReceiver>) -> Router {
    Router::new()
        .route(SUBMIT_ORDER_PATH, post(submit_order))
        .with_state(receiver)
}

/// A missing header is treated as the current version.
fn check_version(metadata: &MetadataMap) -> AppResult<()> {
    match metadata.get(VERSION_HEADER) {
        None => Ok(()),
        Some(v) if v.to_str().ok() == Some(PROTOCOL_VERSION) => Ok(()),
        Some(v) => Err(AppError::new(
            ErrorKind::InvalidInput,
            format!("unsupported relay version {:?}", v),
        )),
    }
}

struct SubmitOrder(Arc<dyn OrderReceiver>);

impl UnaryService<SubmitOrderRequest> for SubmitOrder {
    type Response = SubmitOrderResponse;
    type Future = BoxFuture<'static, Result<tonic::Response<SubmitOrderResponse>, Status>>;

    fn call(&mut self, request: tonic::Request<SubmitOrderRequest>) -> Self::Future {
        let receiver = self.0.clone();
        Box::pin(async move {
            check_version(request.metadata()).map_err(Status::from)?;
            let req = request.into_inner();
            let order_id = req.order_id.clone();
            info!(%order_id, items = req.items.len(), "order received");
            let accepted = receiver.receive_order(req).await.map_err(|e| {
                warn!(%order_id, error = %e, "submit order failed");
                Status::from(e)
            })?;
            Ok(tonic::Response::new(SubmitOrderResponse { accepted }))
        })
    }
}

#[instrument(skip_all)]
async fn submit_order(State(receiver): State<Arc<dyn OrderReceiver>>, req: Request) -> Response {
    let mut grpc = tonic::server::Grpc::new(JsonCodec::<SubmitOrderResponse, SubmitOrderRequest>::default());
    grpc.unary(SubmitOrder(receiver), req).await.map(Body::new)
}
