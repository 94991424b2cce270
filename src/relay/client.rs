use async_trait::async_trait;
use tonic::{
    codegen::http::uri::PathAndQuery,
    metadata::MetadataValue,
    transport::{Channel, Endpoint},
};
use tracing::{debug, instrument};

use super::{
    codec::JsonCodec,
    types::{
        UpdateOrderStatusRequest, UpdateOrderStatusResponse, PROTOCOL_VERSION,
        UPDATE_ORDER_STATUS_PATH, VERSION_HEADER,
    },
};
use crate::{
    config::RelayConfig,
    error::{AppError, AppResult, ErrorKind},
};

/// Outbound half of the relay: tells the order-taking service an order moved on.
#[async_trait]
pub trait OrderCallback: Send + Sync {
    /// Returns the peer's `updated` flag. Transport, status and decode
    /// failures are all `CallbackFailed`.
    async fn update_order_status(&self, order_id: &str, status: &str) -> AppResult<bool>;
}

/// Unary gRPC client over a lazily connected channel.
#[derive(Clone)]
pub struct CallbackClient {
    channel: Channel,
}

fn failed(e: impl std::fmt::Display) -> AppError {
    AppError::new(ErrorKind::CallbackFailed, format!("update_order_status: {e}"))
}

/// Peers are configured as `host:port`; the channel needs a scheme.
fn peer_uri(addr: &str) -> String {
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    }
}

impl CallbackClient {
    pub fn new(cfg: &RelayConfig) -> anyhow::Result<Self> {
        let channel = Endpoint::from_shared(peer_uri(&cfg.peer_addr))?
            .connect_timeout(cfg.callback_timeout())
            .timeout(cfg.callback_timeout())
            .connect_lazy();
        Ok(Self { channel })
    }
}

#[async_trait]
impl OrderCallback for CallbackClient {
    #[instrument(skip(self))]
    async fn update_order_status(&self, order_id: &str, status: &str) -> AppResult<bool> {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready().await.map_err(failed)?;

        let mut req = tonic::Request::new(UpdateOrderStatusRequest {
            order_id: order_id.to_string(),
            status: status.to_string(),
        });
        req.metadata_mut()
            .insert(VERSION_HEADER, MetadataValue::from_static(PROTOCOL_VERSION));

        let codec = JsonCodec::<UpdateOrderStatusRequest, UpdateOrderStatusResponse>::default();
        let res = grpc
            .unary(req, PathAndQuery::from_static(UPDATE_ORDER_STATUS_PATH), codec)
            .await
            .map_err(failed)?;
        let updated = res.into_inner().updated;
        debug!(updated, "status callback delivered");
        Ok(updated)
    }
}
