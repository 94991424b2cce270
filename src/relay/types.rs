//! Wire messages of the order-sync relay.
//!
//! Every request and response is a single JSON object in one gRPC message.
//! Field names match what the order-taking service emits, so neither side
//! needs generated types.

use serde::{Deserialize, Serialize};

/// Request metadata key; peers that omit it are treated as version 1.
pub const VERSION_HEADER: &str = "x-ordersync-version";
pub const PROTOCOL_VERSION: &str = "1";

pub const SUBMIT_ORDER_PATH: &str = "/ordersync.OrderSyncService/SubmitOrder";
pub const UPDATE_ORDER_STATUS_PATH: &str = "/ordersync.OrderCallbackService/UpdateOrderStatus";

pub const STATUS_DONE: &str = "DONE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitOrderItem {
    pub id: String,
    pub menu_item_id: String,
    pub name: String,
    pub quantity: i32,
    pub unit_price_scaled: i64,
    pub total_price_scaled: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitOrderRequest {
    pub order_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    pub cart_id: String,
    pub session_id: String,
    pub total_scaled: i64,
    #[serde(default)]
    pub items: Vec<SubmitOrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitOrderResponse {
    pub accepted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateOrderStatusRequest {
    pub order_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateOrderStatusResponse {
    pub updated: bool,
}
