use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Order received from the order-taking service. `id` is the peer's order id.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Order {
    pub id: String,
    pub bot_id: Option<String>,
    pub cart_id: String,
    pub session_id: String,
    pub total_scaled: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub menu_item_id: String,
    pub name: String,
    pub quantity: i32,
    pub unit_price_scaled: i64,
    pub total_price_scaled: i64,
}
