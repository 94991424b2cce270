use serde::Serialize;

use super::repo_types::{Order, OrderItem};

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}
