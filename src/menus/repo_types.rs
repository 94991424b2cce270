use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// One menu per bot.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Menu {
    pub id: String,
    pub bot_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct MenuItem {
    pub id: String,
    pub menu_id: String,
    pub name: String,
    pub price_scaled: i64, // minor currency units
}

/// Item as submitted by a caller, before it has an id or a menu.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewMenuItem {
    pub name: String,
    pub price_scaled: i64,
}

/// Denormalized menu header in the order-bot store.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct PublishedMenu {
    pub id: String,
    pub bot_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
}

/// Denormalized menu item in the order-bot store, keyed by bot.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct PublishedMenuItem {
    pub id: String,
    pub bot_id: String,
    pub menu_id: String,
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    pub is_available: bool,
}

impl PublishedMenuItem {
    pub fn from_item(bot_id: &str, item: &MenuItem) -> Self {
        Self {
            id: item.id.clone(),
            bot_id: bot_id.to_string(),
            menu_id: item.menu_id.clone(),
            sku: item.id.clone(),
            name: item.name.clone(),
            price_cents: item.price_scaled,
            is_available: true,
        }
    }
}
