use serde::{Deserialize, Serialize};

use time::OffsetDateTime;

use super::repo_types::{Menu, MenuItem, NewMenuItem, PublishedMenu, PublishedMenuItem};

/// Body of both create and update; update replaces every item.
#[derive(Debug, Deserialize)]
pub struct MenuRequest {
    pub bot_id: String,
    #[serde(default)]
    pub items: Vec<NewMenuItem>,
}

#[derive(Debug, Serialize)]
pub struct MenuItemResponse {
    pub id: String,
    pub name: String,
    pub price_scaled: i64,
}

#[derive(Debug, Serialize)]
pub struct MenuResponse {
    pub id: String,
    pub bot_id: String,
    pub items: Vec<MenuItemResponse>,
}

impl From<(Menu, Vec<MenuItem>)> for MenuResponse {
    fn from((menu, items): (Menu, Vec<MenuItem>)) -> Self {
        Self {
            id: menu.id,
            bot_id: menu.bot_id,
            items: items
                .into_iter()
                .map(|i| MenuItemResponse {
                    id: i.id,
                    name: i.name,
                    price_scaled: i.price_scaled,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PublishedMenuResponse {
    pub bot_id: String,
    pub menu_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
    pub items: Vec<PublishedMenuItem>,
}

impl From<(PublishedMenu, Vec<PublishedMenuItem>)> for PublishedMenuResponse {
    fn from((menu, items): (PublishedMenu, Vec<PublishedMenuItem>)) -> Self {
        Self {
            bot_id: menu.bot_id,
            menu_id: menu.id,
            published_at: menu.published_at,
            items,
        }
    }
}
