use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Bot {
    pub id: String,
    pub name: String,
}

/// Link between a user and a bot they own.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct UserBot {
    pub id: String,
    pub user_id: String,
    pub bot_id: String,
}
