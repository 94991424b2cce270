use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User record in the primary store.
///
/// `access_token` / `refresh_token` hold the currently valid signed strings;
/// empty after logout.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: String,
}
