use serde::{Deserialize, Serialize};

/// Type of token: access or refresh.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Token payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,    // user ID
    pub email: String,
    pub exp: i64,       // expires at (unix seconds)
    pub iat: i64,       // issued at (unix seconds)
    pub typ: TokenKind,
}

/// Pair handed to the client on signup and login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}
