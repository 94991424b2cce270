use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Discriminant callers match on. Messages are for logs only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidCredentials,
    UserExists,
    InvalidToken,
    ExpiredToken,
    UserNotFound,
    MenuNotFound,
    BotNotFound,
    UserBotNotFound,
    InvalidMenu,
    InvalidInput,
    InvalidTransaction,
    CallbackFailed,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidCredentials => "invalid credentials",
            ErrorKind::UserExists => "user already exists",
            ErrorKind::InvalidToken => "invalid token",
            ErrorKind::ExpiredToken => "expired token",
            ErrorKind::UserNotFound => "user not found",
            ErrorKind::MenuNotFound => "menu not found",
            ErrorKind::BotNotFound => "bot not found",
            ErrorKind::UserBotNotFound => "user bot not found",
            ErrorKind::InvalidMenu => "invalid menu request",
            ErrorKind::InvalidInput => "invalid request",
            ErrorKind::InvalidTransaction => "transaction not started",
            ErrorKind::CallbackFailed => "order status callback failed",
            ErrorKind::Internal => "internal error",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::UserExists => StatusCode::CONFLICT,
            ErrorKind::InvalidCredentials | ErrorKind::InvalidToken | ErrorKind::ExpiredToken => {
                StatusCode::UNAUTHORIZED
            }
            ErrorKind::UserNotFound
            | ErrorKind::MenuNotFound
            | ErrorKind::BotNotFound
            | ErrorKind::UserBotNotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidMenu | ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::CallbackFailed => StatusCode::BAD_GATEWAY,
            ErrorKind::InvalidTransaction | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Error carried through stores and services.
///
/// `message` accumulates call-site context (`"signup: users.create: ..."`)
/// while `kind` stays fixed from the point the error was classified.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct AppError {
    kind: ErrorKind,
    message: String,
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    /// Prefix the message with `ctx`, keeping the kind.
    pub fn context(self, ctx: &str) -> Self {
        Self {
            kind: self.kind,
            message: format!("{}: {}", ctx, self.message),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl From<ErrorKind> for AppError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind, kind.as_str())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Self::internal("row not found"),
            other => Self::internal(other.to_string()),
        }
    }
}

/// Add context to any `AppResult` without touching its kind.
pub trait ResultExt<T> {
    fn ctx(self, ctx: &str) -> AppResult<T>;
}

impl<T, E: Into<AppError>> ResultExt<T> for Result<T, E> {
    fn ctx(self, ctx: &str) -> AppResult<T> {
        self.map_err(|e| e.into().context(ctx))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.kind.status();
        if status.is_server_error() {
            error!(kind = ?self.kind, error = %self.message, "request failed");
        }
        (status, Json(json!({ "error": self.kind.as_str() }))).into_response()
    }
}

/// Relay boundary. Only the kind's text goes on the wire.
impl From<AppError> for tonic::Status {
    fn from(e: AppError) -> Self {
        let msg = e.kind.as_str();
        match e.kind {
            ErrorKind::InvalidInput => Self::invalid_argument(msg),
            ErrorKind::CallbackFailed => Self::unavailable(msg),
            _ => {
                error!(kind = ?e.kind, error = %e.message, "relay call failed");
                Self::internal(msg)
            }
        }
    }
}

/// Postgres SQLSTATE for unique_violation.
pub(crate) const UNIQUE_VIOLATION: &str = "23505";

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}
