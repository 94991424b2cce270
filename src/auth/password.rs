use tracing::error;

use crate::error::{AppError, AppResult, ErrorKind};

/// bcrypt reads 72 bytes including a trailing NUL; longer passwords are
/// refused instead of silently cut.
pub const MAX_PASSWORD_BYTES: usize = 71;

fn classify(op: &str, e: bcrypt::BcryptError) -> AppError {
    match e {
        bcrypt::BcryptError::Truncation(_) => AppError::new(
            ErrorKind::InvalidCredentials,
            format!("{op}: password longer than {MAX_PASSWORD_BYTES} bytes"),
        ),
        other => {
            error!(error = %other, "{op} error");
            AppError::internal(format!("{op}: {other}"))
        }
    }
}

pub fn hash_password(plain: &str) -> AppResult<String> {
    bcrypt::non_truncating_hash(plain, bcrypt::DEFAULT_COST).map_err(|e| classify("bcrypt hash", e))
}

pub fn verify_password(plain: &str, hash: &str) -> AppResult<bool> {
    bcrypt::non_truncating_verify(plain, hash).map_err(|e| classify("bcrypt verify", e))
}
