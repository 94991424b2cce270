use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::User;
use crate::{
    db::{on_tx_or_pool, require_tx, PgTx},
    error::{is_unique_violation, AppError, AppResult, ErrorKind, ResultExt},
};

#[async_trait]
pub trait UserStore<Tx: Send>: Send + Sync {
    /// Insert a user. Requires a transaction; duplicate email is `UserExists`.
    async fn create(&self, tx: Option<&mut Tx>, user: &User) -> AppResult<()>;
    async fn find_by_email(&self, tx: Option<&mut Tx>, email: &str) -> AppResult<User>;
    async fn find_by_id(&self, tx: Option<&mut Tx>, id: &str) -> AppResult<User>;
    /// Overwrite both stored tokens. `UserNotFound` if no row matched.
    async fn update_tokens(
        &self,
        tx: Option<&mut Tx>,
        id: &str,
        access_token: &str,
        refresh_token: &str,
    ) -> AppResult<()>;
    /// Blank both tokens only while `refresh_token` is still the stored one.
    /// Returns whether a row changed.
    async fn clear_tokens(&self, tx: Option<&mut Tx>, id: &str, refresh_token: &str) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const SELECT_USER: &str =
    "SELECT id, email, password_hash, access_token, refresh_token FROM users";

#[async_trait]
impl UserStore<PgTx> for PgUserStore {
    async fn create(&self, tx: Option<&mut PgTx>, user: &User) -> AppResult<()> {
        let tx = require_tx(tx, "users.create")?;
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, access_token, refresh_token)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.access_token)
        .bind(&user.refresh_token)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::from(ErrorKind::UserExists)
            } else {
                AppError::from(e)
            }
        })
        .ctx("users.create")?;
        Ok(())
    }

    async fn find_by_email(&self, tx: Option<&mut PgTx>, email: &str) -> AppResult<User> {
        let sql = format!("{SELECT_USER} WHERE email = $1");
        let row = on_tx_or_pool!(
            &self.db,
            tx,
            sqlx::query_as::<_, User>(&sql).bind(email),
            fetch_optional
        )
        .ctx("users.find_by_email")?;
        row.ok_or_else(|| AppError::from(ErrorKind::UserNotFound).context("users.find_by_email"))
    }

    async fn find_by_id(&self, tx: Option<&mut PgTx>, id: &str) -> AppResult<User> {
        let sql = format!("{SELECT_USER} WHERE id = $1");
        let row = on_tx_or_pool!(
            &self.db,
            tx,
            sqlx::query_as::<_, User>(&sql).bind(id),
            fetch_optional
        )
        .ctx("users.find_by_id")?;
        row.ok_or_else(|| AppError::from(ErrorKind::UserNotFound).context("users.find_by_id"))
    }

    async fn update_tokens(
        &self,
        tx: Option<&mut PgTx>,
        id: &str,
        access_token: &str,
        refresh_token: &str,
    ) -> AppResult<()> {
        let result = on_tx_or_pool!(
            &self.db,
            tx,
            sqlx::query("UPDATE users SET access_token = $1, refresh_token = $2 WHERE id = $3")
                .bind(access_token)
                .bind(refresh_token)
                .bind(id),
            execute
        )
        .ctx("users.update_tokens")?;
        if result.rows_affected() == 0 {
            return Err(AppError::from(ErrorKind::UserNotFound).context("users.update_tokens"));
        }
        Ok(())
    }

    async fn clear_tokens(&self, tx: Option<&mut PgTx>, id: &str, refresh_token: &str) -> AppResult<bool> {
        let result = on_tx_or_pool!(
            &self.db,
            tx,
            sqlx::query(
                r#"
                UPDATE users SET access_token = '', refresh_token = ''
                WHERE id = $1 AND refresh_token = $2 AND refresh_token <> ''
                "#,
            )
            .bind(id)
            .bind(refresh_token),
            execute
        )
        .ctx("users.clear_tokens")?;
        Ok(result.rows_affected() == 1)
    }
}
