use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::{Bot, UserBot};
use crate::{
    db::{on_tx_or_pool, require_tx, PgTx},
    error::{AppError, AppResult, ErrorKind, ResultExt},
};

#[async_trait]
pub trait BotStore<Tx: Send>: Send + Sync {
    async fn create(&self, tx: Option<&mut Tx>, bot: &Bot) -> AppResult<()>;
    async fn find_by_id(&self, tx: Option<&mut Tx>, id: &str) -> AppResult<Bot>;
}

#[async_trait]
pub trait UserBotStore<Tx: Send>: Send + Sync {
    async fn create(&self, tx: Option<&mut Tx>, link: &UserBot) -> AppResult<()>;
    /// All links for a user, oldest first. `UserBotNotFound` when there are none.
    async fn find_by_user_id(&self, tx: Option<&mut Tx>, user_id: &str) -> AppResult<Vec<UserBot>>;
}

#[derive(Clone)]
pub struct PgBotStore {
    db: PgPool,
}

impl PgBotStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BotStore<PgTx> for PgBotStore {
    async fn create(&self, tx: Option<&mut PgTx>, bot: &Bot) -> AppResult<()> {
        let tx = require_tx(tx, "bots.create")?;
        sqlx::query("INSERT INTO bot (id, bot_name) VALUES ($1, $2)")
            .bind(&bot.id)
            .bind(&bot.name)
            .execute(&mut **tx)
            .await
            .ctx("bots.create")?;
        Ok(())
    }

    async fn find_by_id(&self, tx: Option<&mut PgTx>, id: &str) -> AppResult<Bot> {
        let row = on_tx_or_pool!(
            &self.db,
            tx,
            sqlx::query_as::<_, Bot>("SELECT id, bot_name AS name FROM bot WHERE id = $1").bind(id),
            fetch_optional
        )
        .ctx("bots.find_by_id")?;
        row.ok_or_else(|| AppError::from(ErrorKind::BotNotFound).context("bots.find_by_id"))
    }
}

#[derive(Clone)]
pub struct PgUserBotStore {
    db: PgPool,
}

impl PgUserBotStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserBotStore<PgTx> for PgUserBotStore {
    async fn create(&self, tx: Option<&mut PgTx>, link: &UserBot) -> AppResult<()> {
        let tx = require_tx(tx, "user_bots.create")?;
        sqlx::query("INSERT INTO user_bot (id, user_id, bot_id) VALUES ($1, $2, $3)")
            .bind(&link.id)
            .bind(&link.user_id)
            .bind(&link.bot_id)
            .execute(&mut **tx)
            .await
            .ctx("user_bots.create")?;
        Ok(())
    }

    async fn find_by_user_id(&self, tx: Option<&mut PgTx>, user_id: &str) -> AppResult<Vec<UserBot>> {
        let rows = on_tx_or_pool!(
            &self.db,
            tx,
            sqlx::query_as::<_, UserBot>(
                "SELECT id, user_id, bot_id FROM user_bot WHERE user_id = $1 ORDER BY created_at, id"
            )
            .bind(user_id),
            fetch_all
        )
        .ctx("user_bots.find_by_user_id")?;
        if rows.is_empty() {
            return Err(AppError::from(ErrorKind::UserBotNotFound).context("user_bots.find_by_user_id"));
        }
        Ok(rows)
    }
}
