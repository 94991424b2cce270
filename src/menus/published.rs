//! Published menus in the order-bot store.
//!
//! This store has its own connection pool; nothing written here shares a
//! transaction with the primary store.

use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::{MenuItem, PublishedMenu, PublishedMenuItem};
use crate::{
    db::{on_tx_or_pool, require_tx, PgTx},
    error::{AppResult, ResultExt},
};

#[async_trait]
pub trait PublishedMenuStore<Tx: Send>: Send + Sync {
    /// Delete everything published for `menu.bot_id`, then insert the snapshot.
    async fn replace(&self, tx: Option<&mut Tx>, menu: &PublishedMenu, items: &[MenuItem]) -> AppResult<()>;
    /// Header of the bot's current publication, if it was ever published.
    async fn find_menu(&self, tx: Option<&mut Tx>, bot_id: &str) -> AppResult<Option<PublishedMenu>>;
    async fn find_by_bot_id(&self, tx: Option<&mut Tx>, bot_id: &str) -> AppResult<Vec<PublishedMenuItem>>;
}

#[derive(Clone)]
pub struct PgPublishedMenuStore {
    db: PgPool,
}

impl PgPublishedMenuStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PublishedMenuStore<PgTx> for PgPublishedMenuStore {
    async fn replace(&self, tx: Option<&mut PgTx>, menu: &PublishedMenu, items: &[MenuItem]) -> AppResult<()> {
        let tx = require_tx(tx, "published.replace")?;

        sqlx::query("DELETE FROM published_menu_item WHERE bot_id = $1")
            .bind(&menu.bot_id)
            .execute(&mut **tx)
            .await
            .ctx("published.replace: delete items")?;
        sqlx::query("DELETE FROM published_menu WHERE bot_id = $1")
            .bind(&menu.bot_id)
            .execute(&mut **tx)
            .await
            .ctx("published.replace: delete menu")?;

        sqlx::query("INSERT INTO published_menu (id, bot_id, published_at) VALUES ($1, $2, $3)")
            .bind(&menu.id)
            .bind(&menu.bot_id)
            .bind(menu.published_at)
            .execute(&mut **tx)
            .await
            .ctx("published.replace: insert menu")?;

        for item in items {
            let record = PublishedMenuItem::from_item(&menu.bot_id, item);
            sqlx::query(
                r#"
                INSERT INTO published_menu_item
                    (id, bot_id, menu_id, sku, name, price_cents, is_available)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(&record.id)
            .bind(&record.bot_id)
            .bind(&record.menu_id)
            .bind(&record.sku)
            .bind(&record.name)
            .bind(record.price_cents)
            .bind(record.is_available)
            .execute(&mut **tx)
            .await
            .ctx("published.replace: insert item")?;
        }
        Ok(())
    }

    async fn find_menu(&self, tx: Option<&mut PgTx>, bot_id: &str) -> AppResult<Option<PublishedMenu>> {
        let row = on_tx_or_pool!(
            &self.db,
            tx,
            sqlx::query_as::<_, PublishedMenu>(
                "SELECT id, bot_id, published_at FROM published_menu WHERE bot_id = $1"
            )
            .bind(bot_id),
            fetch_optional
        )
        .ctx("published.find_menu")?;
        Ok(row)
    }

    async fn find_by_bot_id(&self, tx: Option<&mut PgTx>, bot_id: &str) -> AppResult<Vec<PublishedMenuItem>> {
        let rows = on_tx_or_pool!(
            &self.db,
            tx,
            sqlx::query_as::<_, PublishedMenuItem>(
                r#"
                SELECT id, bot_id, menu_id, sku, name, price_cents, is_available
                  FROM published_menu_item
                 WHERE bot_id = $1
                 ORDER BY created_at, id
                "#,
            )
            .bind(bot_id),
            fetch_all
        )
        .ctx("published.find_by_bot_id")?;
        Ok(rows)
    }
}
