use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::{Menu, MenuItem};
use crate::{
    db::{on_tx_or_pool, require_tx, PgTx},
    error::{is_unique_violation, AppError, AppResult, ErrorKind, ResultExt},
};

#[async_trait]
pub trait MenuStore<Tx: Send>: Send + Sync {
    /// Requires a transaction. A second menu for the same bot is `InvalidMenu`.
    async fn create(&self, tx: Option<&mut Tx>, menu: &Menu) -> AppResult<()>;
    async fn find_by_bot_id(&self, tx: Option<&mut Tx>, bot_id: &str) -> AppResult<Menu>;
}

#[async_trait]
pub trait MenuItemStore<Tx: Send>: Send + Sync {
    async fn create_many(&self, tx: Option<&mut Tx>, items: &[MenuItem]) -> AppResult<()>;
    async fn find_by_menu_id(&self, tx: Option<&mut Tx>, menu_id: &str) -> AppResult<Vec<MenuItem>>;
    async fn delete_by_menu_id(&self, tx: Option<&mut Tx>, menu_id: &str) -> AppResult<u64>;
}

#[derive(Clone)]
pub struct PgMenuStore {
    db: PgPool,
}

impl PgMenuStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MenuStore<PgTx> for PgMenuStore {
    async fn create(&self, tx: Option<&mut PgTx>, menu: &Menu) -> AppResult<()> {
        let tx = require_tx(tx, "menus.create")?;
        sqlx::query("INSERT INTO menu (id, bot_id) VALUES ($1, $2)")
            .bind(&menu.id)
            .bind(&menu.bot_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                // menu.bot_id is UNIQUE; a racing create lands here
                if is_unique_violation(&e) {
                    AppError::new(ErrorKind::InvalidMenu, "duplicated bot id")
                } else {
                    AppError::from(e)
                }
            })
            .ctx("menus.create")?;
        Ok(())
    }

    async fn find_by_bot_id(&self, tx: Option<&mut PgTx>, bot_id: &str) -> AppResult<Menu> {
        let row = on_tx_or_pool!(
            &self.db,
            tx,
            sqlx::query_as::<_, Menu>("SELECT id, bot_id FROM menu WHERE bot_id = $1").bind(bot_id),
            fetch_optional
        )
        .ctx("menus.find_by_bot_id")?;
        row.ok_or_else(|| AppError::from(ErrorKind::MenuNotFound).context("menus.find_by_bot_id"))
    }
}

#[derive(Clone)]
pub struct PgMenuItemStore {
    db: PgPool,
}

impl PgMenuItemStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MenuItemStore<PgTx> for PgMenuItemStore {
    async fn create_many(&self, tx: Option<&mut PgTx>, items: &[MenuItem]) -> AppResult<()> {
        let tx = require_tx(tx, "menu_items.create_many")?;
        for item in items {
            sqlx::query(
                "INSERT INTO menu_item (id, menu_id, menu_item_name, price_scaled) VALUES ($1, $2, $3, $4)",
            )
            .bind(&item.id)
            .bind(&item.menu_id)
            .bind(&item.name)
            .bind(item.price_scaled)
            .execute(&mut **tx)
            .await
            .ctx("menu_items.create_many")?;
        }
        Ok(())
    }

    async fn find_by_menu_id(&self, tx: Option<&mut PgTx>, menu_id: &str) -> AppResult<Vec<MenuItem>> {
        let rows = on_tx_or_pool!(
            &self.db,
            tx,
            sqlx::query_as::<_, MenuItem>(
                r#"
                SELECT id, menu_id, menu_item_name AS name, price_scaled
                  FROM menu_item
                 WHERE menu_id = $1
                 ORDER BY created_at, id
                "#,
            )
            .bind(menu_id),
            fetch_all
        )
        .ctx("menu_items.find_by_menu_id")?;
        Ok(rows)
    }

    async fn delete_by_menu_id(&self, tx: Option<&mut PgTx>, menu_id: &str) -> AppResult<u64> {
        let tx = require_tx(tx, "menu_items.delete_by_menu_id")?;
        let result = sqlx::query("DELETE FROM menu_item WHERE menu_id = $1")
            .bind(menu_id)
            .execute(&mut **tx)
            .await
            .ctx("menu_items.delete_by_menu_id")?;
        Ok(result.rows_affected())
    }
}
