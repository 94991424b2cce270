use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::{Order, OrderItem};
use crate::{
    db::{on_tx_or_pool, require_tx, PgTx},
    error::{AppResult, ResultExt},
};

#[async_trait]
pub trait OrderStore<Tx: Send>: Send + Sync {
    /// Insert unless an order with the same id exists. `true` if inserted.
    async fn create_if_absent(&self, tx: Option<&mut Tx>, order: &Order) -> AppResult<bool>;
    async fn find_by_bot_id(&self, tx: Option<&mut Tx>, bot_id: &str) -> AppResult<Vec<Order>>;
}

#[async_trait]
pub trait OrderItemStore<Tx: Send>: Send + Sync {
    async fn create_many(&self, tx: Option<&mut Tx>, items: &[OrderItem]) -> AppResult<()>;
    async fn find_by_order_id(&self, tx: Option<&mut Tx>, order_id: &str) -> AppResult<Vec<OrderItem>>;
}

#[derive(Clone)]
pub struct PgOrderStore {
    db: PgPool,
}

impl PgOrderStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const SELECT_ORDER: &str = "SELECT id, bot_id, cart_id, session_id, total_scaled FROM orders";

#[async_trait]
impl OrderStore<PgTx> for PgOrderStore {
    async fn create_if_absent(&self, tx: Option<&mut PgTx>, order: &Order) -> AppResult<bool> {
        let tx = require_tx(tx, "orders.create_if_absent")?;
        let result = sqlx::query(
            r#"
            INSERT INTO orders (id, bot_id, cart_id, session_id, total_scaled)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&order.id)
        .bind(&order.bot_id)
        .bind(&order.cart_id)
        .bind(&order.session_id)
        .bind(order.total_scaled)
        .execute(&mut **tx)
        .await
        .ctx("orders.create_if_absent")?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_by_bot_id(&self, tx: Option<&mut PgTx>, bot_id: &str) -> AppResult<Vec<Order>> {
        let sql = format!("{SELECT_ORDER} WHERE bot_id = $1 ORDER BY created_at DESC, id");
        let rows = on_tx_or_pool!(
            &self.db,
            tx,
            sqlx::query_as::<_, Order>(&sql).bind(bot_id),
            fetch_all
        )
        .ctx("orders.find_by_bot_id")?;
        Ok(rows)
    }
}

#[derive(Clone)]
pub struct PgOrderItemStore {
    db: PgPool,
}

impl PgOrderItemStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OrderItemStore<PgTx> for PgOrderItemStore {
    async fn create_many(&self, tx: Option<&mut PgTx>, items: &[OrderItem]) -> AppResult<()> {
        let tx = require_tx(tx, "order_items.create_many")?;
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_item
                    (id, order_id, menu_item_id, order_item_name, quantity, unit_price_scaled, total_price_scaled)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(&item.id)
            .bind(&item.order_id)
            .bind(&item.menu_item_id)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.unit_price_scaled)
            .bind(item.total_price_scaled)
            .execute(&mut **tx)
            .await
            .ctx("order_items.create_many")?;
        }
        Ok(())
    }

    async fn find_by_order_id(&self, tx: Option<&mut PgTx>, order_id: &str) -> AppResult<Vec<OrderItem>> {
        let rows = on_tx_or_pool!(
            &self.db,
            tx,
            sqlx::query_as::<_, OrderItem>(
                r#"
                SELECT id, order_id, menu_item_id, order_item_name AS name,
                       quantity, unit_price_scaled, total_price_scaled
                  FROM order_item
                 WHERE order_id = $1
                 ORDER BY id
                "#,
            )
            .bind(order_id),
            fetch_all
        )
        .ctx("order_items.find_by_order_id")?;
        Ok(rows)
    }
}
