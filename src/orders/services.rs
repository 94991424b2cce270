use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, instrument, warn};

use super::{
    repo::{OrderItemStore, OrderStore},
    repo_types::{Order, OrderItem},
};
use crate::{
    db::{get_with_tx, Database},
    error::{AppError, AppResult, ErrorKind, ResultExt},
    relay::{
        types::{SubmitOrderRequest, STATUS_DONE},
        OrderCallback, OrderReceiver,
    },
};

pub struct OrderService<D: Database> {
    db: Arc<D>,
    orders: Arc<dyn OrderStore<D::Tx>>,
    items: Arc<dyn OrderItemStore<D::Tx>>,
    callback: Arc<dyn OrderCallback>,
}

impl<D: Database> Clone for OrderService<D> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            orders: self.orders.clone(),
            items: self.items.clone(),
            callback: self.callback.clone(),
        }
    }
}

fn split_request(req: SubmitOrderRequest) -> (Order, Vec<OrderItem>) {
    let items = req
        .items
        .into_iter()
        .map(|i| OrderItem {
            id: i.id,
            order_id: req.order_id.clone(),
            menu_item_id: i.menu_item_id,
            name: i.name,
            quantity: i.quantity,
            unit_price_scaled: i.unit_price_scaled,
            total_price_scaled: i.total_price_scaled,
        })
        .collect();
    let order = Order {
        id: req.order_id,
        bot_id: req.bot_id,
        cart_id: req.cart_id,
        session_id: req.session_id,
        total_scaled: req.total_scaled,
    };
    (order, items)
}

impl<D: Database> OrderService<D> {
    pub fn new(
        db: Arc<D>,
        orders: Arc<dyn OrderStore<D::Tx>>,
        items: Arc<dyn OrderItemStore<D::Tx>>,
        callback: Arc<dyn OrderCallback>,
    ) -> Self {
        Self {
            db,
            orders,
            items,
            callback,
        }
    }

    /// Persist the order and its items, then report `DONE` to the peer.
    ///
    /// A repeated order id writes nothing but still reports. When the report
    /// fails the order stays committed and `CallbackFailed` is returned.
    #[instrument(skip(self, req), fields(order_id = %req.order_id))]
    pub async fn submit_order(&self, req: SubmitOrderRequest) -> AppResult<bool> {
        let (order, items) = split_request(req);
        let order_id = order.id.clone();

        let orders = self.orders.clone();
        let item_store = self.items.clone();
        let created = get_with_tx(self.db.as_ref(), move |tx| {
            Box::pin(async move {
                let created = orders.create_if_absent(Some(&mut *tx), &order).await?;
                if created {
                    item_store.create_many(Some(tx), &items).await?;
                }
                Ok(created)
            })
        })
        .await
        .ctx("submit_order")?;

        if created {
            info!("order stored");
        } else {
            info!("order already stored; resending status");
        }

        match self.callback.update_order_status(&order_id, STATUS_DONE).await {
            Ok(true) => Ok(true),
            Ok(false) => {
                warn!("peer did not apply status update");
                Ok(true)
            }
            Err(e) => {
                error!(error = %e, "status callback failed; order stays committed");
                Err(AppError::new(ErrorKind::CallbackFailed, e.to_string()))
            }
        }
    }

    /// Orders attributed to `bot_id`, newest first, with their items.
    pub async fn list_orders(&self, bot_id: &str) -> AppResult<Vec<(Order, Vec<OrderItem>)>> {
        let orders = self.orders.find_by_bot_id(None, bot_id).await.ctx("list_orders")?;
        let mut out = Vec::with_capacity(orders.len());
        for order in orders {
            let items = self
                .items
                .find_by_order_id(None, &order.id)
                .await
                .ctx("list_orders")?;
            out.push((order, items));
        }
        Ok(out)
    }
}

#[async_trait]
impl<D: Database> OrderReceiver for OrderService<D> {
    async fn receive_order(&self, req: SubmitOrderRequest) -> AppResult<bool> {
        self.submit_order(req).await
    }
}
