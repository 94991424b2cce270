use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use super::{
    published::PublishedMenuStore,
    repo::{MenuItemStore, MenuStore},
    repo_types::{Menu, MenuItem, NewMenuItem, PublishedMenu, PublishedMenuItem},
};
use crate::{
    bots::repo::BotStore,
    db::{get_with_tx, new_id, with_tx, Database},
    error::{AppError, AppResult, ErrorKind, ResultExt},
};

/// Menu editing on the primary store and publishing to the order-bot store.
///
/// `db` and `published_db` are separate connections; a publish never shares a
/// transaction with the primary store.
pub struct MenuService<D: Database> {
    db: Arc<D>,
    published_db: Arc<D>,
    bots: Arc<dyn BotStore<D::Tx>>,
    menus: Arc<dyn MenuStore<D::Tx>>,
    items: Arc<dyn MenuItemStore<D::Tx>>,
    published: Arc<dyn PublishedMenuStore<D::Tx>>,
}

impl<D: Database> Clone for MenuService<D> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            published_db: self.published_db.clone(),
            bots: self.bots.clone(),
            menus: self.menus.clone(),
            items: self.items.clone(),
            published: self.published.clone(),
        }
    }
}

fn validate(bot_id: &str, items: &[NewMenuItem]) -> AppResult<()> {
    if bot_id.trim().is_empty() {
        return Err(AppError::new(ErrorKind::InvalidMenu, "bot id is required"));
    }
    for item in items {
        if item.name.trim().is_empty() {
            return Err(AppError::new(ErrorKind::InvalidMenu, "item name is required"));
        }
        if item.price_scaled < 0 {
            return Err(AppError::new(
                ErrorKind::InvalidMenu,
                format!("negative price for {}", item.name),
            ));
        }
    }
    Ok(())
}

fn to_rows(menu_id: &str, items: Vec<NewMenuItem>) -> Vec<MenuItem> {
    items
        .into_iter()
        .map(|i| MenuItem {
            id: new_id(),
            menu_id: menu_id.to_string(),
            name: i.name,
            price_scaled: i.price_scaled,
        })
        .collect()
}

impl<D: Database> MenuService<D> {
    pub fn new(
        db: Arc<D>,
        published_db: Arc<D>,
        bots: Arc<dyn BotStore<D::Tx>>,
        menus: Arc<dyn MenuStore<D::Tx>>,
        items: Arc<dyn MenuItemStore<D::Tx>>,
        published: Arc<dyn PublishedMenuStore<D::Tx>>,
    ) -> Self {
        Self {
            db,
            published_db,
            bots,
            menus,
            items,
            published,
        }
    }

    /// Create the bot's only menu. A bot that already has one is `InvalidMenu`.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn create_menu(&self, bot_id: &str, items: Vec<NewMenuItem>) -> AppResult<(Menu, Vec<MenuItem>)> {
        validate(bot_id, &items)?;
        let bot_id = bot_id.to_string();
        let (bots, menus, item_store) = (self.bots.clone(), self.menus.clone(), self.items.clone());

        let (menu, rows) = get_with_tx(self.db.as_ref(), move |tx| {
            Box::pin(async move {
                bots.find_by_id(Some(&mut *tx), &bot_id).await?;
                match menus.find_by_bot_id(Some(&mut *tx), &bot_id).await {
                    Ok(_) => {
                        return Err(AppError::new(ErrorKind::InvalidMenu, "menu already exists for bot"))
                    }
                    Err(e) if e.is(ErrorKind::MenuNotFound) => {}
                    Err(e) => return Err(e),
                }
                let menu = Menu { id: new_id(), bot_id };
                menus.create(Some(&mut *tx), &menu).await?;
                let rows = to_rows(&menu.id, items);
                item_store.create_many(Some(tx), &rows).await?;
                Ok((menu, rows))
            })
        })
        .await
        .ctx("create_menu")?;

        info!(menu_id = %menu.id, "menu created");
        Ok((menu, rows))
    }

    pub async fn get_menu(&self, bot_id: &str) -> AppResult<(Menu, Vec<MenuItem>)> {
        let menu = self.menus.find_by_bot_id(None, bot_id).await.ctx("get_menu")?;
        let items = self.items.find_by_menu_id(None, &menu.id).await.ctx("get_menu")?;
        Ok((menu, items))
    }

    /// Replace all items of the bot's existing menu.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn update_menu(&self, bot_id: &str, items: Vec<NewMenuItem>) -> AppResult<(Menu, Vec<MenuItem>)> {
        validate(bot_id, &items)?;
        let bot_id = bot_id.to_string();
        let (menus, item_store) = (self.menus.clone(), self.items.clone());

        let (menu, rows) = get_with_tx(self.db.as_ref(), move |tx| {
            Box::pin(async move {
                let menu = menus.find_by_bot_id(Some(&mut *tx), &bot_id).await?;
                let removed = item_store.delete_by_menu_id(Some(&mut *tx), &menu.id).await?;
                let rows = to_rows(&menu.id, items);
                item_store.create_many(Some(tx), &rows).await?;
                tracing::debug!(removed, added = rows.len(), "menu items replaced");
                Ok((menu, rows))
            })
        })
        .await
        .ctx("update_menu")?;

        info!(menu_id = %menu.id, "menu updated");
        Ok((menu, rows))
    }

    /// Copy the current menu into the order-bot store, replacing whatever was
    /// published for the bot before.
    ///
    /// The read and the write are not atomic across stores. If the write
    /// fails the previous publication stays in place; calling again is safe.
    #[instrument(skip(self))]
    pub async fn publish_menu(&self, bot_id: &str) -> AppResult<(PublishedMenu, Vec<PublishedMenuItem>)> {
        let (menu, items) = self.get_menu(bot_id).await.ctx("publish_menu")?;
        let header = PublishedMenu {
            id: menu.id,
            bot_id: menu.bot_id,
            published_at: OffsetDateTime::now_utc(),
        };
        let snapshot: Vec<PublishedMenuItem> = items
            .iter()
            .map(|i| PublishedMenuItem::from_item(&header.bot_id, i))
            .collect();

        let (published, written) = (self.published.clone(), header.clone());
        let result = with_tx(self.published_db.as_ref(), move |tx| {
            Box::pin(async move { published.replace(Some(tx), &written, &items).await })
        })
        .await;

        if let Err(e) = result {
            warn!(error = %e, "publish failed; published menu may be stale until the next publish");
            return Err(e.context("publish_menu"));
        }
        info!(items = snapshot.len(), "menu published");
        Ok((header, snapshot))
    }

    /// What the order bot currently serves. `MenuNotFound` before the first publish.
    pub async fn published_menu(&self, bot_id: &str) -> AppResult<(PublishedMenu, Vec<PublishedMenuItem>)> {
        let header = self
            .published
            .find_menu(None, bot_id)
            .await
            .ctx("published_menu")?
            .ok_or_else(|| AppError::from(ErrorKind::MenuNotFound).context("published_menu"))?;
        let items = self
            .published
            .find_by_bot_id(None, bot_id)
            .await
            .ctx("published_menu")?;
        Ok((header, items))
    }
}
