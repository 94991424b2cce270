//! In-memory `Database` and stores for service tests.
//!
//! A transaction works on a cloned copy of the state and replaces the shared
//! state on commit, so a rolled-back unit of work leaves nothing behind.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use async_trait::async_trait;

use crate::{
    auth::{repo::UserStore, repo_types::User},
    bots::{
        repo::{BotStore, UserBotStore},
        repo_types::{Bot, UserBot},
    },
    db::{require_tx, Database},
    error::{AppError, AppResult, ErrorKind},
    menus::{
        published::PublishedMenuStore,
        repo::{MenuItemStore, MenuStore},
        repo_types::{Menu, MenuItem, PublishedMenu, PublishedMenuItem},
    },
    orders::{
        repo::{OrderItemStore, OrderStore},
        repo_types::{Order, OrderItem},
    },
    relay::client::OrderCallback,
};

#[derive(Debug, Clone, Default)]
pub struct MemState {
    pub users: Vec<User>,
    pub bots: Vec<Bot>,
    pub user_bots: Vec<UserBot>,
    pub menus: Vec<Menu>,
    pub menu_items: Vec<MenuItem>,
    pub published_menus: Vec<PublishedMenu>,
    pub published_items: Vec<PublishedMenuItem>,
    pub orders: Vec<Order>,
    pub order_items: Vec<OrderItem>,
}

#[derive(Clone, Default)]
pub struct MemDb {
    state: Arc<Mutex<MemState>>,
    failpoints: Arc<Mutex<HashSet<String>>>,
}

impl MemDb {
    pub fn snapshot(&self) -> MemState {
        self.lock().clone()
    }

    /// Make every later call of `op` (e.g. `"user_bots.create"`) fail.
    pub fn fail_on(&self, op: &str) {
        self.failpoints.lock().unwrap().insert(op.to_string());
    }

    pub fn clear_failpoints(&self) {
        self.failpoints.lock().unwrap().clear();
    }

    fn check(&self, op: &str) -> AppResult<()> {
        if self.failpoints.lock().unwrap().contains(op) {
            return Err(AppError::internal(format!("{op}: injected failure")));
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, MemState> {
        self.state.lock().unwrap()
    }
}

pub struct MemTx {
    pub staged: MemState,
}

#[async_trait]
impl Database for MemDb {
    type Tx = MemTx;

    async fn begin(&self) -> AppResult<MemTx> {
        self.check("begin")?;
        Ok(MemTx {
            staged: self.snapshot(),
        })
    }

    async fn commit(&self, tx: MemTx) -> AppResult<()> {
        self.check("commit")?;
        *self.lock() = tx.staged;
        Ok(())
    }

    async fn rollback(&self, _tx: MemTx) -> AppResult<()> {
        Ok(())
    }
}

/// Implements every store trait over one [`MemDb`].
#[derive(Clone)]
pub struct MemStore {
    db: MemDb,
}

impl MemStore {
    pub fn new(db: MemDb) -> Self {
        Self { db }
    }

    fn read<R>(&self, tx: Option<&mut MemTx>, op: &str, f: impl FnOnce(&MemState) -> R) -> AppResult<R> {
        self.db.check(op)?;
        Ok(match tx {
            Some(tx) => f(&tx.staged),
            None => f(&*self.db.lock()),
        })
    }

    fn write<R>(
        &self,
        tx: Option<&mut MemTx>,
        op: &str,
        f: impl FnOnce(&mut MemState) -> AppResult<R>,
    ) -> AppResult<R> {
        self.db.check(op)?;
        match tx {
            Some(tx) => f(&mut tx.staged),
            None => f(&mut *self.db.lock()),
        }
    }

    fn write_in_tx<R>(
        &self,
        tx: Option<&mut MemTx>,
        op: &str,
        f: impl FnOnce(&mut MemState) -> AppResult<R>,
    ) -> AppResult<R> {
        let tx = require_tx(tx, op)?;
        self.write(Some(tx), op, f)
    }
}

fn missing(kind: ErrorKind, op: &str) -> AppError {
    AppError::from(kind).context(op)
}

#[async_trait]
impl UserStore<MemTx> for MemStore {
    async fn create(&self, tx: Option<&mut MemTx>, user: &User) -> AppResult<()> {
        self.write_in_tx(tx, "users.create", |s| {
            if s.users.iter().any(|u| u.email == user.email) {
                return Err(AppError::from(ErrorKind::UserExists).context("users.create"));
            }
            s.users.push(user.clone());
            Ok(())
        })
    }

    async fn find_by_email(&self, tx: Option<&mut MemTx>, email: &str) -> AppResult<User> {
        self.read(tx, "users.find_by_email", |s| {
            s.users.iter().find(|u| u.email == email).cloned()
        })?
        .ok_or_else(|| missing(ErrorKind::UserNotFound, "users.find_by_email"))
    }

    async fn find_by_id(&self, tx: Option<&mut MemTx>, id: &str) -> AppResult<User> {
        self.read(tx, "users.find_by_id", |s| s.users.iter().find(|u| u.id == id).cloned())?
            .ok_or_else(|| missing(ErrorKind::UserNotFound, "users.find_by_id"))
    }

    async fn update_tokens(
        &self,
        tx: Option<&mut MemTx>,
        id: &str,
        access_token: &str,
        refresh_token: &str,
    ) -> AppResult<()> {
        self.write(tx, "users.update_tokens", |s| {
            let Some(user) = s.users.iter_mut().find(|u| u.id == id) else {
                return Err(missing(ErrorKind::UserNotFound, "users.update_tokens"));
            };
            user.access_token = access_token.to_string();
            user.refresh_token = refresh_token.to_string();
            Ok(())
        })
    }

    async fn clear_tokens(&self, tx: Option<&mut MemTx>, id: &str, refresh_token: &str) -> AppResult<bool> {
        self.write(tx, "users.clear_tokens", |s| {
            let Some(user) = s
                .users
                .iter_mut()
                .find(|u| u.id == id && !u.refresh_token.is_empty() && u.refresh_token == refresh_token)
            else {
                return Ok(false);
            };
            user.access_token.clear();
            user.refresh_token.clear();
            Ok(true)
        })
    }
}

#[async_trait]
impl BotStore<MemTx> for MemStore {
    async fn create(&self, tx: Option<&mut MemTx>, bot: &Bot) -> AppResult<()> {
        self.write_in_tx(tx, "bots.create", |s| {
            s.bots.push(bot.clone());
            Ok(())
        })
    }

    async fn find_by_id(&self, tx: Option<&mut MemTx>, id: &str) -> AppResult<Bot> {
        self.read(tx, "bots.find_by_id", |s| s.bots.iter().find(|b| b.id == id).cloned())?
            .ok_or_else(|| missing(ErrorKind::BotNotFound, "bots.find_by_id"))
    }
}

#[async_trait]
impl UserBotStore<MemTx> for MemStore {
    async fn create(&self, tx: Option<&mut MemTx>, link: &UserBot) -> AppResult<()> {
        self.write_in_tx(tx, "user_bots.create", |s| {
            s.user_bots.push(link.clone());
            Ok(())
        })
    }

    async fn find_by_user_id(&self, tx: Option<&mut MemTx>, user_id: &str) -> AppResult<Vec<UserBot>> {
        let links = self.read(tx, "user_bots.find_by_user_id", |s| {
            s.user_bots
                .iter()
                .filter(|l| l.user_id == user_id)
                .cloned()
                .collect::<Vec<_>>()
        })?;
        if links.is_empty() {
            return Err(missing(ErrorKind::UserBotNotFound, "user_bots.find_by_user_id"));
        }
        Ok(links)
    }
}

#[async_trait]
impl MenuStore<MemTx> for MemStore {
    async fn create(&self, tx: Option<&mut MemTx>, menu: &Menu) -> AppResult<()> {
        self.write_in_tx(tx, "menus.create", |s| {
            if s.menus.iter().any(|m| m.bot_id == menu.bot_id) {
                return Err(AppError::new(ErrorKind::InvalidMenu, "duplicated bot id"));
            }
            s.menus.push(menu.clone());
            Ok(())
        })
    }

    async fn find_by_bot_id(&self, tx: Option<&mut MemTx>, bot_id: &str) -> AppResult<Menu> {
        self.read(tx, "menus.find_by_bot_id", |s| {
            s.menus.iter().find(|m| m.bot_id == bot_id).cloned()
        })?
        .ok_or_else(|| missing(ErrorKind::MenuNotFound, "menus.find_by_bot_id"))
    }
}

#[async_trait]
impl MenuItemStore<MemTx> for MemStore {
    async fn create_many(&self, tx: Option<&mut MemTx>, items: &[MenuItem]) -> AppResult<()> {
        self.write_in_tx(tx, "menu_items.create_many", |s| {
            s.menu_items.extend_from_slice(items);
            Ok(())
        })
    }

    async fn find_by_menu_id(&self, tx: Option<&mut MemTx>, menu_id: &str) -> AppResult<Vec<MenuItem>> {
        self.read(tx, "menu_items.find_by_menu_id", |s| {
            s.menu_items
                .iter()
                .filter(|i| i.menu_id == menu_id)
                .cloned()
                .collect()
        })
    }

    async fn delete_by_menu_id(&self, tx: Option<&mut MemTx>, menu_id: &str) -> AppResult<u64> {
        self.write_in_tx(tx, "menu_items.delete_by_menu_id", |s| {
            let before = s.menu_items.len();
            s.menu_items.retain(|i| i.menu_id != menu_id);
            Ok((before - s.menu_items.len()) as u64)
        })
    }
}

#[async_trait]
impl PublishedMenuStore<MemTx> for MemStore {
    async fn replace(&self, tx: Option<&mut MemTx>, menu: &PublishedMenu, items: &[MenuItem]) -> AppResult<()> {
        self.write_in_tx(tx, "published.replace", |s| {
            s.published_items.retain(|i| i.bot_id != menu.bot_id);
            s.published_menus.retain(|m| m.bot_id != menu.bot_id);
            s.published_menus.push(menu.clone());
            s.published_items.extend(
                items
                    .iter()
                    .map(|i| PublishedMenuItem::from_item(&menu.bot_id, i)),
            );
            Ok(())
        })
    }

    async fn find_menu(&self, tx: Option<&mut MemTx>, bot_id: &str) -> AppResult<Option<PublishedMenu>> {
        self.read(tx, "published.find_menu", |s| {
            s.published_menus.iter().find(|m| m.bot_id == bot_id).cloned()
        })
    }

    async fn find_by_bot_id(&self, tx: Option<&mut MemTx>, bot_id: &str) -> AppResult<Vec<PublishedMenuItem>> {
        self.read(tx, "published.find_by_bot_id", |s| {
            s.published_items
                .iter()
                .filter(|i| i.bot_id == bot_id)
                .cloned()
                .collect()
        })
    }
}

#[async_trait]
impl OrderStore<MemTx> for MemStore {
    async fn create_if_absent(&self, tx: Option<&mut MemTx>, order: &Order) -> AppResult<bool> {
        self.write_in_tx(tx, "orders.create_if_absent", |s| {
            if s.orders.iter().any(|o| o.id == order.id) {
                return Ok(false);
            }
            s.orders.push(order.clone());
            Ok(true)
        })
    }

    async fn find_by_bot_id(&self, tx: Option<&mut MemTx>, bot_id: &str) -> AppResult<Vec<Order>> {
        self.read(tx, "orders.find_by_bot_id", |s| {
            s.orders
                .iter()
                .filter(|o| o.bot_id.as_deref() == Some(bot_id))
                .cloned()
                .collect()
        })
    }
}

#[async_trait]
impl OrderItemStore<MemTx> for MemStore {
    async fn create_many(&self, tx: Option<&mut MemTx>, items: &[OrderItem]) -> AppResult<()> {
        self.write_in_tx(tx, "order_items.create_many", |s| {
            s.order_items.extend_from_slice(items);
            Ok(())
        })
    }

    async fn find_by_order_id(&self, tx: Option<&mut MemTx>, order_id: &str) -> AppResult<Vec<OrderItem>> {
        self.read(tx, "order_items.find_by_order_id", |s| {
            s.order_items
                .iter()
                .filter(|i| i.order_id == order_id)
                .cloned()
                .collect()
        })
    }
}

/// Records status callbacks; can be switched to fail like a dead peer.
#[derive(Clone, Default)]
pub struct RecordingCallback {
    calls: Arc<Mutex<Vec<(String, String)>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingCallback {
    pub fn failing() -> Self {
        let cb = Self::default();
        cb.fail.store(true, Ordering::SeqCst);
        cb
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderCallback for RecordingCallback {
    async fn update_order_status(&self, order_id: &str, status: &str) -> AppResult<bool> {
        self.calls
            .lock()
            .unwrap()
            .push((order_id.to_string(), status.to_string()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::new(ErrorKind::CallbackFailed, "peer unreachable"));
        }
        Ok(true)
    }
}
