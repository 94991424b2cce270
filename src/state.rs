use std::sync::Arc;

use crate::{
    auth::{jwt::JwtKeys, repo::PgUserStore, services::AuthService},
    bots::{
        repo::{PgBotStore, PgUserBotStore},
        services::BotService,
    },
    config::AppConfig,
    db::PgDb,
    menus::{
        published::PgPublishedMenuStore,
        repo::{PgMenuItemStore, PgMenuStore},
        services::MenuService,
    },
    orders::{
        repo::{PgOrderItemStore, PgOrderStore},
        services::OrderService,
    },
    relay::{CallbackClient, OrderCallback},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: PgDb,
    pub published_db: PgDb,
    pub auth: AuthService<PgDb>,
    pub bots: BotService<PgDb>,
    pub menus: MenuService<PgDb>,
    pub orders: OrderService<PgDb>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let db = PgDb::connect(
            &config.database_url,
            config.db_max_connections,
            config.db_acquire_timeout(),
        )
        .await?;
        let published_db = PgDb::connect(
            &config.order_bot_database_url,
            config.db_max_connections,
            config.db_acquire_timeout(),
        )
        .await?;
        let callback = Arc::new(CallbackClient::new(&config.relay)?) as Arc<dyn OrderCallback>;
        Ok(Self::from_parts(Arc::new(config), db, published_db, callback))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        db: PgDb,
        published_db: PgDb,
        callback: Arc<dyn OrderCallback>,
    ) -> Self {
        let pool = db.pool().clone();
        let primary = Arc::new(db.clone());

        let bot_store = Arc::new(PgBotStore::new(pool.clone()));
        let bots = BotService::new(bot_store.clone(), Arc::new(PgUserBotStore::new(pool.clone())));
        let auth = AuthService::new(
            primary.clone(),
            JwtKeys::from_config(&config.jwt),
            Arc::new(PgUserStore::new(pool.clone())),
            bots.clone(),
        );
        let menus = MenuService::new(
            primary.clone(),
            Arc::new(published_db.clone()),
            bot_store,
            Arc::new(PgMenuStore::new(pool.clone())),
            Arc::new(PgMenuItemStore::new(pool.clone())),
            Arc::new(PgPublishedMenuStore::new(published_db.pool().clone())),
        );
        let orders = OrderService::new(
            primary,
            Arc::new(PgOrderStore::new(pool.clone())),
            Arc::new(PgOrderItemStore::new(pool)),
            callback,
        );

        Self {
            config,
            db,
            published_db,
            auth,
            bots,
            menus,
            orders,
        }
    }

    /// State over lazy pools; only routes that fail before touching a
    /// database can be exercised with it.
    #[cfg(test)]
    pub fn fake() -> Self {
        let config = crate::config::test_config();
        let lazy = |url: &str| {
            PgDb::from_pool(
                sqlx::postgres::PgPoolOptions::new()
                    .connect_lazy(url)
                    .expect("lazy pool ok"),
            )
        };
        let db = lazy(&config.database_url);
        let published_db = lazy(&config.order_bot_database_url);
        let callback = Arc::new(CallbackClient::new(&config.relay).expect("client")) as Arc<dyn OrderCallback>;
        Self::from_parts(Arc::new(config), db, published_db, callback)
    }
}
