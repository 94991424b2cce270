use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use tracing::warn;
use uuid::Uuid;

use crate::error::{AppError, AppResult, ErrorKind};

/// A store that can open units of work.
///
/// `Tx` is opaque to services: they receive it from [`with_tx`] and hand it
/// to stores unchanged.
#[async_trait]
pub trait Database: Send + Sync + 'static {
    type Tx: Send + 'static;

    async fn begin(&self) -> AppResult<Self::Tx>;
    async fn commit(&self, tx: Self::Tx) -> AppResult<()>;
    async fn rollback(&self, tx: Self::Tx) -> AppResult<()>;
}

/// Run `f` in one transaction; commit on `Ok`, roll back on `Err`.
pub async fn with_tx<D, F>(db: &D, f: F) -> AppResult<()>
where
    D: Database + ?Sized,
    F: for<'t> FnOnce(&'t mut D::Tx) -> BoxFuture<'t, AppResult<()>> + Send,
{
    get_with_tx(db, f).await
}

/// Value-returning variant of [`with_tx`].
pub async fn get_with_tx<D, T, F>(db: &D, f: F) -> AppResult<T>
where
    D: Database + ?Sized,
    T: Send,
    F: for<'t> FnOnce(&'t mut D::Tx) -> BoxFuture<'t, AppResult<T>> + Send,
{
    let mut tx = db.begin().await?;
    match f(&mut tx).await {
        Ok(value) => {
            db.commit(tx).await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rb) = db.rollback(tx).await {
                warn!(error = %rb, "rollback failed");
            }
            Err(e)
        }
    }
}

/// Unwrap a transaction handle for writes that only make sense inside a unit of work.
pub fn require_tx<'a, Tx>(tx: Option<&'a mut Tx>, op: &str) -> AppResult<&'a mut Tx> {
    tx.ok_or_else(|| AppError::from(ErrorKind::InvalidTransaction).context(op))
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Run a sqlx query on the transaction if one was passed, else on the pool.
macro_rules! on_tx_or_pool {
    ($pool:expr, $tx:expr, $query:expr, $method:ident) => {
        match $tx {
            Some(tx) => $query.$method(&mut **tx).await,
            None => $query.$method($pool).await,
        }
    };
}
pub(crate) use on_tx_or_pool;

pub type PgTx = Transaction<'static, Postgres>;

#[derive(Clone)]
pub struct PgDb {
    pool: PgPool,
}

impl PgDb {
    pub async fn connect(url: &str, max_connections: u32, acquire_timeout: Duration) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .context("connect to database")?;
        Ok(Self { pool })
    }

    #[cfg(test)]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Database for PgDb {
    type Tx = PgTx;

    async fn begin(&self) -> AppResult<PgTx> {
        self.pool.begin().await.map_err(|e| AppError::from(e).context("begin tx"))
    }

    async fn commit(&self, tx: PgTx) -> AppResult<()> {
        tx.commit().await.map_err(|e| AppError::from(e).context("commit tx"))
    }

    async fn rollback(&self, tx: PgTx) -> AppResult<()> {
        tx.rollback().await.map_err(|e| AppError::from(e).context("rollback tx"))
    }
}
