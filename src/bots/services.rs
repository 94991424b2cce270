use std::sync::Arc;

use tracing::{info, instrument};

use super::{
    repo::{BotStore, UserBotStore},
    repo_types::{Bot, UserBot},
};
use crate::{
    db::{new_id, Database},
    error::{AppError, AppResult, ErrorKind, ResultExt},
};

pub struct BotService<D: Database> {
    bots: Arc<dyn BotStore<D::Tx>>,
    user_bots: Arc<dyn UserBotStore<D::Tx>>,
}

impl<D: Database> Clone for BotService<D> {
    fn clone(&self) -> Self {
        Self {
            bots: self.bots.clone(),
            user_bots: self.user_bots.clone(),
        }
    }
}

impl<D: Database> BotService<D> {
    pub fn new(bots: Arc<dyn BotStore<D::Tx>>, user_bots: Arc<dyn UserBotStore<D::Tx>>) -> Self {
        Self { bots, user_bots }
    }

    /// Create a bot and link it to `user_id` inside the caller's unit of work.
    #[instrument(skip(self, tx))]
    pub async fn create_bot(&self, tx: &mut D::Tx, name: &str, user_id: &str) -> AppResult<Bot> {
        let bot = Bot {
            id: new_id(),
            name: name.to_string(),
        };
        self.bots.create(Some(&mut *tx), &bot).await.ctx("create_bot")?;
        let link = UserBot {
            id: new_id(),
            user_id: user_id.to_string(),
            bot_id: bot.id.clone(),
        };
        self.user_bots.create(Some(tx), &link).await.ctx("create_bot")?;
        info!(bot_id = %bot.id, user_id = %user_id, "bot created");
        Ok(bot)
    }

    pub async fn find_bot(&self, bot_id: &str) -> AppResult<Bot> {
        self.bots.find_by_id(None, bot_id).await.ctx("find_bot")
    }

    /// First bot linked to the user.
    pub async fn bot_for_user(&self, user_id: &str) -> AppResult<String> {
        let links = self.user_bots.find_by_user_id(None, user_id).await.ctx("bot_for_user")?;
        links
            .into_iter()
            .next()
            .map(|l| l.bot_id)
            .ok_or_else(|| ErrorKind::UserBotNotFound.into())
    }

    /// `BotNotFound` unless `user_id` is linked to `bot_id`.
    pub async fn ensure_owner(&self, user_id: &str, bot_id: &str) -> AppResult<()> {
        if self.user_owns_bot(user_id, bot_id).await? {
            Ok(())
        } else {
            Err(AppError::from(ErrorKind::BotNotFound).context("ensure_owner"))
        }
    }

    pub async fn user_owns_bot(&self, user_id: &str, bot_id: &str) -> AppResult<bool> {
        match self.user_bots.find_by_user_id(None, user_id).await {
            Ok(links) => Ok(links.iter().any(|l| l.bot_id == bot_id)),
            Err(e) if e.is(ErrorKind::UserBotNotFound) => Ok(false),
            Err(e) => Err(e.context("user_owns_bot")),
        }
    }
}
