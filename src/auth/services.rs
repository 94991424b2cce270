use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::{
    claims::{Claims, TokenKind, TokenPair},
    jwt::{now_unix, JwtKeys},
    password::{hash_password, verify_password},
    repo::UserStore,
    repo_types::User,
};
use crate::{
    bots::services::BotService,
    db::{get_with_tx, new_id, Database},
    error::{AppError, AppResult, ErrorKind, ResultExt},
};

/// Accounts and sessions.
///
/// Each user has at most one live session: the token pair stored on the
/// user row. Issuing a pair overwrites it, logging out blanks it.
pub struct AuthService<D: Database> {
    db: Arc<D>,
    keys: JwtKeys,
    users: Arc<dyn UserStore<D::Tx>>,
    bots: BotService<D>,
}

impl<D: Database> Clone for AuthService<D> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            keys: self.keys.clone(),
            users: self.users.clone(),
            bots: self.bots.clone(),
        }
    }
}

async fn run_blocking<T, F>(f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AppResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::internal(format!("blocking task: {e}")))?
}

impl<D: Database> AuthService<D> {
    pub fn new(db: Arc<D>, keys: JwtKeys, users: Arc<dyn UserStore<D::Tx>>, bots: BotService<D>) -> Self {
        Self { db, keys, users, bots }
    }

    /// Create the user, their first bot and a session in one unit of work.
    #[instrument(skip(self, password))]
    pub async fn signup(&self, email: &str, password: &str, bot_name: &str) -> AppResult<(TokenPair, String)> {
        if email.is_empty() || password.is_empty() {
            return Err(AppError::from(ErrorKind::InvalidCredentials).context("signup"));
        }
        let plain = password.to_string();
        let password_hash = run_blocking(move || hash_password(&plain)).await?;

        let user = User {
            id: new_id(),
            email: email.to_string(),
            password_hash,
            access_token: String::new(),
            refresh_token: String::new(),
        };
        let bot_name = bot_name.to_string();
        let this = self.clone();

        let (pair, user_id) = get_with_tx(self.db.as_ref(), move |tx| {
            Box::pin(async move {
                this.users.create(Some(&mut *tx), &user).await?;
                this.bots.create_bot(&mut *tx, &bot_name, &user.id).await?;
                let pair = this.issue_tokens(Some(tx), &user).await?;
                Ok((pair, user.id))
            })
        })
        .await
        .ctx("signup")?;

        info!(user_id = %user_id, "user signed up");
        Ok((pair, user_id))
    }

    /// Issue a fresh pair, invalidating any earlier refresh token.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> AppResult<TokenPair> {
        let user = match self.users.find_by_email(None, email).await {
            Ok(u) => u,
            Err(e) if e.is(ErrorKind::UserNotFound) => {
                warn!("login for unknown email");
                return Err(AppError::from(ErrorKind::InvalidCredentials).context("login"));
            }
            Err(e) => return Err(e.context("login")),
        };

        let plain = password.to_string();
        let hash = user.password_hash.clone();
        if !run_blocking(move || verify_password(&plain, &hash)).await.ctx("login")? {
            warn!(user_id = %user.id, "login with wrong password");
            return Err(AppError::from(ErrorKind::InvalidCredentials).context("login"));
        }

        let pair = self.issue_tokens(None, &user).await.ctx("login")?;
        info!(user_id = %user.id, "user logged in");
        Ok(pair)
    }

    /// Revoke the session the refresh token belongs to.
    #[instrument(skip_all)]
    pub async fn logout(&self, refresh_token: &str) -> AppResult<()> {
        let user_id = self.validate_refresh_token(refresh_token).await.ctx("logout")?;
        // a login may have rotated the pair since validation
        let cleared = self
            .users
            .clear_tokens(None, &user_id, refresh_token)
            .await
            .ctx("logout")?;
        if !cleared {
            return Err(AppError::from(ErrorKind::InvalidToken).context("logout"));
        }
        info!(user_id = %user_id, "user logged out");
        Ok(())
    }

    /// Request gate. Expiry is reported as `ExpiredToken`, every other
    /// failure as `InvalidToken`.
    pub fn validate_access_token(&self, token: &str) -> AppResult<Claims> {
        self.validate_access_token_at(token, now_unix())
    }

    pub(crate) fn validate_access_token_at(&self, token: &str, now: i64) -> AppResult<Claims> {
        let claims = self.keys.access.open(token)?;
        if claims.typ != TokenKind::Access {
            return Err(ErrorKind::InvalidToken.into());
        }
        if claims.exp <= now {
            return Err(ErrorKind::ExpiredToken.into());
        }
        Ok(claims)
    }

    /// The token must verify and be the one currently stored for its user.
    pub async fn validate_refresh_token(&self, token: &str) -> AppResult<String> {
        let claims = self.keys.refresh.verify(token)?;
        if claims.typ != TokenKind::Refresh {
            return Err(ErrorKind::InvalidToken.into());
        }
        let user = match self.users.find_by_id(None, &claims.sub).await {
            Ok(u) => u,
            Err(e) if e.is(ErrorKind::UserNotFound) => return Err(ErrorKind::InvalidToken.into()),
            Err(e) => return Err(e.context("validate_refresh_token")),
        };
        if user.refresh_token.is_empty() || user.refresh_token != token {
            return Err(ErrorKind::InvalidToken.into());
        }
        Ok(user.id)
    }

    async fn issue_tokens(&self, tx: Option<&mut D::Tx>, user: &User) -> AppResult<TokenPair> {
        let now = now_unix();
        let access_token = self
            .keys
            .sign_with_kind(&user.id, &user.email, TokenKind::Access, now)?;
        let refresh_token = self
            .keys
            .sign_with_kind(&user.id, &user.email, TokenKind::Refresh, now)?;
        self.users
            .update_tokens(tx, &user.id, &access_token, &refresh_token)
            .await
            .ctx("issue_tokens")?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::test_config,
        testing::{MemDb, MemStore, MemTx},
    };

    fn service(db: &MemDb) -> AuthService<MemDb> {
        let store = Arc::new(MemStore::new(db.clone()));
        let bots = BotService::new(store.clone(), store.clone());
        AuthService::new(
            Arc::new(db.clone()),
            JwtKeys::from_config(&test_config().jwt),
            store,
            bots,
        )
    }

    #[tokio::test]
    async fn signup_then_login_carry_user_id() {
        let db = MemDb::default();
        let svc = service(&db);

        let (pair, user_id) = svc.signup("a@b.co", "pw-123456", "coffee-bot").await.unwrap();
        assert_eq!(svc.validate_access_token(&pair.access_token).unwrap().sub, user_id);
        assert_eq!(svc.validate_refresh_token(&pair.refresh_token).await.unwrap(), user_id);

        let login = svc.login("a@b.co", "pw-123456").await.unwrap();
        let access = svc.validate_access_token(&login.access_token).unwrap();
        assert_eq!(access.sub, user_id);
        assert_eq!(access.email, "a@b.co");
        assert_eq!(svc.validate_refresh_token(&login.refresh_token).await.unwrap(), user_id);

        let state = db.snapshot();
        assert_eq!(state.users.len(), 1);
        assert_eq!(state.bots.len(), 1);
        assert_eq!(state.user_bots.len(), 1);
        assert_eq!(state.user_bots[0].user_id, user_id);
        assert_ne!(state.users[0].password_hash, "pw-123456");
    }

    #[tokio::test]
    async fn login_replaces_previous_refresh_token() {
        let db = MemDb::default();
        let svc = service(&db);
        svc.signup("a@b.co", "pw", "bot").await.unwrap();

        let first = svc.login("a@b.co", "pw").await.unwrap();
        // iat/exp have second resolution; wait so the second pair differs
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let second = svc.login("a@b.co", "pw").await.unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);

        let err = svc.validate_refresh_token(&first.refresh_token).await.unwrap_err();
        assert!(err.is(ErrorKind::InvalidToken));
        let err = svc.logout(&first.refresh_token).await.unwrap_err();
        assert!(err.is(ErrorKind::InvalidToken));

        let user = &db.snapshot().users[0];
        assert_eq!(user.access_token, second.access_token);
        assert_eq!(user.refresh_token, second.refresh_token);
        assert!(svc.validate_refresh_token(&second.refresh_token).await.is_ok());
    }

    /// Rotates the stored pair right after every lookup, as a login landing
    /// between logout's check and its write would.
    struct RotateAfterLookup {
        inner: MemStore,
    }

    #[async_trait::async_trait]
    impl UserStore<MemTx> for RotateAfterLookup {
        async fn create(&self, tx: Option<&mut MemTx>, user: &User) -> AppResult<()> {
            UserStore::create(&self.inner, tx, user).await
        }

        async fn find_by_email(&self, tx: Option<&mut MemTx>, email: &str) -> AppResult<User> {
            UserStore::find_by_email(&self.inner, tx, email).await
        }

        async fn find_by_id(&self, tx: Option<&mut MemTx>, id: &str) -> AppResult<User> {
            let user = UserStore::find_by_id(&self.inner, tx, id).await?;
            UserStore::update_tokens(&self.inner, None, id, "newer-access", "newer-refresh").await?;
            Ok(user)
        }

        async fn update_tokens(
            &self,
            tx: Option<&mut MemTx>,
            id: &str,
            access_token: &str,
            refresh_token: &str,
        ) -> AppResult<()> {
            UserStore::update_tokens(&self.inner, tx, id, access_token, refresh_token).await
        }

        async fn clear_tokens(&self, tx: Option<&mut MemTx>, id: &str, refresh_token: &str) -> AppResult<bool> {
            UserStore::clear_tokens(&self.inner, tx, id, refresh_token).await
        }
    }

    #[tokio::test]
    async fn logout_keeps_session_rotated_after_validation() {
        let db = MemDb::default();
        let (pair, _) = service(&db).signup("a@b.co", "pw", "bot").await.unwrap();

        let store = MemStore::new(db.clone());
        let svc = AuthService::new(
            Arc::new(db.clone()),
            JwtKeys::from_config(&test_config().jwt),
            Arc::new(RotateAfterLookup { inner: store.clone() }),
            BotService::new(Arc::new(store.clone()), Arc::new(store)),
        );

        let err = svc.logout(&pair.refresh_token).await.unwrap_err();
        assert!(err.is(ErrorKind::InvalidToken));
        let user = &db.snapshot().users[0];
        assert_eq!(user.access_token, "newer-access");
        assert_eq!(user.refresh_token, "newer-refresh");
    }

    #[tokio::test]
    async fn overlong_password_is_invalid_credentials() {
        let db = MemDb::default();
        let svc = service(&db);
        let prefix = "x".repeat(crate::auth::password::MAX_PASSWORD_BYTES);

        let err = svc
            .signup("a@b.co", &format!("{prefix}CORRECT-SUFFIX"), "bot")
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::InvalidCredentials));
        assert!(db.snapshot().users.is_empty());

        svc.signup("a@b.co", &prefix, "bot").await.unwrap();
        let err = svc
            .login("a@b.co", &format!("{prefix}totally-different"))
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::InvalidCredentials));
        assert!(svc.login("a@b.co", &prefix).await.is_ok());
    }

    #[tokio::test]
    async fn logout_revokes_session() {
        let db = MemDb::default();
        let svc = service(&db);
        let (pair, _) = svc.signup("a@b.co", "pw", "bot").await.unwrap();

        svc.logout(&pair.refresh_token).await.unwrap();

        let user = &db.snapshot().users[0];
        assert!(user.access_token.is_empty());
        assert!(user.refresh_token.is_empty());
        let err = svc.validate_refresh_token(&pair.refresh_token).await.unwrap_err();
        assert!(err.is(ErrorKind::InvalidToken));
        assert!(svc.logout(&pair.refresh_token).await.unwrap_err().is(ErrorKind::InvalidToken));
    }

    #[tokio::test]
    async fn logout_rejects_access_token() {
        let db = MemDb::default();
        let svc = service(&db);
        let (pair, _) = svc.signup("a@b.co", "pw", "bot").await.unwrap();

        let err = svc.logout(&pair.access_token).await.unwrap_err();
        assert!(err.is(ErrorKind::InvalidToken));
        assert_eq!(db.snapshot().users[0].refresh_token, pair.refresh_token);
    }

    #[tokio::test]
    async fn duplicate_email_leaves_no_extra_rows() {
        let db = MemDb::default();
        let svc = service(&db);
        svc.signup("a@b.co", "pw", "bot-1").await.unwrap();

        let err = svc.signup("a@b.co", "other", "bot-2").await.unwrap_err();
        assert!(err.is(ErrorKind::UserExists));

        let state = db.snapshot();
        assert_eq!(state.users.len(), 1);
        assert_eq!(state.bots.len(), 1);
        assert_eq!(state.user_bots.len(), 1);
    }

    #[tokio::test]
    async fn failure_mid_signup_rolls_everything_back() {
        let db = MemDb::default();
        db.fail_on("user_bots.create");
        let svc = service(&db);

        assert!(svc.signup("a@b.co", "pw", "bot").await.is_err());

        let state = db.snapshot();
        assert!(state.users.is_empty());
        assert!(state.bots.is_empty());
        assert!(state.user_bots.is_empty());
    }

    #[tokio::test]
    async fn token_write_failure_rolls_back_signup() {
        let db = MemDb::default();
        db.fail_on("users.update_tokens");
        let svc = service(&db);

        assert!(svc.signup("a@b.co", "pw", "bot").await.is_err());
        assert!(db.snapshot().users.is_empty());
    }

    #[tokio::test]
    async fn empty_credentials_are_rejected() {
        let db = MemDb::default();
        let svc = service(&db);
        for (email, password) in [("", "pw"), ("a@b.co", "")] {
            let err = svc.signup(email, password, "bot").await.unwrap_err();
            assert!(err.is(ErrorKind::InvalidCredentials));
        }
        assert!(db.snapshot().users.is_empty());
    }

    #[tokio::test]
    async fn bad_login_is_invalid_credentials() {
        let db = MemDb::default();
        let svc = service(&db);
        svc.signup("a@b.co", "pw", "bot").await.unwrap();

        let err = svc.login("a@b.co", "wrong").await.unwrap_err();
        assert!(err.is(ErrorKind::InvalidCredentials));
        let err = svc.login("nobody@b.co", "pw").await.unwrap_err();
        assert!(err.is(ErrorKind::InvalidCredentials));
    }

    #[tokio::test]
    async fn access_gate_distinguishes_expiry() {
        let db = MemDb::default();
        let svc = service(&db);
        let (pair, user_id) = svc.signup("a@b.co", "pw", "bot").await.unwrap();

        let claims = svc.validate_access_token(&pair.access_token).unwrap();
        assert!(svc.validate_access_token_at(&pair.access_token, claims.exp - 1).is_ok());
        let err = svc
            .validate_access_token_at(&pair.access_token, claims.exp)
            .unwrap_err();
        assert!(err.is(ErrorKind::ExpiredToken));

        let stale = svc
            .keys
            .sign_with_kind(&user_id, "a@b.co", TokenKind::Access, now_unix() - 3600)
            .unwrap();
        assert!(svc.validate_access_token(&stale).unwrap_err().is(ErrorKind::ExpiredToken));
    }

    #[tokio::test]
    async fn tokens_are_not_interchangeable() {
        let db = MemDb::default();
        let svc = service(&db);
        let (pair, _) = svc.signup("a@b.co", "pw", "bot").await.unwrap();

        let err = svc.validate_access_token(&pair.refresh_token).unwrap_err();
        assert!(err.is(ErrorKind::InvalidToken));
        let err = svc.validate_refresh_token(&pair.access_token).await.unwrap_err();
        assert!(err.is(ErrorKind::InvalidToken));
        let err = svc.validate_access_token("not.a.token").unwrap_err();
        assert!(err.is(ErrorKind::InvalidToken));
    }
}
