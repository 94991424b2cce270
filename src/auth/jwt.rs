use std::{sync::Arc, time::Duration};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use time::OffsetDateTime;
use tracing::debug;

use super::claims::{Claims, TokenKind};
use crate::{
    config::JwtConfig,
    error::{AppError, AppResult, ErrorKind},
};

type HmacSha256 = Hmac<Sha256>;

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

const ALG: &str = "HS256";
const TYP: &str = "JWT";

fn invalid() -> AppError {
    AppError::from(ErrorKind::InvalidToken)
}

pub(crate) fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// HS256 signer/verifier bound to one secret.
///
/// Wire format: `b64url(header).b64url(claims).b64url(hmac)`, unpadded.
/// Every verification failure is reported as [`ErrorKind::InvalidToken`].
#[derive(Clone)]
pub struct TokenCodec {
    secret: Arc<[u8]>,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            secret: Arc::from(secret),
        }
    }

    fn mac(&self) -> AppResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| AppError::internal(e.to_string()))
    }

    pub fn sign(&self, claims: &Claims) -> AppResult<String> {
        let header = serde_json::to_vec(&Header {
            alg: ALG.into(),
            typ: TYP.into(),
        })
        .map_err(|e| AppError::internal(e.to_string()))?;
        let payload = serde_json::to_vec(claims).map_err(|e| AppError::internal(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{}.{}", signing_input, sig))
    }

    /// Check structure and signature only. Expiry is left to the caller.
    pub fn open(&self, token: &str) -> AppResult<Claims> {
        let parts: Vec<&str> = token.split('.').collect();
        let [header_b64, payload_b64, sig_b64] = parts.as_slice() else {
            return Err(invalid());
        };

        let sig = URL_SAFE_NO_PAD.decode(sig_b64).map_err(|_| invalid())?;
        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&sig).map_err(|_| invalid())?;

        let header: Header = URL_SAFE_NO_PAD
            .decode(header_b64)
            .ok()
            .and_then(|b| serde_json::from_slice(&b).ok())
            .ok_or_else(invalid)?;
        if header.alg != ALG {
            return Err(invalid());
        }

        URL_SAFE_NO_PAD
            .decode(payload_b64)
            .ok()
            .and_then(|b| serde_json::from_slice(&b).ok())
            .ok_or_else(invalid)
    }

    /// Structure, signature and expiry (`exp <= now` is rejected).
    pub fn verify_at(&self, token: &str, now: i64) -> AppResult<Claims> {
        let claims = self.open(token)?;
        if claims.exp <= now {
            return Err(invalid());
        }
        Ok(claims)
    }

    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        self.verify_at(token, now_unix())
    }
}

/// Access and refresh codecs with their TTLs.
#[derive(Clone)]
pub struct JwtKeys {
    pub access: TokenCodec,
    pub refresh: TokenCodec,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            access: TokenCodec::new(cfg.access_secret.as_bytes()),
            refresh: TokenCodec::new(cfg.refresh_secret.as_bytes()),
            access_ttl: Duration::from_secs((cfg.access_ttl_minutes as u64) * 60),
            refresh_ttl: Duration::from_secs((cfg.refresh_ttl_minutes as u64) * 60),
        }
    }

    fn codec(&self, kind: TokenKind) -> &TokenCodec {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub fn sign_with_kind(&self, user_id: &str, email: &str, kind: TokenKind, now: i64) -> AppResult<String> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            exp: now + ttl.as_secs() as i64,
            iat: now,
            typ: kind,
        };
        let token = self.codec(kind).sign(&claims)?;
        debug!(user_id = %user_id, kind = ?kind, "token signed");
        Ok(token)
    }
}
