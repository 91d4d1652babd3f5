use anyhow::Result;
use axum::http::HeaderMap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel_async::{pooled_connection::bb8::Pool, AsyncPgConnection, RunQueryDsl};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::future::Future;
use uuid::Uuid;
use crate::models::*;
use crate::schema::*;

type DbPool = Pool<AsyncPgConnection>;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

#[derive(Clone)]
pub struct TokenManager {
    secret: String,
    ttl: Duration,
}

impl TokenManager {
    pub fn new(secret: String, ttl_minutes: i64) -> Self {
        Self {
            secret,
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn issue(&self, username: &str) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: username.to_string(),
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;
        Ok(data.claims)
    }
}

pub fn hash_password(plain: &str) -> Result<String> {
    let hash = bcrypt::hash(plain, bcrypt::DEFAULT_COST)?;
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> Result<bool> {
    let ok = bcrypt::verify(plain, hash)?;
    Ok(ok)
}

pub fn generate_refresh_token() -> String {
    let token_bytes = rand::random::<[u8; 32]>();
    URL_SAFE_NO_PAD.encode(token_bytes)
}

pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn bearer_from_headers(headers: &HeaderMap) -> Option<String> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.to_string())
}

/// Durable store for single-use refresh tokens, keyed by token hash.
pub trait RefreshTokenStore: Send + Sync {
    fn store(
        &self,
        token_hash: String,
        user_name: String,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Consumes the token. Returns the owning username only when the token
    /// existed and had not expired; the row is gone either way afterwards.
    fn redeem(&self, token_hash: &str) -> impl Future<Output = Result<Option<String>>> + Send;
}

#[derive(Clone)]
pub struct PgRefreshTokenStore {
    pool: DbPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl RefreshTokenStore for PgRefreshTokenStore {
    async fn store(
        &self,
        token_hash: String,
        user_name: String,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let record = NewRefreshToken {
            token_hash,
            user_name,
            expires_at,
        };
        diesel::insert_into(refresh_tokens::table)
            .values(&record)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn redeem(&self, token_hash: &str) -> Result<Option<String>> {
        let mut conn = self.pool.get().await?;
        // single DELETE .. RETURNING, so two racing redemptions cannot both win
        let row = diesel::delete(
            refresh_tokens::table.filter(refresh_tokens::token_hash.eq(token_hash)),
        )
        .get_result::<RefreshToken>(&mut conn)
        .await
        .optional()?;
        Ok(row
            .filter(|token| token.expires_at > Utc::now())
            .map(|token| token.user_name))
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct InMemoryRefreshTokenStore {
    tokens: std::sync::Mutex<std::collections::HashMap<String, (String, DateTime<Utc>)>>,
}

#[cfg(test)]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn store(
        &self,
        token_hash: String,
        user_name: String,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.tokens
            .lock()
            .unwrap()
            .insert(token_hash, (user_name, expires_at));
        Ok(())
    }

    async fn redeem(&self, token_hash: &str) -> Result<Option<String>> {
        let entry = self.tokens.lock().unwrap().remove(token_hash);
        Ok(entry
            .filter(|(_, expires_at)| *expires_at > Utc::now())
            .map(|(user_name, _)| user_name))
    }
}
