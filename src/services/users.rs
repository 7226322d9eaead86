// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Login, logout and role checks.
//!
//! Passwords are stored as bcrypt hashes. A successful login issues a random
//! opaque token that expires a fixed time after issue and is not renewed.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{Role, Session, User};

const TOKEN_BYTES: usize = 32;

#[derive(Clone)]
pub struct UsersService {
    db: Arc<dyn Database>,
    session_ttl: Duration,
    hash_cost: u32,
    rng: SystemRandom,
}

impl UsersService {
    pub fn new(db: Arc<dyn Database>, session_ttl_minutes: i64) -> Self {
        Self {
            db,
            session_ttl: Duration::minutes(session_ttl_minutes),
            hash_cost: bcrypt::DEFAULT_COST,
            rng: SystemRandom::new(),
        }
    }

    /// Override the bcrypt cost used for new password hashes.
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Check credentials and start a new session, returning its token.
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        if username.is_empty() || password.is_empty() {
            return Err(AppError::BadRequest(
                "Invalid username or password".to_string(),
            ));
        }

        let Some(user) = self.db.get_user_by_username(username).await? else {
            tracing::info!(username, "Login for unknown user");
            return Err(AppError::Unauthorized("Login failed".to_string()));
        };

        if !verify_password(password, &user.password_hash).await? {
            tracing::info!(username, "Login with wrong password");
            return Err(AppError::Unauthorized("Login failed".to_string()));
        }

        let session = Session {
            access_token: self.new_token()?,
            access_token_expiry: Utc::now() + self.session_ttl,
        };
        self.db.set_session(&user.id, &session).await?;

        tracing::info!(username, role = ?user.role, "User logged in");
        Ok(session.access_token)
    }

    /// End the session holding `token`. Unknown tokens are accepted.
    pub async fn logout(&self, token: &str) -> Result<()> {
        if token.is_empty() {
            return Err(AppError::BadRequest("Invalid access token".to_string()));
        }
        self.db.clear_session(token).await
    }

    /// Whether `token` belongs to a live session whose role is in `allowed`.
    ///
    /// An empty token is a bad request and a token with no live session is
    /// unauthorized. A live session with another role yields `Ok(false)`.
    pub async fn authorize(&self, token: &str, allowed: &[Role]) -> Result<bool> {
        if token.is_empty() {
            return Err(AppError::BadRequest("Invalid access token".to_string()));
        }

        let role = self
            .db
            .role_for_token(token, Utc::now())
            .await?
            .ok_or_else(|| AppError::Unauthorized("Failed to authorize user".to_string()))?;

        Ok(allowed.contains(&role))
    }

    /// Create `username` with `role` unless an account with that name exists.
    pub async fn ensure_user(&self, username: &str, password: &str, role: Role) -> Result<()> {
        if self.db.get_user_by_username(username).await?.is_some() {
            tracing::debug!(username, "User already exists");
            return Ok(());
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: hash_password(password, self.hash_cost).await?,
            role,
            session: None,
        };
        self.db.upsert_user(&user).await?;

        tracing::info!(username, ?role, "User created");
        Ok(())
    }

    fn new_token(&self) -> Result<String> {
        let mut bytes = [0u8; TOKEN_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to generate session token")))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }
}

async fn hash_password(password: &str, cost: u32) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(|e| AppError::Internal(e.into()))
}

async fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(|e| AppError::Internal(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryDb, UserStore};

    async fn service_with_users() -> (MemoryDb, UsersService) {
        let db = MemoryDb::new();
        let service = UsersService::new(Arc::new(db.clone()), 15).with_hash_cost(4);
        service
            .ensure_user("admin", "secret", Role::Admin)
            .await
            .unwrap();
        service
            .ensure_user("jogger", "hunter2", Role::Runner)
            .await
            .unwrap();
        (db, service)
    }

    #[tokio::test]
    async fn test_login_issues_expiring_token() {
        let (db, service) = service_with_users().await;
        let before = Utc::now();
        let token = service.login("admin", "secret").await.unwrap();
        assert_eq!(URL_SAFE_NO_PAD.decode(&token).unwrap().len(), TOKEN_BYTES);

        let user = db.get_user_by_username("admin").await.unwrap().unwrap();
        let session = user.session.unwrap();
        assert_eq!(session.access_token, token);
        assert!(session.access_token_expiry >= before + Duration::minutes(15));
        assert!(session.access_token_expiry <= Utc::now() + Duration::minutes(15));
    }

    #[tokio::test]
    async fn test_login_failures() {
        let (_, service) = service_with_users().await;
        assert!(matches!(
            service.login("admin", "wrong").await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            service.login("nobody", "secret").await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            service.login("", "secret").await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_authorize_role_mismatch_is_false() {
        let (_, service) = service_with_users().await;
        let token = service.login("jogger", "hunter2").await.unwrap();

        assert!(!service.authorize(&token, &[Role::Admin]).await.unwrap());
        assert!(service
            .authorize(&token, &[Role::Admin, Role::Runner])
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_authorize_errors() {
        let (_, service) = service_with_users().await;
        assert!(matches!(
            service.authorize("", &[Role::Admin]).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            service.authorize("bogus", &[Role::Admin]).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_session_authorizes_nothing() {
        let (db, service) = service_with_users().await;
        let user = db.get_user_by_username("admin").await.unwrap().unwrap();
        db.set_session(
            &user.id,
            &Session {
                access_token: "stale".to_string(),
                access_token_expiry: Utc::now() - Duration::seconds(1),
            },
        )
        .await
        .unwrap();

        assert!(matches!(
            service.authorize("stale", &[Role::Admin]).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let (_, service) = service_with_users().await;
        let token = service.login("admin", "secret").await.unwrap();
        service.logout(&token).await.unwrap();
        assert!(service.authorize(&token, &[Role::Admin]).await.is_err());

        // Idempotent
        service.logout(&token).await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_user_keeps_existing_password() {
        let (_, service) = service_with_users().await;
        service
            .ensure_user("admin", "changed", Role::Admin)
            .await
            .unwrap();
        assert!(service.login("admin", "secret").await.is_ok());
    }
}
