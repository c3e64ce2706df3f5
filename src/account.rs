use md5::{Digest, Md5};

use crate::{
    auth::TokenService,
    error::{AppError, AppResult},
    models::{AuthPayload, Credentials, PublicUser, validate_username},
    repository::UserStoreState,
};

/// password_digest
///
/// Unsalted MD5, hex encoded. Kept bit-compatible with the digests already
/// stored for existing accounts.
pub fn password_digest(password: &str) -> String {
    hex::encode(Md5::digest(password.as_bytes()))
}

/// AuthService
///
/// Registration and login. Holds the account store and the token signer; no
/// state of its own.
#[derive(Clone)]
pub struct AuthService {
    users: UserStoreState,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(users: UserStoreState, tokens: TokenService) -> Self {
        Self { users, tokens }
    }

    /// register
    ///
    /// Creates the account if the username is free and issues a token.
    /// A taken username (including one lost to a concurrent registration)
    /// fails with `DuplicateUser` and issues nothing.
    pub async fn register(&self, credentials: Credentials) -> AppResult<AuthPayload> {
        let (username, password) = require_credentials(credentials)?;
        validate_username(&username)?;

        let digest = password_digest(&password);
        let user = self
            .users
            .create_if_absent(&username, &digest)
            .await?
            .ok_or(AppError::DuplicateUser)?;

        tracing::info!(user_id = user.id, username = %user.username, "account registered");
        Ok(AuthPayload {
            token: self.tokens.issue(&user)?,
            user_info: PublicUser::from(&user),
        })
    }

    /// login
    ///
    /// Checks the password digest against the stored one and issues a token.
    pub async fn login(&self, credentials: Credentials) -> AppResult<AuthPayload> {
        let (username, password) = require_credentials(credentials)?;

        let user = self
            .users
            .find_by_username(&username)
            .await?
            .ok_or(AppError::UserNotFound)?;

        if password_digest(&password) != user.password_digest {
            tracing::debug!(username = %username, "login rejected: wrong password");
            return Err(AppError::WrongPassword);
        }

        Ok(AuthPayload {
            token: self.tokens.issue(&user)?,
            user_info: PublicUser::from(&user),
        })
    }
}

fn require_credentials(credentials: Credentials) -> AppResult<(String, String)> {
    match (credentials.username, credentials.password) {
        (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
            Ok((username, password))
        }
        _ => Err(AppError::validation("username and password are required")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use std::sync::Arc;

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(InMemoryRepository::new()),
            TokenService::new("test-secret"),
        )
    }

    fn creds(username: &str, password: &str) -> Credentials {
        Credentials {
            username: Some(username.to_string()),
            password: Some(password.to_string()),
        }
    }

    #[test]
    fn digest_is_hex_md5() {
        assert_eq!(password_digest("secret1"), "e52d98c459819a11775936d8dfbb7929");
    }

    #[tokio::test]
    async fn register_then_duplicate() {
        let auth = service();
        let first = auth.register(creds("alice1", "secret1")).await.unwrap();
        assert_eq!(first.user_info.username, "alice1");
        assert!(!first.token.is_empty());

        let second = auth.register(creds("alice1", "other")).await;
        assert!(matches!(second, Err(AppError::DuplicateUser)));
    }

    #[tokio::test]
    async fn login_outcomes() {
        let auth = service();
        auth.register(creds("alice1", "secret1")).await.unwrap();

        let ok = auth.login(creds("alice1", "secret1")).await.unwrap();
        assert_eq!(ok.user_info.username, "alice1");

        assert!(matches!(
            auth.login(creds("alice1", "wrong")).await,
            Err(AppError::WrongPassword)
        ));
        assert!(matches!(
            auth.login(creds("nobody", "secret1")).await,
            Err(AppError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn missing_fields_are_validation_errors() {
        let auth = service();
        let missing = Credentials {
            username: Some("alice1".into()),
            password: None,
        };
        assert!(matches!(
            auth.register(missing.clone()).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(auth.login(missing).await, Err(AppError::Validation(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_registrations_have_one_winner() {
        let auth = service();
        let (a, b) = tokio::join!(
            auth.register(creds("racer1", "secret1")),
            auth.register(creds("racer1", "secret2"))
        );

        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|r| matches!(r, Err(AppError::DuplicateUser)))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn short_usernames_are_rejected() {
        assert!(matches!(
            service().register(creds("bob", "secret1")).await,
            Err(AppError::Validation(_))
        ));
    }
}
