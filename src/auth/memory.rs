/*
 *     Copyright (C) 2023  Fritz Ochsmann
 *
 *     This program is free software: you can redistribute it and/or modify
 *     it under the terms of the GNU Affero General Public License as published
 *     by the Free Software Foundation, either version 3 of the License, or
 *     (at your option) any later version.
 *
 *     This program is distributed in the hope that it will be useful,
 *     but WITHOUT ANY WARRANTY; without even the implied warranty of
 *     MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *     GNU Affero General Public License for more details.
 *
 *     You should have received a copy of the GNU Affero General Public License
 *     along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use crate::auth::{IdentityProvider, User};
use crate::database::id::ALPHABET;
use crate::prelude::*;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

const UID_LENGTH: usize = 28;
const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Clone, Debug)]
struct Account {
    user: User,
    /// argon2 PHC string, `None` for anonymous accounts
    password: Option<String>,
}

/// An in-process [`IdentityProvider`] with argon2 hashed passwords.
#[derive(Clone)]
pub struct MemoryIdentity {
    accounts: Arc<RwLock<HashMap<String, Account>>>,
    current: Arc<watch::Sender<Option<User>>>,
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        let (current, _) = watch::channel(None);

        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            current: Arc::new(current),
        }
    }
}

impl MemoryIdentity {
    pub async fn account_count(&self) -> usize {
        self.accounts.read().await.len()
    }

    fn start(&self, user: User) -> User {
        self.current.send_replace(Some(user.clone()));
        user
    }
}

fn hash(password: &str) -> Result<String> {
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))?
        .to_string())
}

fn verify(password: &str, hash: &str) -> Result<()> {
    Argon2::default().verify_password(password.as_bytes(), &PasswordHash::new(hash)?)?;

    Ok(())
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    #[instrument(skip(self, password))]
    async fn create_account(&self, email: &str, password: &str) -> Result<User> {
        let email = normalize(email);
        if !email.contains('@') {
            return Err(ApplicationError::BadRequest("invalid email".to_owned()));
        }
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(ApplicationError::BadRequest(format!(
                "password must have at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        let mut accounts = self.accounts.write().await;
        if accounts
            .values()
            .any(|account| account.user.email().as_deref() == Some(email.as_str()))
        {
            return Err(ApplicationError::AccountExists(email));
        }

        let user = User::new(
            nanoid::nanoid!(UID_LENGTH, &ALPHABET),
            Some(email),
            false,
        );
        accounts.insert(
            user.uid().clone(),
            Account {
                user: user.clone(),
                password: Some(hash(password)?),
            },
        );

        Ok(self.start(user))
    }

    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        let email = normalize(email);
        let account = self
            .accounts
            .read()
            .await
            .values()
            .find(|account| account.user.email().as_deref() == Some(email.as_str()))
            .cloned()
            .ok_or(ApplicationError::InvalidCredentials)?;

        match &account.password {
            Some(hash) => verify(password, hash)?,
            None => return Err(ApplicationError::InvalidCredentials),
        }

        Ok(self.start(account.user))
    }

    #[instrument(skip(self))]
    async fn sign_in_anonymous(&self) -> Result<User> {
        let user = User::new(nanoid::nanoid!(UID_LENGTH, &ALPHABET), None, true);
        self.accounts.write().await.insert(
            user.uid().clone(),
            Account {
                user: user.clone(),
                password: None,
            },
        );

        Ok(self.start(user))
    }

    async fn sign_out(&self) -> Result<()> {
        self.current.send_replace(None);

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_account(&self) -> Result<()> {
        let user = self.current_user().ok_or(ApplicationError::NotSignedIn)?;
        self.accounts.write().await.remove(user.uid());
        self.current.send_replace(None);
        info!("Deleted account {}", user.uid());

        Ok(())
    }

    fn current_user(&self) -> Option<User> {
        self.current.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.current.subscribe()
    }
}
