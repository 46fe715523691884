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

use crate::prelude::*;
use crate::ui::colors::ColorRotation;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

pub mod memory;
#[cfg(feature = "surreal")]
pub mod surreal;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Getters)]
#[serde(rename_all = "camelCase")]
#[get = "pub"]
pub struct User {
    uid: String,
    email: Option<String>,
    is_anonymous: bool,
}

impl User {
    pub fn new(uid: impl Into<String>, email: Option<String>, is_anonymous: bool) -> Self {
        Self {
            uid: uid.into(),
            email,
            is_anonymous,
        }
    }
}

/// The identity service users authenticate against.
///
/// A successful `create_account`, `sign_in` or `sign_in_anonymous` makes the returned user the
/// current user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_account(&self, email: &str, password: &str) -> Result<User>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<User>;
    async fn sign_in_anonymous(&self) -> Result<User>;
    async fn sign_out(&self) -> Result<()>;
    /// Deletes the account of the current user and signs it out.
    async fn delete_account(&self) -> Result<()>;
    fn current_user(&self) -> Option<User>;
    fn subscribe(&self) -> watch::Receiver<Option<User>>;
}

/// The authentication gateway of the application.
#[derive(Clone)]
pub struct AuthService {
    identity: Arc<dyn IdentityProvider>,
    database: Database,
    navigator: Navigator,
    just_logged_in: Arc<watch::Sender<bool>>,
}

impl AuthService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        database: Database,
        navigator: Navigator,
    ) -> Self {
        let (just_logged_in, _) = watch::channel(false);

        Self {
            identity,
            database,
            navigator,
            just_logged_in: Arc::new(just_logged_in),
        }
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let user = self.identity.sign_in(email, password).await?;
        info!("Signed in {}", user.uid());
        self.just_logged_in.send_replace(true);

        Ok(user)
    }

    /// Creates an account and provisions the contact that represents the new user.
    #[instrument(skip(self, password))]
    pub async fn signup(&self, name: &str, email: &str, password: &str) -> Result<User> {
        let user = self.identity.create_account(email, password).await?;
        info!("Created account {}", user.uid());

        let mut colors = ColorRotation::load(&self.database).await?;
        let color = colors.next_color().await?;
        self.database
            .create_user_contact(user.uid(), name, email, color)
            .await?;

        self.just_logged_in.send_replace(true);

        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn login_guest(&self) -> Result<User> {
        let user = self.identity.sign_in_anonymous().await?;
        info!("Signed in guest {}", user.uid());
        self.just_logged_in.send_replace(true);

        Ok(user)
    }

    /// Ends the session. Guest accounts are deleted instead of signed out.
    ///
    /// Never fails: errors are logged, the flag is reset and the login route is shown regardless.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        let result = match self.identity.current_user() {
            Some(user) if *user.is_anonymous() => self.identity.delete_account().await,
            _ => self.identity.sign_out().await,
        };

        if let Err(error) = result {
            warn!("Logout/Delete: {}", error);
        }

        self.just_logged_in.send_replace(false);
        self.navigator.navigate(Route::Login);
    }

    pub fn current_user(&self) -> Option<User> {
        self.identity.current_user()
    }

    pub fn subscribe_user(&self) -> watch::Receiver<Option<User>> {
        self.identity.subscribe()
    }

    pub fn just_logged_in(&self) -> bool {
        *self.just_logged_in.borrow()
    }

    pub fn subscribe_just_logged_in(&self) -> watch::Receiver<bool> {
        self.just_logged_in.subscribe()
    }
}
