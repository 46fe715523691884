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
use crate::config::Config;
use crate::prelude::*;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Scope;
use surrealdb::Surreal;
use tokio::sync::watch;

const SCOPE: &str = "account";
const GUEST_DOMAIN: &str = "guest.join";

#[derive(Deserialize)]
struct Account {
    uid: String,
    email: String,
    anonymous: bool,
}

impl From<Account> for User {
    fn from(account: Account) -> Self {
        let email = (!account.anonymous).then_some(account.email);

        User::new(account.uid, email, account.anonymous)
    }
}

/// An [`IdentityProvider`] backed by the `account` scope of surrealdb.
///
/// The connection is authenticated as the signed in account, so it is kept apart from the root
/// connection of the document store.
#[derive(Clone)]
pub struct SurrealIdentity {
    client: Surreal<Client>,
    namespace: String,
    database: String,
    current: Arc<watch::Sender<Option<User>>>,
}

impl SurrealIdentity {
    pub async fn connect(endpoint: &str, config: &Config) -> Result<Self> {
        let client: Surreal<Client> = Surreal::new::<Ws>(endpoint).await?;
        client
            .use_ns(config.surrealdb_namespace().as_str())
            .use_db(config.surrealdb_database().as_str())
            .await?;
        let (current, _) = watch::channel(None);

        Ok(Self {
            client,
            namespace: config.surrealdb_namespace().clone(),
            database: config.surrealdb_database().clone(),
            current: Arc::new(current),
        })
    }

    fn scope<P>(&self, params: P) -> Scope<'_, P> {
        Scope {
            namespace: self.namespace.as_str(),
            database: self.database.as_str(),
            scope: SCOPE,
            params,
        }
    }

    async fn signup(&self, params: Value) -> Result<User> {
        let email = params["email"].as_str().unwrap_or_default().to_owned();

        self.client
            .signup(self.scope(params))
            .await
            .map_err(|error| {
                // raised by the unique email index
                if error.to_string().contains("already contains") {
                    ApplicationError::AccountExists(email)
                } else {
                    ApplicationError::from(error)
                }
            })?;

        self.start().await
    }

    /// Loads the authenticated account and publishes it as the current user.
    async fn start(&self) -> Result<User> {
        let mut response = self
            .client
            .query("SELECT meta::id(id) AS uid, email, anonymous FROM $auth")
            .await?
            .check()?;
        let account = response
            .take::<Option<Account>>(0)?
            .ok_or(ApplicationError::Unauthorized)?;
        let user = User::from(account);
        self.current.send_replace(Some(user.clone()));

        Ok(user)
    }
}

#[async_trait]
impl IdentityProvider for SurrealIdentity {
    #[instrument(skip(self, password))]
    async fn create_account(&self, email: &str, password: &str) -> Result<User> {
        self.signup(json!({
            "email": email.trim(),
            "password": password,
            "anonymous": false
        }))
        .await
    }

    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        self.client
            .signin(self.scope(json!({ "email": email.trim(), "password": password })))
            .await
            .map_err(|error| {
                debug!("Signin refused: {}", error);
                ApplicationError::InvalidCredentials
            })?;

        self.start().await
    }

    #[instrument(skip(self))]
    async fn sign_in_anonymous(&self) -> Result<User> {
        self.signup(json!({
            "email": format!("{}@{GUEST_DOMAIN}", nanoid::nanoid!().to_lowercase()),
            "password": nanoid::nanoid!(32),
            "anonymous": true
        }))
        .await
    }

    async fn sign_out(&self) -> Result<()> {
        self.client.invalidate().await?;
        self.current.send_replace(None);

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_account(&self) -> Result<()> {
        if self.current_user().is_none() {
            return Err(ApplicationError::NotSignedIn);
        }

        self.client.query("DELETE $auth").await?.check()?;
        self.sign_out().await
    }

    fn current_user(&self) -> Option<User> {
        self.current.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.current.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::surreal::SurrealStore;

    async fn identity() -> Result<SurrealIdentity> {
        let endpoint = std::env::var("SURREALDB_ENDPOINT").unwrap();
        let config = envy::from_iter::<_, Config>(vec![
            ("SURREALDB_NAMESPACE".to_owned(), "test".to_owned()),
            ("SURREALDB_DATABASE".to_owned(), nanoid::nanoid!()),
        ])?;
        // defines the scope
        SurrealStore::connect(endpoint.as_str(), &config).await?;

        SurrealIdentity::connect(endpoint.as_str(), &config).await
    }

    #[tokio::test]
    #[ignore = "needs a running surrealdb"]
    async fn test_accounts() -> Result<()> {
        let identity = identity().await?;

        let user = identity.create_account("anna@join.de", "password").await?;
        assert_eq!(Some("anna@join.de"), user.email().as_deref());
        identity.sign_out().await?;
        assert!(identity.current_user().is_none());

        assert!(matches!(
            identity.sign_in("anna@join.de", "wrong").await,
            Err(ApplicationError::InvalidCredentials)
        ));
        assert_eq!(user, identity.sign_in("anna@join.de", "password").await?);

        Ok(())
    }

    #[tokio::test]
    #[ignore = "needs a running surrealdb"]
    async fn test_guest() -> Result<()> {
        let identity = identity().await?;

        let guest = identity.sign_in_anonymous().await?;
        assert!(guest.is_anonymous());
        assert!(guest.email().is_none());

        identity.delete_account().await?;
        assert!(identity.current_user().is_none());

        Ok(())
    }
}
