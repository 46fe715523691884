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
use std::future::{Future, IntoFuture};
use std::pin::Pin;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Getters)]
#[serde(rename_all = "camelCase")]
#[get = "pub"]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<Id>,
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    color: String,
    #[serde(default)]
    is_user: bool,
}

impl Contact {
    /// A contact that has not been persisted yet.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
            phone: String::new(),
            color: String::new(),
            is_user: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Setters)]
#[serde(rename_all = "camelCase")]
pub struct WriteContact<'a> {
    #[set = "pub"]
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[set = "pub"]
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[set = "pub"]
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<String>,
    #[set = "pub"]
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<String>,
    #[set = "pub"]
    #[serde(skip_serializing_if = "Option::is_none")]
    is_user: Option<bool>,
    #[serde(skip)]
    database: &'a Database,
    /// updates the given contact instead of creating a new one
    #[serde(skip)]
    #[set = "pub"]
    target: Option<&'a Id>,
    /// creates the contact under this key instead of a generated one
    #[serde(skip)]
    #[set = "pub"]
    key: Option<&'a str>,
}

impl<'a> From<&'a Database> for WriteContact<'a> {
    fn from(database: &'a Database) -> Self {
        Self {
            name: None,
            email: None,
            phone: None,
            color: None,
            is_user: None,
            database,
            target: None,
            key: None,
        }
    }
}

impl<'a> IntoFuture for WriteContact<'a> {
    type Output = Result<Contact>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    #[instrument(skip_all)]
    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            if let Some(target) = self.target {
                target.require(Collection::Contacts)?;
                store_span!(
                    self.database
                        .store()
                        .merge(target, serde_json::to_value(&self)?),
                    "update contact"
                )?;

                return self.database.fetch(target).await;
            }

            // keyed contacts belong to a signed up user and are stored as entered
            let name = match (self.name, self.key) {
                (Some(name), _) if !name.trim().is_empty() => name,
                (name, Some(_)) => name.unwrap_or_default(),
                _ => return Err(ApplicationError::BadRequest("name is required".to_owned())),
            };
            let contact = Contact {
                id: None,
                name,
                email: self.email.unwrap_or_default(),
                phone: self.phone.unwrap_or_default(),
                color: self.color.unwrap_or_default(),
                is_user: self.is_user.unwrap_or_default(),
            };
            let data = serde_json::to_value(&contact)?;

            let id = match self.key {
                Some(key) => {
                    let id = Id::new(Collection::Contacts, key);
                    store_span!(self.database.store().set(&id, data), "create contact")?;
                    id
                }
                None => store_span!(
                    self.database.store().create(Collection::Contacts, data),
                    "create contact"
                )?,
            };
            info!("Created contact {}", id);

            Ok(Contact {
                id: Some(id),
                ..contact
            })
        })
    }
}

impl Database {
    /// Provisions the contact belonging to a freshly signed up user, keyed by the user's uid.
    #[instrument(skip(self))]
    pub async fn create_user_contact(
        &self,
        uid: &str,
        name: &str,
        email: &str,
        color: &str,
    ) -> Result<Contact> {
        WriteContact::from(self)
            .set_key(Some(uid))
            .set_name(Some(name.to_owned()))
            .set_email(Some(email.to_owned()))
            .set_phone(Some(String::new()))
            .set_color(Some(color.to_owned()))
            .set_is_user(Some(true))
            .to_owned()
            .await
    }

    /// Persists the editable fields of an existing contact and refreshes the copies held by its
    /// assignments.
    #[instrument(skip(self, contact))]
    pub async fn edit_contact(&self, contact: &Contact) -> Result<Contact> {
        let id = contact
            .id()
            .as_ref()
            .ok_or_else(|| ApplicationError::BadRequest("contact is not persisted".to_owned()))?;

        let contact = WriteContact::from(self)
            .set_target(Some(id))
            .set_name(Some(contact.name().clone()))
            .set_email(Some(contact.email().clone()))
            .set_phone(Some(contact.phone().clone()))
            .set_color(Some(contact.color().clone()))
            .to_owned()
            .await?;

        for assign in self.contact_assigns(id).await? {
            if let Some(assign) = assign.id() {
                store_span!(
                    self.store().merge(
                        assign,
                        json!({
                            "name": contact.name(),
                            "initials": crate::contacts::initials(contact.name()),
                            "color": contact.color(),
                        })
                    ),
                    "update assignment"
                )?;
            }
        }

        Ok(contact)
    }

    /// Deletes a contact together with its assignments.
    #[instrument(skip(self))]
    pub async fn delete_contact(&self, id: &Id) -> Result<()> {
        id.require(Collection::Contacts)?;

        for assign in self.contact_assigns(id).await? {
            if let Some(assign) = assign.id() {
                store_span!(self.store().delete(assign), "delete assignment")?;
            }
        }

        store_span!(self.store().delete(id), "delete contact")?;
        info!("Deleted contact {}", id);

        Ok(())
    }

    pub async fn contacts(&self) -> Result<Vec<Contact>> {
        self.select(&Query::all(Collection::Contacts)).await
    }

    /// Live query over all contacts.
    pub async fn watch_contacts(&self) -> Result<LiveQuery<Contact>> {
        self.live(Query::all(Collection::Contacts)).await
    }
}
