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
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use strum::{AsRefStr, Display, EnumIter, EnumString};

pub mod definitions;
pub mod id;
pub mod memory;
#[cfg(feature = "surreal")]
pub mod surreal;

/// A push-based live query. Every item is the full result set at that point in time.
pub type LiveQuery<T> = BoxStream<'static, Result<Vec<T>>>;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumString,
    AsRefStr,
    Display,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Tasks,
    Subtasks,
    Assignments,
    Contacts,
    Meta,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: Id,
    pub data: Value,
}

impl Document {
    /// Deserializes the document into a record, exposing its id as the `id` field.
    pub fn parse<T: DeserializeOwned>(self) -> Result<T> {
        let mut data = self.data;
        match data.as_object_mut() {
            Some(object) => {
                object.insert("id".to_owned(), Value::String(self.id.to_string()));
            }
            None => {
                return Err(ApplicationError::BadRequest(format!(
                    "{} is not an object",
                    self.id
                )))
            }
        }

        Ok(serde_json::from_value(data)?)
    }
}

/// Field equality filter of a [`Query`].
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: &'static str,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: Collection,
    pub filter: Option<Filter>,
}

impl Query {
    pub fn all(collection: Collection) -> Self {
        Self {
            collection,
            filter: None,
        }
    }

    pub fn where_eq(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.filter = Some(Filter {
            field,
            value: value.into(),
        });
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        document.id.collection == self.collection
            && self.filter.as_ref().map_or(true, |filter| {
                document.data.get(filter.field) == Some(&filter.value)
            })
    }
}

/// The document database the application persists into.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates a document under a generated key.
    async fn create(&self, collection: Collection, data: Value) -> Result<Id>;
    /// Creates or replaces the document at the given id.
    async fn set(&self, id: &Id, data: Value) -> Result<()>;
    /// Merges the top level fields of `patch` into an existing document.
    async fn merge(&self, id: &Id, patch: Value) -> Result<()>;
    async fn delete(&self, id: &Id) -> Result<()>;
    async fn get(&self, id: &Id) -> Result<Option<Document>>;
    async fn list(&self, query: &Query) -> Result<Vec<Document>>;
    /// Subscribes to the result set of the query. The current result is emitted first.
    async fn watch(&self, query: Query) -> Result<LiveQuery<Document>>;
}

/// Typed data-access façade over a [`DocumentStore`].
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl From<Arc<dyn DocumentStore>> for Database {
    fn from(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

impl Database {
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub(crate) async fn fetch<T: DeserializeOwned>(&self, id: &Id) -> Result<T> {
        let document = store_span!(self.store.get(id), "get")?;

        document
            .ok_or_else(|| ApplicationError::NotFound(id.clone()))?
            .parse()
    }

    pub(crate) async fn select<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>> {
        store_span!(self.store.list(query), "list")?
            .into_iter()
            .map(Document::parse)
            .collect()
    }

    pub(crate) async fn live<T: DeserializeOwned + 'static>(
        &self,
        query: Query,
    ) -> Result<LiveQuery<T>> {
        let stream = store_span!(self.store.watch(query), "watch")?;

        Ok(stream
            .map(|snapshot| {
                snapshot?
                    .into_iter()
                    .map(Document::parse)
                    .collect::<Result<Vec<T>>>()
            })
            .boxed())
    }
}

/// The backends an application runs against.
#[derive(Clone)]
pub struct Backend {
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn crate::auth::IdentityProvider>,
}

impl Backend {
    /// A backend that lives entirely in this process.
    pub fn memory() -> Self {
        Self {
            store: Arc::new(memory::MemoryStore::default()),
            identity: Arc::new(crate::auth::memory::MemoryIdentity::default()),
        }
    }
}

pub async fn connect(config: &crate::config::Config) -> Result<Backend> {
    cfg_if::cfg_if! {
        if #[cfg(feature = "surreal")] {
            if let Some(endpoint) = config.surrealdb_endpoint() {
                let store = surreal::SurrealStore::connect(endpoint, config).await?;
                info!("Connected the document store to surrealdb");
                let identity = crate::auth::surreal::SurrealIdentity::connect(endpoint, config).await?;
                info!("Connected the identity provider to surrealdb");

                return Ok(Backend {
                    store: Arc::new(store),
                    identity: Arc::new(identity),
                });
            }
        } else {
            if config.surrealdb_endpoint().is_some() {
                warn!("SURREALDB_ENDPOINT is set but the surreal feature is disabled");
            }
        }
    }

    info!("Using the in-process backend");
    Ok(Backend::memory())
}

#[macro_export]
macro_rules! store_span {
    ($future: expr) => {{
        use tracing::Instrument;
        $future.instrument(tracing::info_span!("Store Request")).await
    }};
    ($future: expr, $title: expr) => {{
        use tracing::Instrument;
        $future
            .instrument(tracing::info_span!(concat!("Store Request: ", $title)))
            .await
    }};
}
