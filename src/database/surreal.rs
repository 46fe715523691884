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

use crate::config::Config;
use crate::prelude::*;
use async_trait::async_trait;
use futures::StreamExt;
use serde::de::IgnoredAny;
use serde_json::Value;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use version_compare::{Cmp, Version};

pub type DatabaseConnection = Surreal<Client>;

/// Field the record key is projected into, it never reaches the documents.
const KEY_FIELD: &str = "__key";

/// A [`DocumentStore`] on top of a root authenticated surrealdb connection.
#[derive(Debug, Clone)]
pub struct SurrealStore {
    client: DatabaseConnection,
}

impl SurrealStore {
    pub async fn connect(endpoint: &str, config: &Config) -> Result<Self> {
        // establish the connection
        let client: Surreal<Client> = Surreal::new::<Ws>(endpoint).await?;
        info!("Established connection to surrealdb");

        // authenticate
        client
            .signin(Root {
                username: config.surrealdb_username().as_str(),
                password: config.surrealdb_password().as_str(),
            })
            .await?;
        info!("Authenticated with surrealdb");

        client
            .use_ns(config.surrealdb_namespace().as_str())
            .use_db(config.surrealdb_database().as_str())
            .await?;

        // perform the migrations
        migrate(&client, env!("CARGO_PKG_VERSION"), Vec::new()).await?;
        // execute the up queries
        client
            .query(include_str!("./up.surrealql"))
            .await?
            .check()?;
        info!("Initiated tables");

        Ok(Self { client })
    }

    async fn select(&self, sql: String, bindings: Value) -> Result<Vec<Document>> {
        let mut response = self.client.query(sql).bind(bindings).await?.check()?;
        let records = response.take::<Vec<Value>>(0)?;

        records.into_iter().map(into_document).collect()
    }
}

fn into_document(mut record: Value) -> Result<Document> {
    let object = record
        .as_object_mut()
        .ok_or(ApplicationError::InternalServerError)?;
    let table = object
        .remove("__table")
        .and_then(|table| table.as_str().map(ToOwned::to_owned))
        .ok_or(ApplicationError::InternalServerError)?;
    let key = object
        .remove(KEY_FIELD)
        .and_then(|key| key.as_str().map(ToOwned::to_owned))
        .ok_or(ApplicationError::InternalServerError)?;

    Ok(Document {
        id: format!("{table}:{key}").parse()?,
        data: record,
    })
}

fn projection() -> String {
    format!("*, meta::tb(id) AS __table, meta::id(id) AS {KEY_FIELD} OMIT id")
}

fn thing(id: &Id) -> Value {
    json!({ "table": id.collection, "key": id.key })
}

pub async fn migrate(
    client: &DatabaseConnection,
    current_version: &'static str,
    migrations: Vec<(&'static str, &'static str)>,
) -> Result<()> {
    // initiate the migration table and fetch possibly already existing records
    let mut responses = client
        .query(
            "DEFINE TABLE migration SCHEMALESS;
            DEFINE FIELD version     on TABLE migration TYPE string ASSERT $value IS NOT NULL;
            DEFINE FIELD created_at  on TABLE migration TYPE datetime VALUE time::now();",
        )
        .query("SELECT version, created_at FROM migration ORDER BY created_at DESC LIMIT 1")
        .await?
        .check()?;
    // the second response carries the last migrated version
    let last = responses.take::<Option<String>>((1, "version"))?;

    let Some(last) = last else {
        client
            .query("CREATE migration SET version = $version")
            .bind(("version", current_version))
            .await?
            .check()?;

        return Ok(());
    };

    if last == current_version {
        return Ok(());
    }

    let last = Version::from(last.as_str()).ok_or_else(|| {
        ApplicationError::BadRequest(format!("invalid migration version {last}"))
    })?;
    for (version, migration) in migrations {
        let target = Version::from(version).ok_or_else(|| {
            ApplicationError::BadRequest(format!("invalid migration version {version}"))
        })?;
        if !last.compare_to(&target, Cmp::Lt) {
            continue;
        }

        info!("Executing surrealdb migration to {version}");
        client
            .query(migration)
            .query("CREATE migration SET version = $version")
            .bind(("version", version))
            .await?
            .check()?;
    }

    Ok(())
}

/// Aborts the forwarding task once the live query stream is dropped.
struct Forwarder(JoinHandle<()>);

impl Drop for Forwarder {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct Subscription {
    store: SurrealStore,
    query: Query,
    changes: mpsc::UnboundedReceiver<()>,
    last: Option<Vec<Document>>,
    _forwarder: Forwarder,
}

impl Subscription {
    async fn next(&mut self) -> Option<Result<Vec<Document>>> {
        loop {
            if self.last.is_some() {
                // `None` once the live query is gone
                self.changes.recv().await?;
            }

            let snapshot = match self.store.list(&self.query).await {
                Ok(snapshot) => snapshot,
                Err(error) => return Some(Err(error)),
            };
            if self.last.as_ref() != Some(&snapshot) {
                self.last = Some(snapshot.clone());
                return Some(Ok(snapshot));
            }
        }
    }
}

#[async_trait]
impl DocumentStore for SurrealStore {
    #[instrument(skip(self, data))]
    async fn create(&self, collection: Collection, data: Value) -> Result<Id> {
        let id = Id::generate(collection);
        self.set(&id, data).await?;

        Ok(id)
    }

    #[instrument(skip(self, data))]
    async fn set(&self, id: &Id, data: Value) -> Result<()> {
        if !data.is_object() {
            return Err(ApplicationError::BadRequest(format!(
                "document {id} has to be an object"
            )));
        }

        self.client
            .query("UPDATE type::thing($table, $key) CONTENT $data")
            .bind(thing(id))
            .bind(("data", data))
            .await?
            .check()?;

        Ok(())
    }

    #[instrument(skip(self, patch))]
    async fn merge(&self, id: &Id, patch: Value) -> Result<()> {
        if self.get(id).await?.is_none() {
            return Err(ApplicationError::NotFound(id.clone()));
        }

        self.client
            .query("UPDATE type::thing($table, $key) MERGE $patch")
            .bind(thing(id))
            .bind(("patch", patch))
            .await?
            .check()?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &Id) -> Result<()> {
        self.client
            .query("DELETE type::thing($table, $key)")
            .bind(thing(id))
            .await?
            .check()?;

        Ok(())
    }

    async fn get(&self, id: &Id) -> Result<Option<Document>> {
        let sql = format!("SELECT {} FROM type::thing($table, $key)", projection());

        Ok(self.select(sql, thing(id)).await?.into_iter().next())
    }

    async fn list(&self, query: &Query) -> Result<Vec<Document>> {
        let mut sql = format!("SELECT {} FROM type::table($table)", projection());
        let mut bindings = json!({ "table": query.collection });

        if let Some(filter) = &query.filter {
            // field names are compile time constants
            sql.push_str(&format!(" WHERE {} = $value", filter.field));
            bindings["value"] = filter.value.clone();
        }
        sql.push_str(" ORDER BY __key");

        self.select(sql, bindings).await
    }

    #[instrument(skip(self))]
    async fn watch(&self, query: Query) -> Result<LiveQuery<Document>> {
        let (sender, changes) = mpsc::unbounded_channel();
        let client = self.client.clone();
        let table = query.collection.to_string();

        let handle = tokio::spawn(async move {
            let mut notifications = match client
                .select::<Vec<IgnoredAny>>(table.as_str())
                .live()
                .await
            {
                Ok(notifications) => notifications,
                Err(error) => {
                    error!("Unable to start live query on {}: {}", table, error);
                    return;
                }
            };
            // anything written before the live query was registered
            if sender.send(()).is_err() {
                return;
            }

            while let Some(notification) = notifications.next().await {
                if let Err(error) = notification {
                    warn!("Live query on {} reported: {}", table, error);
                    continue;
                }
                if sender.send(()).is_err() {
                    break;
                }
            }
        });

        let subscription = Subscription {
            store: self.clone(),
            query,
            changes,
            last: None,
            _forwarder: Forwarder(handle),
        };

        Ok(futures::stream::unfold(subscription, |mut subscription| async move {
            subscription
                .next()
                .await
                .map(|snapshot| (snapshot, subscription))
        })
        .boxed())
    }
}
