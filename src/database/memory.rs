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
use futures::StreamExt;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, RwLock};

const CHANGE_CAPACITY: usize = 256;

type Documents = HashMap<Collection, BTreeMap<String, Value>>;

/// An in-process [`DocumentStore`]. Documents are kept ordered by key per collection.
#[derive(Clone)]
pub struct MemoryStore {
    documents: Arc<RwLock<Documents>>,
    changes: broadcast::Sender<Collection>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);

        Self {
            documents: Arc::new(RwLock::new(HashMap::new())),
            changes,
        }
    }
}

impl MemoryStore {
    /// Number of live queries currently following the store.
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    fn notify(&self, collection: Collection) {
        // nobody listening is fine
        let _ = self.changes.send(collection);
    }

    async fn snapshot(documents: &RwLock<Documents>, query: &Query) -> Vec<Document> {
        let documents = documents.read().await;

        documents
            .get(&query.collection)
            .map(|collection| {
                collection
                    .iter()
                    .map(|(key, data)| Document {
                        id: Id::new(query.collection, key),
                        data: data.clone(),
                    })
                    .filter(|document| query.matches(document))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn require_object(id: &Id, data: &Value) -> Result<()> {
    if data.is_object() {
        Ok(())
    } else {
        Err(ApplicationError::BadRequest(format!(
            "document {id} has to be an object"
        )))
    }
}

struct Subscription {
    documents: Arc<RwLock<Documents>>,
    receiver: broadcast::Receiver<Collection>,
    query: Query,
    last: Option<Vec<Document>>,
}

impl Subscription {
    /// Waits for the next change of the result set. `None` once the store is gone.
    async fn next(&mut self) -> Option<Vec<Document>> {
        loop {
            if self.last.is_some() {
                match self.receiver.recv().await {
                    Ok(collection) if collection != self.query.collection => continue,
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Live query lagged behind by {} changes", skipped);
                    }
                    Err(RecvError::Closed) => return None,
                }
            }

            let snapshot = MemoryStore::snapshot(&self.documents, &self.query).await;
            // only emit when the result set actually changed
            if self.last.as_ref() != Some(&snapshot) {
                self.last = Some(snapshot.clone());
                return Some(snapshot);
            }
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    #[instrument(skip(self, data))]
    async fn create(&self, collection: Collection, data: Value) -> Result<Id> {
        let id = Id::generate(collection);
        self.set(&id, data).await?;

        Ok(id)
    }

    #[instrument(skip(self, data))]
    async fn set(&self, id: &Id, data: Value) -> Result<()> {
        require_object(id, &data)?;
        self.documents
            .write()
            .await
            .entry(id.collection)
            .or_default()
            .insert(id.key.clone(), data);
        self.notify(id.collection);

        Ok(())
    }

    #[instrument(skip(self, patch))]
    async fn merge(&self, id: &Id, patch: Value) -> Result<()> {
        require_object(id, &patch)?;
        {
            let mut documents = self.documents.write().await;
            let document = documents
                .get_mut(&id.collection)
                .and_then(|collection| collection.get_mut(&id.key))
                .and_then(Value::as_object_mut)
                .ok_or_else(|| ApplicationError::NotFound(id.clone()))?;

            if let Value::Object(fields) = patch {
                document.extend(fields);
            }
        }
        self.notify(id.collection);

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &Id) -> Result<()> {
        let removed = self
            .documents
            .write()
            .await
            .get_mut(&id.collection)
            .and_then(|collection| collection.remove(&id.key));

        if removed.is_some() {
            self.notify(id.collection);
        }

        Ok(())
    }

    async fn get(&self, id: &Id) -> Result<Option<Document>> {
        let documents = self.documents.read().await;

        Ok(documents
            .get(&id.collection)
            .and_then(|collection| collection.get(&id.key))
            .map(|data| Document {
                id: id.clone(),
                data: data.clone(),
            }))
    }

    async fn list(&self, query: &Query) -> Result<Vec<Document>> {
        Ok(Self::snapshot(&self.documents, query).await)
    }

    #[instrument(skip(self))]
    async fn watch(&self, query: Query) -> Result<LiveQuery<Document>> {
        // subscribe before the first snapshot so no change can slip through in between
        let subscription = Subscription {
            documents: self.documents.clone(),
            receiver: self.changes.subscribe(),
            query,
            last: None,
        };

        Ok(futures::stream::unfold(subscription, |mut subscription| async move {
            subscription
                .next()
                .await
                .map(|snapshot| (Ok(snapshot), subscription))
        })
        .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn next(stream: &mut LiveQuery<Document>) -> Vec<Document> {
        tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("live query did not emit")
            .expect("live query ended")
            .unwrap()
    }

    #[tokio::test]
    async fn test_crud() -> Result<()> {
        let store = MemoryStore::default();

        let id = store
            .create(Collection::Tasks, json!({ "title": "title", "status": "todo" }))
            .await?;
        assert_eq!(Collection::Tasks, id.collection);

        store.merge(&id, json!({ "status": "done" })).await?;
        let document = store.get(&id).await?.unwrap();
        assert_eq!(json!({ "title": "title", "status": "done" }), document.data);

        store.delete(&id).await?;
        assert!(store.get(&id).await?.is_none());
        // deleting twice is fine
        store.delete(&id).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_merge_missing_document() {
        let store = MemoryStore::default();
        let id = Id::new(Collection::Tasks, "missing");

        assert!(matches!(
            store.merge(&id, json!({ "status": "done" })).await,
            Err(ApplicationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_non_objects() {
        let store = MemoryStore::default();

        assert!(store.create(Collection::Tasks, json!("title")).await.is_err());
    }

    #[tokio::test]
    async fn test_list_filters() -> Result<()> {
        let store = MemoryStore::default();
        store
            .create(Collection::Subtasks, json!({ "taskId": "tasks:a" }))
            .await?;
        store
            .create(Collection::Subtasks, json!({ "taskId": "tasks:b" }))
            .await?;

        let all = store.list(&Query::all(Collection::Subtasks)).await?;
        assert_eq!(2, all.len());
        let filtered = store
            .list(&Query::all(Collection::Subtasks).where_eq("taskId", "tasks:a"))
            .await?;
        assert_eq!(1, filtered.len());

        Ok(())
    }

    #[tokio::test]
    async fn test_watch() -> Result<()> {
        let store = MemoryStore::default();
        let mut stream = store
            .watch(Query::all(Collection::Subtasks).where_eq("taskId", "tasks:a"))
            .await?;
        assert!(next(&mut stream).await.is_empty());

        let id = store
            .create(Collection::Subtasks, json!({ "taskId": "tasks:a", "done": false }))
            .await?;
        let snapshot = next(&mut stream).await;
        assert_eq!(1, snapshot.len());
        assert_eq!(id, snapshot[0].id);

        // changes outside the result set are not emitted
        store
            .create(Collection::Subtasks, json!({ "taskId": "tasks:b", "done": false }))
            .await?;
        store
            .create(Collection::Contacts, json!({ "name": "Anna" }))
            .await?;
        store.merge(&id, json!({ "done": true })).await?;
        let snapshot = next(&mut stream).await;
        assert_eq!(json!(true), snapshot[0].data["done"]);

        store.delete(&id).await?;
        assert!(next(&mut stream).await.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_watch_ends_with_store() -> Result<()> {
        let store = MemoryStore::default();
        let mut stream = store.watch(Query::all(Collection::Tasks)).await?;
        next(&mut stream).await;

        drop(store);
        assert!(stream.next().await.is_none());

        Ok(())
    }
}
