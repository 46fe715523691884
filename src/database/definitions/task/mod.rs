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
use chrono::NaiveDate;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use strum::{AsRefStr, EnumString};

pub mod assign;
pub mod state;
pub mod subtask;

pub use state::TaskStatus;

#[derive(
    Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskPriority {
    Urgent,
    #[default]
    Medium,
    Low,
}

#[derive(
    Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum TaskType {
    #[default]
    UserStory,
    TechnicalTask,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Getters)]
#[serde(rename_all = "camelCase")]
#[get = "pub"]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<Id>,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    due_date: Option<NaiveDate>,
    #[serde(default)]
    priority: TaskPriority,
    #[serde(rename = "type", default)]
    kind: TaskType,
    #[serde(default)]
    status: TaskStatus,
}

impl Task {
    /// A task that has not been persisted yet.
    pub fn new(title: impl Into<String>, kind: TaskType, status: TaskStatus) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: String::new(),
            due_date: None,
            priority: TaskPriority::default(),
            kind,
            status,
        }
    }
}

#[derive(Clone, Debug, Serialize, Setters)]
#[serde(rename_all = "camelCase")]
pub struct WriteTask<'a> {
    #[set = "pub"]
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[set = "pub"]
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[set = "pub"]
    #[serde(skip_serializing_if = "Option::is_none")]
    due_date: Option<NaiveDate>,
    #[set = "pub"]
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<TaskPriority>,
    #[set = "pub"]
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<TaskType>,
    #[set = "pub"]
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<TaskStatus>,
    #[serde(skip)]
    database: &'a Database,
    #[serde(skip)]
    #[set = "pub"]
    target: Option<&'a Id>,
}

impl<'a> From<&'a Database> for WriteTask<'a> {
    fn from(database: &'a Database) -> Self {
        Self {
            title: None,
            description: None,
            due_date: None,
            priority: None,
            kind: None,
            status: None,
            database,
            target: None,
        }
    }
}

impl<'a> IntoFuture for WriteTask<'a> {
    type Output = Result<Task>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    #[instrument(skip_all)]
    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            if let Some(target) = self.target {
                target.require(Collection::Tasks)?;
                // only the given fields are touched
                store_span!(
                    self.database.store().merge(target, serde_json::to_value(&self)?),
                    "update task"
                )?;

                return self.database.fetch(target).await;
            }

            let title = match self.title {
                Some(title) if !title.trim().is_empty() => title,
                _ => return Err(ApplicationError::BadRequest("title is required".to_owned())),
            };
            let task = Task {
                id: None,
                title,
                description: self.description.unwrap_or_default(),
                due_date: self.due_date,
                priority: self.priority.unwrap_or_default(),
                kind: self.kind.unwrap_or_default(),
                status: self.status.unwrap_or_default(),
            };

            let id = store_span!(
                self.database
                    .store()
                    .create(Collection::Tasks, serde_json::to_value(&task)?),
                "create task"
            )?;
            info!("Created task {}", id);

            Ok(Task {
                id: Some(id),
                ..task
            })
        })
    }
}

impl Database {
    pub async fn get_task(&self, id: &Id) -> Result<Task> {
        id.require(Collection::Tasks)?;
        self.fetch(id).await
    }

    pub async fn tasks(&self) -> Result<Vec<Task>> {
        self.select(&Query::all(Collection::Tasks)).await
    }

    /// Live query over all tasks.
    pub async fn watch_tasks(&self) -> Result<LiveQuery<Task>> {
        self.live(Query::all(Collection::Tasks)).await
    }

    /// Moves a task into another board column, leaving every other field untouched.
    #[instrument(skip(self))]
    pub async fn update_task_status(&self, id: &Id, status: TaskStatus) -> Result<()> {
        id.require(Collection::Tasks)?;
        store_span!(
            self.store().merge(id, json!({ "status": status })),
            "update task status"
        )
    }

    /// Deletes a task together with its subtasks and assignments.
    #[instrument(skip(self))]
    pub async fn delete_task(&self, id: &Id) -> Result<()> {
        id.require(Collection::Tasks)?;

        for subtask in self.subtasks(id).await? {
            if let Some(subtask) = subtask.id() {
                store_span!(self.store().delete(subtask), "delete subtask")?;
            }
        }
        for assign in self.task_assigns(id).await? {
            if let Some(assign) = assign.id() {
                store_span!(self.store().delete(assign), "delete assignment")?;
            }
        }

        store_span!(self.store().delete(id), "delete task")?;
        info!("Deleted task {}", id);

        Ok(())
    }
}
