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

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Getters)]
#[serde(rename_all = "camelCase")]
#[get = "pub"]
pub struct Subtask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<Id>,
    task_id: Id,
    title: String,
    #[serde(default)]
    done: bool,
}

fn by_task(task: &Id) -> Query {
    Query::all(Collection::Subtasks).where_eq("taskId", task.to_string())
}

impl Database {
    #[instrument(skip(self))]
    pub async fn add_subtask(&self, task: &Id, title: &str) -> Result<Subtask> {
        task.require(Collection::Tasks)?;
        if title.trim().is_empty() {
            return Err(ApplicationError::BadRequest(
                "subtask title is required".to_owned(),
            ));
        }

        let subtask = Subtask {
            id: None,
            task_id: task.clone(),
            title: title.trim().to_owned(),
            done: false,
        };
        let id = store_span!(
            self.store()
                .create(Collection::Subtasks, serde_json::to_value(&subtask)?),
            "create subtask"
        )?;

        Ok(Subtask {
            id: Some(id),
            ..subtask
        })
    }

    #[instrument(skip(self))]
    pub async fn set_subtask_done(&self, id: &Id, done: bool) -> Result<()> {
        id.require(Collection::Subtasks)?;
        store_span!(
            self.store().merge(id, json!({ "done": done })),
            "update subtask"
        )
    }

    #[instrument(skip(self))]
    pub async fn rename_subtask(&self, id: &Id, title: &str) -> Result<()> {
        id.require(Collection::Subtasks)?;
        if title.trim().is_empty() {
            return Err(ApplicationError::BadRequest(
                "subtask title is required".to_owned(),
            ));
        }

        store_span!(
            self.store().merge(id, json!({ "title": title.trim() })),
            "update subtask"
        )
    }

    #[instrument(skip(self))]
    pub async fn delete_subtask(&self, id: &Id) -> Result<()> {
        id.require(Collection::Subtasks)?;
        store_span!(self.store().delete(id), "delete subtask")
    }

    pub async fn subtasks(&self, task: &Id) -> Result<Vec<Subtask>> {
        self.select(&by_task(task)).await
    }

    /// Live query over the subtasks of one task.
    pub async fn watch_subtasks(&self, task: &Id) -> Result<LiveQuery<Subtask>> {
        self.live(by_task(task)).await
    }
}
