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

/// An assignment of a contact to a task as it is stored.
///
/// The contact attributes are denormalized into the record when the assignment is created and
/// refreshed when the contact is edited. They may be missing on records written by other clients.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Getters)]
#[serde(rename_all = "camelCase")]
#[get = "pub"]
pub struct TaskAssignDb {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<Id>,
    task_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    contact_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    initials: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    color: Option<String>,
}

/// An assignment merged with the display attributes of its contact.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Getters)]
#[serde(rename_all = "camelCase")]
#[get = "pub"]
pub struct TaskAssign {
    id: Option<Id>,
    task_id: Id,
    contact_id: Option<Id>,
    name: String,
    initials: String,
    color: String,
}

impl From<TaskAssignDb> for TaskAssign {
    fn from(assign: TaskAssignDb) -> Self {
        if assign.name.is_none() || assign.initials.is_none() || assign.color.is_none() {
            debug!(
                "Assignment {:?} lacks contact attributes, falling back to empty values",
                assign.id
            );
        }

        Self {
            id: assign.id,
            task_id: assign.task_id,
            contact_id: assign.contact_id,
            name: assign.name.unwrap_or_default(),
            initials: assign.initials.unwrap_or_default(),
            color: assign.color.unwrap_or_default(),
        }
    }
}

fn by_task(task: &Id) -> Query {
    Query::all(Collection::Assignments).where_eq("taskId", task.to_string())
}

fn by_contact(contact: &Id) -> Query {
    Query::all(Collection::Assignments).where_eq("contactId", contact.to_string())
}

impl Database {
    /// Assigns a persisted contact to a task, copying its display attributes into the record.
    #[instrument(skip(self, contact))]
    pub async fn assign_contact(&self, task: &Id, contact: &Contact) -> Result<TaskAssignDb> {
        task.require(Collection::Tasks)?;
        let contact_id = contact
            .id()
            .clone()
            .ok_or_else(|| ApplicationError::BadRequest("contact is not persisted".to_owned()))?;

        let assign = TaskAssignDb {
            id: None,
            task_id: task.clone(),
            contact_id: Some(contact_id),
            name: Some(contact.name().clone()),
            initials: Some(crate::contacts::initials(contact.name())),
            color: Some(contact.color().clone()),
        };
        let id = store_span!(
            self.store()
                .create(Collection::Assignments, serde_json::to_value(&assign)?),
            "create assignment"
        )?;

        Ok(TaskAssignDb {
            id: Some(id),
            ..assign
        })
    }

    #[instrument(skip(self))]
    pub async fn unassign(&self, id: &Id) -> Result<()> {
        id.require(Collection::Assignments)?;
        store_span!(self.store().delete(id), "delete assignment")
    }

    pub async fn task_assigns(&self, task: &Id) -> Result<Vec<TaskAssignDb>> {
        self.select(&by_task(task)).await
    }

    /// All assignments of one contact across tasks.
    pub async fn contact_assigns(&self, contact: &Id) -> Result<Vec<TaskAssignDb>> {
        self.select(&by_contact(contact)).await
    }

    /// Live query over the assignments of one task.
    pub async fn watch_task_assigns(&self, task: &Id) -> Result<LiveQuery<TaskAssignDb>> {
        self.live(by_task(task)).await
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::prelude::*;

    #[test]
    fn test_fallback_to_empty_attributes() {
        let assign: TaskAssignDb = serde_json::from_value(json!({
            "id": "assignments:a",
            "taskId": "tasks:t",
            "name": "Anton Mayer"
        }))
        .unwrap();

        let merged = TaskAssign::from(assign);
        assert_eq!("Anton Mayer", merged.name());
        assert_eq!("", merged.initials());
        assert_eq!("", merged.color());
        assert!(merged.contact_id().is_none());
    }

    #[tokio::test]
    async fn test_assign_contact() -> Result<()> {
        let suite = TestSuite::init();
        let database = suite.database();
        let task = suite.create_task("title", TaskStatus::ToDo).await?;
        let task_id = task.id().clone().unwrap();
        let contact = suite.create_contact("Anton Mayer").await?;

        let assign = database.assign_contact(&task_id, &contact).await?;
        assert_eq!(Some("AM"), assign.initials().as_deref());
        assert_eq!(contact.id(), assign.contact_id());

        let assigns = database.task_assigns(&task_id).await?;
        assert_eq!(vec![assign.clone()], assigns);

        assert_eq!(
            vec![assign.clone()],
            database.contact_assigns(contact.id().as_ref().unwrap()).await?
        );

        database.unassign(assign.id().as_ref().unwrap()).await?;
        assert!(database.task_assigns(&task_id).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_assign_requires_persisted_contact() -> Result<()> {
        let suite = TestSuite::init();
        let task = suite.create_task("title", TaskStatus::ToDo).await?;

        let result = suite
            .database()
            .assign_contact(task.id().as_ref().unwrap(), &Contact::new("Anna", "anna@join.de"))
            .await;
        assert!(matches!(result, Err(ApplicationError::BadRequest(_))));

        Ok(())
    }
}
