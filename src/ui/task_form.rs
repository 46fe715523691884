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

/// The add-task form.
#[derive(Debug, Clone, Getters, Setters)]
pub struct TaskForm {
    database: Database,
    #[getset(get = "pub", set = "pub")]
    title: String,
    #[getset(get = "pub", set = "pub")]
    description: String,
    #[getset(get = "pub", set = "pub")]
    due_date: Option<NaiveDate>,
    #[get = "pub"]
    priority: Option<TaskPriority>,
    #[getset(get = "pub", set = "pub")]
    kind: TaskType,
    /// the column a task is created in, board "+" buttons preselect it
    #[getset(get = "pub", set = "pub")]
    status: TaskStatus,
    #[get = "pub"]
    subtasks: Vec<String>,
    #[get = "pub"]
    assigned: Vec<Contact>,
}

impl TaskForm {
    pub fn new(database: &Database) -> Self {
        Self {
            database: database.clone(),
            title: String::new(),
            description: String::new(),
            due_date: None,
            priority: None,
            kind: TaskType::default(),
            status: TaskStatus::ToDo,
            subtasks: Vec::new(),
            assigned: Vec::new(),
        }
    }

    pub fn with_status(database: &Database, status: TaskStatus) -> Self {
        Self {
            status,
            ..Self::new(database)
        }
    }

    /// Selects the priority, or clears it when it is already selected.
    pub fn set_priority(&mut self, priority: TaskPriority) -> &mut Self {
        self.priority = match self.priority {
            Some(selected) if selected == priority => None,
            _ => Some(priority),
        };
        self
    }

    pub fn add_subtask(&mut self, title: &str) -> &mut Self {
        let title = title.trim();
        if !title.is_empty() {
            self.subtasks.push(title.to_owned());
        }
        self
    }

    pub fn remove_subtask(&mut self, index: usize) -> &mut Self {
        if index < self.subtasks.len() {
            self.subtasks.remove(index);
        }
        self
    }

    /// Assigns the contact, or removes it when it is already assigned.
    pub fn toggle_contact(&mut self, contact: &Contact) -> &mut Self {
        match self
            .assigned
            .iter()
            .position(|assigned| assigned.id() == contact.id())
        {
            Some(index) => {
                self.assigned.remove(index);
            }
            None => self.assigned.push(contact.clone()),
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(ApplicationError::BadRequest("title is required".to_owned()));
        }
        if self.due_date.is_none() {
            return Err(ApplicationError::BadRequest(
                "due date is required".to_owned(),
            ));
        }

        Ok(())
    }

    /// Creates the task followed by its subtasks and assignments, then clears the form.
    #[instrument(skip_all)]
    pub async fn submit(&mut self) -> Result<Task> {
        self.validate()?;

        let task = WriteTask::from(&self.database)
            .set_title(Some(self.title.trim().to_owned()))
            .set_description(Some(self.description.clone()))
            .set_due_date(self.due_date)
            .set_priority(Some(self.priority.unwrap_or_default()))
            .set_kind(Some(self.kind))
            .set_status(Some(self.status))
            .to_owned()
            .await?;
        let id = task
            .id()
            .as_ref()
            .ok_or(ApplicationError::InternalServerError)?;

        for subtask in &self.subtasks {
            self.database.add_subtask(id, subtask).await?;
        }
        for contact in &self.assigned {
            self.database.assign_contact(id, contact).await?;
        }

        self.clear();

        Ok(task)
    }

    /// Resets every field, keeping the preselected column.
    pub fn clear(&mut self) {
        *self = Self::with_status(&self.database, self.status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::prelude::*;

    fn filled(suite: &TestSuite) -> TaskForm {
        let mut form = TaskForm::new(suite.database());
        form.set_title("Write release notes".to_owned())
            .set_due_date(NaiveDate::from_ymd_opt(2026, 11, 2));
        form
    }

    #[test]
    fn test_priority_toggle() {
        let suite = TestSuite::init();
        let mut form = TaskForm::new(suite.database());

        form.set_priority(TaskPriority::Urgent);
        assert_eq!(Some(TaskPriority::Urgent), *form.priority());
        form.set_priority(TaskPriority::Low);
        assert_eq!(Some(TaskPriority::Low), *form.priority());
        form.set_priority(TaskPriority::Low);
        assert_eq!(None, *form.priority());
    }

    #[test]
    fn test_validate() {
        let suite = TestSuite::init();
        let mut form = TaskForm::new(suite.database());
        assert!(form.validate().is_err());

        form.set_title("  ".to_owned())
            .set_due_date(NaiveDate::from_ymd_opt(2026, 11, 2));
        assert!(form.validate().is_err());

        form.set_title("title".to_owned());
        assert!(form.validate().is_ok());
    }

    #[tokio::test]
    async fn test_submit() -> Result<()> {
        let suite = TestSuite::init();
        let contact = suite.create_contact("Anton Mayer").await?;
        let mut form = filled(&suite);
        form.add_subtask("draft")
            .add_subtask("   ")
            .add_subtask("review")
            .toggle_contact(&contact);

        let task = form.submit().await?;
        let id = task.id().clone().unwrap();
        assert_eq!(TaskPriority::Medium, *task.priority());
        assert_eq!(TaskStatus::ToDo, *task.status());

        let database = suite.database();
        assert_eq!(1, database.tasks().await?.len());
        let subtasks = database.subtasks(&id).await?;
        assert_eq!(2, subtasks.len());
        let assigns = database.task_assigns(&id).await?;
        assert_eq!(1, assigns.len());
        assert_eq!(&Some("AM".to_owned()), assigns[0].initials());

        // the form is cleared afterwards
        assert!(form.title().is_empty());
        assert!(form.subtasks().is_empty());
        assert!(form.assigned().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_submit_into_preselected_column() -> Result<()> {
        let suite = TestSuite::init();
        let mut form = TaskForm::with_status(suite.database(), TaskStatus::AwaitFeedback);
        form.set_title("title".to_owned())
            .set_due_date(NaiveDate::from_ymd_opt(2026, 11, 2));
        form.set_priority(TaskPriority::Urgent);

        let task = form.submit().await?;
        assert_eq!(TaskStatus::AwaitFeedback, *task.status());
        assert_eq!(TaskPriority::Urgent, *task.priority());
        assert_eq!(TaskStatus::AwaitFeedback, *form.status());

        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_submit_creates_nothing() -> Result<()> {
        let suite = TestSuite::init();
        let mut form = TaskForm::new(suite.database());
        form.set_title("title".to_owned());

        assert!(form.submit().await.is_err());
        assert!(suite.database().tasks().await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_toggle_contact() -> Result<()> {
        let suite = TestSuite::init();
        let contact = suite.create_contact("Anna").await?;
        let mut form = TaskForm::new(suite.database());

        form.toggle_contact(&contact);
        assert_eq!(1, form.assigned().len());
        form.toggle_contact(&contact);
        assert!(form.assigned().is_empty());

        Ok(())
    }
}
