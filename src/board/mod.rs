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
use futures::StreamExt;
use std::collections::HashMap;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub mod summary;

pub use summary::BoardSummary;

/// Rounded percentage of finished subtasks, `0` without subtasks.
pub fn progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }

    (100.0 * done as f64 / total as f64).round() as u8
}

/// A task joined with its subtasks and assignments.
#[derive(Debug, Clone, PartialEq, Serialize, Getters)]
#[serde(rename_all = "camelCase")]
#[get = "pub"]
pub struct BoardTask {
    #[serde(flatten)]
    task: Task,
    assigns: Vec<TaskAssign>,
    subtasks: Vec<Subtask>,
    subtasks_total: usize,
    subtasks_done: usize,
    progress: u8,
}

impl BoardTask {
    pub fn new(task: Task, subtasks: Vec<Subtask>, assigns: Vec<TaskAssign>) -> Self {
        let subtasks_total = subtasks.len();
        let subtasks_done = subtasks.iter().filter(|subtask| *subtask.done()).count();

        Self {
            task,
            assigns,
            subtasks,
            subtasks_total,
            subtasks_done,
            progress: progress(subtasks_done, subtasks_total),
        }
    }

    pub fn id(&self) -> Option<&Id> {
        self.task.id().as_ref()
    }

    pub fn status(&self) -> TaskStatus {
        *self.task.status()
    }
}

enum ChildUpdate {
    Subtasks(Vec<Subtask>),
    Assigns(Vec<TaskAssign>),
}

struct ChildEvent {
    id: Id,
    generation: u64,
    update: ChildUpdate,
}

/// The subtask and assignment subscriptions of one task.
struct Child {
    generation: u64,
    subtasks: Option<Vec<Subtask>>,
    assigns: Option<Vec<TaskAssign>>,
    handle: JoinHandle<()>,
}

impl Drop for Child {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn follow(
    database: Database,
    id: Id,
    generation: u64,
    events: mpsc::UnboundedSender<ChildEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = async {
            let mut subtasks = database.watch_subtasks(&id).await?;
            let mut assigns = database.watch_task_assigns(&id).await?;

            loop {
                let update = tokio::select! {
                    Some(next) = subtasks.next() => ChildUpdate::Subtasks(next?),
                    Some(next) = assigns.next() => {
                        ChildUpdate::Assigns(next?.into_iter().map(TaskAssign::from).collect())
                    }
                    else => break,
                };

                let event = ChildEvent {
                    id: id.clone(),
                    generation,
                    update,
                };
                if events.send(event).is_err() {
                    break;
                }
            }

            Ok::<(), ApplicationError>(())
        }
        .await;

        if let Err(error) = result {
            error!("Error occurred on the live queries of {}: {}", id, error);
        }
    })
}

/// The arena of child subscriptions, keyed by task id.
struct Board {
    database: Database,
    events: mpsc::UnboundedSender<ChildEvent>,
    tasks: Vec<Task>,
    children: HashMap<Id, Child>,
    generation: u64,
}

impl Board {
    fn replace(&mut self, tasks: Vec<Task>) {
        let current: Vec<Id> = tasks.iter().filter_map(|task| task.id().clone()).collect();

        // dropping a child aborts its subscriptions
        let before = self.children.len();
        self.children.retain(|id, _| current.contains(id));
        if before != self.children.len() {
            debug!("Disposed {} task subscriptions", before - self.children.len());
        }

        for id in current {
            if self.children.contains_key(&id) {
                continue;
            }

            self.generation += 1;
            let handle = follow(
                self.database.clone(),
                id.clone(),
                self.generation,
                self.events.clone(),
            );
            self.children.insert(
                id,
                Child {
                    generation: self.generation,
                    subtasks: None,
                    assigns: None,
                    handle,
                },
            );
        }

        self.tasks = tasks;
    }

    fn apply(&mut self, event: ChildEvent) {
        let Some(child) = self.children.get_mut(&event.id) else {
            return;
        };
        // late messages of a disposed subscription
        if child.generation != event.generation {
            return;
        }

        match event.update {
            ChildUpdate::Subtasks(subtasks) => child.subtasks = Some(subtasks),
            ChildUpdate::Assigns(assigns) => child.assigns = Some(assigns),
        }
    }

    /// The joined list, once every task has delivered its subtasks and assignments.
    fn assemble(&self) -> Option<Vec<BoardTask>> {
        self.tasks
            .iter()
            .filter_map(|task| task.id().as_ref().map(|id| (task, id)))
            .map(|(task, id)| {
                let child = self.children.get(id)?;

                Some(BoardTask::new(
                    task.clone(),
                    child.subtasks.clone()?,
                    child.assigns.clone()?,
                ))
            })
            .collect()
    }
}

/// Follows the live task collection and publishes the joined board.
///
/// The published value is `None` until the first complete join.
pub struct BoardViewModel {
    database: Database,
    board: watch::Receiver<Option<Vec<BoardTask>>>,
    shutdown: kanal::AsyncSender<()>,
    handle: JoinHandle<()>,
}

impl BoardViewModel {
    pub async fn spawn(database: &Database) -> Result<Self> {
        let mut tasks = database.watch_tasks().await?;
        let (sender, board) = watch::channel(None);
        let (shutdown, receiver) = kanal::unbounded_async::<()>();
        let (events, mut updates) = mpsc::unbounded_channel();

        let mut arena = Board {
            database: database.clone(),
            events,
            tasks: Vec::new(),
            children: HashMap::new(),
            generation: 0,
        };

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    next = tasks.next() => match next {
                        Some(Ok(tasks)) => arena.replace(tasks),
                        Some(Err(error)) => {
                            error!("Error occurred on the tasks live query: {}", error);
                            break;
                        }
                        None => break,
                    },
                    Some(event) = updates.recv() => arena.apply(event),
                    _ = receiver.recv() => {
                        debug!("Received shutdown signal on kanal receiver");
                        break;
                    }
                }

                if let Some(joined) = arena.assemble() {
                    sender.send_if_modified(|current| {
                        if current.as_ref() == Some(&joined) {
                            return false;
                        }

                        *current = Some(joined);
                        true
                    });
                }
            }
        });

        Ok(Self {
            database: database.clone(),
            board,
            shutdown,
            handle,
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.board.borrow().is_some()
    }

    pub fn tasks(&self) -> Vec<BoardTask> {
        self.board.borrow().clone().unwrap_or_default()
    }

    pub fn column(&self, status: TaskStatus) -> Vec<BoardTask> {
        self.board
            .borrow()
            .iter()
            .flatten()
            .filter(|task| task.status() == status)
            .cloned()
            .collect()
    }

    /// Every column in board order.
    pub fn columns(&self) -> Vec<(TaskStatus, Vec<BoardTask>)> {
        TaskStatus::ALL
            .into_iter()
            .map(|status| (status, self.column(status)))
            .collect()
    }

    pub fn todo(&self) -> Vec<BoardTask> {
        self.column(TaskStatus::ToDo)
    }

    pub fn in_progress(&self) -> Vec<BoardTask> {
        self.column(TaskStatus::InProgress)
    }

    pub fn await_feedback(&self) -> Vec<BoardTask> {
        self.column(TaskStatus::AwaitFeedback)
    }

    pub fn done(&self) -> Vec<BoardTask> {
        self.column(TaskStatus::Done)
    }

    pub fn summary(&self) -> BoardSummary {
        BoardSummary::from(self.tasks().as_slice())
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Vec<BoardTask>>> {
        self.board.clone()
    }

    /// Moves a dropped task into the column. Tasks without an id are ignored.
    ///
    /// The board itself only changes once the live query reports the update.
    #[instrument(skip(self, task))]
    pub async fn drop_task(&self, task: &Task, status: TaskStatus) -> Result<()> {
        match task.id() {
            Some(id) => self.database.update_task_status(id, status).await,
            None => {
                debug!("Ignoring drop of a task without id");
                Ok(())
            }
        }
    }

    pub async fn shutdown(self) {
        self.shutdown.send(()).await.ok();
    }
}

impl Drop for BoardViewModel {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MockDocumentStore;
    use crate::tests::prelude::*;
    use std::sync::Arc;
    use std::time::Duration;

    async fn board_where(
        model: &BoardViewModel,
        predicate: impl FnMut(&Option<Vec<BoardTask>>) -> bool,
    ) -> Vec<BoardTask> {
        let mut receiver = model.subscribe();
        let board = tokio::time::timeout(Duration::from_secs(5), receiver.wait_for(predicate))
            .await
            .expect("board did not reach the expected state")
            .unwrap()
            .clone();

        board.unwrap_or_default()
    }

    async fn eventually(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        panic!("condition was never met");
    }

    #[test]
    fn test_progress() {
        assert_eq!(0, progress(0, 0));
        assert_eq!(0, progress(0, 3));
        assert_eq!(33, progress(1, 3));
        assert_eq!(67, progress(2, 3));
        assert_eq!(50, progress(1, 2));
        assert_eq!(100, progress(4, 4));
    }

    #[test]
    fn test_board_task_counts() {
        let task_id = Id::new(Collection::Tasks, "t");
        let subtasks: Vec<Subtask> = serde_json::from_value(json!([
            { "id": "subtasks:a", "taskId": "tasks:t", "title": "a", "done": true },
            { "id": "subtasks:b", "taskId": "tasks:t", "title": "b", "done": false },
            { "id": "subtasks:c", "taskId": "tasks:t", "title": "c", "done": false }
        ]))
        .unwrap();
        let task: Task =
            serde_json::from_value(json!({ "id": task_id.to_string(), "title": "t" })).unwrap();

        let board_task = BoardTask::new(task, subtasks, Vec::new());
        assert_eq!(3, *board_task.subtasks_total());
        assert_eq!(1, *board_task.subtasks_done());
        assert_eq!(33, *board_task.progress());
        assert_eq!(Some(&task_id), board_task.id());

        let value = serde_json::to_value(&board_task).unwrap();
        assert_eq!(json!("t"), value["title"]);
        assert_eq!(json!(33), value["progress"]);
        assert_eq!(json!(3), value["subtasksTotal"]);
    }

    #[tokio::test]
    async fn test_empty_board_is_emitted() -> Result<()> {
        let suite = TestSuite::init();
        let model = BoardViewModel::spawn(suite.database()).await?;

        let board = board_where(&model, Option::is_some).await;
        assert!(board.is_empty());
        assert!(model.is_loaded());
        assert!(model.todo().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_join_and_columns() -> Result<()> {
        let suite = TestSuite::init();
        let database = suite.database();
        let todo = suite.create_task("todo", TaskStatus::ToDo).await?;
        let todo_id = todo.id().clone().unwrap();
        suite.create_task("review", TaskStatus::AwaitFeedback).await?;
        let first = database.add_subtask(&todo_id, "first").await?;
        database.add_subtask(&todo_id, "second").await?;
        database.add_subtask(&todo_id, "third").await?;
        database
            .set_subtask_done(first.id().as_ref().unwrap(), true)
            .await?;
        let contact = suite.create_contact("Anton Mayer").await?;
        database.assign_contact(&todo_id, &contact).await?;

        let model = BoardViewModel::spawn(database).await?;
        let board = board_where(&model, |board| {
            board.as_ref().map_or(false, |tasks| {
                tasks.len() == 2 && tasks.iter().any(|task| task.subtasks_total() == &3)
            })
        })
        .await;
        assert_eq!(2, board.len());

        let column = model.todo();
        assert_eq!(1, column.len());
        let joined = &column[0];
        assert_eq!(33, *joined.progress());
        assert_eq!(1, *joined.subtasks_done());
        assert_eq!("AM", joined.assigns()[0].initials());
        assert_eq!("Anton Mayer", joined.assigns()[0].name());
        assert_eq!(1, model.await_feedback().len());
        assert!(model.in_progress().is_empty());
        assert!(model.done().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_assign_fallback() -> Result<()> {
        let suite = TestSuite::init();
        let task = suite.create_task("task", TaskStatus::ToDo).await?;
        let task_id = task.id().clone().unwrap();
        suite
            .database()
            .store()
            .create(
                Collection::Assignments,
                json!({ "taskId": task_id.to_string() }),
            )
            .await?;

        let model = BoardViewModel::spawn(suite.database()).await?;
        let board = board_where(&model, |board| {
            board
                .as_ref()
                .map_or(false, |tasks| tasks.len() == 1 && tasks[0].assigns().len() == 1)
        })
        .await;

        let assign = &board[0].assigns()[0];
        assert_eq!("", assign.name());
        assert_eq!("", assign.initials());
        assert_eq!("", assign.color());

        Ok(())
    }

    #[tokio::test]
    async fn test_drop_round_trips_through_the_store() -> Result<()> {
        let suite = TestSuite::init();
        let task = suite.create_task("task", TaskStatus::ToDo).await?;
        let model = BoardViewModel::spawn(suite.database()).await?;
        board_where(&model, |board| {
            board.as_ref().map_or(false, |tasks| tasks.len() == 1)
        })
        .await;

        model.drop_task(&task, TaskStatus::InProgress).await?;
        board_where(&model, |board| {
            board.iter().flatten().any(|task| task.status() == TaskStatus::InProgress)
        })
        .await;
        assert!(model.todo().is_empty());
        assert_eq!(1, model.in_progress().len());

        // the untouched fields survive the status update
        let stored = suite.database().get_task(task.id().as_ref().unwrap()).await?;
        assert_eq!(task.title(), stored.title());
        assert_eq!(task.priority(), stored.priority());

        Ok(())
    }

    #[tokio::test]
    async fn test_drop_without_id_is_a_no_op() -> Result<()> {
        let suite = TestSuite::init();
        let model = BoardViewModel::spawn(suite.database()).await?;

        model
            .drop_task(
                &Task::new("unsaved", TaskType::UserStory, TaskStatus::ToDo),
                TaskStatus::Done,
            )
            .await?;
        assert!(suite.database().tasks().await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_drop_without_id_never_touches_the_store() -> Result<()> {
        let mut store = MockDocumentStore::new();
        store
            .expect_watch()
            .returning(|_| Ok(futures::stream::pending().boxed()));
        store.expect_merge().never();
        let database = Database::from(Arc::new(store) as Arc<dyn DocumentStore>);
        let model = BoardViewModel::spawn(&database).await?;

        model
            .drop_task(
                &Task::new("unsaved", TaskType::UserStory, TaskStatus::ToDo),
                TaskStatus::Done,
            )
            .await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_removed_tasks_are_disposed() -> Result<()> {
        let suite = TestSuite::init();
        let first = suite.create_task("first", TaskStatus::ToDo).await?;
        suite.create_task("second", TaskStatus::Done).await?;
        let store = suite.store().clone();
        let baseline = store.subscriber_count();

        let model = BoardViewModel::spawn(suite.database()).await?;
        board_where(&model, |board| {
            board.as_ref().map_or(false, |tasks| tasks.len() == 2)
        })
        .await;
        // the task query plus two live queries per task
        eventually(|| store.subscriber_count() == baseline + 5).await;

        suite
            .database()
            .delete_task(first.id().as_ref().unwrap())
            .await?;
        let board = board_where(&model, |board| {
            board.as_ref().map_or(false, |tasks| tasks.len() == 1)
        })
        .await;
        assert_eq!("second", board[0].task().title());
        eventually(|| store.subscriber_count() == baseline + 3).await;

        drop(model);
        eventually(|| store.subscriber_count() == baseline).await;

        Ok(())
    }

    #[tokio::test]
    async fn test_stale_child_events_are_ignored() -> Result<()> {
        let suite = TestSuite::init();
        let task = suite.create_task("task", TaskStatus::ToDo).await?;
        let id = task.id().clone().unwrap();
        let (events, _updates) = mpsc::unbounded_channel();
        let mut board = Board {
            database: suite.database().clone(),
            events,
            tasks: Vec::new(),
            children: HashMap::new(),
            generation: 0,
        };

        board.replace(vec![task.clone()]);
        let disposed = board.children[&id].generation;
        board.replace(Vec::new());
        board.replace(vec![task.clone()]);
        let current = board.children[&id].generation;
        assert_ne!(disposed, current);

        let subtask: Subtask = serde_json::from_value(json!({
            "id": "subtasks:old",
            "taskId": id.to_string(),
            "title": "old"
        }))?;
        board.apply(ChildEvent {
            id: id.clone(),
            generation: disposed,
            update: ChildUpdate::Subtasks(vec![subtask]),
        });
        assert!(board.children[&id].subtasks.is_none());

        let subtask: Subtask = serde_json::from_value(json!({
            "id": "subtasks:new",
            "taskId": id.to_string(),
            "title": "new"
        }))?;
        board.apply(ChildEvent {
            id: id.clone(),
            generation: current,
            update: ChildUpdate::Subtasks(vec![subtask.clone()]),
        });
        board.apply(ChildEvent {
            id: id.clone(),
            generation: current,
            update: ChildUpdate::Assigns(Vec::new()),
        });

        let joined = board.assemble().unwrap();
        assert_eq!(1, joined.len());
        assert_eq!(&vec![subtask], joined[0].subtasks());

        Ok(())
    }

    #[tokio::test]
    async fn test_task_recreated_under_the_same_id() -> Result<()> {
        let suite = TestSuite::init();
        let database = suite.database();
        let task = suite.create_task("task", TaskStatus::ToDo).await?;
        let id = task.id().clone().unwrap();
        database.add_subtask(&id, "old").await?;

        let model = BoardViewModel::spawn(database).await?;
        board_where(&model, |board| {
            board
                .iter()
                .flatten()
                .any(|task| task.subtasks().iter().any(|subtask| subtask.title() == "old"))
        })
        .await;

        database.delete_task(&id).await?;
        database
            .store()
            .set(&id, json!({ "title": "again", "status": "todo" }))
            .await?;
        database.add_subtask(&id, "new").await?;

        let board = board_where(&model, |board| {
            board.as_ref().map_or(false, |tasks| {
                tasks.len() == 1
                    && tasks[0].task().title() == "again"
                    && tasks[0].subtasks().len() == 1
                    && tasks[0].subtasks()[0].title() == "new"
            })
        })
        .await;
        assert_eq!(1, *board[0].subtasks_total());
        assert_eq!(1, database.subtasks(&id).await?.len());

        Ok(())
    }

    #[tokio::test]
    async fn test_contact_changes_reach_the_cards() -> Result<()> {
        let suite = TestSuite::init();
        let database = suite.database();
        let task = suite.create_task("task", TaskStatus::ToDo).await?;
        let contact = suite.create_contact("Anton Mayer").await?;
        database
            .assign_contact(task.id().as_ref().unwrap(), &contact)
            .await?;

        let model = BoardViewModel::spawn(database).await?;
        board_where(&model, |board| {
            board
                .iter()
                .flatten()
                .any(|task| task.assigns().iter().any(|assign| assign.name() == "Anton Mayer"))
        })
        .await;

        let edited: Contact = serde_json::from_value(json!({
            "id": contact.id().as_ref().unwrap().to_string(),
            "name": "Bea Zimmer",
            "email": "bea@join.de",
            "color": "#FF4646"
        }))?;
        database.edit_contact(&edited).await?;
        let board = board_where(&model, |board| {
            board
                .iter()
                .flatten()
                .any(|task| task.assigns().iter().any(|assign| assign.name() == "Bea Zimmer"))
        })
        .await;
        let assign = &board[0].assigns()[0];
        assert_eq!("BZ", assign.initials());
        assert_eq!("#FF4646", assign.color());

        database
            .delete_contact(contact.id().as_ref().unwrap())
            .await?;
        let board = board_where(&model, |board| {
            board
                .as_ref()
                .map_or(false, |tasks| tasks.len() == 1 && tasks[0].assigns().is_empty())
        })
        .await;
        assert_eq!("task", board[0].task().title());

        Ok(())
    }

    #[tokio::test]
    async fn test_columns_in_board_order() -> Result<()> {
        let suite = TestSuite::init();
        suite.create_task("first", TaskStatus::Done).await?;
        suite.create_task("second", TaskStatus::InProgress).await?;
        let model = BoardViewModel::spawn(suite.database()).await?;
        board_where(&model, |board| {
            board.as_ref().map_or(false, |tasks| tasks.len() == 2)
        })
        .await;

        let columns = model.columns();
        let statuses: Vec<TaskStatus> = columns.iter().map(|(status, _)| *status).collect();
        assert_eq!(TaskStatus::ALL.to_vec(), statuses);
        let sizes: Vec<usize> = columns.iter().map(|(_, tasks)| tasks.len()).collect();
        assert_eq!(vec![0, 1, 0, 1], sizes);

        Ok(())
    }

    #[tokio::test]
    async fn test_summary_follows_the_board() -> Result<()> {
        let suite = TestSuite::init();
        suite.create_task("first", TaskStatus::ToDo).await?;
        suite.create_task("second", TaskStatus::Done).await?;
        let model = BoardViewModel::spawn(suite.database()).await?;
        board_where(&model, |board| {
            board.as_ref().map_or(false, |tasks| tasks.len() == 2)
        })
        .await;

        let summary = model.summary();
        assert_eq!(2, *summary.total());
        assert_eq!(1, *summary.todo());
        assert_eq!(1, *summary.done());

        model.shutdown().await;

        Ok(())
    }
}
