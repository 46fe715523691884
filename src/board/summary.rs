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

use crate::board::BoardTask;
use crate::prelude::*;
use chrono::NaiveDate;

/// Figures of the summary page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Getters)]
#[serde(rename_all = "camelCase")]
#[get = "pub"]
pub struct BoardSummary {
    todo: usize,
    in_progress: usize,
    await_feedback: usize,
    done: usize,
    total: usize,
    urgent: usize,
    /// earliest due date of the urgent tasks that are not done yet
    upcoming_deadline: Option<NaiveDate>,
}

impl From<&[BoardTask]> for BoardSummary {
    fn from(tasks: &[BoardTask]) -> Self {
        let mut summary = Self {
            total: tasks.len(),
            ..Self::default()
        };

        for task in tasks {
            match task.status() {
                TaskStatus::ToDo => summary.todo += 1,
                TaskStatus::InProgress => summary.in_progress += 1,
                TaskStatus::AwaitFeedback => summary.await_feedback += 1,
                TaskStatus::Done => summary.done += 1,
            }

            if *task.task().priority() != TaskPriority::Urgent {
                continue;
            }
            summary.urgent += 1;

            if task.status() != TaskStatus::Done {
                if let Some(due) = task.task().due_date() {
                    summary.upcoming_deadline = Some(
                        summary
                            .upcoming_deadline
                            .map_or(*due, |current| current.min(*due)),
                    );
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_task(status: &str, priority: &str, due: Option<&str>) -> BoardTask {
        let task: Task = serde_json::from_value(json!({
            "id": Id::generate(Collection::Tasks).to_string(),
            "title": "task",
            "status": status,
            "priority": priority,
            "dueDate": due
        }))
        .unwrap();

        BoardTask::new(task, Vec::new(), Vec::new())
    }

    #[test]
    fn test_empty() {
        assert_eq!(BoardSummary::default(), BoardSummary::from(&[][..]));
    }

    #[test]
    fn test_counts_and_deadline() {
        let tasks = vec![
            board_task("todo", "urgent", Some("2026-12-01")),
            board_task("inProgress", "urgent", Some("2026-11-20")),
            board_task("done", "urgent", Some("2026-10-01")),
            board_task("awaitFeedback", "low", Some("2026-09-01")),
            board_task("todo", "medium", None),
        ];

        let summary = BoardSummary::from(tasks.as_slice());
        assert_eq!(5, *summary.total());
        assert_eq!(2, *summary.todo());
        assert_eq!(1, *summary.in_progress());
        assert_eq!(1, *summary.await_feedback());
        assert_eq!(1, *summary.done());
        assert_eq!(3, *summary.urgent());
        // finished and non urgent tasks do not count towards the deadline
        assert_eq!(
            NaiveDate::from_ymd_opt(2026, 11, 20),
            *summary.upcoming_deadline()
        );
    }
}
