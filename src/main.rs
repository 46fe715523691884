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

#[macro_use]
extern crate tracing;

use chrono::{Days, Local};
use join::board::BoardSummary;
use join::config::Config;
use join::prelude::*;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let state = ApplicationState::from(join::database::connect(&config).await?);

    let guest = state.auth().login_guest().await?;
    info!("Entered as guest {}", guest.uid());
    state.open(Route::Board);

    let board = state.board().await?;
    if state.database().tasks().await?.is_empty() {
        let mut form = state.task_form(TaskStatus::ToDo);
        form.set_title("Explore the board".to_owned())
            .set_due_date(Local::now().date_naive().checked_add_days(Days::new(7)));
        form.add_subtask("Drag a task into another column");
        form.submit().await?;
    }

    let (sender, receiver) = kanal::unbounded_async::<()>();
    let mut updates = board.subscribe();

    let watcher = tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }

                    let summary = updates.borrow().as_deref().map(BoardSummary::from);
                    if let Some(summary) = summary {
                        info!(
                            todo = summary.todo(),
                            in_progress = summary.in_progress(),
                            await_feedback = summary.await_feedback(),
                            done = summary.done(),
                            urgent = summary.urgent(),
                            "Board changed"
                        );
                    }
                },
                _ = receiver.recv() => {
                    warn!("Received shutdown signal on kanal receiver");
                    break;
                }
            }
        }
    });

    match tokio::signal::ctrl_c().await {
        Ok(()) => {}
        Err(error) => {
            error!("Unable to listen for shutdown signal: {}", error);
        }
    }

    info!("Received shutdown signal... Shutting down...");
    // shutdown
    sender.send(()).await?;
    watcher.await?;
    board.shutdown().await;
    state.auth().logout().await;

    Ok(())
}
