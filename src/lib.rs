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
extern crate serde;
#[macro_use]
extern crate thiserror;
#[macro_use]
extern crate getset;
#[macro_use]
extern crate tracing;
#[macro_use]
extern crate serde_json;

pub mod auth;
pub mod board;
pub mod config;
pub mod contacts;
pub mod database;
pub mod error;
pub mod routing;
pub mod state;
pub mod ui;


pub mod prelude {
    pub use crate::database::definitions::contact::{Contact, WriteContact};
    pub use crate::database::definitions::task::assign::{TaskAssign, TaskAssignDb};
    pub use crate::database::definitions::task::subtask::Subtask;
    pub use crate::database::definitions::task::{
        Task, TaskPriority, TaskStatus, TaskType, WriteTask,
    };
    pub use crate::database::id::Id;
    pub use crate::database::{Collection, Database, Document, DocumentStore, LiveQuery, Query};
    pub use crate::error::*;
    pub use crate::routing::{Navigator, Route};
    pub use crate::state::ApplicationState;
    pub use crate::store_span;
}
