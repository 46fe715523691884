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

use crate::auth::AuthService;
use crate::board::BoardViewModel;
use crate::contacts::dialog::ContactEditor;
use crate::contacts::ContactsViewModel;
use crate::database::Backend;
use crate::prelude::*;
use crate::ui::TaskForm;

/// Everything the application shares, built once from a connected backend.
#[derive(Clone, Getters)]
#[get = "pub"]
pub struct ApplicationState {
    database: Database,
    auth: AuthService,
    navigator: Navigator,
}

impl From<Backend> for ApplicationState {
    fn from(backend: Backend) -> Self {
        let database = Database::from(backend.store);
        let navigator = Navigator::default();
        let auth = AuthService::new(backend.identity, database.clone(), navigator.clone());

        Self {
            database,
            auth,
            navigator,
        }
    }
}

impl ApplicationState {
    pub async fn board(&self) -> Result<BoardViewModel> {
        BoardViewModel::spawn(&self.database).await
    }

    pub async fn contacts(&self) -> Result<ContactsViewModel> {
        ContactsViewModel::spawn(&self.database).await
    }

    pub fn task_form(&self, status: TaskStatus) -> TaskForm {
        TaskForm::with_status(&self.database, status)
    }

    pub fn contact_editor(&self) -> ContactEditor {
        ContactEditor::new(&self.database)
    }

    /// Navigates to the route, or to the login when it needs a user and nobody is signed in.
    pub fn open(&self, route: Route) -> Route {
        self.navigator
            .guarded(route, self.auth.current_user().as_ref())
    }
}
