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

use crate::auth::User;
use std::sync::Arc;
use strum::{AsRefStr, EnumString};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr)]
pub enum Route {
    #[default]
    #[strum(serialize = "/Login")]
    Login,
    #[strum(serialize = "/summary")]
    Summary,
    #[strum(serialize = "/add-task")]
    AddTask,
    #[strum(serialize = "/board")]
    Board,
    #[strum(serialize = "/contacts")]
    Contacts,
    #[strum(serialize = "/help")]
    Help,
    #[strum(serialize = "/legal-notice")]
    LegalNotice,
    #[strum(serialize = "/privacy-policy")]
    PrivacyPolicy,
}

impl Route {
    pub fn requires_user(&self) -> bool {
        !matches!(self, Route::Login | Route::LegalNotice | Route::PrivacyPolicy)
    }
}

/// Client-side navigation. The current route is observable through [`Navigator::subscribe`].
#[derive(Debug, Clone)]
pub struct Navigator {
    current: Arc<watch::Sender<Route>>,
}

impl Default for Navigator {
    fn default() -> Self {
        let (current, _) = watch::channel(Route::default());

        Self {
            current: Arc::new(current),
        }
    }
}

impl Navigator {
    pub fn navigate(&self, route: Route) {
        debug!("Navigating to {}", route.as_ref());
        self.current.send_replace(route);
    }

    /// Navigates to the route unless it needs a signed in user and there is none.
    pub fn guarded(&self, route: Route, user: Option<&User>) -> Route {
        let target = Self::guard(route, user);
        self.navigate(target);

        target
    }

    pub fn guard(route: Route, user: Option<&User>) -> Route {
        if route.requires_user() && user.is_none() {
            Route::Login
        } else {
            route
        }
    }

    pub fn current(&self) -> Route {
        *self.current.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Route> {
        self.current.subscribe()
    }
}
