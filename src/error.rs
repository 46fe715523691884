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

use crate::database::id::Id;

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0} does not exist")]
    NotFound(Id),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("An account for {0} already exists")]
    AccountExists(String),
    #[error("No user is signed in")]
    NotSignedIn,
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    ConfigurationError(#[from] envy::Error),
    #[cfg(feature = "surreal")]
    #[error(transparent)]
    SurrealdbError(#[from] surrealdb::Error),
    #[error("Internal error occurred")]
    InternalServerError,
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

impl From<argon2::password_hash::Error> for ApplicationError {
    fn from(error: argon2::password_hash::Error) -> Self {
        match error {
            argon2::password_hash::Error::Password => Self::InvalidCredentials,
            other => Self::PasswordHash(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApplicationError>;
