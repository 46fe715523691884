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

#[derive(Deserialize, Debug, Clone, Getters)]
#[get = "pub"]
pub struct Config {
    /// selects the surrealdb backend when set and the `surreal` feature is enabled
    #[serde(default)]
    surrealdb_endpoint: Option<String>,
    #[serde(default = "default_credential")]
    surrealdb_username: String,
    #[serde(default = "default_credential")]
    surrealdb_password: String,
    #[serde(default = "default_namespace")]
    surrealdb_namespace: String,
    #[serde(default = "default_database")]
    surrealdb_database: String,
}

impl Config {
    /// Reads the configuration from the environment, including a `.env` file if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(envy::from_env::<Config>()?)
    }
}

fn default_credential() -> String {
    "root".to_owned()
}

fn default_namespace() -> String {
    "production".to_owned()
}

fn default_database() -> String {
    "join".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_environment() {
        let config = envy::from_iter::<_, Config>(Vec::<(String, String)>::new()).unwrap();

        assert!(config.surrealdb_endpoint().is_none());
        assert_eq!("root", config.surrealdb_username());
        assert_eq!("production", config.surrealdb_namespace());
        assert_eq!("join", config.surrealdb_database());
    }

    #[test]
    fn test_endpoint_from_environment() {
        let config = envy::from_iter::<_, Config>(vec![
            ("SURREALDB_ENDPOINT".to_owned(), "localhost:8000".to_owned()),
            ("SURREALDB_DATABASE".to_owned(), "board".to_owned()),
        ])
        .unwrap();

        assert_eq!(Some("localhost:8000"), config.surrealdb_endpoint().as_deref());
        assert_eq!("board", config.surrealdb_database());
    }
}
