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

use crate::database::Collection;
use crate::error::ApplicationError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub(crate) const ALPHABET: [char; 62] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B',
    'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V', 'W', 'X', 'Y', 'Z',
];

const KEY_LENGTH: usize = 20;

/// The address of a persisted document, rendered as `collection:key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id {
    pub collection: Collection,
    pub key: String,
}

impl TryFrom<(Collection, &str)> for Id {
    type Error = ApplicationError;

    /// Parses `collection:key` (or a bare key) and makes sure it points into the expected collection.
    fn try_from((force, id): (Collection, &str)) -> Result<Self, Self::Error> {
        let parsed = match id.split_once(':') {
            Some(_) => id.parse::<Id>()?,
            None => Id::new(force, id),
        };

        // a key from one collection must never address another one
        if parsed.collection != force {
            return Err(ApplicationError::Unauthorized);
        }

        Ok(parsed)
    }
}

impl FromStr for Id {
    type Err = ApplicationError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        let (collection, key) = id
            .split_once(':')
            .ok_or(ApplicationError::BadRequest("invalid id".to_owned()))?;
        let collection = collection
            .parse::<Collection>()
            .map_err(|_| ApplicationError::BadRequest(format!("unknown collection {collection}")))?;
        // surrealdb wraps complex keys into ⟨⟩
        let key = key.replace(['⟨', '⟩'], "");
        if key.is_empty() {
            return Err(ApplicationError::BadRequest("invalid id".to_owned()));
        }

        Ok(Self { collection, key })
    }
}

impl Id {
    pub fn new(collection: Collection, key: &str) -> Self {
        Self {
            collection,
            key: key.to_string(),
        }
    }

    /// Refuses ids pointing into another collection than the expected one.
    pub fn require(&self, collection: Collection) -> Result<&Self, ApplicationError> {
        if self.collection == collection {
            Ok(self)
        } else {
            Err(ApplicationError::Unauthorized)
        }
    }

    /// Generates a fresh random key inside the given collection.
    pub fn generate(collection: Collection) -> Self {
        Self {
            collection,
            key: nanoid::nanoid!(KEY_LENGTH, &ALPHABET),
        }
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.collection, self.key)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<Id>().map_err(serde::de::Error::custom)
    }
}

impl Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}
