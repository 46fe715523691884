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

/// The colors handed out to new contacts, in rotation order.
pub const PALETTE: [&str; 15] = [
    "#FF7A00", "#FF5EB3", "#6E52FF", "#9327FF", "#00BEE8", "#1FD7C1", "#FF745E", "#FFA35E",
    "#FC71FF", "#FFC701", "#0038FF", "#C3FF2B", "#FFE62B", "#FF4646", "#FFBB2B",
];

const COUNTER_KEY: &str = "colors";

pub fn color_by_index(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct Counter {
    #[serde(default)]
    next: usize,
}

/// Hands out palette colors round robin. The position is persisted in `meta:colors` so the
/// rotation continues across sessions.
#[derive(Debug, Clone)]
pub struct ColorRotation {
    database: Database,
    next: usize,
}

impl ColorRotation {
    fn counter_id() -> Id {
        Id::new(Collection::Meta, COUNTER_KEY)
    }

    /// Loads the persisted position. A missing counter starts at the first color.
    pub async fn load(database: &Database) -> Result<Self> {
        let counter = match database.fetch::<Counter>(&Self::counter_id()).await {
            Ok(counter) => counter,
            Err(ApplicationError::NotFound(_)) => Counter::default(),
            Err(error) => return Err(error),
        };

        Ok(Self {
            database: database.clone(),
            next: counter.next % PALETTE.len(),
        })
    }

    /// Returns the current color and persists the advanced position.
    #[instrument(skip(self))]
    pub async fn next_color(&mut self) -> Result<&'static str> {
        let color = color_by_index(self.next);
        let next = (self.next + 1) % PALETTE.len();

        store_span!(
            self.database
                .store()
                .set(&Self::counter_id(), serde_json::to_value(Counter { next })?),
            "advance color rotation"
        )?;
        self.next = next;

        Ok(color)
    }

    pub fn peek(&self) -> &'static str {
        color_by_index(self.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::prelude::*;

    #[test]
    fn test_color_by_index_wraps() {
        assert_eq!("#FF7A00", color_by_index(0));
        assert_eq!("#FFBB2B", color_by_index(14));
        assert_eq!("#FF7A00", color_by_index(15));
    }

    #[tokio::test]
    async fn test_rotation_is_persisted() -> Result<()> {
        let suite = TestSuite::init();

        let mut colors = ColorRotation::load(suite.database()).await?;
        assert_eq!("#FF7A00", colors.peek());
        assert_eq!("#FF7A00", colors.next_color().await?);
        assert_eq!("#FF5EB3", colors.next_color().await?);

        let mut reloaded = ColorRotation::load(suite.database()).await?;
        assert_eq!("#6E52FF", reloaded.next_color().await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_rotation_wraps_around() -> Result<()> {
        let suite = TestSuite::init();
        suite
            .database()
            .store()
            .set(&ColorRotation::counter_id(), json!({ "next": 14 }))
            .await?;

        let mut colors = ColorRotation::load(suite.database()).await?;
        assert_eq!("#FFBB2B", colors.next_color().await?);
        assert_eq!("#FF7A00", colors.next_color().await?);

        Ok(())
    }
}
