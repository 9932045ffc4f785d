// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reality_common::{GameId, Reality};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::repository::RealityRepository;

/// Storage-side shape of a reality: the document exactly as written, filed
/// under the game it was written for.
///
/// `record_id` is the store's own identifier. It is `None` until the store
/// has assigned one and never leaves this layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RealityRecord {
    pub record_id: Option<String>,
    pub game_key: GameId,
    pub reality: Reality,
    pub updated_at: DateTime<Utc>,
}

impl RealityRecord {
    fn new(game_key: &str, reality: Reality) -> Self {
        Self {
            record_id: None,
            game_key: game_key.to_string(),
            reality,
            updated_at: Utc::now(),
        }
    }
}

/// External document store holding one [`RealityRecord`] per game key.
#[async_trait]
pub trait RealityDocumentStore: Send + Sync {
    /// Records filed under `game_key`, read consistently, in store order.
    async fn find_by_game_key(&self, game_key: &str) -> anyhow::Result<Vec<RealityRecord>>;

    /// Writes `record` under `record.game_key` in a single atomic step. The
    /// record id already stored for that key is kept; `new_record_id` is
    /// used only when nothing is stored yet. Returns how many records the
    /// store reports as written.
    async fn upsert_record(
        &self,
        record: &RealityRecord,
        new_record_id: &str,
    ) -> anyhow::Result<u64>;
}

/// Repository over a [`RealityDocumentStore`]. Record id reuse is left to
/// the store's atomic upsert, so concurrent writers to one game cannot split
/// it into two records.
pub struct DocumentRealityRepository<S> {
    store: S,
}

impl<S: RealityDocumentStore> DocumentRealityRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: RealityDocumentStore> RealityRepository for DocumentRealityRepository<S> {
    async fn upsert(&self, game_id: &str, reality: Reality) -> anyhow::Result<()> {
        let record = RealityRecord::new(game_id, reality);
        let new_record_id = Uuid::new_v4().to_string();

        let written = self
            .store
            .upsert_record(&record, &new_record_id)
            .await
            .with_context(|| format!("failed to upsert reality record for game {game_id}"))?;

        if written == 0 {
            anyhow::bail!("upsert of reality record for game {game_id} wrote no records");
        }
        info!(game_id = %game_id, "updated reality record");
        Ok(())
    }

    async fn get(&self, game_id: &str) -> anyhow::Result<Option<Reality>> {
        debug!(game_id = %game_id, "looking up reality record");
        let mut records = self
            .store
            .find_by_game_key(game_id)
            .await
            .with_context(|| format!("failed to look up reality record for game {game_id}"))?;

        if records.len() > 1 {
            warn!(
                game_id = %game_id,
                count = records.len(),
                "multiple reality records stored for one game; using the first"
            );
        }

        if records.is_empty() {
            return Ok(None);
        }
        Ok(Some(records.swap_remove(0).reality))
    }
}
