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

use std::collections::HashMap;

use async_trait::async_trait;
use reality_common::{GameId, Reality};
use tokio::sync::Mutex;
use tracing::debug;

/// Storage for game realities, keyed by game id.
///
/// `upsert` replaces whatever was stored for the game in full. `get` returns
/// `Ok(None)` when nothing has been stored for the game yet.
#[async_trait]
pub trait RealityRepository: Send + Sync {
    async fn upsert(&self, game_id: &str, reality: Reality) -> anyhow::Result<()>;
    async fn get(&self, game_id: &str) -> anyhow::Result<Option<Reality>>;
}

/// Non-durable repository used when no document store is configured.
#[derive(Default)]
pub struct InMemoryRealityRepository {
    realities: Mutex<HashMap<GameId, Reality>>,
}

impl InMemoryRealityRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RealityRepository for InMemoryRealityRepository {
    async fn upsert(&self, game_id: &str, reality: Reality) -> anyhow::Result<()> {
        let mut realities = self.realities.lock().await;
        realities.insert(game_id.to_string(), reality);
        debug!(game_id = %game_id, stored = realities.len(), "stored reality in memory");
        Ok(())
    }

    async fn get(&self, game_id: &str) -> anyhow::Result<Option<Reality>> {
        let realities = self.realities.lock().await;
        Ok(realities.get(game_id).cloned())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::HashMap;

    use reality_common::{GameMap, MapMetadata, MapTile, PlayerState, Reality};

    pub fn grass_tile() -> MapTile {
        MapTile {
            id: "tile1".to_string(),
            sprite: String::new(),
            allow_up: true,
            allow_down: true,
            allow_left: true,
            allow_right: true,
            traversable: true,
            tile_name: "grass-dirt-12".to_string(),
        }
    }

    pub fn bob(hitpoints: u32) -> PlayerState {
        PlayerState {
            hitpoints,
            player_id: "bob".to_string(),
            current_tile_id: "tile1".to_string(),
            name: "Bob".to_string(),
            sprite: "elf-1".to_string(),
        }
    }

    pub fn fake_reality(game_id: &str) -> Reality {
        Reality {
            game_id: game_id.to_string(),
            game_map: GameMap {
                tiles: vec![vec![grass_tile()]],
                id: "testmap1".to_string(),
                metadata: MapMetadata {
                    author: "Test Map Maker".to_string(),
                    description: "Test Map".to_string(),
                },
            },
            players: HashMap::from([("bob".to_string(), bob(99))]),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::fixtures::{bob, fake_reality, grass_tile};
    use super::*;

    #[tokio::test]
    async fn get_unknown_game_returns_none() {
        let repo = InMemoryRealityRepository::new();
        assert!(repo.get("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_then_get_returns_written_reality() {
        let repo = InMemoryRealityRepository::new();
        let reality = fake_reality("game90");

        repo.upsert("game90", reality.clone()).await.unwrap();

        assert_eq!(repo.get("game90").await.unwrap(), Some(reality));
    }

    #[tokio::test]
    async fn repeated_upsert_keeps_last_write_and_untouched_fields() {
        let repo = InMemoryRealityRepository::new();
        let mut reality = fake_reality("splendid");
        repo.upsert("splendid", reality.clone()).await.unwrap();

        reality.players.insert("bob".to_string(), bob(1));
        reality.game_map.metadata.author = "Changey McChangePants".to_string();
        repo.upsert("splendid", reality).await.unwrap();

        let stored = repo.get("splendid").await.unwrap().unwrap();
        assert_eq!(stored.players["bob"].hitpoints, 1);
        assert_eq!(stored.game_map.metadata.author, "Changey McChangePants");
        assert_eq!(stored.game_map.tiles, vec![vec![grass_tile()]]);
        assert_eq!(repo.realities.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn upsert_replaces_rather_than_merges_players() {
        let repo = InMemoryRealityRepository::new();
        let mut reality = fake_reality("game1");
        repo.upsert("game1", reality.clone()).await.unwrap();

        reality.players.clear();
        repo.upsert("game1", reality).await.unwrap();

        let stored = repo.get("game1").await.unwrap().unwrap();
        assert!(stored.players.is_empty());
    }

    #[tokio::test]
    async fn upsert_keeps_payload_game_id_as_written() {
        let repo = InMemoryRealityRepository::new();
        let written = fake_reality("other");

        repo.upsert("game7", written.clone()).await.unwrap();

        assert_eq!(repo.get("game7").await.unwrap(), Some(written));
        assert!(repo.get("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_upserts_to_distinct_games_are_all_kept() {
        let repo = Arc::new(InMemoryRealityRepository::new());
        let mut handles = Vec::new();
        for index in 0..16 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                let game_id = format!("game{index}");
                repo.upsert(&game_id, fake_reality(&game_id)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for index in 0..16 {
            let game_id = format!("game{index}");
            assert!(repo.get(&game_id).await.unwrap().is_some(), "{game_id}");
        }
    }
}
