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

//! Wire and storage model for a game reality: the map a game is played on
//! plus the state of every player in it.
//!
//! The service treats everything below [`Reality`] as opaque payload. Missing
//! fields decode to their defaults.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub type GameId = String;
pub type PlayerId = String;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MapMetadata {
    pub author: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MapTile {
    pub id: String,
    pub sprite: String,
    pub allow_up: bool,
    pub allow_down: bool,
    pub allow_left: bool,
    pub allow_right: bool,
    pub traversable: bool,
    pub tile_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GameMap {
    /// Rows of tiles, in order.
    pub tiles: Vec<Vec<MapTile>>,
    pub id: String,
    pub metadata: MapMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlayerState {
    #[serde(rename = "hit_points")]
    pub hitpoints: u32,
    pub player_id: PlayerId,
    pub current_tile_id: String,
    pub name: String,
    pub sprite: String,
}

/// Complete snapshot of one game. Identity is `game_id`; a reality is always
/// replaced as a whole, never patched field by field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Reality {
    pub game_id: GameId,
    pub game_map: GameMap,
    pub players: HashMap<PlayerId, PlayerState>,
}
