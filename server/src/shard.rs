//! One thread's exclusively-owned partition of the player population.

use crate::world::WorldMap;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Direction, QUEST_DRIFT_SPEED};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;

/// A command the shard refused. These are tier-one failures: the command
/// is dropped, the shard is untouched, the tick carries on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShardError {
    #[error("player {0} already joined")]
    DuplicatePlayer(u32),
    #[error("player {0} is not in this shard")]
    UnknownPlayer(u32),
    #[error("unknown direction code {0}")]
    BadDirection(u8),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: u32,
    pub addr: SocketAddr,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
}

/// A partition of the world, mutated only by the worker thread that owns
/// it. Anything crossing shard boundaries has to arrive as a command
/// through the shard's queue; there is no other way in.
pub struct WorldShard {
    shard_id: usize,
    map: Arc<WorldMap>,
    players: HashMap<u32, Player>,
    quest_between_ms: u64,
    quest_elapsed_ms: f32,
    active_quest: (f32, f32),
    rng: StdRng,
}

impl WorldShard {
    pub fn new(shard_id: usize, map: Arc<WorldMap>, quest_between_ms: u64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(shard_id as u64));
        let active_quest = map.quest_spot(rng.gen_range(0..map.quest_spot_count()));
        Self {
            shard_id,
            map,
            players: HashMap::new(),
            quest_between_ms,
            quest_elapsed_ms: 0.0,
            active_quest,
            rng,
        }
    }

    pub fn shard_id(&self) -> usize {
        self.shard_id
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn player_ids(&self) -> Vec<u32> {
        self.players.keys().copied().collect()
    }

    pub fn player(&self, id: u32) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn active_quest(&self) -> (f32, f32) {
        self.active_quest
    }

    pub fn apply_join(&mut self, id: u32, addr: SocketAddr) -> Result<(), ShardError> {
        if self.players.contains_key(&id) {
            return Err(ShardError::DuplicatePlayer(id));
        }
        let (x, y) = self.map.spawn_point(id);
        self.players.insert(
            id,
            Player {
                id,
                addr,
                x,
                y,
                vel_x: 0.0,
                vel_y: 0.0,
            },
        );
        debug!(
            "shard {}: player {} joined at ({:.0}, {:.0})",
            self.shard_id, id, x, y
        );
        Ok(())
    }

    pub fn apply_leave(&mut self, id: u32) -> Result<Player, ShardError> {
        let player = self
            .players
            .remove(&id)
            .ok_or(ShardError::UnknownPlayer(id))?;
        debug!("shard {}: player {} left", self.shard_id, id);
        Ok(player)
    }

    pub fn apply_move(&mut self, id: u32, code: u8) -> Result<(), ShardError> {
        let direction = Direction::try_from(code).map_err(ShardError::BadDirection)?;
        let player = self
            .players
            .get_mut(&id)
            .ok_or(ShardError::UnknownPlayer(id))?;
        let (vel_x, vel_y) = direction.velocity();
        player.vel_x = vel_x;
        player.vel_y = vel_y;
        Ok(())
    }

    /// One simulation step over every owned player: integrate commanded
    /// movement, drift idle players toward the active quest spot, stop
    /// anyone walking into blocked terrain, and rotate the quest when its
    /// interval has elapsed.
    pub fn advance(&mut self, dt: f32) {
        let map = &*self.map;
        let (quest_x, quest_y) = self.active_quest;

        for player in self.players.values_mut() {
            let (step_x, step_y) = if player.vel_x == 0.0 && player.vel_y == 0.0 {
                let dx = quest_x - player.x;
                let dy = quest_y - player.y;
                let distance = (dx * dx + dy * dy).sqrt();
                if distance <= 1.0 {
                    continue;
                }
                let step = (QUEST_DRIFT_SPEED * dt).min(distance);
                (dx / distance * step, dy / distance * step)
            } else {
                (player.vel_x * dt, player.vel_y * dt)
            };

            let (next_x, next_y) = map.clamp(player.x + step_x, player.y + step_y);
            if map.is_blocked(next_x, next_y) {
                player.vel_x = 0.0;
                player.vel_y = 0.0;
            } else {
                player.x = next_x;
                player.y = next_y;
            }
        }

        if self.quest_between_ms > 0 {
            self.quest_elapsed_ms += dt * 1000.0;
            if self.quest_elapsed_ms >= self.quest_between_ms as f32 {
                self.quest_elapsed_ms = 0.0;
                self.active_quest = self
                    .map
                    .quest_spot(self.rng.gen_range(0..self.map.quest_spot_count()));
                debug!(
                    "shard {}: quest moved to ({:.0}, {:.0})",
                    self.shard_id, self.active_quest.0, self.active_quest.1
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use shared::PLAYER_SPEED;

    fn open_map() -> Arc<WorldMap> {
        let mut config: ServerConfig = serde_json::from_str(r#"{"num_threads": 1}"#).unwrap();
        config.blocked_ratio = 0.0;
        Arc::new(WorldMap::generate(
            &config,
            &mut StdRng::seed_from_u64(11),
        ))
    }

    fn test_shard() -> WorldShard {
        WorldShard::new(0, open_map(), 0, 11)
    }

    fn test_addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    #[test]
    fn test_join_and_leave() {
        let mut shard = test_shard();

        shard.apply_join(1, test_addr()).unwrap();
        assert_eq!(shard.player_count(), 1);

        let player = shard.apply_leave(1).unwrap();
        assert_eq!(player.id, 1);
        assert_eq!(shard.player_count(), 0);
    }

    #[test]
    fn test_duplicate_join_rejected() {
        let mut shard = test_shard();
        shard.apply_join(1, test_addr()).unwrap();

        let result = shard.apply_join(1, test_addr());
        assert_eq!(result, Err(ShardError::DuplicatePlayer(1)));
        assert_eq!(shard.player_count(), 1);
    }

    #[test]
    fn test_leave_of_absent_player_is_harmless() {
        let mut shard = test_shard();
        shard.apply_join(1, test_addr()).unwrap();
        let before = shard.player(1).unwrap().clone();

        let result = shard.apply_leave(99);
        assert_eq!(result, Err(ShardError::UnknownPlayer(99)));
        assert_eq!(shard.player_count(), 1);

        let after = shard.player(1).unwrap();
        assert_eq!(after.x, before.x);
        assert_eq!(after.y, before.y);
    }

    #[test]
    fn test_move_sets_velocity() {
        let mut shard = test_shard();
        shard.apply_join(1, test_addr()).unwrap();

        shard.apply_move(1, Direction::Right.code()).unwrap();
        let player = shard.player(1).unwrap();
        assert_eq!(player.vel_x, PLAYER_SPEED);
        assert_eq!(player.vel_y, 0.0);
    }

    #[test]
    fn test_bad_direction_rejected_without_mutation() {
        let mut shard = test_shard();
        shard.apply_join(1, test_addr()).unwrap();
        shard.apply_move(1, Direction::Up.code()).unwrap();
        let before = shard.player(1).unwrap().clone();

        let result = shard.apply_move(1, 42);
        assert_eq!(result, Err(ShardError::BadDirection(42)));

        let after = shard.player(1).unwrap();
        assert_eq!(after.vel_x, before.vel_x);
        assert_eq!(after.vel_y, before.vel_y);
    }

    #[test]
    fn test_move_for_unknown_player_rejected() {
        let mut shard = test_shard();
        let result = shard.apply_move(5, Direction::Left.code());
        assert_eq!(result, Err(ShardError::UnknownPlayer(5)));
    }

    #[test]
    fn test_advance_integrates_movement() {
        let mut shard = test_shard();
        shard.apply_join(1, test_addr()).unwrap();
        shard.apply_move(1, Direction::Right.code()).unwrap();
        let start_x = shard.player(1).unwrap().x;

        shard.advance(0.5);

        let player = shard.player(1).unwrap();
        assert!((player.x - (start_x + PLAYER_SPEED * 0.5)).abs() < 1.0);
    }

    #[test]
    fn test_advance_stops_at_the_map_edge() {
        let mut shard = test_shard();
        shard.apply_join(1, test_addr()).unwrap();
        shard.apply_move(1, Direction::Up.code()).unwrap();

        // Long enough to cross the whole map several times over.
        for _ in 0..100 {
            shard.advance(1.0);
        }

        let player = shard.player(1).unwrap();
        assert!(player.y >= 0.0);
        assert!(player.y < 600.0);
    }

    #[test]
    fn test_idle_players_drift_toward_the_quest() {
        let mut shard = test_shard();
        shard.apply_join(1, test_addr()).unwrap();
        let (quest_x, quest_y) = shard.active_quest();
        let before = shard.player(1).unwrap().clone();
        let before_distance =
            ((quest_x - before.x).powi(2) + (quest_y - before.y).powi(2)).sqrt();

        shard.advance(0.1);

        let after = shard.player(1).unwrap();
        let after_distance = ((quest_x - after.x).powi(2) + (quest_y - after.y).powi(2)).sqrt();
        assert!(after_distance <= before_distance);
    }

    #[test]
    fn test_quest_rotation_honors_the_interval() {
        let map = open_map();
        let mut shard = WorldShard::new(0, map, 1000, 3);

        // 0.4s elapsed: the timer accumulates, no rotation yet.
        shard.advance(0.4);
        assert!(shard.quest_elapsed_ms >= 399.0);

        // Crossing one full second forces a re-roll (possibly onto the
        // same spot, so the timer reset is what gets asserted).
        shard.advance(0.7);
        assert_eq!(shard.quest_elapsed_ms, 0.0);
        shard.advance(0.1);
        assert!(shard.quest_elapsed_ms < 1000.0);
    }

    #[test]
    fn test_sequential_reapplication_in_order() {
        let mut shard = test_shard();
        shard.apply_join(7, test_addr()).unwrap();

        // move, leave, join in enqueue order: the player ends up joined
        // exactly once, at a fresh spawn.
        assert!(shard.apply_move(7, Direction::Left.code()).is_ok());
        assert!(shard.apply_leave(7).is_ok());
        assert!(shard.apply_join(7, test_addr()).is_ok());

        assert_eq!(shard.player_count(), 1);
        let player = shard.player(7).unwrap();
        assert_eq!(player.vel_x, 0.0);
        assert_eq!(player.vel_y, 0.0);
    }
}
