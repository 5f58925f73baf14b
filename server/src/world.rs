//! World content generation: terrain grid, spawn placement, quest spots.

use crate::config::ServerConfig;
use log::info;
use rand::rngs::StdRng;
use rand::Rng;

pub const CELL_SIZE: f32 = 32.0;

/// Immutable world content shared read-only by every shard.
///
/// The grid marks impassable cells; coordinates outside the map count as
/// blocked so movement code never has to special-case the edges.
pub struct WorldMap {
    width: f32,
    height: f32,
    cols: usize,
    rows: usize,
    blocked: Vec<bool>,
    quest_spots: Vec<(f32, f32)>,
}

impl WorldMap {
    pub fn generate(config: &ServerConfig, rng: &mut StdRng) -> Self {
        let cols = (config.map_width / CELL_SIZE).ceil().max(1.0) as usize;
        let rows = (config.map_height / CELL_SIZE).ceil().max(1.0) as usize;

        let blocked: Vec<bool> = (0..cols * rows)
            .map(|_| rng.gen::<f32>() < config.blocked_ratio)
            .collect();

        let mut map = Self {
            width: config.map_width,
            height: config.map_height,
            cols,
            rows,
            blocked,
            quest_spots: Vec::new(),
        };
        map.place_quest_spots(rng);

        info!(
            "Generated {}x{} world map: {} blocked cells, {} quest spots",
            cols,
            rows,
            map.blocked.iter().filter(|&&cell| cell).count(),
            map.quest_spots.len()
        );
        map
    }

    fn place_quest_spots(&mut self, rng: &mut StdRng) {
        const QUEST_SPOTS: usize = 8;
        const ATTEMPTS: usize = 64;

        for _ in 0..QUEST_SPOTS {
            for _ in 0..ATTEMPTS {
                let x = rng.gen::<f32>() * self.width;
                let y = rng.gen::<f32>() * self.height;
                if !self.is_blocked(x, y) {
                    self.quest_spots.push((x, y));
                    break;
                }
            }
        }
        if self.quest_spots.is_empty() {
            // Heavily blocked maps still get one spot to rotate onto.
            self.quest_spots.push((self.width / 2.0, self.height / 2.0));
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn is_blocked(&self, x: f32, y: f32) -> bool {
        if x < 0.0 || y < 0.0 || x >= self.width || y >= self.height {
            return true;
        }
        let col = (x / CELL_SIZE) as usize;
        let row = (y / CELL_SIZE) as usize;
        self.blocked[(row.min(self.rows - 1)) * self.cols + col.min(self.cols - 1)]
    }

    pub fn clamp(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x.clamp(0.0, self.width - 1.0),
            y.clamp(0.0, self.height - 1.0),
        )
    }

    /// Deterministic spawn position for a joining player, spread so joins
    /// don't pile onto one cell. Falls back to scanning for open terrain
    /// when the preferred spot is blocked.
    pub fn spawn_point(&self, player_id: u32) -> (f32, f32) {
        let span_x = (self.width - 2.0 * CELL_SIZE).max(1.0);
        let span_y = (self.height - 2.0 * CELL_SIZE).max(1.0);
        let x = CELL_SIZE + (player_id as f32 * 60.0) % span_x;
        let y = CELL_SIZE + (player_id as f32 * 37.0) % span_y;
        if !self.is_blocked(x, y) {
            return (x, y);
        }

        for cell in 0..self.cols * self.rows {
            let col = cell % self.cols;
            let row = cell / self.cols;
            let cx = (col as f32 + 0.5) * CELL_SIZE;
            let cy = (row as f32 + 0.5) * CELL_SIZE;
            if !self.is_blocked(cx, cy) {
                return self.clamp(cx, cy);
            }
        }
        (x, y)
    }

    pub fn quest_spot(&self, index: usize) -> (f32, f32) {
        self.quest_spots[index % self.quest_spots.len()]
    }

    pub fn quest_spot_count(&self) -> usize {
        self.quest_spots.len()
    }
}
