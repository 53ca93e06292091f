use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{BuildingType, Grid, ResourceType, Tile};

pub(super) const DEFAULT_REVEAL_RADIUS: f64 = 3.0;

const ISLAND_THRESHOLD: f64 = 0.72;
const STONE_CHANCE: f64 = 0.10;
const FOREST_CHANCE: f64 = 0.15;
const SATELLITE_MIN_SIZE: usize = 12;
/// Satellite island centres as fractions of the grid size.
const SATELLITES: [(f64, f64); 2] = [(0.15, 0.2), (0.85, 0.8)];

pub(super) fn generate(size: usize, seed: u64, reveal_radius: f64) -> Grid {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let centre = (size.saturating_sub(1)) as f64 / 2.0;
    let centre_index = size.saturating_sub(1) / 2;
    let mut tiles = Vec::with_capacity(size * size);
    for y in 0..size {
        for x in 0..size {
            let (fx, fy) = (x as f64, y as f64);
            let is_centre = x == centre_index && y == centre_index;
            let land = is_centre || is_land(fx, fy, size, centre);
            // Draw both values for every tile so the stream stays aligned
            // regardless of the mask.
            let roll: f64 = rng.gen();
            let variant: f64 = rng.gen();
            let resource = if !land {
                ResourceType::Water
            } else if is_centre {
                ResourceType::None
            } else if roll < STONE_CHANCE {
                ResourceType::Stone
            } else if roll < STONE_CHANCE + FOREST_CHANCE {
                ResourceType::Forest
            } else {
                ResourceType::None
            };
            let distance = ((fx - centre).powi(2) + (fy - centre).powi(2)).sqrt();
            tiles.push(Arc::new(Tile {
                x: x as i32,
                y: y as i32,
                building: BuildingType::None,
                resource,
                land_value: 1.0,
                level: 1,
                variant,
                explored: distance <= reveal_radius,
            }));
        }
    }
    let mut grid = Grid {
        size,
        version: 0,
        tiles,
    };
    grid.recompute_all_land_values();
    grid
}

fn is_land(x: f64, y: f64, size: usize, centre: f64) -> bool {
    let reach = centre.max(1.0);
    let distance = ((x - centre).powi(2) + (y - centre).powi(2)).sqrt() / reach;
    if distance + coherent_noise(x, y) < ISLAND_THRESHOLD {
        return true;
    }
    if size < SATELLITE_MIN_SIZE {
        return false;
    }
    let radius = 0.08 * size as f64 + 0.6;
    SATELLITES.iter().any(|&(sx, sy)| {
        let (cx, cy) = (sx * size as f64, sy * size as f64);
        ((x - cx).powi(2) + (y - cy).powi(2)).sqrt() < radius
    })
}

/// Smooth, seed-independent wobble on the coastline.
fn coherent_noise(x: f64, y: f64) -> f64 {
    (x * 0.9).sin() * (y * 0.7).cos() * 0.12 + ((x + y) * 0.45).sin() * 0.08
}
