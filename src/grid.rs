use std::{collections::BTreeMap, fmt};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{buildings::BuildingId, config::MapConfig, error::SimError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainKind {
    Grass,
    Dirt,
    Water,
    Forest,
}

impl TerrainKind {
    pub fn buildable(self) -> bool {
        matches!(self, TerrainKind::Grass | TerrainKind::Dirt)
    }
}

/// Integer tile coordinate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TilePos {
    pub x: i32,
    pub z: i32,
}

impl TilePos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn to_position(self) -> Position {
        Position::new(self.x as f32, self.z as f32)
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Continuous world position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    pub fn distance(self, other: Position) -> f32 {
        ((self.x - other.x).powi(2) + (self.z - other.z).powi(2)).sqrt()
    }

    pub fn lerp(self, other: Position, t: f32) -> Position {
        Position::new(
            self.x + (other.x - self.x) * t,
            self.z + (other.z - self.z) * t,
        )
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.z)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub pos: TilePos,
    pub terrain: TerrainKind,
    pub buildable: bool,
    pub occupied: bool,
    pub building: Option<BuildingId>,
}

impl Tile {
    fn new(pos: TilePos, terrain: TerrainKind) -> Self {
        Self {
            pos,
            terrain,
            buildable: terrain.buildable(),
            occupied: false,
            building: None,
        }
    }

    pub fn set_terrain(&mut self, terrain: TerrainKind) {
        self.terrain = terrain;
        self.buildable = terrain.buildable();
    }
}

/// Square map of tiles anchored at (0, 0).
#[derive(Debug, Clone)]
pub struct TileGrid {
    size: u32,
    /// River axis, fixed when the map is first generated so that expansion
    /// extends the same river instead of carving a new one.
    river_axis: f32,
    river_amplitude: f32,
    river_wavenumber: f32,
    tiles: BTreeMap<TilePos, Tile>,
}

impl TileGrid {
    pub fn generate(config: &MapConfig, rng: &mut impl Rng) -> Self {
        let size = config.size;
        let mut grid = Self {
            size: 0,
            river_axis: size as f32 / 2.0 + config.river_offset * size as f32,
            river_amplitude: config.river_amplitude,
            river_wavenumber: config.river_wavenumber,
            tiles: BTreeMap::new(),
        };
        grid.fill(size, config, rng);
        grid
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    pub fn tile_at(&self, x: i32, z: i32) -> Option<&Tile> {
        self.tiles.get(&TilePos::new(x, z))
    }

    pub fn tile_at_mut(&mut self, x: i32, z: i32) -> Option<&mut Tile> {
        self.tiles.get_mut(&TilePos::new(x, z))
    }

    pub fn is_river(&self, pos: TilePos) -> bool {
        let meander = self.river_amplitude * (self.river_wavenumber * pos.z as f32).sin();
        pos.x == (self.river_axis + meander).round() as i32
    }

    pub fn footprint(origin: TilePos, width: u32, depth: u32) -> impl Iterator<Item = TilePos> {
        (0..width as i32).flat_map(move |dx| {
            (0..depth as i32).map(move |dz| TilePos::new(origin.x + dx, origin.z + dz))
        })
    }

    /// Every covered tile exists, is buildable and is free.
    pub fn can_place(&self, origin: TilePos, width: u32, depth: u32) -> bool {
        Self::footprint(origin, width, depth).all(|pos| {
            self.tiles
                .get(&pos)
                .map(|tile| tile.buildable && !tile.occupied)
                .unwrap_or(false)
        })
    }

    pub fn occupy(&mut self, origin: TilePos, width: u32, depth: u32, building: BuildingId) {
        for pos in Self::footprint(origin, width, depth) {
            if let Some(tile) = self.tiles.get_mut(&pos) {
                tile.occupied = true;
                tile.building = Some(building);
            }
        }
    }

    /// Clears every tile that points at `building`.
    pub fn release(&mut self, building: BuildingId) -> usize {
        let mut cleared = 0;
        for tile in self.tiles.values_mut() {
            if tile.building == Some(building) {
                tile.occupied = false;
                tile.building = None;
                cleared += 1;
            }
        }
        cleared
    }

    /// Nearest tile of the given terrain. Ties go to the lowest coordinate.
    pub fn nearest(&self, terrain: TerrainKind, from: Position) -> Option<TilePos> {
        let mut best: Option<(TilePos, f32)> = None;
        for tile in self.tiles.values().filter(|tile| tile.terrain == terrain) {
            let distance = tile.pos.to_position().distance(from);
            if best.map_or(true, |(_, current)| distance < current) {
                best = Some((tile.pos, distance));
            }
        }
        best.map(|(pos, _)| pos)
    }

    /// Grows the square to `new_size`, generating only the tiles outside the
    /// old bounds. Returns the number of tiles added.
    pub fn expand(
        &mut self,
        new_size: u32,
        config: &MapConfig,
        rng: &mut impl Rng,
    ) -> Result<usize, SimError> {
        if new_size <= self.size {
            return Err(SimError::InvalidExpansion {
                current: self.size,
                requested: new_size,
            });
        }
        let before = self.tiles.len();
        self.fill(new_size, config, rng);
        Ok(self.tiles.len() - before)
    }

    fn fill(&mut self, new_size: u32, config: &MapConfig, rng: &mut impl Rng) {
        let old = self.size as i32;
        for x in 0..new_size as i32 {
            for z in 0..new_size as i32 {
                if x < old && z < old {
                    continue;
                }
                let pos = TilePos::new(x, z);
                let terrain = self.roll_terrain(pos, config, rng);
                self.tiles.insert(pos, Tile::new(pos, terrain));
            }
        }
        self.size = new_size;
    }

    fn roll_terrain(&self, pos: TilePos, config: &MapConfig, rng: &mut impl Rng) -> TerrainKind {
        // Both rolls are drawn for every tile so river tiles do not shift the
        // stream for the rest of the map.
        let forest_roll: f64 = rng.gen();
        let dirt_roll: f64 = rng.gen();
        if self.is_river(pos) {
            TerrainKind::Water
        } else if forest_roll < config.forest_chance {
            TerrainKind::Forest
        } else if dirt_roll < config.dirt_chance {
            TerrainKind::Dirt
        } else {
            TerrainKind::Grass
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn grid(config: &MapConfig) -> TileGrid {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        TileGrid::generate(config, &mut rng)
    }

    #[test]
    fn generates_a_full_square_with_a_river() {
        let config = MapConfig::default();
        let grid = grid(&config);

        assert_eq!(grid.len(), 400);
        let water = grid
            .tiles()
            .filter(|tile| tile.terrain == TerrainKind::Water)
            .count();
        assert_eq!(water, 20, "one river tile per row");
        assert!(grid
            .tiles()
            .filter(|tile| tile.terrain == TerrainKind::Water)
            .all(|tile| !tile.buildable));
    }

    #[test]
    fn can_place_rejects_off_map_and_occupied_sites() {
        let config = MapConfig {
            forest_chance: 0.0,
            dirt_chance: 0.0,
            river_offset: -0.5,
            river_amplitude: 0.0,
            ..MapConfig::default()
        };
        let mut grid = grid(&config);
        let origin = TilePos::new(10, 10);

        assert!(grid.can_place(origin, 2, 2));
        assert!(!grid.can_place(TilePos::new(19, 19), 2, 2));

        grid.occupy(origin, 2, 2, BuildingId::new(1));
        assert!(!grid.can_place(TilePos::new(11, 11), 2, 2));
        assert_eq!(grid.release(BuildingId::new(1)), 4);
        assert!(grid.can_place(TilePos::new(11, 11), 2, 2));
    }

    #[test]
    fn expansion_preserves_existing_tiles() {
        let config = MapConfig::default();
        let mut grid = grid(&config);
        grid.occupy(TilePos::new(3, 3), 2, 2, BuildingId::new(9));
        let before: Vec<Tile> = grid.tiles().cloned().collect();

        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let added = grid.expand(25, &config, &mut rng).unwrap();

        assert_eq!(added, 225);
        assert_eq!(grid.len(), 625);
        for tile in before {
            assert_eq!(grid.tile_at(tile.pos.x, tile.pos.z), Some(&tile));
        }
        assert!(matches!(
            grid.expand(25, &config, &mut rng),
            Err(SimError::InvalidExpansion { .. })
        ));
    }

    #[test]
    fn nearest_finds_closest_water() {
        let config = MapConfig {
            forest_chance: 0.0,
            river_amplitude: 0.0,
            ..MapConfig::default()
        };
        let grid = grid(&config);

        let water = grid
            .nearest(TerrainKind::Water, Position::new(12.0, 7.0))
            .unwrap();
        assert_eq!(water, TilePos::new(5, 7));
    }
}
