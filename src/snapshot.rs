use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    agents::Agent, buildings::Building, calendar::Calendar, grid::Tile, ledger::ResourceLedger,
    world::World,
};

/// Read-only copy of everything a renderer needs to draw one frame.
#[derive(Debug, Clone, Serialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub elapsed: f64,
    pub map_size: u32,
    pub tiles: Vec<Tile>,
    pub buildings: Vec<Building>,
    pub agents: Vec<Agent>,
    pub ledger: ResourceLedger,
    pub calendar: Calendar,
}

impl World {
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            tick: self.tick(),
            elapsed: self.elapsed(),
            map_size: self.grid.size(),
            tiles: self.grid.tiles().cloned().collect(),
            buildings: self.buildings.values().cloned().collect(),
            agents: self.agents.values().cloned().collect(),
            ledger: self.ledger.clone(),
            calendar: self.calendar.clone(),
        }
    }
}

#[derive(Serialize)]
struct SnapshotFile<'a> {
    scenario: &'a str,
    written_at: DateTime<Utc>,
    #[serde(flatten)]
    snapshot: WorldSnapshot,
}

pub struct SnapshotWriter {
    dir: PathBuf,
    interval: u64,
}

impl SnapshotWriter {
    pub fn new(dir: impl AsRef<Path>, interval: u64) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            interval,
        }
    }

    pub fn maybe_write(&self, world: &World, scenario_name: &str) -> Result<Option<PathBuf>> {
        if self.interval == 0 || world.tick() % self.interval != 0 {
            return Ok(None);
        }

        let dir = self.dir.join(scenario_name);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create snapshot dir {}", dir.display()))?;
        let path = dir.join(format!("tick_{:06}.json", world.tick()));
        let file = SnapshotFile {
            scenario: scenario_name,
            written_at: Utc::now(),
            snapshot: world.snapshot(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use tempfile::tempdir;

    #[test]
    fn writes_only_on_interval_ticks() {
        let temp = tempdir().expect("tempdir");
        let writer = SnapshotWriter::new(temp.path(), 2);
        let mut world = World::new(GameConfig::default(), 1, 0.1);

        world.advance_time(0.1);
        assert!(writer.maybe_write(&world, "demo").unwrap().is_none());

        world.advance_time(0.1);
        let path = writer.maybe_write(&world, "demo").unwrap().unwrap();
        assert!(path.ends_with("demo/tick_000002.json"));

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["tick"], 2);
        assert_eq!(json["map_size"], 20);
        assert_eq!(json["tiles"].as_array().unwrap().len(), 400);
    }
}
