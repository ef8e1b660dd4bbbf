use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

use crate::{
    agents::Profession, buildings::BuildingKind, config::GameConfig, grid::Position, world::World,
};

fn default_dt() -> f32 {
    0.1
}

fn default_snapshot_interval_ticks() -> u64 {
    100
}

fn default_profession() -> Profession {
    Profession::Unassigned
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    /// Game units per tick.
    #[serde(default = "default_dt")]
    pub dt: f32,
    #[serde(default)]
    pub ticks: Option<u64>,
    #[serde(default = "default_snapshot_interval_ticks")]
    pub snapshot_interval_ticks: u64,
    #[serde(default)]
    pub config: GameConfig,
    #[serde(default)]
    pub buildings: Vec<ScenarioBuilding>,
    #[serde(default)]
    pub residents: Vec<ScenarioResident>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioBuilding {
    pub kind: BuildingKind,
    pub x: i32,
    pub z: i32,
    #[serde(default)]
    pub complete: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioResident {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_profession")]
    pub profession: Profession,
    /// Spawned near the map center when omitted.
    #[serde(default)]
    pub position: Option<Position>,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    /// Generates the map and lays out the starting village. Starter sites are
    /// cleared of forest so the layout always fits.
    pub fn build_world(&self) -> Result<World> {
        let mut world = World::new(self.config.clone(), self.seed, self.dt);

        for entry in &self.buildings {
            world.prepare_site(entry.kind, entry.x, entry.z);
            let id = world
                .place_building(entry.kind, entry.x, entry.z)
                .with_context(|| {
                    format!(
                        "Scenario '{}' cannot place {} at ({}, {})",
                        self.name, entry.kind, entry.x, entry.z
                    )
                })?;
            if entry.complete {
                world.complete_building(id);
            }
        }

        for (index, entry) in self.residents.iter().enumerate() {
            ensure!(
                world.ledger.has_room(),
                "Scenario '{}' lists more residents than the population cap of {}",
                self.name,
                world.ledger.population_cap
            );
            let position = match entry.position {
                Some(position) => position,
                None => world.spawn_position(),
            };
            let name = entry
                .name
                .clone()
                .unwrap_or_else(|| format!("Resident {}", index + 1));
            world.create_resident(name, entry.profession, position);
        }

        Ok(world)
    }

    pub fn ticks(&self, override_ticks: Option<u64>) -> u64 {
        override_ticks.or(self.ticks).unwrap_or(600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
name: tiny
seed: 4
config:
  map:
    size: 16
buildings:
  - kind: barn
    x: 10
    z: 10
    complete: true
  - kind: farm
    x: 12
    z: 12
residents:
  - profession: farmer
    position: { x: 8.0, z: 8.0 }
  - name: Hana
"#;

    #[test]
    fn builds_the_listed_village() {
        let scenario: Scenario = serde_yaml::from_str(YAML).unwrap();
        let world = scenario.build_world().unwrap();

        assert_eq!(world.grid.size(), 16);
        assert_eq!(world.buildings.len(), 2);
        assert_eq!(world.buildings.values().filter(|b| b.complete).count(), 1);
        assert_eq!(world.agents.len(), 2);
        let names: Vec<&str> = world.agents.values().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Resident 1", "Hana"]);
        assert!(world.audit().is_empty());
        assert_eq!(scenario.ticks(None), 600);
        assert_eq!(scenario.dt, 0.1);
    }

    #[test]
    fn rejects_more_residents_than_the_cap() {
        let yaml = "name: crowded\nseed: 1\nconfig:\n  ledger:\n    population_cap: 1\nresidents:\n  - {}\n  - {}\n";
        let scenario: Scenario = serde_yaml::from_str(yaml).unwrap();
        assert!(scenario.build_world().is_err());
    }
}
