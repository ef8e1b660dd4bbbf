use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    agents::AgentId,
    config::BuildingSpec,
    events::{EffectKind, Severity, SimEvent, VisualHandle, VisualKind},
    farm::FarmPlot,
    grid::{Position, TilePos},
    world::World,
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BuildingId(u64);

impl BuildingId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BuildingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "building_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingKind {
    Farm,
    House,
    Lumbermill,
    Barn,
}

impl fmt::Display for BuildingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BuildingKind::Farm => "farm",
            BuildingKind::House => "house",
            BuildingKind::Lumbermill => "lumbermill",
            BuildingKind::Barn => "barn",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Building {
    pub id: BuildingId,
    pub kind: BuildingKind,
    pub origin: TilePos,
    pub width: u32,
    pub depth: u32,
    pub complete: bool,
    /// Construction progress in `[0, 1]`.
    pub progress: f32,
    pub worker: Option<AgentId>,
    pub production_timer: f32,
    /// Crop lifecycle, present once a farm is complete.
    pub farm: Option<FarmPlot>,
    #[serde(skip)]
    pub visual: Option<VisualHandle>,
}

impl Building {
    pub fn new(id: BuildingId, kind: BuildingKind, origin: TilePos, spec: &BuildingSpec) -> Self {
        Self {
            id,
            kind,
            origin,
            width: spec.width,
            depth: spec.depth,
            complete: false,
            progress: 0.0,
            worker: None,
            production_timer: 0.0,
            farm: None,
            visual: None,
        }
    }

    /// Where residents walk to when they come here.
    pub fn position(&self) -> Position {
        self.origin.to_position()
    }

    pub fn covers(&self, pos: TilePos) -> bool {
        pos.x >= self.origin.x
            && pos.x < self.origin.x + self.width as i32
            && pos.z >= self.origin.z
            && pos.z < self.origin.z + self.depth as i32
    }

    pub fn is_vacant(&self) -> bool {
        self.worker.is_none()
    }
}

impl World {
    /// Moves construction forward. Returns `true` if this call finished it.
    ///
    /// Unknown ids and finished buildings are left alone.
    pub fn advance_construction(&mut self, id: BuildingId, dt: f32) -> bool {
        let build_time = match self.buildings.get(&id) {
            Some(building) if !building.complete => {
                self.config.buildings.spec(building.kind).build_time
            }
            _ => return false,
        };
        let Some(building) = self.buildings.get_mut(&id) else {
            return false;
        };
        building.progress = if build_time > 0.0 {
            building.progress + dt / build_time
        } else {
            1.0
        };
        if building.progress >= 1.0 {
            self.complete_building(id)
        } else {
            false
        }
    }

    pub fn complete_building(&mut self, id: BuildingId) -> bool {
        let Some(building) = self.buildings.get_mut(&id) else {
            return false;
        };
        if building.complete {
            return false;
        }
        building.complete = true;
        building.progress = 1.0;
        building.production_timer = 0.0;
        if building.kind == BuildingKind::Farm {
            building.farm = Some(FarmPlot::new(self.config.farming.crop));
        }
        let kind = building.kind;
        let position = building.position();
        let old_visual = building.visual.take();

        if let Some(handle) = old_visual {
            self.outbox.remove_visual(handle);
        }
        let handle = self
            .outbox
            .create_visual(VisualKind::Building(kind), position);
        if let Some(building) = self.buildings.get_mut(&id) {
            building.visual = Some(handle);
        }
        self.outbox.play_effect(EffectKind::Build, position);
        self.outbox
            .notify(format!("{kind} finished"), Severity::Success);

        info!(building = %id, %kind, "construction complete");
        self.emit(SimEvent::BuildingCompleted { building: id, kind });

        let increase = self.config.buildings.spec(kind).population_increase;
        if kind == BuildingKind::House && increase > 0 {
            debug!(building = %id, increase, "housing added");
            self.emit(SimEvent::PopulationIncreased {
                building: id,
                amount: increase,
            });
        }
        true
    }

    /// Nearest finished building of a kind, measured from `from`.
    pub fn nearest_complete(&self, kind: BuildingKind, from: Position) -> Option<BuildingId> {
        let mut best: Option<(BuildingId, f32)> = None;
        for building in self
            .buildings
            .values()
            .filter(|building| building.kind == kind && building.complete)
        {
            let distance = building.position().distance(from);
            if best.map_or(true, |(_, current)| distance < current) {
                best = Some((building.id, distance));
            }
        }
        best.map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::GameConfig, farm::FarmState};

    fn open_world() -> World {
        let mut config = GameConfig::default();
        config.map.forest_chance = 0.0;
        World::new(config, 1, 0.1)
    }

    #[test]
    fn construction_completes_once() {
        let mut world = open_world();
        let id = world
            .place_building(BuildingKind::House, 12, 12)
            .unwrap();

        assert!(!world.advance_construction(id, 2.5));
        assert!((world.buildings[&id].progress - 0.5).abs() < 1e-6);
        assert!(world.advance_construction(id, 2.5));
        assert!(world.buildings[&id].complete);

        assert!(!world.advance_construction(id, 10.0));
        assert_eq!(world.buildings[&id].progress, 1.0);
        assert_eq!(world.ledger.population_cap, 12);
    }

    #[test]
    fn completed_farm_starts_barren() {
        let mut world = open_world();
        let id = world.place_building(BuildingKind::Farm, 12, 12).unwrap();
        assert!(world.buildings[&id].farm.is_none());

        world.complete_building(id);

        let plot = world.buildings[&id].farm.as_ref().unwrap();
        assert_eq!(plot.state, FarmState::Barren);
        assert_eq!(plot.state_timer, 0.0);
    }

    #[test]
    fn unknown_building_is_ignored() {
        let mut world = open_world();
        assert!(!world.advance_construction(BuildingId::new(404), 1.0));
        assert!(!world.complete_building(BuildingId::new(404)));
    }
}
