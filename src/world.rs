use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    agents::{Agent, AgentId, AgentState, Profession},
    buildings::{Building, BuildingId, BuildingKind},
    calendar::Calendar,
    config::GameConfig,
    error::SimError,
    events::{Outbox, Severity, SimEvent, VisualKind},
    grid::{TerrainKind, TileGrid, TilePos},
    ledger::{CropKind, ResourceLedger},
    rng::RngManager,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terraform {
    /// Cut down a forest tile.
    Clear,
    /// Turn grass into farmable dirt.
    Till,
}

/// All simulation state. Systems and player commands mutate it in place;
/// the view only ever sees snapshots and the drained outbox.
pub struct World {
    tick: u64,
    elapsed: f64,
    dt: f32,
    pub config: GameConfig,
    pub grid: TileGrid,
    pub buildings: BTreeMap<BuildingId, Building>,
    /// Keyed by creation order, which is also update order.
    pub agents: BTreeMap<AgentId, Agent>,
    pub ledger: ResourceLedger,
    pub calendar: Calendar,
    pub outbox: Outbox,
    pub(crate) rng: RngManager,
    next_building: u64,
    next_agent: u64,
}

impl World {
    pub fn new(config: GameConfig, seed: u64, dt: f32) -> Self {
        let mut rng = RngManager::new(seed);
        let grid = TileGrid::generate(&config.map, &mut rng.stream("terrain"));
        Self {
            tick: 0,
            elapsed: 0.0,
            dt,
            ledger: ResourceLedger::new(&config.ledger),
            calendar: Calendar::new(&config.seasons),
            config,
            grid,
            buildings: BTreeMap::new(),
            agents: BTreeMap::new(),
            outbox: Outbox::new(),
            rng,
            next_building: 1,
            next_agent: 1,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulated time since the start, in game units.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn advance_time(&mut self, dt: f32) {
        self.tick += 1;
        self.elapsed += dt as f64;
    }

    pub(crate) fn allocate_agent_id(&mut self) -> AgentId {
        let id = AgentId::new(self.next_agent);
        self.next_agent += 1;
        id
    }

    pub(crate) fn next_agent_number(&self) -> u64 {
        self.next_agent
    }

    fn allocate_building_id(&mut self) -> BuildingId {
        let id = BuildingId::new(self.next_building);
        self.next_building += 1;
        id
    }

    /// Records a domain event. The ledger sees it first so stock is current
    /// before anyone downstream reacts.
    pub fn emit(&mut self, event: SimEvent) {
        self.ledger.observe(&event);
        self.outbox.push_event(event);
    }

    pub fn building_at(&self, x: i32, z: i32) -> Option<BuildingId> {
        self.grid.tile_at(x, z).and_then(|tile| tile.building)
    }

    pub fn residents_with(&self, profession: Profession) -> impl Iterator<Item = &Agent> {
        self.agents
            .values()
            .filter(move |agent| agent.profession == profession)
    }

    pub fn can_place(&self, kind: BuildingKind, x: i32, z: i32) -> bool {
        let spec = self.config.buildings.spec(kind);
        self.grid
            .can_place(TilePos::new(x, z), spec.width, spec.depth)
    }

    /// Puts a construction site on the map without charging for it.
    pub fn place_building(
        &mut self,
        kind: BuildingKind,
        x: i32,
        z: i32,
    ) -> Result<BuildingId, SimError> {
        let origin = TilePos::new(x, z);
        if !self.can_place(kind, x, z) {
            let err = SimError::InvalidSite { kind, origin };
            debug!(%kind, %origin, "placement rejected");
            self.outbox.notify(err.to_string(), Severity::Error);
            return Err(err);
        }
        let id = self.allocate_building_id();
        let spec = self.config.buildings.spec(kind);
        let mut building = Building::new(id, kind, origin, spec);
        self.grid.occupy(origin, spec.width, spec.depth, id);
        building.visual = Some(
            self.outbox
                .create_visual(VisualKind::ConstructionSite(kind), building.position()),
        );
        self.buildings.insert(id, building);
        info!(building = %id, %kind, %origin, "building placed");
        self.emit(SimEvent::BuildingPlaced {
            building: id,
            kind,
            origin,
        });
        Ok(id)
    }

    /// Player command: pay for a building and start construction.
    pub fn build(&mut self, kind: BuildingKind, x: i32, z: i32) -> Result<BuildingId, SimError> {
        let cost = self.config.buildings.spec(kind).cost.clone();
        if !self.ledger.can_afford(&cost) {
            let err = SimError::InsufficientResources {
                what: format!("{kind} ({cost})"),
            };
            self.outbox.notify(err.to_string(), Severity::Error);
            return Err(err);
        }
        let id = self.place_building(kind, x, z)?;
        self.ledger.consume(&cost)?;
        self.outbox
            .notify(format!("Started building a {kind}"), Severity::Success);

        if self.config.auto_builder && self.ledger.has_room() {
            self.spawn_resident(Profession::Builder)?;
        }
        Ok(id)
    }

    /// Tears down whatever building covers the tile. Its worker, including one
    /// away on an errand, is sent idle first.
    pub fn demolish(&mut self, x: i32, z: i32) -> bool {
        let Some(id) = self.building_at(x, z) else {
            return false;
        };
        let attached: Vec<AgentId> = self
            .agents
            .values()
            .filter(|agent| {
                agent.workplace == Some(id)
                    || agent.journey.is_some_and(|journey| journey.return_to == id)
            })
            .map(|agent| agent.id)
            .collect();
        for agent in attached {
            self.send_idle(agent);
        }
        self.grid.release(id);
        let Some(building) = self.buildings.remove(&id) else {
            return false;
        };
        if let Some(handle) = building.visual {
            self.outbox.remove_visual(handle);
        }
        info!(building = %id, kind = %building.kind, "building demolished");
        self.emit(SimEvent::BuildingDemolished {
            building: id,
            kind: building.kind,
        });
        true
    }

    /// Grows the map to `new_size`, keeping every existing tile.
    pub fn expand_map(&mut self, new_size: u32) -> Result<usize, SimError> {
        let from = self.grid.size();
        let added = {
            let mut rng = self.rng.stream("terrain");
            self.grid.expand(new_size, &self.config.map, &mut rng)
        };
        let added = match added {
            Ok(added) => added,
            Err(err) => {
                self.outbox.notify(err.to_string(), Severity::Error);
                return Err(err);
            }
        };
        info!(from, to = new_size, added, "map expanded");
        self.emit(SimEvent::MapExpanded { from, to: new_size });
        Ok(added)
    }

    /// Player command: pay the expansion cost and grow by one step.
    pub fn expand_by_step(&mut self) -> Result<usize, SimError> {
        let cost = self.config.map.expansion_cost.clone();
        if let Err(err) = self.ledger.consume(&cost) {
            self.outbox.notify(err.to_string(), Severity::Error);
            return Err(err);
        }
        let target = self.grid.size() + self.config.map.expansion_step;
        self.expand_map(target)
    }

    pub fn terraform(&mut self, x: i32, z: i32, action: Terraform) -> Result<(), SimError> {
        let pos = TilePos::new(x, z);
        let result = match self.grid.tile_at_mut(x, z) {
            Some(tile) if !tile.occupied => match (action, tile.terrain) {
                (Terraform::Clear, TerrainKind::Forest) => {
                    tile.set_terrain(TerrainKind::Grass);
                    Ok(())
                }
                (Terraform::Till, TerrainKind::Grass) => {
                    tile.set_terrain(TerrainKind::Dirt);
                    Ok(())
                }
                _ => Err(SimError::InvalidTerraform(pos)),
            },
            _ => Err(SimError::InvalidTerraform(pos)),
        };
        match &result {
            Ok(()) => debug!(%pos, ?action, "terraformed"),
            Err(err) => self.outbox.notify(err.to_string(), Severity::Warning),
        }
        result
    }

    /// Clears forest under a footprint so a starter building fits.
    pub fn prepare_site(&mut self, kind: BuildingKind, x: i32, z: i32) {
        let spec = self.config.buildings.spec(kind);
        for pos in TileGrid::footprint(TilePos::new(x, z), spec.width, spec.depth) {
            if let Some(tile) = self.grid.tile_at_mut(pos.x, pos.z) {
                if tile.terrain == TerrainKind::Forest && !tile.occupied {
                    tile.set_terrain(TerrainKind::Grass);
                }
            }
        }
    }

    pub fn sell_crop(&mut self, crop: CropKind, amount: u32) -> f64 {
        let earned = self.ledger.sell_crop(crop, amount);
        if earned > 0.0 {
            self.outbox
                .notify(format!("Sold {crop} for {earned}"), Severity::Success);
        }
        earned
    }

    pub fn sell_all(&mut self) -> f64 {
        let earned = self.ledger.sell_all();
        if earned > 0.0 {
            self.outbox
                .notify(format!("Sold the harvest for {earned}"), Severity::Success);
        }
        earned
    }

    /// Every broken structural invariant, described in plain words.
    pub fn audit(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for tile in self.grid.tiles() {
            if tile.occupied != tile.building.is_some() {
                problems.push(format!(
                    "tile {} occupied={} but building={:?}",
                    tile.pos, tile.occupied, tile.building
                ));
            }
            if let Some(id) = tile.building {
                match self.buildings.get(&id) {
                    Some(building) if building.covers(tile.pos) => {}
                    Some(_) => problems.push(format!("tile {} outside {id}", tile.pos)),
                    None => problems.push(format!("tile {} points at missing {id}", tile.pos)),
                }
            }
        }

        for building in self.buildings.values() {
            for pos in TileGrid::footprint(building.origin, building.width, building.depth) {
                let owner = self.grid.tile_at(pos.x, pos.z).and_then(|tile| tile.building);
                if owner != Some(building.id) {
                    problems.push(format!("{} does not own tile {pos}", building.id));
                }
            }
            if let Some(worker) = building.worker {
                let linked = self
                    .agents
                    .get(&worker)
                    .map(|agent| agent.workplace == Some(building.id))
                    .unwrap_or(false);
                if !linked {
                    problems.push(format!("{} lists {worker} who does not work there", building.id));
                }
            }
            if !(0.0..=1.0).contains(&building.progress)
                || (building.complete && building.progress != 1.0)
            {
                problems.push(format!("{} has progress {}", building.id, building.progress));
            }
            if building.farm.is_some()
                && (building.kind != BuildingKind::Farm || !building.complete)
            {
                problems.push(format!("{} has a crop plot it should not have", building.id));
            }
        }

        for agent in self.agents.values() {
            if let Some(workplace) = agent.workplace {
                let linked = self
                    .buildings
                    .get(&workplace)
                    .map(|building| building.worker == Some(agent.id))
                    .unwrap_or(false);
                if !linked {
                    problems.push(format!("{} works at {workplace} without a back-link", agent.id));
                }
            }
            if agent.state == AgentState::Working && agent.workplace.is_none() {
                problems.push(format!("{} is working without a workplace", agent.id));
            }
            if let Some(journey) = agent.journey {
                if agent.workplace != Some(journey.return_to) {
                    problems.push(format!(
                        "{} is on an errand for {} but works at {:?}",
                        agent.id, journey.return_to, agent.workplace
                    ));
                }
            }
        }

        if self.ledger.population as usize != self.agents.len() {
            problems.push(format!(
                "population {} but {} residents",
                self.ledger.population,
                self.agents.len()
            ));
        }

        if !problems.is_empty() {
            warn!(count = problems.len(), "world audit found problems");
        }
        problems
    }
}
