use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    buildings::BuildingId,
    error::SimError,
    events::{Severity, SimEvent, VisualHandle, VisualKind},
    grid::Position,
    world::World,
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AgentId(u64);

impl AgentId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resident_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profession {
    #[serde(rename = "none")]
    Unassigned,
    Farmer,
    Builder,
    Lumberjack,
}

impl fmt::Display for Profession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Profession::Unassigned => "none",
            Profession::Farmer => "farmer",
            Profession::Builder => "builder",
            Profession::Lumberjack => "lumberjack",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Idle,
    Moving,
    Working,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Hoe,
    WateringCan,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tool::Hoe => f.write_str("hoe"),
            Tool::WateringCan => f.write_str("watering can"),
        }
    }
}

/// A detour to a supply point and back to the workplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Errand {
    FetchHoe,
    FetchSeeds,
    FetchWateringCan,
    FetchWater,
}

impl Errand {
    pub fn tool(self) -> Option<Tool> {
        match self {
            Errand::FetchHoe => Some(Tool::Hoe),
            Errand::FetchWateringCan => Some(Tool::WateringCan),
            Errand::FetchSeeds | Errand::FetchWater => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
    Outbound,
    Returning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journey {
    pub errand: Errand,
    pub return_to: BuildingId,
    pub leg: Leg,
}

#[derive(Debug, Clone, Serialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub profession: Profession,
    pub position: Position,
    pub workplace: Option<BuildingId>,
    pub state: AgentState,
    pub state_timer: f32,
    pub path: Vec<Position>,
    pub path_cursor: usize,
    pub work_progress: f32,
    pub energy: f32,
    pub tool: Option<Tool>,
    pub has_seeds: bool,
    pub has_water: bool,
    pub journey: Option<Journey>,
    #[serde(skip)]
    pub visual: Option<VisualHandle>,
}

impl Agent {
    pub fn new(id: AgentId, name: String, profession: Profession, position: Position) -> Self {
        Self {
            id,
            name,
            profession,
            position,
            workplace: None,
            state: AgentState::Idle,
            state_timer: 0.0,
            path: Vec::new(),
            path_cursor: 0,
            work_progress: 0.0,
            energy: 100.0,
            tool: None,
            has_seeds: false,
            has_water: false,
            journey: None,
            visual: None,
        }
    }

    pub fn set_path(&mut self, to: Position, waypoints: usize) {
        self.path = straight_path(self.position, to, waypoints);
        self.path_cursor = 0;
    }

    pub fn clear_path(&mut self) {
        self.path.clear();
        self.path_cursor = 0;
    }

    pub fn next_waypoint(&self) -> Option<Position> {
        self.path.get(self.path_cursor).copied()
    }

    pub fn on_errand(&self) -> bool {
        self.journey.is_some()
    }
}

/// Evenly spaced points on the segment, excluding `from` and ending at `to`.
pub fn straight_path(from: Position, to: Position, waypoints: usize) -> Vec<Position> {
    let steps = waypoints.max(1);
    (1..=steps)
        .map(|i| from.lerp(to, i as f32 / steps as f32))
        .collect()
}

impl World {
    /// Adds a resident. The one place the population count goes up.
    pub fn create_resident(
        &mut self,
        name: impl Into<String>,
        profession: Profession,
        position: Position,
    ) -> AgentId {
        let id = self.allocate_agent_id();
        let mut agent = Agent::new(id, name.into(), profession, position);
        agent.visual = Some(
            self.outbox
                .create_visual(VisualKind::Resident(profession), position),
        );
        self.agents.insert(id, agent);
        self.ledger.population += 1;
        info!(agent = %id, %profession, %position, "resident created");
        self.emit(SimEvent::ResidentSpawned {
            agent: id,
            profession,
        });
        id
    }

    /// Spawns a resident near the map center if the village has room.
    pub fn spawn_resident(&mut self, profession: Profession) -> Result<AgentId, SimError> {
        if !self.ledger.has_room() {
            let cap = self.ledger.population_cap;
            let err = SimError::PopulationCapReached { cap };
            self.outbox
                .notify(format!("{err}, build more houses"), Severity::Error);
            return Err(err);
        }
        let position = self.spawn_position();
        let name = format!("Resident {}", self.next_agent_number());
        Ok(self.create_resident(name, profession, position))
    }

    pub(crate) fn spawn_position(&mut self) -> Position {
        let center = self.grid.size() as f32 / 2.0;
        let spread = self.config.agents.spawn_spread;
        let mut rng = self.rng.stream("spawn");
        let dx: f32 = rng.gen_range(-1.0..1.0);
        let dz: f32 = rng.gen_range(-1.0..1.0);
        Position::new(center + dx * spread, center + dz * spread)
    }

    /// Links a resident and a building in both directions.
    ///
    /// Any previous link on either side is dropped first. Returns `false` if
    /// either id is stale or the building is held by someone else.
    pub fn assign_work(&mut self, agent: AgentId, building: BuildingId) -> bool {
        let Some(target) = self.buildings.get(&building) else {
            return false;
        };
        if target.worker.is_some_and(|worker| worker != agent) {
            return false;
        }
        if !self.agents.contains_key(&agent) {
            return false;
        }
        if self.agents[&agent].workplace != Some(building) {
            self.release_work(agent);
        }
        if let Some(target) = self.buildings.get_mut(&building) {
            target.worker = Some(agent);
        }
        if let Some(resident) = self.agents.get_mut(&agent) {
            resident.workplace = Some(building);
        }
        debug!(%agent, %building, "work assigned");
        self.emit(SimEvent::WorkAssigned { agent, building });
        true
    }

    /// Clears both sides of the resident's workplace link and any errand in
    /// progress. Returns the building that was released.
    pub fn release_work(&mut self, agent: AgentId) -> Option<BuildingId> {
        let resident = self.agents.get_mut(&agent)?;
        resident.journey = None;
        let building = resident.workplace.take()?;
        if let Some(target) = self.buildings.get_mut(&building) {
            if target.worker == Some(agent) {
                target.worker = None;
            }
        }
        debug!(%agent, %building, "work released");
        self.emit(SimEvent::WorkReleased { agent, building });
        Some(building)
    }

    /// Sends a resident back to idle, dropping its workplace. Idle residents
    /// hold no tools.
    pub fn send_idle(&mut self, agent: AgentId) {
        self.release_work(agent);
        self.return_tool(agent);
        if let Some(resident) = self.agents.get_mut(&agent) {
            resident.state = AgentState::Idle;
            resident.state_timer = 0.0;
            resident.work_progress = 0.0;
            resident.clear_path();
        }
    }

    /// Gives a resident a new job. Unknown ids are ignored.
    pub fn change_profession(&mut self, agent: AgentId, profession: Profession) -> bool {
        if !self.agents.contains_key(&agent) {
            return false;
        }
        self.release_work(agent);
        self.return_tool(agent);

        let Some(resident) = self.agents.get_mut(&agent) else {
            return false;
        };
        let from = resident.profession;
        resident.profession = profession;
        resident.state = AgentState::Idle;
        resident.state_timer = 0.0;
        resident.work_progress = 0.0;
        resident.has_seeds = false;
        resident.has_water = false;
        resident.clear_path();
        let position = resident.position;
        let old_visual = resident.visual.take();

        if let Some(handle) = old_visual {
            self.outbox.remove_visual(handle);
        }
        let handle = self
            .outbox
            .create_visual(VisualKind::Resident(profession), position);
        if let Some(resident) = self.agents.get_mut(&agent) {
            resident.visual = Some(handle);
        }
        info!(%agent, %from, to = %profession, "profession changed");
        self.emit(SimEvent::ProfessionChanged {
            agent,
            from,
            to: profession,
        });
        true
    }

    /// Takes a resident out of the village. Unknown ids are ignored.
    pub fn remove_resident(&mut self, agent: AgentId) -> bool {
        if !self.agents.contains_key(&agent) {
            return false;
        }
        self.release_work(agent);
        self.return_tool(agent);
        let Some(resident) = self.agents.remove(&agent) else {
            return false;
        };
        if let Some(handle) = resident.visual {
            self.outbox.remove_visual(handle);
        }
        self.ledger.population = self.ledger.population.saturating_sub(1);
        info!(%agent, name = %resident.name, "resident removed");
        self.emit(SimEvent::ResidentRemoved { agent });
        true
    }

    /// Puts the resident's tool back in the barn stock.
    pub fn return_tool(&mut self, agent: AgentId) {
        if let Some(tool) = self.agents.get_mut(&agent).and_then(|a| a.tool.take()) {
            self.ledger.return_tool(tool);
        }
    }
}
