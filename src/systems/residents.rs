//! Per-resident scheduler.
//!
//! Every resident is an `Idle -> Moving -> Working -> Idle` machine. Moving
//! doubles as the travel leg of errands: a farmer missing a tool or water
//! keeps its workplace reserved, walks to the barn or the river, picks up
//! what it needs and walks back.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::{
    agents::{AgentId, AgentState, Errand, Journey, Leg, Profession, Tool},
    buildings::{BuildingId, BuildingKind},
    engine::{System, SystemContext},
    error::SimError,
    events::{EffectKind, Severity, SimEvent},
    farm::FarmOutcome,
    grid::{Position, TerrainKind},
    world::World,
};

pub struct ResidentSystem;

impl ResidentSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ResidentSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ResidentSystem {
    fn name(&self) -> &str {
        "residents"
    }

    fn run(&mut self, ctx: &SystemContext, world: &mut World) -> Result<()> {
        let ids: Vec<AgentId> = world.agents.keys().copied().collect();
        for id in ids {
            update_resident(world, id, ctx.dt);
        }
        Ok(())
    }
}

/// Runs one tick of a single resident.
pub fn update_resident(world: &mut World, id: AgentId, dt: f32) {
    let Some(agent) = world.agents.get_mut(&id) else {
        return;
    };
    agent.state_timer += dt;
    match agent.state {
        AgentState::Idle => idle(world, id, dt),
        AgentState::Moving => travel(world, id),
        AgentState::Working => work(world, id, dt),
    }
}

fn idle(world: &mut World, id: AgentId, dt: f32) {
    let regen = world.config.agents.energy_regen;
    let delay = world.config.agents.idle_search_delay;
    let Some(agent) = world.agents.get_mut(&id) else {
        return;
    };
    agent.energy = (agent.energy + regen * dt).min(100.0);
    if agent.state_timer <= delay || agent.profession == Profession::Unassigned {
        return;
    }
    match find_work(world, id) {
        Some(building) => {
            start_commute(world, id, building);
        }
        None => {
            if let Some(agent) = world.agents.get_mut(&id) {
                agent.state_timer = 0.0;
            }
        }
    }
}

/// The nearest building this resident's profession can work at right now.
/// Equal distances go to the building created first.
pub fn find_work(world: &World, id: AgentId) -> Option<BuildingId> {
    let agent = world.agents.get(&id)?;
    let mut best: Option<(BuildingId, f32)> = None;
    for building in world.buildings.values() {
        let suitable = match agent.profession {
            Profession::Farmer => {
                building.kind == BuildingKind::Farm
                    && building.complete
                    && building.worker.map_or(true, |worker| worker == id)
            }
            Profession::Builder => !building.complete && building.is_vacant(),
            Profession::Lumberjack => {
                building.kind == BuildingKind::Lumbermill
                    && building.complete
                    && building.is_vacant()
            }
            Profession::Unassigned => false,
        };
        if !suitable {
            continue;
        }
        let distance = agent.position.distance(building.position());
        if best.map_or(true, |(_, current)| distance < current) {
            best = Some((building.id, distance));
        }
    }
    best.map(|(building, _)| building)
}

/// Reserves `building` for the resident and sets off towards it.
pub fn start_commute(world: &mut World, id: AgentId, building: BuildingId) -> bool {
    if !world.assign_work(id, building) {
        return false;
    }
    let waypoints = world.config.agents.path_waypoints;
    let Some(destination) = world.buildings.get(&building).map(|b| b.position()) else {
        return false;
    };
    if let Some(agent) = world.agents.get_mut(&id) {
        agent.work_progress = 0.0;
        agent.state_timer = 0.0;
    }

    if let Some(errand) = world.farm_errand_before_work(id, building) {
        match begin_errand(world, id, errand) {
            Ok(()) => return true,
            Err(err) => warn_missing_supply(world, building, &err),
        }
    }

    let Some(agent) = world.agents.get_mut(&id) else {
        return false;
    };
    agent.set_path(destination, waypoints);
    agent.state = AgentState::Moving;
    info!(agent = %id, %building, "heading to work");
    true
}

/// Sends the resident to the barn or the river on behalf of its workplace.
pub fn begin_errand(world: &mut World, id: AgentId, errand: Errand) -> Result<(), SimError> {
    let agent = world
        .agents
        .get(&id)
        .ok_or_else(|| SimError::UnknownEntity(id.to_string()))?;
    let return_to = agent
        .workplace
        .ok_or_else(|| SimError::UnknownEntity(format!("workplace of {id}")))?;
    let from = agent.position;
    let held = agent.tool;

    let destination = match errand {
        Errand::FetchWater => world
            .grid
            .nearest(TerrainKind::Water, from)
            .map(|tile| tile.to_position())
            .ok_or(SimError::MissingCollaborator("river"))?,
        Errand::FetchHoe | Errand::FetchSeeds | Errand::FetchWateringCan => {
            let barn = world
                .nearest_complete(BuildingKind::Barn, from)
                .ok_or(SimError::MissingCollaborator("barn"))?;
            if let Some(tool) = errand.tool() {
                if held != Some(tool) && world.ledger.tool_stock(tool) == 0 {
                    return Err(SimError::MissingCollaborator(tool_label(tool)));
                }
            }
            world
                .buildings
                .get(&barn)
                .map(|building| building.position())
                .ok_or(SimError::MissingCollaborator("barn"))?
        }
    };

    let waypoints = world.config.agents.path_waypoints;
    if let Some(agent) = world.agents.get_mut(&id) {
        agent.journey = Some(Journey {
            errand,
            return_to,
            leg: Leg::Outbound,
        });
        agent.set_path(destination, waypoints);
        agent.state = AgentState::Moving;
        agent.state_timer = 0.0;
    }
    if let Some(plot) = world
        .buildings
        .get_mut(&return_to)
        .and_then(|building| building.farm.as_mut())
    {
        plot.supply_warning_shown = false;
    }
    info!(agent = %id, ?errand, %destination, "errand started");
    world.emit(SimEvent::ErrandStarted {
        agent: id,
        errand,
        destination,
    });
    Ok(())
}

fn tool_label(tool: Tool) -> &'static str {
    match tool {
        Tool::Hoe => "hoe",
        Tool::WateringCan => "watering can",
    }
}

fn warn_missing_supply(world: &mut World, farm: BuildingId, err: &SimError) {
    let Some(plot) = world
        .buildings
        .get_mut(&farm)
        .and_then(|building| building.farm.as_mut())
    else {
        return;
    };
    if plot.supply_warning_shown {
        return;
    }
    plot.supply_warning_shown = true;
    warn!(building = %farm, %err, "farm work blocked");
    world
        .outbox
        .notify(format!("{farm} is stuck: {err}"), Severity::Error);
}

fn travel(world: &mut World, id: AgentId) {
    let radius = world.config.agents.arrival_radius;
    let Some(agent) = world.agents.get(&id) else {
        return;
    };
    let speed = world.config.professions.spec(agent.profession).move_speed;
    if agent.path.is_empty() {
        world.send_idle(id);
        return;
    }
    let Some(agent) = world.agents.get_mut(&id) else {
        return;
    };
    let Some(target) = agent.next_waypoint() else {
        arrive(world, id);
        return;
    };

    let distance = agent.position.distance(target);
    if distance < radius {
        agent.path_cursor += 1;
        if agent.path_cursor >= agent.path.len() {
            arrive(world, id);
        }
        return;
    }
    let step = speed.min(distance);
    agent.position = agent.position.lerp(target, step / distance);
}

fn arrive(world: &mut World, id: AgentId) {
    let Some(agent) = world.agents.get_mut(&id) else {
        return;
    };
    agent.clear_path();
    let journey = agent.journey;
    match journey {
        Some(Journey {
            errand,
            return_to,
            leg: Leg::Outbound,
        }) => {
            let success = run_errand(world, id, errand);
            world.emit(SimEvent::ErrandFinished {
                agent: id,
                errand,
                success,
            });
            head_back(world, id, return_to);
        }
        Some(Journey {
            leg: Leg::Returning,
            ..
        }) => {
            if let Some(agent) = world.agents.get_mut(&id) {
                agent.journey = None;
            }
            settle_at_work(world, id);
        }
        None => settle_at_work(world, id),
    }
}

fn head_back(world: &mut World, id: AgentId, return_to: BuildingId) {
    let waypoints = world.config.agents.path_waypoints;
    let Some(destination) = world.buildings.get(&return_to).map(|b| b.position()) else {
        world.send_idle(id);
        return;
    };
    if let Some(agent) = world.agents.get_mut(&id) {
        if let Some(journey) = agent.journey.as_mut() {
            journey.leg = Leg::Returning;
        }
        agent.set_path(destination, waypoints);
        agent.state = AgentState::Moving;
        debug!(agent = %id, building = %return_to, "returning from errand");
    }
}

/// Picks up whatever the errand was for. Returns whether it worked out.
fn run_errand(world: &mut World, id: AgentId, errand: Errand) -> bool {
    match errand {
        Errand::FetchHoe => equip(world, id, Tool::Hoe),
        Errand::FetchWateringCan => equip(world, id, Tool::WateringCan),
        Errand::FetchSeeds => {
            if let Some(agent) = world.agents.get_mut(&id) {
                agent.has_seeds = true;
            }
            true
        }
        Errand::FetchWater => {
            let Some(agent) = world.agents.get_mut(&id) else {
                return false;
            };
            agent.has_water = true;
            let position = agent.position;
            world.ledger.fill_watering_can();
            world.outbox.play_effect(EffectKind::Water, position);
            true
        }
    }
}

/// Borrows a tool from the barn, handing back the one already held.
fn equip(world: &mut World, id: AgentId, tool: Tool) -> bool {
    let Some(agent) = world.agents.get(&id) else {
        return false;
    };
    if agent.tool == Some(tool) {
        return true;
    }
    if !world.ledger.take_tool(tool) {
        world
            .outbox
            .notify(format!("No {tool} left in the barn"), Severity::Warning);
        return false;
    }
    let previous = world
        .agents
        .get_mut(&id)
        .and_then(|agent| agent.tool.replace(tool));
    if let Some(previous) = previous {
        world.ledger.return_tool(previous);
    }
    debug!(agent = %id, %tool, "tool equipped");
    true
}

fn settle_at_work(world: &mut World, id: AgentId) {
    let Some(workplace) = world.agents.get(&id).and_then(|agent| agent.workplace) else {
        world.send_idle(id);
        return;
    };
    match world.buildings.get_mut(&workplace) {
        Some(building) if building.worker.map_or(true, |worker| worker == id) => {
            building.worker = Some(id);
        }
        _ => {
            world.send_idle(id);
            return;
        }
    }
    if let Some(agent) = world.agents.get_mut(&id) {
        agent.state = AgentState::Working;
        agent.state_timer = 0.0;
        agent.work_progress = 0.0;
        debug!(agent = %id, building = %workplace, "arrived at work");
    }

    // A thirsty plot still waiting on water chains the next errand, e.g. the
    // river after a trip to the barn for the can.
    if let Some(errand) = world.farm_errand_before_work(id, workplace) {
        if let Err(err) = begin_errand(world, id, errand) {
            warn_missing_supply(world, workplace, &err);
        }
    }
}

fn work(world: &mut World, id: AgentId, dt: f32) {
    let Some(agent) = world.agents.get_mut(&id) else {
        return;
    };
    let Some(workplace) = agent.workplace else {
        world.send_idle(id);
        return;
    };
    agent.work_progress += dt;
    let progress = agent.work_progress;
    let profession = agent.profession;
    let duration = world.config.professions.spec(profession).work_duration;
    let Some(kind) = world.buildings.get(&workplace).map(|b| b.kind) else {
        world.send_idle(id);
        return;
    };

    match profession {
        Profession::Builder => {
            world.advance_construction(workplace, dt);
            if progress >= duration {
                let done = world
                    .buildings
                    .get(&workplace)
                    .map_or(true, |building| building.complete);
                if done {
                    info!(agent = %id, building = %workplace, "construction handed over");
                    world.send_idle(id);
                } else {
                    reset_progress(world, id);
                }
            }
        }
        Profession::Farmer if kind == BuildingKind::Farm => {
            let outcome = world.tend_farm(id, workplace, dt);
            if progress >= duration {
                reset_progress(world, id);
            }
            match outcome {
                FarmOutcome::Continue => {}
                FarmOutcome::Errand(errand) => {
                    if let Err(err) = begin_errand(world, id, errand) {
                        if errand.tool().is_some() {
                            // Waiting on a tool: don't hold the other one.
                            world.return_tool(id);
                        }
                        warn_missing_supply(world, workplace, &err);
                    }
                }
                FarmOutcome::Release => world.send_idle(id),
            }
        }
        Profession::Lumberjack if kind == BuildingKind::Lumbermill => {
            if progress >= duration {
                reset_progress(world, id);
            }
        }
        _ => world.send_idle(id),
    }
}

fn reset_progress(world: &mut World, id: AgentId) {
    if let Some(agent) = world.agents.get_mut(&id) {
        agent.work_progress = 0.0;
    }
}

/// Where a resident is currently headed, if anywhere.
pub fn destination(world: &World, id: AgentId) -> Option<Position> {
    world.agents.get(&id)?.path.last().copied()
}
