use anyhow::Result;
use tracing::debug;

use crate::{
    agents::AgentState,
    buildings::{BuildingId, BuildingKind},
    engine::{System, SystemContext},
    events::SimEvent,
    world::World,
};

/// Output of staffed non-farm buildings. Farms produce through their crop
/// cycle instead.
pub struct ProductionSystem;

impl ProductionSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProductionSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ProductionSystem {
    fn name(&self) -> &str {
        "production"
    }

    fn run(&mut self, ctx: &SystemContext, world: &mut World) -> Result<()> {
        let ids: Vec<BuildingId> = world.buildings.keys().copied().collect();
        for id in ids {
            produce(world, id, ctx.dt);
        }
        Ok(())
    }
}

fn produce(world: &mut World, id: BuildingId, dt: f32) {
    let Some(building) = world.buildings.get(&id) else {
        return;
    };
    if !building.complete || building.kind == BuildingKind::Farm {
        return;
    }
    let spec = world.config.buildings.spec(building.kind);
    let Some(table) = spec.production.clone() else {
        return;
    };
    let interval = spec.production_interval;
    let staffed = building
        .worker
        .and_then(|worker| world.agents.get(&worker))
        .map_or(false, |agent| agent.state == AgentState::Working);
    if !staffed {
        return;
    }

    let Some(building) = world.buildings.get_mut(&id) else {
        return;
    };
    building.production_timer += dt;
    if building.production_timer < interval {
        return;
    }
    building.production_timer = 0.0;
    let kind = building.kind;
    debug!(building = %id, %kind, produced = %table, "production cycle");
    world.emit(SimEvent::ResourceProduced {
        building: id,
        kind,
        resources: table,
        crop: None,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        agents::Profession,
        config::GameConfig,
        grid::Position,
    };

    #[test]
    fn lumbermill_needs_a_worker_to_produce() {
        let mut config = GameConfig::default();
        config.map.forest_chance = 0.0;
        let mut world = World::new(config, 8, 1.0);
        let mill = world.place_building(BuildingKind::Lumbermill, 12, 12).unwrap();
        world.complete_building(mill);

        for _ in 0..20 {
            produce(&mut world, mill, 1.0);
        }
        assert_eq!(world.ledger.wood, 50.0);

        let jack = world.create_resident("L", Profession::Lumberjack, Position::new(12.0, 12.0));
        world.assign_work(jack, mill);
        world.agents.get_mut(&jack).unwrap().state = AgentState::Working;
        for _ in 0..15 {
            produce(&mut world, mill, 1.0);
        }
        assert_eq!(world.ledger.wood, 53.0);
    }
}
