use anyhow::Result;
use tracing::info;

use crate::{
    buildings::{BuildingId, BuildingKind},
    calendar::CalendarChange,
    engine::{System, SystemContext},
    events::{Severity, SimEvent},
    world::World,
};

pub struct CalendarSystem;

impl CalendarSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CalendarSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for CalendarSystem {
    fn name(&self) -> &str {
        "calendar"
    }

    fn run(&mut self, ctx: &SystemContext, world: &mut World) -> Result<()> {
        let changes =
            world
                .calendar
                .advance(ctx.dt, &world.config.seasons, world.config.day_length);
        for change in changes {
            match change {
                CalendarChange::NewDay(day) => {
                    info!(day, "new day");
                    world.emit(SimEvent::DayStarted { day });
                    if world.config.farming.overnight_drying {
                        dry_out_farms(world);
                    }
                }
                CalendarChange::NewSeason(season) => {
                    info!(%season, "season changed");
                    world
                        .outbox
                        .notify(format!("It is now {season}"), Severity::Info);
                    world.emit(SimEvent::SeasonChanged { season });
                }
            }
        }
        Ok(())
    }
}

fn dry_out_farms(world: &mut World) {
    let farms: Vec<BuildingId> = world
        .buildings
        .values()
        .filter(|building| building.kind == BuildingKind::Farm && building.complete)
        .map(|building| building.id)
        .collect();
    for farm in farms {
        world.wither_farm(farm);
    }
}
