//! Crop lifecycle of a farm plot.
//!
//! A plot only moves while a farmer stands on it and works. Each stage waits
//! for its timer and for whatever the farmer has to bring along: a hoe to
//! till, a bag of seeds to sow, a watering can and water to water. When the
//! farmer is missing something the machine answers with the errand that would
//! fetch it, and the resident scheduler carries it out.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    agents::{AgentId, Errand, Tool},
    buildings::{BuildingId, BuildingKind},
    events::{EffectKind, Severity, SimEvent},
    ledger::{Amounts, CropKind, CropYield, Resource},
    world::World,
};

/// Time spent tilling bare soil before it counts as tilled.
pub const TILL_TIME: f32 = 2.0;
/// Time a ripe crop stands before it is harvested.
pub const HARVEST_TIME: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FarmState {
    Barren,
    Tilled,
    Seeded,
    Watered,
    Sprouted,
    GrowingEarly,
    GrowingMid,
    Ready,
}

impl FarmState {
    pub const ALL: [FarmState; 8] = [
        FarmState::Barren,
        FarmState::Tilled,
        FarmState::Seeded,
        FarmState::Watered,
        FarmState::Sprouted,
        FarmState::GrowingEarly,
        FarmState::GrowingMid,
        FarmState::Ready,
    ];

    /// Nominal length of the stage.
    pub fn duration(self) -> f32 {
        match self {
            FarmState::Barren | FarmState::Ready => 0.0,
            FarmState::Tilled | FarmState::Seeded => 2.0,
            FarmState::Watered => 3.0,
            FarmState::Sprouted | FarmState::GrowingEarly | FarmState::GrowingMid => 5.0,
        }
    }

    /// Work needed on this stage before the plot may leave it.
    pub fn work_time(self) -> f32 {
        match self {
            FarmState::Barren => TILL_TIME,
            FarmState::Ready => HARVEST_TIME,
            other => other.duration(),
        }
    }

    pub fn next(self) -> FarmState {
        match self {
            FarmState::Barren => FarmState::Tilled,
            FarmState::Tilled => FarmState::Seeded,
            FarmState::Seeded => FarmState::Watered,
            FarmState::Watered => FarmState::Sprouted,
            FarmState::Sprouted => FarmState::GrowingEarly,
            FarmState::GrowingEarly => FarmState::GrowingMid,
            FarmState::GrowingMid => FarmState::Ready,
            FarmState::Ready => FarmState::Barren,
        }
    }

    /// Stage a plot falls back to when it dries out overnight.
    pub fn dried(self) -> Option<FarmState> {
        match self {
            FarmState::Watered => Some(FarmState::Seeded),
            FarmState::Sprouted => Some(FarmState::Seeded),
            FarmState::GrowingEarly => Some(FarmState::Sprouted),
            FarmState::GrowingMid => Some(FarmState::GrowingEarly),
            _ => None,
        }
    }

    /// Stages that drink from the shared watering can.
    pub fn is_growing(self) -> bool {
        matches!(
            self,
            FarmState::Sprouted | FarmState::GrowingEarly | FarmState::GrowingMid
        )
    }
}

impl fmt::Display for FarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FarmState::Barren => "barren",
            FarmState::Tilled => "tilled",
            FarmState::Seeded => "seeded",
            FarmState::Watered => "watered",
            FarmState::Sprouted => "sprouted",
            FarmState::GrowingEarly => "growing (early)",
            FarmState::GrowingMid => "growing (mid)",
            FarmState::Ready => "ready",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmPlot {
    pub state: FarmState,
    pub state_timer: f32,
    pub crop: CropKind,
    pub seed_warning_shown: bool,
    pub water_warning_shown: bool,
    /// Set once the player was told a barn, river or tool is missing.
    pub supply_warning_shown: bool,
}

impl FarmPlot {
    pub fn new(crop: CropKind) -> Self {
        Self {
            state: FarmState::Barren,
            state_timer: 0.0,
            crop,
            seed_warning_shown: false,
            water_warning_shown: false,
            supply_warning_shown: false,
        }
    }

    /// A growing crop that has waited out its stage with an empty can.
    pub fn is_thirsty(&self) -> bool {
        self.state.is_growing() && self.state_timer >= self.state.work_time()
    }
}

/// What the scheduler should do with the farmer after a tick of farm work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FarmOutcome {
    Continue,
    Errand(Errand),
    /// The farmer gives up the plot and goes idle.
    Release,
}

impl World {
    /// One tick of `agent` working `farm`.
    pub fn tend_farm(&mut self, agent: AgentId, farm: BuildingId, dt: f32) -> FarmOutcome {
        let Some(worker) = self.agents.get(&agent) else {
            return FarmOutcome::Release;
        };
        let tool = worker.tool;
        let has_seeds = worker.has_seeds;
        let has_water = worker.has_water;

        let seeds_left = match self.buildings.get(&farm).and_then(|b| b.farm.as_ref()) {
            Some(plot) => self.ledger.seed_count(plot.crop) > 0,
            None => return FarmOutcome::Release,
        };
        let can_filled = self.ledger.watering_can_filled;
        let Some(plot) = self.plot_mut(farm) else {
            return FarmOutcome::Release;
        };
        let state = plot.state;
        if seeds_left {
            plot.seed_warning_shown = false;
        }
        let watered = match state {
            FarmState::Seeded => has_water,
            other => other.is_growing() && can_filled,
        };
        if watered {
            plot.water_warning_shown = false;
        }

        match state {
            FarmState::Barren => {
                if tool != Some(Tool::Hoe) {
                    return FarmOutcome::Errand(Errand::FetchHoe);
                }
                if self.work_plot(farm, dt) {
                    self.put_back(agent, Tool::Hoe);
                    self.change_farm_state(farm, FarmState::Tilled);
                    self.play_farm_effect(farm, EffectKind::Till);
                }
                FarmOutcome::Continue
            }
            FarmState::Tilled => {
                if !has_seeds {
                    return FarmOutcome::Errand(Errand::FetchSeeds);
                }
                if self.work_plot(farm, dt) {
                    self.plant(agent, farm);
                }
                FarmOutcome::Continue
            }
            FarmState::Seeded => {
                if tool != Some(Tool::WateringCan) {
                    return FarmOutcome::Errand(Errand::FetchWateringCan);
                }
                if !has_water {
                    return FarmOutcome::Errand(Errand::FetchWater);
                }
                if self.work_plot(farm, dt) {
                    if let Some(worker) = self.agents.get_mut(&agent) {
                        worker.has_water = false;
                    }
                    self.put_back(agent, Tool::WateringCan);
                    self.change_farm_state(farm, FarmState::Watered);
                    self.play_farm_effect(farm, EffectKind::Water);
                }
                FarmOutcome::Continue
            }
            FarmState::Watered => {
                if self.work_plot(farm, dt) {
                    self.change_farm_state(farm, FarmState::Sprouted);
                }
                FarmOutcome::Continue
            }
            FarmState::Sprouted | FarmState::GrowingEarly | FarmState::GrowingMid => {
                if !self.work_plot(farm, dt) {
                    return FarmOutcome::Continue;
                }
                if self.ledger.drain_watering_can() {
                    self.put_back(agent, Tool::WateringCan);
                    self.play_farm_effect(farm, EffectKind::Water);
                    self.change_farm_state(farm, state.next());
                    return FarmOutcome::Continue;
                }
                self.warn_thirsty(farm);
                if state == FarmState::Sprouted {
                    // Soft path: stay on the plot and go refill.
                    if tool == Some(Tool::WateringCan) {
                        FarmOutcome::Errand(Errand::FetchWater)
                    } else {
                        FarmOutcome::Errand(Errand::FetchWateringCan)
                    }
                } else {
                    debug!(%agent, building = %farm, %state, "farmer gives up a dry plot");
                    FarmOutcome::Release
                }
            }
            FarmState::Ready => {
                if self.work_plot(farm, dt) {
                    self.harvest(farm);
                }
                FarmOutcome::Continue
            }
        }
    }

    /// Moves a finished farm one stage forward. Anything else is refused.
    pub fn change_farm_state(&mut self, farm: BuildingId, to: FarmState) -> bool {
        let Some(building) = self.buildings.get_mut(&farm) else {
            return false;
        };
        if !building.complete {
            return false;
        }
        let Some(plot) = building.farm.as_mut() else {
            return false;
        };
        let from = plot.state;
        if from.next() != to {
            return false;
        }
        plot.state = to;
        plot.state_timer = 0.0;
        debug!(building = %farm, %from, %to, "farm state changed");
        self.emit(SimEvent::FarmStateChanged {
            building: farm,
            from,
            to,
        });
        true
    }

    /// Overnight drying. The only way a plot moves backwards.
    pub fn wither_farm(&mut self, farm: BuildingId) -> bool {
        let Some(plot) = self.plot_mut(farm) else {
            return false;
        };
        let from = plot.state;
        let Some(to) = from.dried() else {
            return false;
        };
        plot.state = to;
        plot.state_timer = 0.0;
        info!(building = %farm, %from, %to, "farm dried out overnight");
        self.outbox.notify(
            format!("{farm} dried out overnight and needs water"),
            Severity::Warning,
        );
        self.emit(SimEvent::FarmStateChanged {
            building: farm,
            from,
            to,
        });
        true
    }

    /// Errand a farmer should run before starting work on `farm`, if any.
    ///
    /// A thirsty plot with an empty can would only send the farmer home again,
    /// so the commute begins with a trip for water instead.
    pub fn farm_errand_before_work(&self, agent: AgentId, farm: BuildingId) -> Option<Errand> {
        let plot = self.buildings.get(&farm)?.farm.as_ref()?;
        let worker = self.agents.get(&agent)?;
        if !plot.is_thirsty() || self.ledger.watering_can_filled {
            return None;
        }
        if worker.tool == Some(Tool::WateringCan) {
            Some(Errand::FetchWater)
        } else {
            Some(Errand::FetchWateringCan)
        }
    }

    /// Hands `tool` back to the barn stock if the farmer is holding it.
    fn put_back(&mut self, agent: AgentId, tool: Tool) {
        let held = self.agents.get(&agent).and_then(|worker| worker.tool);
        if held == Some(tool) {
            self.return_tool(agent);
            debug!(%agent, %tool, "tool returned to the barn");
        }
    }

    fn plot_mut(&mut self, farm: BuildingId) -> Option<&mut FarmPlot> {
        self.buildings
            .get_mut(&farm)
            .filter(|building| building.complete)
            .and_then(|building| building.farm.as_mut())
    }

    /// Adds work time and reports whether the stage is done.
    fn work_plot(&mut self, farm: BuildingId, dt: f32) -> bool {
        match self.plot_mut(farm) {
            Some(plot) => {
                plot.state_timer += dt;
                plot.state_timer >= plot.state.work_time()
            }
            None => false,
        }
    }

    fn plant(&mut self, agent: AgentId, farm: BuildingId) {
        let Some(crop) = self.plot_mut(farm).map(|plot| plot.crop) else {
            return;
        };
        if self.ledger.take_seed(crop) {
            if let Some(worker) = self.agents.get_mut(&agent) {
                worker.has_seeds = false;
            }
            self.change_farm_state(farm, FarmState::Seeded);
            self.play_farm_effect(farm, EffectKind::Seed);
            self.outbox
                .notify(format!("Planted {crop} on {farm}"), Severity::Success);
            return;
        }
        let Some(plot) = self.plot_mut(farm) else {
            return;
        };
        plot.state_timer = 0.0;
        if !plot.seed_warning_shown {
            plot.seed_warning_shown = true;
            self.outbox
                .notify(format!("Out of {crop} seeds"), Severity::Warning);
        }
    }

    fn warn_thirsty(&mut self, farm: BuildingId) {
        let Some(plot) = self.plot_mut(farm) else {
            return;
        };
        if plot.water_warning_shown {
            return;
        }
        plot.water_warning_shown = true;
        self.outbox
            .notify(format!("{farm} needs water"), Severity::Warning);
    }

    fn harvest(&mut self, farm: BuildingId) {
        let Some(crop) = self.plot_mut(farm).map(|plot| plot.crop) else {
            return;
        };
        let food = self
            .config
            .buildings
            .farm
            .production
            .as_ref()
            .map(|table| table.get(Resource::Food))
            .unwrap_or(0.0);
        let quantity = self.config.farming.harvest_crop_yield;
        info!(building = %farm, food, %crop, quantity, "harvest");
        self.emit(SimEvent::ResourceProduced {
            building: farm,
            kind: BuildingKind::Farm,
            resources: Amounts::new().with(Resource::Food, food),
            crop: Some(CropYield { crop, quantity }),
        });
        self.change_farm_state(farm, FarmState::Barren);
        self.play_farm_effect(farm, EffectKind::Harvest);
    }

    fn play_farm_effect(&mut self, farm: BuildingId, effect: EffectKind) {
        if let Some(building) = self.buildings.get(&farm) {
            let position = building.position();
            self.outbox.play_effect(effect, position);
        }
    }
}
