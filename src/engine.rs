use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    events::{Presenter, SimEvent, ViewCommand},
    snapshot::{SnapshotWriter, WorldSnapshot},
    systems::{CalendarSystem, ProductionSystem, ResidentSystem, UpkeepSystem},
    world::World,
};

/// Multiplier applied to every frame's time step.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum GameSpeed {
    Paused,
    #[default]
    Normal,
    Fast,
    VeryFast,
}

impl GameSpeed {
    pub fn multiplier(self) -> f32 {
        match self {
            GameSpeed::Paused => 0.0,
            GameSpeed::Normal => 1.0,
            GameSpeed::Fast => 2.0,
            GameSpeed::VeryFast => 3.0,
        }
    }

    /// The next setting on the speed button. Pausing is a separate toggle.
    pub fn cycle(self) -> GameSpeed {
        match self {
            GameSpeed::Paused => GameSpeed::Normal,
            GameSpeed::Normal => GameSpeed::Fast,
            GameSpeed::Fast => GameSpeed::VeryFast,
            GameSpeed::VeryFast => GameSpeed::Normal,
        }
    }
}

pub struct EngineSettings {
    pub scenario_name: String,
    pub snapshot_interval_ticks: u64,
    pub snapshot_dir: PathBuf,
    pub speed: GameSpeed,
}

pub struct EngineBuilder {
    settings: EngineSettings,
    systems: Vec<Box<dyn System>>,
    presenters: Vec<Box<dyn Presenter>>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            systems: Vec::new(),
            presenters: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    pub fn push_system(&mut self, system: impl System + 'static) {
        self.systems.push(Box::new(system));
    }

    pub fn with_presenter(mut self, presenter: impl Presenter + 'static) -> Self {
        self.presenters.push(Box::new(presenter));
        self
    }

    /// Residents, production, upkeep and calendar, in that order.
    pub fn with_standard_systems(self) -> Self {
        self.with_system(ResidentSystem::new())
            .with_system(ProductionSystem::new())
            .with_system(UpkeepSystem::new())
            .with_system(CalendarSystem::new())
    }

    pub fn build(self) -> Engine {
        Engine {
            systems: self.systems,
            presenters: self.presenters,
            snapshot_writer: SnapshotWriter::new(
                &self.settings.snapshot_dir,
                self.settings.snapshot_interval_ticks,
            ),
            settings: self.settings,
        }
    }
}

/// What one call to [`Engine::advance`] produced.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub tick: u64,
    pub dt: f32,
    pub events: Vec<SimEvent>,
    pub view: Vec<ViewCommand>,
}

impl TickReport {
    pub fn advanced(&self) -> bool {
        self.dt > 0.0
    }
}

/// Handed to the hook of [`Engine::run_with_hook`] after every tick.
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    pub snapshot: WorldSnapshot,
    pub events: Vec<SimEvent>,
    pub view: Vec<ViewCommand>,
}

pub struct Engine {
    systems: Vec<Box<dyn System>>,
    presenters: Vec<Box<dyn Presenter>>,
    snapshot_writer: SnapshotWriter,
    settings: EngineSettings,
}

impl Engine {
    pub fn speed(&self) -> GameSpeed {
        self.settings.speed
    }

    pub fn set_speed(&mut self, speed: GameSpeed) {
        debug!(?speed, "game speed changed");
        self.settings.speed = speed;
    }

    /// Advances the simulation by one frame of `frame_dt` game units, scaled
    /// by the current speed. Every system runs to completion before the
    /// outbox is drained and handed to the presenters.
    pub fn advance(&mut self, world: &mut World, frame_dt: f32) -> Result<TickReport> {
        let dt = frame_dt * self.settings.speed.multiplier();
        if dt <= 0.0 {
            return Ok(TickReport {
                tick: world.tick(),
                ..TickReport::default()
            });
        }

        let ctx = SystemContext {
            tick: world.tick() + 1,
            dt,
            scenario_name: &self.settings.scenario_name,
        };
        for system in &mut self.systems {
            system
                .run(&ctx, world)
                .with_context(|| format!("system '{}' failed", system.name()))?;
        }
        world.advance_time(dt);

        let (events, view) = world.outbox.drain();
        for presenter in &mut self.presenters {
            for event in &events {
                presenter.on_event(event);
            }
            for command in &view {
                presenter.apply(command);
            }
        }
        self.snapshot_writer
            .maybe_write(world, &self.settings.scenario_name)?;

        Ok(TickReport {
            tick: world.tick(),
            dt,
            events,
            view,
        })
    }

    /// One frame at the world's configured time step.
    pub fn step(&mut self, world: &mut World) -> Result<TickReport> {
        let dt = world.dt();
        self.advance(world, dt)
    }

    pub fn run(&mut self, world: &mut World, ticks: u64) -> Result<()> {
        for _ in 0..ticks {
            self.step(world)?;
        }
        Ok(())
    }

    pub fn run_with_hook<F>(&mut self, world: &mut World, ticks: u64, mut hook: F) -> Result<()>
    where
        F: FnMut(Frame),
    {
        for _ in 0..ticks {
            let report = self.step(world)?;
            hook(Frame {
                snapshot: world.snapshot(),
                events: report.events,
                view: report.view,
            });
        }
        Ok(())
    }
}

pub struct SystemContext<'a> {
    pub tick: u64,
    pub dt: f32,
    pub scenario_name: &'a str,
}

pub trait System: Send {
    fn name(&self) -> &str;
    fn run(&mut self, ctx: &SystemContext, world: &mut World) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_multipliers() {
        assert_eq!(GameSpeed::Paused.multiplier(), 0.0);
        assert_eq!(GameSpeed::VeryFast.multiplier(), 3.0);
        assert_eq!(GameSpeed::VeryFast.cycle(), GameSpeed::Normal);
        assert_eq!(GameSpeed::Paused.cycle(), GameSpeed::Normal);
    }
}
