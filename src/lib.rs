pub mod agents;
pub mod buildings;
pub mod calendar;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod farm;
pub mod grid;
pub mod ledger;
pub mod rng;
pub mod scenario;
pub mod snapshot;
pub mod systems;
pub mod web;
pub mod world;

pub use config::GameConfig;
pub use engine::{Engine, EngineBuilder, EngineSettings, GameSpeed};
pub use error::SimError;
pub use scenario::{Scenario, ScenarioLoader};
pub use world::World;
