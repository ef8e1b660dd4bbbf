//! Game balance and world generation parameters.
//!
//! Every field carries a default equal to the stock game, so a scenario file
//! only needs to spell out the values it wants to change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    agents::{Profession, Tool},
    buildings::BuildingKind,
    calendar::Season,
    ledger::{Amounts, CropKind, Resource},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub map: MapConfig,
    pub buildings: BuildingCatalog,
    pub professions: ProfessionCatalog,
    pub agents: AgentConfig,
    pub ledger: LedgerConfig,
    pub farming: FarmingConfig,
    pub seasons: Vec<SeasonConfig>,
    pub day_length: f32,
    /// Spawn a builder for every new construction site while there is room.
    pub auto_builder: bool,
    pub logging: LoggingConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            map: MapConfig::default(),
            buildings: BuildingCatalog::default(),
            professions: ProfessionCatalog::default(),
            agents: AgentConfig::default(),
            ledger: LedgerConfig::default(),
            farming: FarmingConfig::default(),
            seasons: vec![
                SeasonConfig::new(Season::Spring, 30.0),
                SeasonConfig::new(Season::Summer, 30.0),
                SeasonConfig::new(Season::Autumn, 30.0),
                SeasonConfig::new(Season::Winter, 30.0),
            ],
            day_length: 1.0,
            auto_builder: true,
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub size: u32,
    pub forest_chance: f64,
    /// Rolled only when the forest roll fails.
    pub dirt_chance: f64,
    pub river_amplitude: f32,
    pub river_wavenumber: f32,
    /// Lateral shift of the river axis from the map center, as a fraction of
    /// the initial map size.
    pub river_offset: f32,
    pub expansion_step: u32,
    pub expansion_cost: Amounts,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            size: 20,
            forest_chance: 0.1,
            dirt_chance: 0.05,
            river_amplitude: 2.0,
            river_wavenumber: 0.35,
            river_offset: -0.25,
            expansion_step: 5,
            expansion_cost: Amounts::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingSpec {
    pub cost: Amounts,
    pub build_time: f32,
    pub width: u32,
    pub depth: u32,
    pub production: Option<Amounts>,
    pub production_interval: f32,
    pub population_increase: u32,
}

impl Default for BuildingSpec {
    fn default() -> Self {
        Self {
            cost: Amounts::new(),
            build_time: 1.0,
            width: 1,
            depth: 1,
            production: None,
            production_interval: 0.0,
            population_increase: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingCatalog {
    pub farm: BuildingSpec,
    pub house: BuildingSpec,
    pub lumbermill: BuildingSpec,
    pub barn: BuildingSpec,
}

impl BuildingCatalog {
    pub fn spec(&self, kind: BuildingKind) -> &BuildingSpec {
        match kind {
            BuildingKind::Farm => &self.farm,
            BuildingKind::House => &self.house,
            BuildingKind::Lumbermill => &self.lumbermill,
            BuildingKind::Barn => &self.barn,
        }
    }
}

impl Default for BuildingCatalog {
    fn default() -> Self {
        Self {
            farm: BuildingSpec {
                cost: Amounts::new().with(Resource::Wood, 10.0),
                build_time: 3.0,
                width: 2,
                depth: 2,
                production: Some(Amounts::new().with(Resource::Food, 5.0)),
                production_interval: 10.0,
                population_increase: 0,
            },
            house: BuildingSpec {
                cost: Amounts::new()
                    .with(Resource::Wood, 20.0)
                    .with(Resource::Money, 100.0),
                build_time: 5.0,
                width: 2,
                depth: 2,
                production: None,
                production_interval: 0.0,
                population_increase: 2,
            },
            lumbermill: BuildingSpec {
                cost: Amounts::new()
                    .with(Resource::Wood, 30.0)
                    .with(Resource::Money, 200.0),
                build_time: 8.0,
                width: 3,
                depth: 3,
                production: Some(Amounts::new().with(Resource::Wood, 3.0)),
                production_interval: 15.0,
                population_increase: 0,
            },
            barn: BuildingSpec {
                cost: Amounts::new()
                    .with(Resource::Wood, 15.0)
                    .with(Resource::Money, 50.0),
                build_time: 4.0,
                width: 2,
                depth: 2,
                production: None,
                production_interval: 0.0,
                population_increase: 0,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProfessionSpec {
    /// Distance covered per tick while moving.
    pub move_speed: f32,
    pub work_duration: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfessionCatalog {
    pub none: ProfessionSpec,
    pub farmer: ProfessionSpec,
    pub builder: ProfessionSpec,
    pub lumberjack: ProfessionSpec,
}

impl ProfessionCatalog {
    pub fn spec(&self, profession: Profession) -> ProfessionSpec {
        match profession {
            Profession::Unassigned => self.none,
            Profession::Farmer => self.farmer,
            Profession::Builder => self.builder,
            Profession::Lumberjack => self.lumberjack,
        }
    }
}

impl Default for ProfessionCatalog {
    fn default() -> Self {
        Self {
            none: ProfessionSpec {
                move_speed: 0.04,
                work_duration: 0.0,
            },
            farmer: ProfessionSpec {
                move_speed: 0.05,
                work_duration: 5.0,
            },
            builder: ProfessionSpec {
                move_speed: 0.04,
                work_duration: 3.0,
            },
            lumberjack: ProfessionSpec {
                move_speed: 0.045,
                work_duration: 6.0,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub idle_search_delay: f32,
    pub energy_regen: f32,
    pub path_waypoints: usize,
    pub arrival_radius: f32,
    /// Half-width of the square around the map center where residents appear.
    pub spawn_spread: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            idle_search_delay: 2.0,
            energy_regen: 5.0,
            path_waypoints: 10,
            arrival_radius: 0.1,
            spawn_spread: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub food: f64,
    pub wood: f64,
    pub money: f64,
    pub population_cap: u32,
    pub food_per_resident: f64,
    pub seeds: BTreeMap<CropKind, u32>,
    pub tools: BTreeMap<Tool, u32>,
    pub watering_can_filled: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            food: 100.0,
            wood: 50.0,
            money: 1000.0,
            population_cap: 10,
            food_per_resident: 0.1,
            seeds: BTreeMap::from([(CropKind::Potato, 5)]),
            tools: BTreeMap::from([(Tool::Hoe, 1), (Tool::WateringCan, 1)]),
            watering_can_filled: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmingConfig {
    pub crop: CropKind,
    pub harvest_crop_yield: u32,
    pub overnight_drying: bool,
}

impl Default for FarmingConfig {
    fn default() -> Self {
        Self {
            crop: CropKind::Potato,
            harvest_crop_yield: 1,
            overnight_drying: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonConfig {
    pub season: Season,
    pub duration: f32,
}

impl SeasonConfig {
    pub fn new(season: Season, duration: f32) -> Self {
        Self { season, duration }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
