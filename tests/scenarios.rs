use hamlet::{
    agents::{AgentId, AgentState, Errand, Profession, Tool},
    buildings::{BuildingId, BuildingKind},
    config::GameConfig,
    engine::{Engine, EngineBuilder, EngineSettings, GameSpeed},
    error::SimError,
    events::SimEvent,
    farm::FarmState,
    grid::{Position, Tile},
    ledger::Resource,
    scenario::ScenarioLoader,
    world::World,
};

fn build_engine(name: &str) -> Engine {
    let settings = EngineSettings {
        scenario_name: name.to_string(),
        snapshot_interval_ticks: 0,
        snapshot_dir: std::env::temp_dir(),
        speed: GameSpeed::Normal,
    };
    EngineBuilder::new(settings).with_standard_systems().build()
}

fn open_config() -> GameConfig {
    let mut config = GameConfig::default();
    config.map.forest_chance = 0.0;
    config.auto_builder = false;
    config
}

/// A finished barn at (15, 15) and a finished farm at (10, 10).
fn barn_and_farm(config: GameConfig) -> (World, BuildingId) {
    let mut world = World::new(config, 17, 0.1);
    let barn = world.place_building(BuildingKind::Barn, 15, 15).unwrap();
    world.complete_building(barn);
    let farm = world.place_building(BuildingKind::Farm, 10, 10).unwrap();
    world.complete_building(farm);
    (world, farm)
}

fn put_to_work(world: &mut World, farm: BuildingId) -> AgentId {
    let agent = world.create_resident("Farmer", Profession::Farmer, Position::new(10.0, 10.0));
    assert!(world.assign_work(agent, farm));
    world.agents.get_mut(&agent).unwrap().state = AgentState::Working;
    agent
}

#[test]
fn farm_runs_a_full_cycle_to_one_harvest() {
    let loader = ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"));
    let scenario = loader
        .load("scenarios/farm_cycle.yaml")
        .expect("scenario should load");
    let mut world = scenario.build_world().expect("world should build");
    let mut engine = build_engine(&scenario.name);
    let farm = world
        .buildings
        .values()
        .find(|building| building.kind == BuildingKind::Farm)
        .map(|building| building.id)
        .unwrap();

    let mut produced = Vec::new();
    let mut reached_ready = false;
    let mut visited = vec![FarmState::Barren];
    for _ in 0..scenario.ticks(None) {
        let report = engine.step(&mut world).expect("tick succeeds");
        for event in report.events {
            match event {
                SimEvent::ResourceProduced {
                    building,
                    resources,
                    crop,
                    ..
                } if building == farm => produced.push((resources, crop)),
                SimEvent::FarmStateChanged { building, from, to } if building == farm => {
                    assert_eq!(from.next(), to, "farm skipped a stage");
                    if to == FarmState::Ready {
                        reached_ready = true;
                    }
                    visited.push(to);
                }
                _ => {}
            }
        }
        assert!(world.audit().is_empty(), "{:?}", world.audit());
    }

    assert!(reached_ready);
    assert_eq!(produced.len(), 1);
    let (resources, crop) = &produced[0];
    assert_eq!(resources.get(Resource::Food), 5.0);
    assert_eq!(crop.map(|c| c.quantity), Some(1));
    assert_eq!(
        &visited[..9],
        &[
            FarmState::Barren,
            FarmState::Tilled,
            FarmState::Seeded,
            FarmState::Watered,
            FarmState::Sprouted,
            FarmState::GrowingEarly,
            FarmState::GrowingMid,
            FarmState::Ready,
            FarmState::Barren,
        ]
    );
    assert_eq!(world.ledger.seed_count(hamlet::ledger::CropKind::Potato), 0);
}

#[test]
fn unaffordable_house_is_not_placed() {
    let mut config = open_config();
    config.ledger.wood = 5.0;
    config.ledger.money = 0.0;
    let mut world = World::new(config, 3, 0.1);

    let err = world.build(BuildingKind::House, 12, 12).unwrap_err();

    assert!(matches!(err, SimError::InsufficientResources { .. }));
    assert!(world.buildings.is_empty());
    assert!(world.grid.tiles().all(|tile| !tile.occupied && tile.building.is_none()));
    assert_eq!(world.ledger.wood, 5.0);
}

#[test]
fn seeded_farm_sends_farmer_to_barn_then_river() {
    let (mut world, farm) = barn_and_farm(open_config());
    assert!(world.change_farm_state(farm, FarmState::Tilled));
    assert!(world.change_farm_state(farm, FarmState::Seeded));
    let agent = put_to_work(&mut world, farm);
    let mut engine = build_engine("scenario_c");

    let mut errands = Vec::new();
    let mut fetched_water = false;
    let mut resumed = false;
    for _ in 0..10_000 {
        let report = engine.step(&mut world).expect("tick succeeds");
        for event in &report.events {
            match event {
                SimEvent::ErrandStarted { errand, .. } => errands.push(*errand),
                SimEvent::ErrandFinished {
                    errand: Errand::FetchWater,
                    success: true,
                    ..
                } => fetched_water = true,
                _ => {}
            }
        }
        let resident = &world.agents[&agent];
        if fetched_water && resident.state == AgentState::Working && resident.journey.is_none() {
            resumed = true;
            break;
        }
    }

    assert!(resumed);
    assert_eq!(errands, vec![Errand::FetchWateringCan, Errand::FetchWater]);
    let resident = &world.agents[&agent];
    assert!(resident.has_water);
    assert_eq!(resident.workplace, Some(farm));
    assert_eq!(world.buildings[&farm].worker, Some(agent));
    let water_tile = world
        .grid
        .nearest(hamlet::grid::TerrainKind::Water, Position::new(15.0, 15.0));
    assert!(water_tile.is_some());
}

#[test]
fn demolishing_a_worked_farm_frees_the_farmer() {
    let (mut world, farm) = barn_and_farm(open_config());
    let agent = put_to_work(&mut world, farm);

    assert!(world.demolish(11, 11));

    let resident = &world.agents[&agent];
    assert_eq!(resident.workplace, None);
    assert_eq!(resident.state, AgentState::Idle);
    assert!(world.grid.tiles().all(|tile| tile.building != Some(farm)));
    assert!(world.audit().is_empty());
}

#[test]
fn demolishing_a_farm_mid_errand_frees_the_farmer() {
    let (mut world, farm) = barn_and_farm(open_config());
    let agent = put_to_work(&mut world, farm);
    let mut engine = build_engine("scenario_d");

    engine.step(&mut world).unwrap();
    assert!(world.agents[&agent].journey.is_some());

    assert!(world.demolish(10, 10));

    let resident = &world.agents[&agent];
    assert_eq!(resident.workplace, None);
    assert_eq!(resident.journey, None);
    assert_eq!(resident.state, AgentState::Idle);
    assert!(world.audit().is_empty());

    engine.run(&mut world, 500).unwrap();
    assert!(world.audit().is_empty());
}

#[test]
fn expansion_keeps_the_original_tiles() {
    let mut world = World::new(GameConfig::default(), 99, 0.1);
    let farm = world.place_building(BuildingKind::Farm, 16, 16);
    let before: Vec<Tile> = world.grid.tiles().cloned().collect();
    assert_eq!(before.len(), 400);

    let added = world.expand_map(25).unwrap();

    assert_eq!(added, 225);
    assert_eq!(world.grid.len(), 625);
    for tile in &before {
        assert_eq!(world.grid.tile_at(tile.pos.x, tile.pos.z), Some(tile));
    }
    if let Ok(farm) = farm {
        assert_eq!(world.grid.tile_at(16, 16).unwrap().building, Some(farm));
    }
}

#[test]
fn two_farmers_share_the_barn_tools_and_keep_harvesting() {
    let mut config = open_config();
    config.ledger.seeds = [(hamlet::ledger::CropKind::Potato, 50)].into_iter().collect();
    let (mut world, north) = barn_and_farm(config);
    let south = world.place_building(BuildingKind::Farm, 10, 6).unwrap();
    world.complete_building(south);
    world.create_resident("Ada", Profession::Farmer, Position::new(10.0, 10.0));
    world.create_resident("Bo", Profession::Farmer, Position::new(10.0, 6.0));
    let mut engine = build_engine("shared_tools");

    let mut harvests = std::collections::BTreeMap::new();
    for tick in 0..60_000 {
        let report = engine.step(&mut world).expect("tick succeeds");
        for event in &report.events {
            if let SimEvent::ResourceProduced { building, .. } = event {
                *harvests.entry(*building).or_insert(0u32) += 1;
            }
        }
        if tick % 100 == 0 {
            assert!(world.audit().is_empty(), "{:?}", world.audit());
        }
        for tool in [Tool::Hoe, Tool::WateringCan] {
            let held = world
                .agents
                .values()
                .filter(|agent| agent.tool == Some(tool))
                .count() as u32;
            assert_eq!(world.ledger.tool_stock(tool) + held, 1, "{tool} went missing");
        }
    }

    let north_count = harvests.get(&north).copied().unwrap_or(0);
    let south_count = harvests.get(&south).copied().unwrap_or(0);
    assert!(north_count >= 1, "north farm never harvested");
    assert!(south_count >= 1, "south farm never harvested");
    assert!(north_count + south_count >= 4, "harvests stalled at {harvests:?}");
}
