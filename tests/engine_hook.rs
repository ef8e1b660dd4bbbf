use hamlet::{
    engine::{Engine, EngineBuilder, EngineSettings, GameSpeed},
    events::SimEvent,
    scenario::{Scenario, ScenarioLoader},
};
use std::path::Path;
use tempfile::tempdir;

fn load(file: &str) -> Scenario {
    ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"))
        .load(file)
        .expect("scenario should load")
}

fn build_engine(scenario: &Scenario, snapshot_interval_ticks: u64, dir: &Path) -> Engine {
    let settings = EngineSettings {
        scenario_name: scenario.name.clone(),
        snapshot_interval_ticks,
        snapshot_dir: dir.to_path_buf(),
        speed: GameSpeed::Normal,
    };
    EngineBuilder::new(settings).with_standard_systems().build()
}

#[test]
fn engine_runs_hook_each_tick() {
    let scenario = load("scenarios/starter_village.yaml");
    let mut world = scenario.build_world().expect("world should build");
    let temp = tempdir().expect("tempdir");
    let mut engine = build_engine(&scenario, 0, temp.path());

    let mut ticks = Vec::new();
    let mut first_events = Vec::new();
    engine
        .run_with_hook(&mut world, 6, |frame| {
            if frame.snapshot.tick == 1 {
                first_events = frame.events.clone();
            }
            ticks.push(frame.snapshot.tick);
        })
        .expect("run succeeds");

    assert_eq!(ticks, vec![1, 2, 3, 4, 5, 6]);
    let placed = first_events
        .iter()
        .filter(|event| matches!(event, SimEvent::BuildingPlaced { .. }))
        .count();
    assert_eq!(placed, 5, "setup events reach the first frame");
}

#[test]
fn same_seed_gives_the_same_village() {
    let scenario = load("scenarios/starter_village.yaml");
    let temp = tempdir().expect("tempdir");

    let run = || {
        let mut world = scenario.build_world().expect("world should build");
        let mut engine = build_engine(&scenario, 0, temp.path());
        engine.run(&mut world, 300).expect("run succeeds");
        serde_json::to_string(&world.snapshot()).expect("snapshot serializes")
    };

    assert_eq!(run(), run());
}

#[test]
fn paused_engine_leaves_the_world_alone() {
    let scenario = load("scenarios/farm_cycle.yaml");
    let mut world = scenario.build_world().expect("world should build");
    let temp = tempdir().expect("tempdir");
    let mut engine = build_engine(&scenario, 0, temp.path());
    engine.set_speed(GameSpeed::Paused);

    let report = engine.step(&mut world).expect("step succeeds");

    assert!(!report.advanced());
    assert_eq!(world.tick(), 0);
    assert!(report.events.is_empty());

    engine.set_speed(GameSpeed::Fast);
    let report = engine.step(&mut world).expect("step succeeds");
    assert!(report.advanced());
    assert_eq!(world.tick(), 1);
    assert!((world.elapsed() - 0.2).abs() < 1e-6);
}

#[test]
fn snapshots_land_on_interval_ticks() {
    let scenario = load("scenarios/starter_village.yaml");
    let mut world = scenario.build_world().expect("world should build");
    let temp = tempdir().expect("tempdir");
    let mut engine = build_engine(&scenario, 5, temp.path());

    engine.run(&mut world, 12).expect("run succeeds");

    let dir = temp.path().join(&scenario.name);
    assert!(dir.join("tick_000005.json").exists());
    assert!(dir.join("tick_000010.json").exists());
    assert!(!dir.join("tick_000012.json").exists());

    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.join("tick_000010.json")).expect("snapshot readable"),
    )
    .expect("snapshot is json");
    assert_eq!(json["scenario"], "starter_village");
    assert_eq!(json["tick"], 10);
    assert_eq!(json["buildings"].as_array().map(Vec::len), Some(5));
    assert_eq!(json["agents"].as_array().map(Vec::len), Some(2));
}
