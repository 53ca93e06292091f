use std::collections::HashMap;

use frontier::{
    engine::{Driver, EngineSettings},
    grid::{land_value, BuildingType, MAX_LAND_VALUE, MAX_LEVEL, MIN_LAND_VALUE},
    scenario::ScenarioLoader,
    systems,
    transactions::{apply_tool, TransactionOutcome},
    world::World,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn scenario_loader() -> ScenarioLoader {
    ScenarioLoader::new(env!("CARGO_MANIFEST_DIR"))
}

fn settings(seed: u64) -> EngineSettings {
    EngineSettings {
        scenario_name: "frontier".into(),
        seed,
    }
}

fn assert_invariants(world: &World) {
    let grid = world.grid();
    let size = grid.size() as i32;
    assert_eq!(grid.tiles().count(), grid.size() * grid.size());
    for (index, tile) in grid.tiles().enumerate() {
        assert_eq!((tile.x, tile.y), (index as i32 % size, index as i32 / size));
        assert!((1..=MAX_LEVEL).contains(&tile.level));
        assert!((MIN_LAND_VALUE..=MAX_LAND_VALUE).contains(&tile.land_value));
        let expected = land_value(grid, tile.x, tile.y);
        assert!(
            (tile.land_value - expected).abs() < 1e-9,
            "stale land value at ({}, {})",
            tile.x,
            tile.y
        );
    }
    let stats = world.stats();
    for value in [stats.money, stats.wood, stats.stone, stats.food, stats.population] {
        assert!(value >= 0.0, "negative ledger entry in {stats:?}");
    }
    for hostile in world.hostiles() {
        assert!(hostile.hp > 0.0 && hostile.hp <= hostile.max_hp);
    }
}

#[test]
fn shipped_scenario_applies_opening_builds() {
    let scenario = scenario_loader()
        .load("scenarios/frontier.yaml")
        .expect("scenario should load");
    let world = scenario.build_world();
    assert_eq!(world.grid().count_buildings(BuildingType::Residential), 2);
    assert_eq!(world.grid().count_buildings(BuildingType::Farm), 2);
    assert_eq!(world.grid().count_buildings(BuildingType::Road), 1);
    assert!((world.stats().money - 570.0).abs() < 1e-9);
    assert!((world.stats().wood - 70.0).abs() < 1e-9);
    assert_invariants(&world);
}

#[test]
fn headless_runs_are_deterministic() {
    let scenario = scenario_loader().load("scenarios/frontier.yaml").unwrap();
    let run = || {
        let mut world = scenario.build_world();
        let mut engine = systems::standard_engine(settings(scenario.seed)).build();
        engine.run(&mut world, 80).unwrap();
        world.snapshot()
    };
    let a = run();
    let b = run();
    assert_eq!(a.stats, b.stats);
    assert_eq!(a.hostiles, b.hostiles);
    assert_eq!(a.explorers, b.explorers);
    assert!(a.grid.tiles().eq(b.grid.tiles()));
    assert_eq!(a.stats.day, 80);
}

#[test]
fn settlement_grows_from_the_opening() {
    let scenario = scenario_loader().load("scenarios/frontier.yaml").unwrap();
    let mut world = scenario.build_world();
    let mut engine = systems::standard_engine(settings(scenario.seed)).build();
    engine.run(&mut world, 10).unwrap();
    assert!(world.stats().population > 0.0);
    assert!(world.stats().population <= 40.0);
    assert_eq!(
        world.census().get(&BuildingType::Residential).copied(),
        Some(2)
    );
}

#[test]
fn random_play_preserves_invariants() {
    let scenario = scenario_loader().load("scenarios/frontier.yaml").unwrap();
    let mut world = scenario.build_world();
    world.stats_mut().money = 20_000.0;
    world.stats_mut().wood = 2_000.0;
    world.stats_mut().stone = 2_000.0;
    let mut engine = systems::standard_engine(settings(7)).build();
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let size = world.grid().size() as i32;

    let mut last_era = world.stats().era;
    let mut hp_seen: HashMap<u64, f64> = HashMap::new();

    for round in 0..300 {
        let x = rng.gen_range(-1..=size);
        let y = rng.gen_range(-1..=size);
        let tool = BuildingType::ALL[rng.gen_range(0..BuildingType::ALL.len())];
        let before = world.stats().clone();
        let version = world.grid().version();
        let level_before = world.grid().get(x, y).map(|tile| tile.level);

        let outcome = apply_tool(&mut world, x, y, tool);
        match outcome {
            TransactionOutcome::Rejected { .. } => {
                assert_eq!(world.stats(), &before);
                assert_eq!(world.grid().version(), version);
            }
            TransactionOutcome::Upgraded { level, .. } => {
                assert_eq!(Some(level), level_before.map(|l| l + 1));
            }
            _ => {}
        }
        assert_invariants(&world);

        for driver in [Driver::Hostiles, Driver::Explorers] {
            engine.step(driver, &mut world).unwrap();
        }
        if round % 5 == 0 {
            engine.step(Driver::Economy, &mut world).unwrap();
            assert!(world.stats().era >= last_era);
            last_era = world.stats().era;
        }
        for hostile in world.hostiles() {
            if let Some(previous) = hp_seen.insert(hostile.id, hostile.hp) {
                assert!(hostile.hp <= previous, "hostile {} healed", hostile.id);
            }
        }
        assert_invariants(&world);
    }
}
