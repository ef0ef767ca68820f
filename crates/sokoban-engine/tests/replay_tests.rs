//! Recording a session and replaying it from its JSON log.

use sokoban_engine::prelude::*;
use sokoban_engine::replay::{replay, ReplayEntry, ReplayLog, ReplayRecorder};

fn p(x: i32, y: i32) -> Position {
    Position::new(x, y)
}

fn gate_puzzle() -> Vec<u8> {
    let mut level = Level::new(6, 4);
    let switch = level.create(ObjectKind::Switch { persistent: true }, p(2, 1)).unwrap();
    let gate = level
        .create(ObjectKind::GateBase { default_up: false }, p(4, 1))
        .unwrap();
    level
        .link(Structure::Single(SingleSwitchLink {
            switch,
            gates: vec![gate],
        }))
        .unwrap();
    let sticky = ObjectKind::Box {
        color: Color::GREEN,
        sticky: true,
    };
    level.create(sticky, p(1, 1)).unwrap();
    level.create(sticky, p(1, 3)).unwrap();
    level.create(ObjectKind::Player, p(0, 1)).unwrap();
    encode(&level, MapFormat::Extended).unwrap()
}

fn session() -> Vec<StepInput> {
    use Direction::*;
    [Right, Down, Down, Right, Up, Left, Right]
        .into_iter()
        .map(StepInput::Move)
        .chain([StepInput::Undo, StepInput::Undo, StepInput::Move(Up)])
        .collect()
}

#[test]
fn recorded_session_replays_from_json() {
    let (mut recorder, mut engine) =
        ReplayRecorder::start(gate_puzzle(), MapFormat::Extended, EngineConfig::default(), 3).unwrap();
    for input in session() {
        recorder.record_step(input, Some(engine.state_hash()));
        engine.step(input);
    }
    let log = recorder.finish();
    assert_eq!(log.total_steps, session().len() as u64);

    let json = serde_json::to_string_pretty(&log).unwrap();
    let log: ReplayLog = serde_json::from_str(&json).unwrap();

    let result = replay(&log).unwrap();
    assert!(result.completed, "{:?}", result.first_divergence);
    assert_eq!(result.steps_replayed, log.total_steps);
    assert_eq!(result.final_hash, engine.state_hash());
}

#[test]
fn replay_with_a_different_settle_mode_still_matches_here() {
    let config = EngineConfig {
        settle: SettleMode::FixedPoint { max_passes: 8 },
        ..Default::default()
    };
    let (mut recorder, mut engine) =
        ReplayRecorder::start(gate_puzzle(), MapFormat::Extended, config, 0).unwrap();
    for input in session() {
        recorder.record_step(input, Some(engine.state_hash()));
        engine.step(input);
    }
    let log = recorder.finish();
    let checkpoints = log
        .entries
        .iter()
        .filter(|e| matches!(e, ReplayEntry::Checkpoint { .. }))
        .count();
    assert_eq!(checkpoints, session().len());

    let result = replay(&log).unwrap();
    assert!(result.completed);
    assert_eq!(result.final_hash, engine.state_hash());
}

#[test]
fn corrupted_level_bytes_fail_replay() {
    let (recorder, _) =
        ReplayRecorder::start(gate_puzzle(), MapFormat::Extended, EngineConfig::default(), 1).unwrap();
    let mut log = recorder.finish();
    log.level.truncate(3);
    let err = replay(&log).unwrap_err();
    assert!(err.to_string().contains("decode"));
}
