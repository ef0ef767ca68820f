//! Map files on disk: save/load round trips in both formats, and playing a
//! loaded level.

use std::path::PathBuf;

use sokoban_engine::prelude::*;

fn p(x: i32, y: i32) -> Position {
    Position::new(x, y)
}

/// A fresh scratch directory per test.
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sokoban-maps-{}-{name}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn puzzle() -> Level {
    let mut level = Level::new(7, 5);
    for y in 0..5 {
        if y != 2 {
            level.create(ObjectKind::Wall, p(3, y)).unwrap();
        }
    }
    let gate = level
        .create(ObjectKind::GateBase { default_up: true }, p(3, 2))
        .unwrap();
    let switch = level.create(ObjectKind::Switch { persistent: false }, p(1, 3)).unwrap();
    level
        .link(Structure::Single(SingleSwitchLink {
            switch,
            gates: vec![gate],
        }))
        .unwrap();
    let sticky = ObjectKind::Box {
        color: Color::PURPLE,
        sticky: true,
    };
    level.create(sticky, p(5, 1)).unwrap();
    level.create(sticky, p(5, 2)).unwrap();
    level
        .create(
            ObjectKind::Box {
                color: Color::GOLD,
                sticky: false,
            },
            p(1, 2),
        )
        .unwrap();
    level.create(ObjectKind::Player, p(1, 1)).unwrap();
    level
}

#[test]
fn resaving_a_loaded_map_is_byte_identical() {
    let dir = scratch_dir("resave");
    save(dir.join("puzzle"), &puzzle()).unwrap();
    let original = std::fs::read(dir.join("puzzle.map")).unwrap();

    let loaded = load(dir.join("puzzle.map")).unwrap();
    save(dir.join("again.map"), &loaded).unwrap();
    assert_eq!(std::fs::read(dir.join("again.map")).unwrap(), original);

    let reloaded = load(dir.join("again.map")).unwrap();
    assert_eq!(
        reloaded.grid().capture_snapshot(),
        loaded.grid().capture_snapshot()
    );
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn extended_maps_hold_large_levels() {
    let dir = scratch_dir("extended");
    let mut level = Level::new(400, 3);
    level.create(ObjectKind::Wall, p(399, 2)).unwrap();
    level.create(ObjectKind::Player, p(300, 1)).unwrap();

    assert!(matches!(
        save(dir.join("big.map"), &level),
        Err(SaveError::TooLarge { .. })
    ));
    save(dir.join("big.mapx"), &level).unwrap();

    let loaded = load(dir.join("big.mapx")).unwrap();
    assert_eq!(loaded.grid().width(), 400);
    assert_eq!(loaded.player_position(), Some(p(300, 1)));
    assert!(loaded.grid().solid_at(p(399, 2)).is_some());
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn loaded_level_plays_like_the_original() {
    let bytes = encode(&puzzle(), MapFormat::Standard).unwrap();
    let mut original = Engine::new(puzzle(), EngineConfig::default());
    let mut loaded = Engine::new(decode(&bytes, MapFormat::Standard).unwrap(), EngineConfig::default());

    // Push the gold box onto the switch to drop the gate, walk through it and
    // shove the sticky pair against the far wall.
    let path = [
        Direction::Down,
        Direction::Right,
        Direction::Right,
        Direction::Right,
        Direction::Right,
    ];
    for dir in path {
        assert_eq!(original.try_move_player(dir), loaded.try_move_player(dir));
        assert_eq!(
            original.level().player_position(),
            loaded.level().player_position()
        );
    }
    assert_eq!(loaded.level().player_position(), Some(p(5, 2)));
    assert!(!loaded.try_move_player(Direction::Right));
}

#[test]
fn corrupt_file_is_a_load_error() {
    let dir = scratch_dir("corrupt");
    let path = dir.join("broken.map");
    std::fs::write(&path, [7, 5, 3]).unwrap();
    assert!(matches!(load(&path), Err(LoadError::Truncated { .. })));
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn unsaveable_level_reports_missing_player() {
    let dir = scratch_dir("no-player");
    let err = save(dir.join("empty"), &Level::new(3, 3)).unwrap_err();
    assert!(matches!(err, SaveError::MissingPlayer));
    assert!(!dir.join("empty.map").exists());
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn huge_header_without_records_is_truncated() {
    let err = decode(&[0xff, 0xff, 0xff, 0xff], MapFormat::Extended).unwrap_err();
    assert!(matches!(err, LoadError::Truncated { offset: 4, .. }), "{err}");
}

#[test]
fn oversized_level_is_refused_before_allocating() {
    // 65535 x 65535 with an empty body and the player at (0, 0).
    let bytes = [0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0, 0];
    let err = decode(&bytes, MapFormat::Extended).unwrap_err();
    assert!(
        matches!(
            err,
            LoadError::TooLarge {
                width: u16::MAX,
                height: u16::MAX
            }
        ),
        "{err}"
    );
}
