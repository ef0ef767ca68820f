//! Play a level in the terminal.
//!
//! ```text
//! cargo run --example terminal_play -- [level.map]
//! ```
//!
//! Commands (one per line): `w` `a` `s` `d` to move, `u` to undo,
//! `save <path>` to write the current level, `q` to quit. Without a path a
//! small built-in level is used. Set `RUST_LOG=sokoban_engine=debug` to
//! watch blocked pushes and merges.

use std::io::{self, BufRead, Write};

use sokoban_engine::prelude::*;

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn glyph(level: &Level, pos: Position) -> char {
    let grid = level.grid();
    if level.player_position() == Some(pos) {
        return '@';
    }
    if let Some(obj) = grid.object_at(pos, Layer::Solid) {
        return match obj.kind {
            ObjectKind::Wall => '#',
            ObjectKind::GateWall => '|',
            ObjectKind::Box { sticky: true, .. } => 'O',
            ObjectKind::Box { .. } => 'o',
            ObjectKind::Car { .. } => 'c',
            _ => '?',
        };
    }
    match grid.object_at(pos, Layer::Floor).map(|o| o.state) {
        Some(ObjectState::Switch { pressed: true }) => '=',
        Some(ObjectState::Switch { pressed: false }) => '_',
        Some(ObjectState::Gate { waiting: true, .. }) => '!',
        Some(ObjectState::Gate { .. }) => '.',
        _ => ' ',
    }
}

fn render(level: &Level) -> String {
    let (w, h) = (i32::from(level.grid().width()), i32::from(level.grid().height()));
    let mut out = String::new();
    for y in -1..=h {
        for x in -1..=w {
            out.push(glyph(level, Position::new(x, y)));
        }
        out.push('\n');
    }
    out
}

// ---------------------------------------------------------------------------
// Built-in level
// ---------------------------------------------------------------------------

fn demo_level() -> Result<Level, EditError> {
    let mut level = Level::new(8, 5);
    let switch = level.create(ObjectKind::Switch { persistent: false }, Position::new(2, 3))?;
    let gate = level.create(ObjectKind::GateBase { default_up: true }, Position::new(5, 2))?;
    for y in [0, 1, 3, 4] {
        level.create(ObjectKind::Wall, Position::new(5, y))?;
    }
    level.link(Structure::Single(SingleSwitchLink {
        switch,
        gates: vec![gate],
    }))?;
    let sticky = ObjectKind::Box {
        color: Color::PURPLE,
        sticky: true,
    };
    level.create(sticky, Position::new(6, 1))?;
    level.create(sticky, Position::new(7, 3))?;
    level.create(
        ObjectKind::Box {
            color: Color::GOLD,
            sticky: false,
        },
        Position::new(2, 2),
    )?;
    level.create(
        ObjectKind::Car {
            color: Color::NAVY_BLUE,
            sticky: false,
        },
        Position::new(0, 4),
    )?;
    level.create(ObjectKind::Player, Position::new(2, 1))?;
    Ok(level)
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let level = match std::env::args().nth(1) {
        Some(path) => load(&path)?,
        None => demo_level()?,
    };
    let mut engine = Engine::new(level, EngineConfig::default());

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    print!("{}", render(engine.level()));
    for line in stdin.lock().lines() {
        let line = line?;
        let mut words = line.split_whitespace();
        let input = match words.next() {
            Some("w") => StepInput::Move(Direction::Up),
            Some("a") => StepInput::Move(Direction::Left),
            Some("s") => StepInput::Move(Direction::Down),
            Some("d") => StepInput::Move(Direction::Right),
            Some("u") => StepInput::Undo,
            Some("q") => break,
            Some("save") => {
                match words.next() {
                    Some(path) => match save(path, engine.level()) {
                        Ok(()) => println!("saved {}", sokoban_engine::codec::save_path(path).display()),
                        Err(e) => println!("save failed: {e}"),
                    },
                    None => println!("usage: save <path>"),
                }
                continue;
            }
            _ => {
                println!("w/a/s/d move, u undo, save <path>, q quit");
                continue;
            }
        };
        if !engine.step(input) {
            println!("(nothing happens)");
        }
        print!("{}", render(engine.level()));
        writeln!(stdout, "steps: {}  undo: {}", engine.step_count(), engine.history_len())?;
    }
    Ok(())
}
