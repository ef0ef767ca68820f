//! Deterministic replay with input recording and checkpoint verification.
//!
//! A [`ReplayLog`] holds the encoded level a session started from, every
//! [`StepInput`] fed to the engine, and periodic state hash checkpoints.
//! [`replay`] decodes the level into a fresh [`Engine`], feeds the inputs
//! step by step, and compares hashes at each checkpoint.
//!
//! Recording starts from map bytes rather than a live engine: object ids
//! are part of the hashed board state, and decoding is what fixes them.
//!
//! # Recording
//!
//! ```
//! use sokoban_engine::prelude::*;
//! use sokoban_engine::replay::{replay, ReplayRecorder};
//!
//! let mut level = Level::new(4, 4);
//! level.create(ObjectKind::Player, Position::new(0, 0)).unwrap();
//! let bytes = encode(&level, MapFormat::Standard).unwrap();
//!
//! let (mut recorder, mut engine) =
//!     ReplayRecorder::start(bytes, MapFormat::Standard, EngineConfig::default(), 2).unwrap();
//! for input in [StepInput::Move(Direction::Right), StepInput::Move(Direction::Down), StepInput::Undo] {
//!     recorder.record_step(input, Some(engine.state_hash()));
//!     engine.step(input);
//! }
//! let log = recorder.finish();
//!
//! let result = replay(&log).unwrap();
//! assert!(result.completed);
//! assert!(result.first_divergence.is_none());
//! assert_eq!(result.final_hash, engine.state_hash());
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::codec::{self, LoadError, MapFormat};
use crate::step::{Engine, EngineConfig, StepInput};

// ---------------------------------------------------------------------------
// ReplayLog
// ---------------------------------------------------------------------------

/// A complete replay log: the starting level plus an ordered sequence of
/// inputs and checkpoints. Serializes to JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayLog {
    /// The encoded starting level.
    pub level: Vec<u8>,
    /// Format of `level`.
    pub format: MapFormat,
    /// Engine configuration used while recording.
    pub config: EngineConfig,
    /// Board hash of the freshly decoded level.
    pub initial_hash: String,
    /// Number of recorded steps. Every step in `0..total_steps` has an input.
    pub total_steps: u64,
    /// Inputs and checkpoints in recording order.
    pub entries: Vec<ReplayEntry>,
}

/// A single entry in a [`ReplayLog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplayEntry {
    /// The input resolved at `step`.
    Input {
        step: u64,
        input: StepInput,
    },
    /// The board hash before `step` was resolved.
    Checkpoint {
        step: u64,
        state_hash: String,
    },
}

// ---------------------------------------------------------------------------
// ReplayResult
// ---------------------------------------------------------------------------

/// The outcome of [`replay`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayResult {
    /// Whether every step was replayed without a divergence.
    pub completed: bool,
    /// Number of steps replayed.
    pub steps_replayed: u64,
    /// The first checkpoint whose hash did not match.
    pub first_divergence: Option<ReplayDivergence>,
    /// Board hash where the replay stopped.
    pub final_hash: String,
}

/// A checkpoint mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayDivergence {
    pub step: u64,
    pub expected_hash: String,
    pub actual_hash: String,
}

// ---------------------------------------------------------------------------
// ReplayRecorder
// ---------------------------------------------------------------------------

/// Records a session into a [`ReplayLog`].
///
/// Call [`record_step`](Self::record_step) *before* resolving each input on
/// the engine returned by [`start`](Self::start), then
/// [`finish`](Self::finish).
pub struct ReplayRecorder {
    log: ReplayLog,
    /// Record a checkpoint every this many steps; 0 records one whenever a
    /// hash is supplied.
    checkpoint_interval: u64,
}

impl ReplayRecorder {
    /// Decode `level` into the engine to record against.
    ///
    /// # Errors
    ///
    /// Any [`LoadError`] from decoding the level.
    pub fn start(
        level: Vec<u8>,
        format: MapFormat,
        config: EngineConfig,
        checkpoint_interval: u64,
    ) -> Result<(Self, Engine), LoadError> {
        let engine = Engine::new(codec::decode(&level, format)?, config);
        let recorder = Self {
            log: ReplayLog {
                level,
                format,
                config,
                initial_hash: engine.state_hash(),
                total_steps: 0,
                entries: Vec::new(),
            },
            checkpoint_interval,
        };
        Ok((recorder, engine))
    }

    /// Record the next input, with a checkpoint if `state_hash` is given and
    /// the step falls on the checkpoint interval.
    pub fn record_step(&mut self, input: StepInput, state_hash: Option<String>) {
        let step = self.log.total_steps;
        self.log.entries.push(ReplayEntry::Input { step, input });

        if let Some(hash) = state_hash {
            let due = self.checkpoint_interval == 0 || step % self.checkpoint_interval == 0;
            if due {
                self.log.entries.push(ReplayEntry::Checkpoint {
                    step,
                    state_hash: hash,
                });
            }
        }
        self.log.total_steps += 1;
    }

    /// Finish recording and return the log.
    pub fn finish(self) -> ReplayLog {
        self.log
    }
}

// ---------------------------------------------------------------------------
// replay()
// ---------------------------------------------------------------------------

/// Replay `log` on a fresh engine and verify every checkpoint.
///
/// Replay stops at the first divergence and reports the steps completed up
/// to that point.
///
/// # Errors
///
/// Returns an error if the log is malformed (duplicate entries, a missing
/// input, a checkpoint past the end), if the level fails to decode, or if
/// the decoded level does not match `initial_hash`.
pub fn replay(log: &ReplayLog) -> Result<ReplayResult, anyhow::Error> {
    let mut inputs: BTreeMap<u64, StepInput> = BTreeMap::new();
    let mut checkpoints: BTreeMap<u64, &str> = BTreeMap::new();

    for entry in &log.entries {
        match entry {
            ReplayEntry::Input { step, input } => {
                if inputs.insert(*step, *input).is_some() {
                    anyhow::bail!("replay log contains duplicate Input entry at step {step}");
                }
            }
            ReplayEntry::Checkpoint { step, state_hash } => {
                if *step >= log.total_steps {
                    anyhow::bail!(
                        "replay log has a checkpoint at step {step} but only {} steps",
                        log.total_steps
                    );
                }
                if checkpoints.insert(*step, state_hash).is_some() {
                    anyhow::bail!("replay log contains duplicate Checkpoint entry at step {step}");
                }
            }
        }
    }
    if let Some(missing) = (0..log.total_steps).find(|s| !inputs.contains_key(s)) {
        anyhow::bail!("replay log has no input for step {missing}");
    }

    let level = codec::decode(&log.level, log.format)
        .map_err(|e| anyhow::anyhow!("failed to decode replay level: {e}"))?;
    let mut engine = Engine::new(level, log.config);
    let initial = engine.state_hash();
    if initial != log.initial_hash {
        anyhow::bail!(
            "replay level hash mismatch: recorded {} but decoded {initial}",
            log.initial_hash
        );
    }

    let mut steps_replayed = 0;
    for (&step, &input) in &inputs {
        if step >= log.total_steps {
            break;
        }
        if let Some(&expected) = checkpoints.get(&step) {
            let actual_hash = engine.state_hash();
            if actual_hash != expected {
                tracing::warn!(step, "replay diverged");
                return Ok(ReplayResult {
                    completed: false,
                    steps_replayed,
                    first_divergence: Some(ReplayDivergence {
                        step,
                        expected_hash: expected.to_owned(),
                        actual_hash: actual_hash.clone(),
                    }),
                    final_hash: actual_hash,
                });
            }
        }
        let _ = engine.step(input);
        steps_replayed += 1;
    }

    Ok(ReplayResult {
        completed: true,
        steps_replayed,
        first_divergence: None,
        final_hash: engine.state_hash(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
