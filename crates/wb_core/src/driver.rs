//! Fixed-dt driver: steps an engine until the play completes.
//!
//! The UI drives the engine from its own render loop; this is the headless
//! equivalent used by the CLI and by tests.

use log::warn;

use crate::contracts::WhiteboardPlaySnapshot;
use crate::engine::MotionEngine;

/// 60 Hz frame.
pub const DEFAULT_FRAME_DT: f32 = 1.0 / 60.0;

/// Frames produced by [`run_to_completion`].
#[derive(Debug, Clone)]
pub struct PlayRun {
    /// One snapshot per step, in order
    pub frames: Vec<WhiteboardPlaySnapshot>,
    /// Whether the engine reported done before the step budget ran out
    pub completed: bool,
    pub steps: usize,
}

impl PlayRun {
    pub fn last(&self) -> Option<&WhiteboardPlaySnapshot> {
        self.frames.last()
    }
}

/// Step with a constant `dt` until done or `max_steps` is reached.
pub fn run_to_completion(engine: &mut MotionEngine, dt: f32, max_steps: usize) -> PlayRun {
    let mut frames = Vec::new();
    let mut steps = 0;
    while !engine.is_done() && steps < max_steps {
        frames.push(engine.step(dt));
        steps += 1;
    }

    let completed = engine.is_done();
    if !completed {
        warn!(
            "Play did not settle within {} steps ({:.2}s simulated)",
            max_steps,
            engine.elapsed()
        );
    }
    PlayRun { frames, completed, steps }
}
