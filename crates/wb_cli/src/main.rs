//! Whiteboard CLI
//!
//! Runs a play setup headlessly and streams frames as JSON lines.
//! Tuning override: WB_TUNING_PATH=<tuning.json>

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use serde::Serialize;

use wb_core::{
    run_to_completion, PlayRun, PlaySetup, WhiteboardMotionTuning, YieldPolicy, DEFAULT_FRAME_DT,
};

const TUNING_PATH_ENV: &str = "WB_TUNING_PATH";

#[derive(Parser)]
#[command(name = "wb_cli")]
#[command(about = "Run rotation whiteboard plays without the UI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Step a play setup until it settles
    Run {
        /// Play setup JSON file
        #[arg(long)]
        setup: PathBuf,

        /// Fixed step in seconds
        #[arg(long, default_value_t = DEFAULT_FRAME_DT)]
        dt: f32,

        /// Step budget before giving up
        #[arg(long, default_value_t = 10_000)]
        max_steps: usize,

        /// Emit every k-th frame (the final frame is always emitted)
        #[arg(long, default_value_t = 1)]
        every: usize,

        /// Which end of the priority table leads when two movers conflict
        #[arg(long, value_enum, default_value_t = PolicyArg::Lower)]
        policy: PolicyArg,

        /// Write frames here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print a tuning preset as JSON
    Tuning {
        #[arg(long, value_enum, default_value_t = Preset::Default)]
        preset: Preset,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    Lower,
    Higher,
}

impl From<PolicyArg> for YieldPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Lower => YieldPolicy::LowerValueLeads,
            PolicyArg::Higher => YieldPolicy::HigherValueLeads,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Preset {
    Default,
    Smooth,
    Snappy,
}

impl Preset {
    fn tuning(self) -> WhiteboardMotionTuning {
        match self {
            Preset::Default => WhiteboardMotionTuning::default(),
            Preset::Smooth => WhiteboardMotionTuning::smooth(),
            Preset::Snappy => WhiteboardMotionTuning::snappy(),
        }
    }
}

/// Last line of a `run`.
#[derive(Debug, Serialize)]
struct RunSummary {
    completed: bool,
    steps: usize,
    elapsed: f32,
    min_pair_distance: Option<f32>,
    hard_distance: f32,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { setup, dt, max_steps, every, policy, out } => {
            let setup = load_setup(&setup, std::env::var_os(TUNING_PATH_ENV).map(PathBuf::from))?;
            let mut engine = setup.build_engine(policy.into());
            let hard_distance = engine.hard_distance();
            let run = run_to_completion(&mut engine, dt, max_steps);

            let summary = RunSummary {
                completed: run.completed,
                steps: run.steps,
                elapsed: engine.elapsed(),
                min_pair_distance: min_pair_distance(&run),
                hard_distance,
            };

            match out {
                Some(path) => {
                    let file = fs::File::create(&path)
                        .with_context(|| format!("creating {}", path.display()))?;
                    write_frames(BufWriter::new(file), &run, every, &summary)?;
                    info!("Wrote {} frames to {}", run.steps, path.display());
                }
                None => write_frames(io::stdout().lock(), &run, every, &summary)?,
            }

            if !run.completed {
                warn!("Play did not settle; summary reports completed=false");
            }
        }

        Commands::Tuning { preset } => {
            println!("{}", preset.tuning().to_json_pretty()?);
        }
    }

    Ok(())
}

/// Read a setup, letting a tuning file replace the one inside it.
fn load_setup(path: &Path, tuning_override: Option<PathBuf>) -> Result<PlaySetup> {
    let json =
        fs::read_to_string(path).with_context(|| format!("reading setup {}", path.display()))?;
    let mut setup =
        PlaySetup::from_json(&json).with_context(|| format!("parsing setup {}", path.display()))?;

    if let Some(tuning_path) = tuning_override {
        let json = fs::read_to_string(&tuning_path)
            .with_context(|| format!("reading tuning {}", tuning_path.display()))?;
        setup.tuning = WhiteboardMotionTuning::from_json(&json)
            .with_context(|| format!("parsing tuning {}", tuning_path.display()))?;
        info!("Tuning overridden from {}", tuning_path.display());
    }
    Ok(setup)
}

/// Indices of the frames to print: every k-th, plus the final one.
fn emitted_frames(total: usize, every: usize) -> Vec<usize> {
    let every = every.max(1);
    let mut picked: Vec<usize> = (0..total).filter(|i| (i + 1) % every == 0).collect();
    if total > 0 && picked.last() != Some(&(total - 1)) {
        picked.push(total - 1);
    }
    picked
}

fn min_pair_distance(run: &PlayRun) -> Option<f32> {
    run.frames
        .iter()
        .filter_map(|frame| frame.min_pair_distance())
        .reduce(f32::min)
}

fn write_frames<W: Write>(
    mut writer: W,
    run: &PlayRun,
    every: usize,
    summary: &RunSummary,
) -> Result<()> {
    for i in emitted_frames(run.frames.len(), every) {
        serde_json::to_writer(&mut writer, &run.frames[i])?;
        writeln!(writer)?;
    }
    serde_json::to_writer(&mut writer, summary)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================
