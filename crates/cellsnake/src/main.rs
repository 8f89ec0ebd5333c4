//! cellsnake: replay an operator's boundary actions against one image.
//!
//! Loads a microscope image, then replays a session script of `refine`,
//! `delete_last` and `finalize` actions in order. Each refine snaps a
//! rough cell outline onto the nearest intensity edge and records its
//! shape features; each finalize appends the image's summary row to the
//! CSV store. Useful for:
//!
//! - Batch-processing outlines captured elsewhere
//! - Re-running a session with different snake parameters
//! - Inspecting where refined curves settle (`--svg`)
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin cellsnake -- [OPTIONS] <IMAGE_PATH> <SCRIPT_PATH>
//! ```
//!
//! Results go to stdout (one JSON object per line with `--json`),
//! diagnostics to stderr. Set `RUST_LOG=debug` for per-step logging.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;

use cellsnake_export::{Overlay, SvgMetadata, to_overlay_svg};
use cellsnake_io::{Action, AppendOutcome, CsvStore, LoadedImage, load_image, load_script};
use cellsnake_pipeline::{
    AnalysisConfig, Boundary, BoundaryIndex, FeatureTuple, RefineReport, RefinedCurve, Session,
    SnakeConfig, SummaryRecord,
};

/// Snake-based cell boundary refinement and feature summaries.
///
/// Replays the actions of SCRIPT_PATH (a JSON array of
/// `{"action": "refine", "points": [[x, y], ...]}`,
/// `{"action": "delete_last"}` and `{"action": "finalize"}`) against
/// IMAGE_PATH and appends one summary row per finalize to the store.
#[derive(Parser)]
#[command(name = "cellsnake", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Path to the session script (JSON).
    script_path: PathBuf,

    /// CSV store that finalized summaries are appended to.
    #[arg(long, default_value = cellsnake_io::DEFAULT_STORE_PATH)]
    store: PathBuf,

    /// Write an SVG overlay of rough (red) and refined (blue) outlines.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Print one JSON object per action instead of a human-readable line.
    #[arg(long)]
    json: bool,

    /// Stretching weight of the snake.
    #[arg(long, default_value_t = SnakeConfig::DEFAULT_ALPHA)]
    alpha: f64,

    /// Bending weight of the snake.
    #[arg(long, default_value_t = SnakeConfig::DEFAULT_BETA)]
    beta: f64,

    /// Time step of the snake update.
    #[arg(long, default_value_t = SnakeConfig::DEFAULT_GAMMA)]
    gamma: f64,

    /// Maximum snake iterations per boundary.
    #[arg(long, default_value_t = SnakeConfig::DEFAULT_MAX_ITERATIONS, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    max_iterations: usize,

    /// Maximum vertex displacement per iteration, in pixels.
    #[arg(long, default_value_t = SnakeConfig::DEFAULT_MAX_PX_MOVE)]
    max_px_move: f64,

    /// Early-stop threshold in pixels.
    #[arg(long, default_value_t = SnakeConfig::DEFAULT_CONVERGENCE)]
    convergence: f64,

    /// Always run the full iteration budget.
    #[arg(long, conflicts_with = "convergence")]
    no_early_stop: bool,

    /// Gaussian blur sigma applied before the edge response.
    #[arg(long, default_value_t = AnalysisConfig::DEFAULT_BLUR_SIGMA)]
    blur_sigma: f32,

    /// Magnification-adjustment factor converting pixels to physical units.
    #[arg(long, default_value_t = AnalysisConfig::DEFAULT_MAGNIFICATION)]
    magnification: f64,

    /// Full analysis config as a JSON string.
    ///
    /// When provided, all other analysis parameter flags are ignored.
    /// The JSON must be a valid `AnalysisConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Build an [`AnalysisConfig`] from CLI arguments and validate it.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<AnalysisConfig, String> {
    let config = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        AnalysisConfig {
            blur_sigma: cli.blur_sigma,
            snake: SnakeConfig {
                alpha: cli.alpha,
                beta: cli.beta,
                gamma: cli.gamma,
                max_iterations: cli.max_iterations,
                max_px_move: cli.max_px_move,
                convergence: (!cli.no_early_stop).then_some(cli.convergence),
            },
            magnification: cli.magnification,
        }
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// Outcome of one replayed action.
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Event {
    Refined {
        step: usize,
        index: BoundaryIndex,
        features: FeatureTuple,
        report: RefineReport,
    },
    Deleted {
        step: usize,
        index: Option<BoundaryIndex>,
    },
    Finalized {
        step: usize,
        record: SummaryRecord,
        store: PathBuf,
        created: bool,
    },
    Failed {
        step: usize,
        action: &'static str,
        error: String,
    },
}

impl Event {
    fn report(&self) -> String {
        match self {
            Self::Refined {
                step,
                index,
                features,
                report,
            } => format!(
                "[{step}] refined boundary {index}: area={:.2} perimeter={:.2} radius={:.2} smoothness={:.4} ({} iterations{})",
                features.area,
                features.perimeter,
                features.radius,
                features.smoothness,
                report.iterations,
                if report.converged { ", converged" } else { "" },
            ),
            Self::Deleted {
                step,
                index: Some(index),
            } => format!("[{step}] deleted boundary {index}"),
            Self::Deleted { step, index: None } => format!("[{step}] nothing to delete"),
            Self::Finalized {
                step,
                record,
                store,
                created,
            } => format!(
                "[{step}] finalized {}: {} cells, radius_mean={:.2}, {} {}",
                record.image_id,
                record.snake_refined_count,
                record.radius_mean,
                if *created { "created" } else { "appended to" },
                store.display(),
            ),
            Self::Failed {
                step,
                action,
                error,
            } => format!("[{step}] {action} failed: {error}"),
        }
    }

    const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Session state for one replay, plus what the overlay needs.
struct Replay<'a> {
    image: &'a LoadedImage,
    config: &'a AnalysisConfig,
    session: Session,
    store: CsvStore,
    /// Rough and refined outline of every boundary not deleted.
    drawn: Vec<(Boundary, RefinedCurve)>,
}

impl<'a> Replay<'a> {
    fn new(image: &'a LoadedImage, config: &'a AnalysisConfig, store: CsvStore) -> Self {
        Self {
            image,
            config,
            session: Session::open(image.image_id.clone(), image.dimensions),
            store,
            drawn: Vec::new(),
        }
    }

    fn apply(&mut self, step: usize, action: &Action) -> Event {
        match action {
            Action::Refine { boundary } => {
                match self
                    .session
                    .refine(boundary, &self.image.field, self.config)
                {
                    Ok(entry) => {
                        self.drawn.push((boundary.clone(), entry.curve));
                        Event::Refined {
                            step,
                            index: entry.index,
                            features: entry.features,
                            report: entry.report,
                        }
                    }
                    Err(e) => Event::Failed {
                        step,
                        action: "refine",
                        error: e.to_string(),
                    },
                }
            }
            Action::DeleteLast => {
                let index = self.session.delete_last();
                if index.is_some() {
                    self.drawn.pop();
                }
                Event::Deleted { step, index }
            }
            Action::Finalize => match self.session.finalize_into(&mut self.store) {
                Ok(record) => Event::Finalized {
                    step,
                    record,
                    store: self.store.path().to_path_buf(),
                    created: self.store.last_outcome() == Some(AppendOutcome::Created),
                },
                Err(e) => Event::Failed {
                    step,
                    action: "finalize",
                    error: e.to_string(),
                },
            },
        }
    }

    fn write_svg(&self, path: &Path) -> std::io::Result<usize> {
        let (boundaries, curves): (Vec<Boundary>, Vec<RefinedCurve>) =
            self.drawn.iter().cloned().unzip();
        let title = self.image.image_id.to_string();
        let snake = &self.config.snake;
        let desc = format!(
            "alpha={} beta={} gamma={} max_iterations={} magnification={}",
            snake.alpha, snake.beta, snake.gamma, snake.max_iterations, self.config.magnification,
        );
        let config_json = serde_json::to_string(self.config).ok();
        let metadata = SvgMetadata {
            title: Some(&title),
            description: Some(&desc),
            config_json: config_json.as_deref(),
        };
        let svg = to_overlay_svg(
            Overlay {
                boundaries: &boundaries,
                curves: &curves,
            },
            self.image.dimensions,
            &metadata,
        );
        std::fs::write(path, &svg)?;
        Ok(svg.len())
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    log::debug!("config: {config:?}");

    let image = match load_image(&cli.image_path, &config) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error loading image: {e}");
            return ExitCode::FAILURE;
        }
    };

    let actions = match load_script(&cli.script_path) {
        Ok(actions) => actions,
        Err(e) => {
            eprintln!("Error loading script: {e}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({})",
        cli.image_path.display(),
        image.dimensions
    );
    eprintln!("Script: {} ({} actions)", cli.script_path.display(), actions.len());
    eprintln!("Store: {}", cli.store.display());
    eprintln!();

    let mut replay = Replay::new(&image, &config, CsvStore::new(&cli.store));
    let mut failures = 0_usize;

    for (step, action) in actions.iter().enumerate() {
        let event = replay.apply(step + 1, action);
        if event.is_failure() {
            failures += 1;
        }
        if cli.json {
            match serde_json::to_string(&event) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("Error serializing event: {e}"),
            }
        } else if event.is_failure() {
            eprintln!("{}", event.report());
        } else {
            println!("{}", event.report());
        }
    }

    if let Some(ref svg_path) = cli.svg {
        match replay.write_svg(svg_path) {
            Ok(len) => eprintln!("SVG written to {} ({len} bytes)", svg_path.display()),
            Err(e) => eprintln!("Error writing SVG to {}: {e}", svg_path.display()),
        }
    }

    if failures > 0 {
        eprintln!("{failures} action(s) failed");
    }

    let unfinalized = replay.session.close();
    if unfinalized > 0 {
        eprintln!(
            "Warning: {unfinalized} refined boundaries were not finalized and are not in the store"
        );
    }

    ExitCode::SUCCESS
}
