//! OpsViz DST Simulator CLI
//!
//! Run deterministic lifecycle scenarios against the animation engine.

use clap::Parser;
use opsviz_core::{SceneConfig, SceneKind};
use opsviz_sim::scenarios::ScenarioId;
use opsviz_sim::{RerunLogger, ScenarioResult, ScenarioRunner, SimError};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// OpsViz Deterministic Simulation Testing CLI
#[derive(Parser, Debug)]
#[command(name = "opsviz-sim")]
#[command(about = "Run deterministic simulation tests for the OpsViz animation engine", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Scene to drive (factory, robotic_arm, ..., all)
    #[arg(long, default_value = "factory")]
    scene: String,

    /// Scenario to run (steady_state, frame_stall, remount_churn, rewind, pulse_soak, telemetry_sweep, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Simulated duration in seconds
    #[arg(short, long, default_value = "10")]
    duration: f64,

    /// Display refresh rate in Hz
    #[arg(long, default_value = "60")]
    fps: u32,

    /// Scene descriptor as JSON (overrides --scene)
    #[arg(long)]
    config: Option<String>,

    /// Telemetry presets to feed, e.g. dashboard.power,engine.power
    #[arg(long, value_delimiter = ',')]
    series: Vec<String>,

    /// List scenes, scenarios and series presets, then exit
    #[arg(long)]
    list: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export simulation frames to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// Export every N-th frame
    #[arg(long, default_value = "6")]
    export_every: u64,

    /// Stream frames to a Rerun viewer (requires the `visualization` feature)
    #[arg(long)]
    rerun: bool,

    /// Live terminal console instead of scenarios (requires the `dashboard` feature)
    #[arg(long)]
    dashboard: bool,
}

fn print_catalog() {
    println!("Scenes:");
    for kind in SceneKind::all() {
        println!("  {:<16} {}", kind.name(), kind.description());
    }
    println!("Scenarios:");
    for scenario in ScenarioId::all() {
        println!("  {:<16} {}", scenario.name(), scenario.description());
    }
    println!("Series presets:");
    for preset in opsviz_core::telemetry::PRESETS {
        let shape = preset.shape;
        println!(
            "  {:<34} base={} variance={} trend={}",
            preset.key(),
            shape.base,
            shape.variance,
            shape.trend
        );
    }
}

/// Scene configs selected by `--config` / `--scene`.
fn scene_configs(args: &Args) -> Result<Vec<SceneConfig>, SimError> {
    if let Some(path) = &args.config {
        let json = std::fs::read_to_string(path)?;
        return Ok(vec![SceneConfig::from_json(&json)?]);
    }
    if args.scene == "all" {
        return Ok(SceneKind::all().into_iter().map(SceneConfig::for_kind).collect());
    }
    let kind: SceneKind = args.scene.parse()?;
    Ok(vec![SceneConfig::for_kind(kind)])
}

fn runner(args: &Args, seed: u64, scene: &SceneConfig) -> ScenarioRunner {
    let mut runner = ScenarioRunner::new(seed)
        .with_scene_config(scene.clone())
        .with_frame_rate(args.fps)
        .with_duration(args.duration);
    if !args.series.is_empty() {
        runner = runner.with_series(args.series.clone());
    }
    if args.rerun {
        runner = runner.with_logger(RerunLogger::new("opsviz_sim"));
    }
    runner
}

/// Run a scenario with frame-by-frame export.
fn run_with_export(args: &Args, seed: u64, scene: &SceneConfig, scenario: ScenarioId, path: &str) -> ScenarioResult {
    let (result, export) = runner(args, seed, scene).run_with_export(scenario, args.export_every);

    match export.write_to_file(path) {
        Ok(()) => info!("Exported {} frames to {}", export.frames.len(), path),
        Err(e) => error!("Failed to write export: {}", e),
    }
    result
}

#[cfg(feature = "dashboard")]
fn run_dashboard(args: &Args, seed: u64, scene: SceneConfig) -> Result<(), SimError> {
    use opsviz_core::dashboard::{ConsoleDashboard, ConsolePacket, SeriesReading};
    use opsviz_sim::{SimConfig, SimWorld};
    use std::time::Duration;

    let mut config = SimConfig {
        seed,
        scene,
        frame_rate_hz: args.fps,
        ..Default::default()
    };
    if !args.series.is_empty() {
        config.series = args.series.clone();
    }
    let mut world = SimWorld::new(config)?;
    world.start_pulse()?;
    world.start_clock();
    world.start_feeds()?;
    world.mount_scene()?;

    let (tx, rx) = crossbeam::channel::bounded::<ConsolePacket>(64);

    // Drive the world in real time; stops when the dashboard goes away
    let pacing = world.host().frame_period();
    let publish_every = u64::from(args.fps / 10).max(1);
    std::thread::spawn(move || loop {
        world.tick();
        if world.tick_count() % publish_every == 0 {
            let packet = ConsolePacket {
                timestamp: world.mounted().and_then(|m| m.elapsed()).unwrap_or(0.0),
                scene: world.config().scene.kind,
                ticks: world.mounted().map(|m| m.tick_count()).unwrap_or(0),
                status: world.config().status,
                pulsing: world
                    .pulse()
                    .and_then(|p| p.lock().ok().map(|p| p.is_pulsing()))
                    .unwrap_or(false),
                clock: world.clock_labels().map(|(time, _)| time).unwrap_or_default(),
                series: world
                    .feeds()
                    .iter()
                    .map(|handle| SeriesReading {
                        key: handle.key.clone(),
                        samples: handle.feed.lock().map(|f| f.latest().to_vec()).unwrap_or_default(),
                    })
                    .collect(),
            };
            if tx.send(packet).is_err() {
                break;
            }
        }
        std::thread::sleep(pacing.max(Duration::from_millis(1)));
    });

    ConsoleDashboard::new(rx).run()?;
    Ok(())
}

#[cfg(not(feature = "dashboard"))]
fn run_dashboard(_args: &Args, _seed: u64, _scene: SceneConfig) -> Result<(), SimError> {
    Err(SimError::config(
        "the live console requires building with --features dashboard",
    ))
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if args.list {
        print_catalog();
        return;
    }

    if !args.json {
        info!("OpsViz DST Simulator v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(scenario) => vec![scenario],
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!("Run with --list to see available scenarios");
                std::process::exit(1);
            }
        }
    };

    let scenes = scene_configs(&args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("Run with --list to see available scenes");
        std::process::exit(1);
    });

    // Determine base seed
    let base_seed = if args.seed == 0 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    if args.dashboard {
        if let Err(e) = run_dashboard(&args, base_seed, scenes[0].clone()) {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 || scenes.len() > 1 {
            eprintln!("Error: --export only supports a single scenario and scene, not 'all'");
            std::process::exit(1);
        }

        info!("Running with export to: {}", export_path);
        let result = run_with_export(&args, base_seed, &scenes[0], scenarios[0], export_path);

        if result.passed {
            info!(
                "✓ {} on {} (seed={}) PASSED - exported to {}",
                scenarios[0].name(),
                result.scene,
                base_seed,
                export_path
            );
        } else {
            error!(
                "✗ {} FAILED: {}",
                scenarios[0].name(),
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
            std::process::exit(1);
        }
        return;
    }

    // Track results
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    // Run simulations
    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);

        for scene in &scenes {
            let runner = runner(&args, seed, scene);

            for scenario in &scenarios {
                let result = runner.run(*scenario);

                if !args.json {
                    if result.passed {
                        info!("✓ {} on {} (seed={}) PASSED", scenario.name(), scene.kind, seed);
                    } else {
                        error!(
                            "✗ {} on {} (seed={}) FAILED: {}",
                            scenario.name(),
                            scene.kind,
                            seed,
                            result.failure_reason.as_deref().unwrap_or("unknown")
                        );
                    }
                }

                if !result.passed {
                    failed_count += 1;
                }

                all_results.push(result);
            }
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to encode results: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);

            // List failed seeds
            for result in &all_results {
                if !result.passed {
                    error!(
                        "  - {} on {} seed={}: {}",
                        result.scenario.name(),
                        result.scene,
                        result.seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
