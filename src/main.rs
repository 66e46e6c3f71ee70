mod constants;
mod engine;
mod geometry;
mod matching;
mod model;
mod platform;
mod positioning;
mod services;
mod settings;
mod snapshot;
mod store;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use engine::{Engine, RestoreTarget};
use geometry::Rect;
use model::Rule;
use settings::Settings;
use store::SnapshotStore;

#[derive(Parser)]
#[command(name = "snapback")]
#[command(about = "Snapshot and restore window layouts across display configurations")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the capture and restore daemon
    Run,
    /// Capture the current layout once and save it
    Capture,
    /// Restore window positions for the current display configuration
    Restore {
        /// Timestamp of the history frame to replay
        #[arg(long, conflicts_with = "most_recent")]
        at: Option<f64>,
        /// Replay the frame that was last restored
        #[arg(long)]
        most_recent: bool,
    },
    /// List the rules visible to the current display configuration
    Rules {
        /// Only rules tied to this exact configuration
        #[arg(long)]
        exclusive: bool,
    },
    /// Create a positioning rule
    AddRule {
        /// Pattern matched against window titles
        #[arg(long)]
        name: Option<String>,
        /// Pattern matched against the owning executable path
        #[arg(long)]
        executable: Option<String>,
        /// Target rect as left,top,right,bottom
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        rect: Vec<i32>,
        /// Attach to the Global layout instead of the current configuration
        #[arg(long)]
        global: bool,
    },
    /// Forget all captured window history
    ClearHistory,
}

fn main() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    let sys = platform::native()?;
    let settings = Settings::load()?;
    let store = SnapshotStore::load(SnapshotStore::default_path());
    info!(snapshots = store.snapshots.len(), "loaded snapshot store");
    let engine = Arc::new(Engine::new(sys, store, settings));

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(engine),
        Command::Capture => {
            engine.update()?;
            engine.save()?;
            info!("captured current layout");
            Ok(())
        }
        Command::Restore { at, most_recent } => {
            let target = match at {
                Some(time) => RestoreTarget::At(time),
                None if most_recent => RestoreTarget::MostRecent,
                None => RestoreTarget::LastCaptured,
            };
            engine.restore(target)?;
            // persist the mru bump
            engine.save()
        }
        Command::Rules { exclusive } => {
            let displays = engine.displays()?;
            for rule in engine.get_rules(Some(&displays), exclusive) {
                println!(
                    "{}: name={} executable={} rect={:?}",
                    rule.rule_name,
                    rule.name.as_deref().unwrap_or("*"),
                    rule.executable.as_deref().unwrap_or("*"),
                    rule.rect,
                );
            }
            Ok(())
        }
        Command::AddRule { name, executable, rect, global } => {
            let [left, top, right, bottom] = rect[..] else {
                anyhow::bail!("--rect expects left,top,right,bottom");
            };
            let mut rule = Rule::from_rect(Rect::new(left, top, right, bottom));
            rule.name = name;
            rule.executable = executable;
            engine.add_rule(rule, global)?;
            engine.save()
        }
        Command::ClearHistory => engine.clear_history(),
    }
}

fn run(engine: Arc<Engine>) -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));

    let mut workers = vec![
        services::spawn_capture_loop(engine.clone(), stop.clone()),
        services::spawn_display_watcher(engine.clone(), stop.clone()),
    ];
    if engine.settings().react_to_new_windows {
        workers.push(services::spawn_window_watcher(engine.clone(), stop.clone()));
    }

    info!("snapback running, press Ctrl+C to exit");
    for worker in workers {
        let _ = worker.join();
    }
    Ok(())
}
