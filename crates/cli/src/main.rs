//! Headless driver replaying a JSON command script against the trim engine.

use std::error::Error;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use clap::Parser;
use serde_json::Value;
use tracing::{debug, error, info};
use trim_engine::export::{ExportBackend, ExportRequest};
use trim_engine::projection::{format_time, format_time_hms};
use trim_engine::{
    ClipSummary, Command, DetachedSurface, EditorConfig, Engine, Event, TimelineSnapshot,
    spawn_engine_bridge,
};

const EXPORT_PROGRESS_STEP: u8 = 5;
const EXPORT_OUTPUT: &str = "exported-video.mp4";

/// Replay timeline editing commands and print the emitted events as JSON lines.
#[derive(Parser, Debug)]
#[command(name = "trim-cli", version, about, long_about = None)]
struct Args {
    /// JSON array of commands; `-` reads from stdin.
    script: PathBuf,

    /// Editor configuration file (JSON).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Track width in pixels for pointer commands that omit `track_width_px`.
    #[arg(long, default_value_t = 1000.0)]
    track_width: f64,

    /// Print a human-readable clip list to stderr when the script ends.
    #[arg(long)]
    summary: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "trim-cli failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => EditorConfig::load(path)?,
        None => EditorConfig::default(),
    };
    let commands = read_script(args)?;
    info!(command_count = commands.len(), "script loaded");

    let engine = Engine::new(DetachedSurface, SimulatedExport).with_config(config);
    let (command_tx, event_rx) = spawn_engine_bridge(engine);

    let feeder = thread::spawn(move || {
        for command in commands {
            if command_tx.send(command).is_err() {
                break;
            }
        }
    });

    let mut stdout = BufWriter::new(io::stdout().lock());
    let mut last_snapshot = None;
    for event in event_rx {
        serde_json::to_writer(&mut stdout, &event)?;
        writeln!(stdout)?;
        if let Event::ClipsChanged(snapshot) = event {
            last_snapshot = Some(snapshot);
        }
    }
    stdout.flush()?;

    if feeder.join().is_err() {
        return Err("command feeder thread panicked".into());
    }
    if args.summary {
        if let Some(snapshot) = &last_snapshot {
            print_summary(snapshot);
        }
    }
    Ok(())
}

fn read_script(args: &Args) -> Result<Vec<Command>, Box<dyn Error>> {
    let raw = if args.script.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(&args.script)
            .map_err(|err| format!("failed to read {}: {err}", args.script.display()))?
    };

    let mut entries: Vec<Value> = serde_json::from_str(&raw)?;
    for entry in &mut entries {
        fill_track_width(entry, args.track_width);
    }
    entries
        .into_iter()
        .map(|entry| serde_json::from_value(entry).map_err(Into::into))
        .collect()
}

/// Inserts the default track width into pointer commands that leave it out.
fn fill_track_width(entry: &mut Value, track_width: f64) {
    let Some(object) = entry.as_object_mut() else {
        return;
    };
    let needs_width = matches!(
        object.get("type").and_then(Value::as_str),
        Some("pointer_down" | "timeline_click")
    );
    if needs_width && !object.contains_key("track_width_px") {
        object.insert("track_width_px".to_string(), Value::from(track_width));
    }
}

fn print_summary(snapshot: &TimelineSnapshot) {
    eprintln!(
        "{} clip(s) over {}",
        snapshot.clips.len(),
        format_time_hms(snapshot.total_duration)
    );
    for clip in &snapshot.clips {
        eprintln!("  {}", clip_label(clip));
    }
}

/// One summary line in the editor's `MM:SS` clock.
fn clip_label(clip: &ClipSummary) -> String {
    format!(
        "#{:<4} {} - {}  ({})",
        clip.id,
        format_time(clip.start),
        format_time(clip.end),
        format_time(clip.duration)
    )
}

/// Stand-in export job that reports progress in fixed steps and never touches disk.
#[derive(Debug, Clone, Copy)]
struct SimulatedExport;

impl ExportBackend for SimulatedExport {
    fn export(
        &self,
        request: &ExportRequest,
        on_progress: &mut dyn FnMut(u8),
    ) -> trim_engine::Result<PathBuf> {
        debug!(clip_count = request.clips.len(), "simulated export started");
        for progress in (0..=100).step_by(usize::from(EXPORT_PROGRESS_STEP)) {
            on_progress(progress);
        }
        Ok(PathBuf::from(EXPORT_OUTPUT))
    }
}
