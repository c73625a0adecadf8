//! traffic-server: CLI + web server for the traffic proximity tracker.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use comfy_table::{Cell, Table};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use traffic_core::config::{self, Config};
use traffic_core::{Result, Target, TrafficError, TrafficTracker};

mod feed;
mod web;

#[derive(Parser)]
#[command(name = "traffic", version, about = "Traffic proximity tracker")]
struct Cli {
    /// Config file (defaults to ~/.traffic-scope/config.yaml)
    #[arg(long, global = true, env = "TRAFFIC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines feed and print the resulting traffic picture
    Replay {
        /// Feed file, or `-` for stdin
        file: PathBuf,

        #[command(flatten)]
        tracker: TrackerArgs,
    },

    /// Run the HTTP API with a periodic sweep
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// JSON-lines feed to stream into the live tracker
        #[arg(long)]
        feed: Option<PathBuf>,

        /// Milliseconds to wait after each target line of the feed
        #[arg(long, default_value = "100")]
        feed_pace_ms: u64,

        /// Seconds between eviction sweeps
        #[arg(long, default_value = "1.0")]
        sweep_interval: f64,

        #[command(flatten)]
        tracker: TrackerArgs,
    },

    /// Show or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Tracker overrides shared by `replay` and `serve`.
#[derive(Args, Debug, Default)]
struct TrackerArgs {
    /// Drop targets farther than this many statute miles (0 disables)
    #[arg(long, env = "TRAFFIC_IGNORE_DISTANCE")]
    ignore_distance: Option<f64>,

    /// Evict targets silent for longer than this many seconds
    #[arg(long, env = "TRAFFIC_MAX_AGE")]
    max_age: Option<f64>,

    /// Initial ownship latitude
    #[arg(long, allow_hyphen_values = true)]
    own_lat: Option<f64>,

    /// Initial ownship longitude
    #[arg(long, allow_hyphen_values = true)]
    own_lon: Option<f64>,
}

impl TrackerArgs {
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(d) = self.ignore_distance {
            config.tracker.ignore_beyond_distance_mi = d;
        }
        if let Some(a) = self.max_age {
            config.tracker.max_age_sec = a;
        }
        if self.own_lat.is_some() {
            config.ownship.lat = self.own_lat;
        }
        if self.own_lon.is_some() {
            config.ownship.lon = self.own_lon;
        }
        config.tracker.validate()
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Replay { file, tracker } => cmd_replay(config_path, &file, &tracker),
        Commands::Serve {
            host,
            port,
            feed,
            feed_pace_ms,
            sweep_interval,
            tracker,
        } => cmd_serve(
            config_path,
            host,
            port,
            feed,
            Duration::from_millis(feed_pace_ms),
            sweep_interval,
            &tracker,
        ),
        Commands::Config { action } => cmd_config(config_path, action),
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

/// An explicit `--config` must parse; the default file falls back to defaults.
fn load(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => config::load_config_from(p),
        None => Ok(config::load_config()),
    }
}

fn cmd_replay(config_path: Option<&Path>, file: &Path, args: &TrackerArgs) -> Result<()> {
    let mut cfg = load(config_path)?;
    args.apply(&mut cfg)?;

    let reader: Box<dyn BufRead> = if file.to_str() == Some("-") {
        Box::new(io::stdin().lock())
    } else {
        let f = std::fs::File::open(file).map_err(|e| {
            TrafficError::Config(format!("cannot open {}: {e}", file.display()))
        })?;
        Box::new(io::BufReader::new(f))
    };

    let mut tracker = TrafficTracker::new(cfg.tracker);
    let mut ownship = cfg.ownship.to_reference();
    let summary = feed::replay(reader, &mut tracker, &mut ownship);
    tracker.refresh_ages(summary.clock);

    println!();
    println!(
        "Lines: {} read, {} records, {} skipped",
        summary.lines, summary.records, summary.skipped
    );
    println!(
        "Updates: {} stored, {} filtered, {} invalid; {} buoys, {} sweeps, {} removed",
        summary.upserted,
        summary.filtered,
        summary.invalid,
        summary.buoys,
        summary.sweeps,
        summary.removed
    );
    println!("Tracking {} targets at t={:.1}", tracker.count(), summary.clock);
    println!();

    print_traffic(&tracker.sorted_by_distance());
    Ok(())
}

fn cmd_serve(
    config_path: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
    feed: Option<PathBuf>,
    feed_pace: Duration,
    sweep_interval: f64,
    args: &TrackerArgs,
) -> Result<()> {
    let mut cfg = load(config_path)?;
    args.apply(&mut cfg)?;
    let period = sweep_period(sweep_interval)?;

    let host = host.unwrap_or_else(|| cfg.server.host.clone());
    let port = port.unwrap_or(cfg.server.port);
    let state = Arc::new(web::AppState::new(
        TrafficTracker::new(cfg.tracker),
        cfg.ownship.to_reference(),
    ));

    info!(
        ignore_beyond_distance_mi = cfg.tracker.ignore_beyond_distance_mi,
        max_age_sec = cfg.tracker.max_age_sec,
        "tracker ready"
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        web::spawn_heartbeat(state.clone(), period);
        if let Some(path) = feed {
            web::spawn_feed(state.clone(), path, feed_pace);
        }
        web::serve(state, &host, port).await
    })
}

/// Heartbeat period from `--sweep-interval` seconds. Rejects values that
/// do not fit a `Duration` or round down to zero.
fn sweep_period(secs: f64) -> Result<Duration> {
    match Duration::try_from_secs_f64(secs) {
        Ok(d) if !d.is_zero() => Ok(d),
        _ => Err(TrafficError::Config(format!(
            "sweep interval must be a positive number of seconds, got {secs}"
        ))),
    }
}

fn cmd_config(config_path: Option<&Path>, action: ConfigAction) -> Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::config_file);

    match action {
        ConfigAction::Show => {
            let cfg = load(config_path)?;
            println!("# {}", path.display());
            print!("{}", config::serialize_config(&cfg));
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                return Err(TrafficError::Config(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                )));
            }
            let written = match config_path {
                Some(p) => config::save_config_to(&Config::default(), p).map(|_| path),
                None => config::save_config(&Config::default()),
            }?;
            println!("Wrote {}", written.display());
        }
    }
    Ok(())
}

fn print_traffic(targets: &[&Target]) {
    if targets.is_empty() {
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Identity", "Kind", "Callsign", "Dist (mi)", "Brg", "Alt (ft)", "Rel Alt", "Trk",
        "Spd (kts)", "Age (s)", "Source",
    ]);

    for t in targets {
        table.add_row(vec![
            Cell::new(&t.identity),
            Cell::new(t.kind),
            Cell::new(t.callsign.as_deref().unwrap_or("-")),
            Cell::new(
                t.distance_mi
                    .map(|d| format!("{d:.2}"))
                    .unwrap_or("-".into()),
            ),
            Cell::new(
                t.bearing_deg
                    .map(|b| format!("{b:.0}"))
                    .unwrap_or("-".into()),
            ),
            Cell::new(
                t.altitude_ft
                    .map(|a| a.to_string())
                    .unwrap_or("-".into()),
            ),
            Cell::new(
                t.alt_diff_ft
                    .map(|a| format!("{a:+}"))
                    .unwrap_or("-".into()),
            ),
            Cell::new(
                t.track_deg
                    .map(|h| format!("{h:.0}"))
                    .unwrap_or("-".into()),
            ),
            Cell::new(
                t.speed_kts
                    .map(|s| format!("{s:.0}"))
                    .unwrap_or("-".into()),
            ),
            Cell::new(format!("{:.1}", t.age)),
            Cell::new(t.source.as_deref().unwrap_or("-")),
        ]);
    }

    println!("{table}");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
