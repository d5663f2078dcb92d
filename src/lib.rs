pub mod alert;
pub mod clock;
pub mod error;
pub mod session;
pub mod settings;
pub mod timer;
pub mod utils;

use std::{
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use log::{error, info};

use alert::{default_output, AlertPlayer};
use clock::{ClockService, HttpTimeSource, ReferenceTimeSource};
use session::{LinkStore, SessionMode};
use settings::{default_settings_path, Settings, SettingsStore};
use timer::{
    commands::{self, HubSnapshot},
    format::format_time_of_day,
    ControllerStatus, DisplayState, TimerHub,
};

const DEBUG_ENV: &str = "LINKCLOCK_DEBUG";
const RENDER_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Settings file. Defaults to $LINKCLOCK_SETTINGS, then ./linkclock.json
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Link that new sessions are written onto
    #[arg(long)]
    base_link: Option<String>,

    /// Skip the reference time source and trust the local clock
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a new shared session, print its link and follow it
    Start {
        #[command(subcommand)]
        kind: StartKind,
    },
    /// Open a shared link and follow whatever session it carries
    Watch { link: String },
    /// Print the base link
    Link,
}

#[derive(Subcommand, Debug)]
enum StartKind {
    Stopwatch,
    Timer {
        minutes: i64,
        #[arg(default_value_t = 0)]
        seconds: i64,
    },
    /// Ring at the next local HH:MM
    Alarm { time: String },
}

pub fn run() {
    let default_level = if std::env::var_os(DEBUG_ENV).is_some() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    // RUST_LOG still wins over the default level.
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    let args = Args::parse();
    if let Err(err) = run_with(args) {
        error!("{err:#}");
        std::process::exit(1);
    }
}

fn run_with(args: Args) -> Result<()> {
    let path = args.settings.clone().unwrap_or_else(default_settings_path);
    let mut settings = SettingsStore::new(path)?.settings();
    if let Some(base_link) = args.base_link.clone() {
        settings.base_link = base_link;
    }

    if let Command::Link = args.command {
        println!("{}", settings.base_link);
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    runtime.block_on(follow(args, settings))
}

async fn follow(args: Args, settings: Settings) -> Result<()> {
    let clock = ClockService::system();
    let source: Option<Arc<dyn ReferenceTimeSource>> = if args.offline {
        None
    } else {
        Some(Arc::new(HttpTimeSource::new(
            settings.time_source_url.clone(),
            settings.sync_timeout(),
        )?))
    };

    let link = match &args.command {
        Command::Watch { link } => link.clone(),
        _ => settings.base_link.clone(),
    };
    let store = Arc::new(LinkStore::new(&link)?);
    let player = Arc::new(AlertPlayer::new(default_output()));
    let hub = TimerHub::new(clock.clone(), store, player.clone(), &settings);

    match args.command {
        Command::Start { kind } => {
            // New anchors are written in corrected time, so sync first.
            if let Some(source) = source {
                let _ = clock
                    .estimate_offset(source.as_ref(), settings.sync_attempts)
                    .await;
            }
            hub.attach();
            let started = match kind {
                StartKind::Stopwatch => commands::start_stopwatch(&hub),
                StartKind::Timer { minutes, seconds } => {
                    commands::start_timer(&hub, minutes, seconds)
                }
                StartKind::Alarm { time } => commands::parse_time_of_day(&time)
                    .and_then(|(hour, minute)| commands::start_alarm(&hub, hour, minute)),
            };
            if let Err(err) = started {
                hub.shutdown();
                anyhow::bail!(err);
            }
        }
        Command::Watch { .. } => {
            if let Some(source) = source {
                clock.spawn_sync(source, settings.sync_attempts);
            }
            hub.attach();
        }
        Command::Link => return Ok(()),
    }

    let state = commands::get_state(&hub).map_err(anyhow::Error::msg)?;
    if state.active_mode == SessionMode::Home
        || state.snapshot.status != ControllerStatus::Running
    {
        info!("no active session in {}", state.link);
        hub.shutdown();
        return Ok(());
    }
    println!("{}", state.link);
    if let Some(target) = hub.descriptor().target_time {
        if let Some(label) = format_time_of_day(target, &Local) {
            println!("alarm set for {label}");
        }
    }

    let mut interval = tokio::time::interval(RENDER_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let state = commands::get_state(&hub).map_err(anyhow::Error::msg)?;
                render(&state)?;
                if finished(&state, player.is_playing()) {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
        }
    }
    println!();

    hub.shutdown();
    Ok(())
}

fn render(state: &HubSnapshot) -> Result<()> {
    let indicator = if state.synced { "synced" } else { "local" };
    let mut out = io::stdout().lock();
    write!(
        out,
        "\r[{indicator}] {:<9} {:>12}",
        state.active_mode.as_str(),
        state.text
    )?;
    out.flush()?;
    Ok(())
}

/// Countdowns end once their alert has played out; a stopwatch runs until
/// interrupted or cleared by another viewer.
fn finished(state: &HubSnapshot, alert_playing: bool) -> bool {
    if state.snapshot.status != ControllerStatus::Running {
        return true;
    }
    match state.snapshot.display {
        DisplayState::Timer(_) | DisplayState::Alarm(_) => state.snapshot.fired && !alert_playing,
        DisplayState::Stopwatch(_) | DisplayState::Idle => false,
    }
}
