use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kadr::config::Config;
use kadr::controls::ControlsVisibilityTimer;
use kadr::models::{EpisodeNavigationContext, NavigationDirection, TranslationEntry, TranslationKind};
use kadr::pip::{
    LoggingRemoteChannel, Orientation, PictureInPictureCoordinator, PlatformCapabilities,
    RemoteCommand,
};
use kadr::player::{
    LifecycleEvent, PlaybackSessionController, SessionEvent, SessionHandle, SimulatedEngine,
    SourceResolver,
};
use kadr::utils::format_duration;

const SIMULATED_DURATION_MS: u64 = 24 * 60 * 1000;

struct Args {
    catalogue: PathBuf,
    episode: u32,
    total: Option<u32>,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let Some(catalogue) = args.next() else {
        bail!("usage: kadr <catalogue.json> [episode] [total]");
    };
    let episode = match args.next() {
        Some(raw) => raw.parse().context("episode must be a number")?,
        None => 1,
    };
    let total = args
        .next()
        .map(|raw| raw.parse().context("total must be a number"))
        .transpose()?;

    Ok(Args {
        catalogue: PathBuf::from(catalogue),
        episode,
        total,
    })
}

fn load_catalogue(path: &PathBuf) -> Result<Vec<TranslationEntry>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalogue {:?}", path))?;
    serde_json::from_str(&contents).context("Failed to parse catalogue")
}

fn print_status(session: &SessionHandle) {
    let snapshot = session.view().snapshot();
    println!(
        "{} | episode {}/{} | {} / {} | buffered {}% | {} {} | x{} | {}",
        snapshot.state,
        snapshot.episode.current_episode,
        snapshot.episode.total_episodes,
        format_duration(Duration::from_millis(snapshot.current_time_ms)),
        format_duration(Duration::from_millis(snapshot.duration_ms)),
        snapshot.buffered_percent,
        snapshot
            .current_kind
            .map(|kind| kind.to_string())
            .unwrap_or_else(|| "-".to_string()),
        snapshot.current_quality.unwrap_or_else(|| "-".to_string()),
        snapshot.current_speed,
        snapshot.zoom_mode.label(),
    );
}

async fn run_command(
    line: &str,
    session: &SessionHandle,
    pip: &PictureInPictureCoordinator,
) -> Result<bool> {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(true);
    };
    let argument = parts.next();

    match (command, argument) {
        ("play", _) => session.play().await?,
        ("pause", _) => session.pause().await?,
        ("toggle", _) => {
            if pip.is_compact() {
                pip.on_compact_action(RemoteCommand::PlayPause).await?
            } else {
                session.toggle().await?
            }
        }
        ("back", _) => {
            if pip.is_compact() {
                pip.on_compact_action(RemoteCommand::Back).await?
            } else {
                session.seek_relative(-kadr::constants::SEEK_BACK_MS).await?;
            }
        }
        ("forward", _) => {
            if pip.is_compact() {
                pip.on_compact_action(RemoteCommand::Next).await?
            } else {
                session.seek_relative(kadr::constants::SEEK_FORWARD_MS).await?;
            }
        }
        ("seek", Some(ms)) => {
            session.seek_absolute(ms.parse().context("seek takes milliseconds")?).await?;
        }
        ("speed", Some(speed)) => {
            session.set_speed(speed.parse().context("speed takes a number")?).await?
        }
        ("quality", Some(quality)) => session.select_quality(quality).await?,
        ("kind", Some(kind)) => {
            let kind: TranslationKind = kind.parse().map_err(anyhow::Error::msg)?;
            session.select_kind(kind).await?
        }
        ("next", _) => {
            let outcome = session.navigate_episode(NavigationDirection::Next).await?;
            println!("{:?}", outcome);
        }
        ("prev", _) => {
            let outcome = session.navigate_episode(NavigationDirection::Previous).await?;
            println!("{:?}", outcome);
        }
        ("pip", _) => pip.enter_compact()?,
        ("unpip", _) => pip.on_compact_exit(),
        ("stop", _) => pip.on_lifecycle(LifecycleEvent::Stopped).await?,
        ("start", _) => pip.on_lifecycle(LifecycleEvent::Started).await?,
        ("status", _) => {}
        ("quit", _) | ("exit", _) => return Ok(false),
        (other, _) => {
            println!("Unknown command: {}", other);
            return Ok(true);
        }
    }

    print_status(session);
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kadr=debug")),
        )
        .init();

    let args = parse_args()?;
    let config = Config::load()?;
    let entries = load_catalogue(&args.catalogue)?;
    let total = args
        .total
        .or_else(|| entries.iter().map(|entry| entry.episode).max())
        .unwrap_or(1);
    let context = EpisodeNavigationContext::new(args.episode, total);
    info!(
        "Loaded {} catalogue entries for {} episodes",
        entries.len(),
        total
    );

    let (engine, _control) = SimulatedEngine::new(SIMULATED_DURATION_MS);
    let resolver = SourceResolver::new(entries, context);
    let session = PlaybackSessionController::spawn(Box::new(engine), &config, resolver);

    let controls = ControlsVisibilityTimer::new(config.controls.auto_hide());
    let _follower = controls.spawn_state_follower(session.view().subscribe_state());
    let pip = PictureInPictureCoordinator::new(
        session.clone(),
        controls.clone(),
        Box::new(LoggingRemoteChannel),
        PlatformCapabilities {
            pip_supported: true,
            orientation: Orientation::Landscape,
        },
        &config.pip,
    );
    let _remote_sync = pip.watch_state();

    let mut events = session.view().subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::FallbackRequested { embed_url, reason } => {
                    warn!("Playback failed ({}); open {} in a web view", reason, embed_url)
                }
                other => info!("Session event: {:?}", other),
            }
        }
    });

    if let Err(err) = session
        .open_episode(
            context.current_episode,
            config.playback.preferred_kind,
            &config.playback.preferred_quality,
        )
        .await
    {
        warn!("Could not open episode {}: {}", context.current_episode, err);
    }
    print_status(&session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match run_command(line.trim(), &session, &pip).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => println!("Error: {}", err),
        }
    }

    session.shutdown().await?;
    info!("Session closed");
    Ok(())
}
