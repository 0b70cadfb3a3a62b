//! FlipWorld host runner.
//!
//! Startup sequence:
//!
//!   1. load config, open the file store, settle the frame rate
//!      (`--fps` > input script `fixed_dt` > stored `Game-FPS` > config)
//!   2. when online, run the account loader on this thread: login (or
//!      register) if credentials are stored, refresh the world list, download
//!      uncached worlds
//!   3. build the `GameManager` and hand it to a `GameSession` worker
//!   4. wait for the session to end (script exhausted, BACK, or `--seconds`)
//!
//! With `--script` the session runs headless, one frame per scripted input,
//! which keeps runs reproducible. Without it the session paces itself in
//! real time against an idle input source.

mod account;
mod enemy;
mod entity;
mod game;
mod icon;
mod level;
mod loader;
mod player;
mod replay;
mod session;
mod world;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use fw_core::FpsChoice;
use fw_platform::storage::load_string;
use fw_platform::{AppConfig, FileStore, HttpTransport, Storage};
use fw_render::RecordingCanvas;

use account::{AccountSteps, PASSWORD_KEY, USERNAME_KEY};
use game::{GameManager, GameOptions};
use loader::{DataLoader, LoaderHost, LoaderPoll, POLL_INTERVAL};
use replay::{load_script_from_path, InputScript, ScriptedInput};
use session::{Pacing, SessionSlot, SharedInput};
use world::{OfflineSource, TransportSource, WorldSource};

const FPS_KEY: &str = "Game-FPS";

#[derive(Parser, Debug)]
#[command(name = "flip_world", about = "FlipWorld game client (host build)")]
struct Args {
    /// JSON config file.
    #[arg(long, default_value = "flip_world.json")]
    config: PathBuf,

    /// Skip the network: no login, uncached worlds fall back to the town.
    #[arg(long)]
    offline: bool,

    /// Replay a JSON input script headlessly.
    #[arg(long)]
    script: Option<PathBuf>,

    /// Frame rate: 30, 60, 120 or 240.
    #[arg(long)]
    fps: Option<String>,

    #[arg(long)]
    username: Option<String>,

    #[arg(long)]
    password: Option<String>,

    /// Stop a real-time session after this many seconds.
    #[arg(long, default_value_t = 10)]
    seconds: u64,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("FlipWorld starting...");
    let args = Args::parse();
    if let Err(e) = run(args) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), String> {
    let config = AppConfig::load_or_default(&args.config);
    let mut store = FileStore::new(&config.base_path);
    log::info!("{}: data under {}", config.title, store.base().display());

    if let Some(name) = &args.username {
        store
            .save(USERNAME_KEY, name)
            .map_err(|e| format!("Failed to save username: {e}"))?;
    }
    if let Some(password) = &args.password {
        store
            .save(PASSWORD_KEY, password)
            .map_err(|e| format!("Failed to save password: {e}"))?;
    }

    let script = args
        .script
        .as_deref()
        .map(load_script_from_path)
        .transpose()?;
    let fps = resolve_fps(&args, &config, &store, script.as_ref());
    if let Err(e) = store.save(FPS_KEY, fps.label()) {
        log::warn!("Failed to persist {FPS_KEY}: {e}");
    }

    if args.offline {
        log::info!("Offline mode, skipping account sync");
    } else if has_credentials(&store) {
        let steps = AccountSteps::login_flow(Box::new(store.clone()), config.api_base_url.clone());
        sync_account(&config, steps, "Syncing");
    } else {
        log::info!("No stored credentials, refreshing world list only");
        let steps = AccountSteps::world_list_flow(Box::new(store.clone()), config.api_base_url.clone());
        sync_account(&config, steps, "Worlds");
    }

    let source: Box<dyn WorldSource> = if args.offline {
        Box::new(OfflineSource)
    } else {
        Box::new(TransportSource::new(
            Box::new(HttpTransport::new(config.request_timeout())),
            config.api_base_url.clone(),
            config.request_timeout(),
        ))
    };
    let options = GameOptions {
        fps,
        show_fps: config.show_fps,
        imu_present: config.imu_present,
        username: args.username.clone(),
    };
    let manager = GameManager::new(Box::new(store.clone()), source, options);

    let mut slot = SessionSlot::new();
    let canvas = Box::new(RecordingCanvas::default());
    let deadline = match &script {
        Some(script) => {
            slot.start(manager, Box::new(ScriptedInput::new(script)), canvas, Pacing::Headless)
                .map_err(|e| e.to_string())?;
            None
        }
        None => {
            slot.start(manager, Box::new(SharedInput::new()), canvas, Pacing::Realtime)
                .map_err(|e| e.to_string())?;
            Some(Instant::now() + Duration::from_secs(args.seconds))
        }
    };

    while slot.is_active() && deadline.map_or(true, |d| Instant::now() < d) {
        std::thread::sleep(Duration::from_millis(50));
    }

    match slot.stop() {
        Some(Ok(game)) => {
            log::info!(
                "Session ended after {} frames on level {}/{}",
                game.frame_count(),
                game.current_level() + 1,
                game.level_count()
            );
            Ok(())
        }
        Some(Err(e)) => Err(e.to_string()),
        None => Ok(()),
    }
}

fn resolve_fps(
    args: &Args,
    config: &AppConfig,
    store: &dyn Storage,
    script: Option<&InputScript>,
) -> FpsChoice {
    if let Some(label) = &args.fps {
        match FpsChoice::from_label(label) {
            Some(fps) => return fps,
            None => log::warn!("Ignoring unknown --fps '{label}'"),
        }
    }
    if let Some(fps) = script.and_then(InputScript::fps_hint) {
        return fps;
    }
    load_string(store, FPS_KEY)
        .ok()
        .and_then(|label| FpsChoice::from_label(&label))
        .unwrap_or_else(|| config.fps_choice())
}

fn has_credentials(store: &dyn Storage) -> bool {
    [USERNAME_KEY, PASSWORD_KEY]
        .iter()
        .all(|key| load_string(store, key).is_ok_and(|v| !v.is_empty()))
}

/// Drive an account loader on this thread until it reaches a terminal state.
fn sync_account(config: &AppConfig, steps: AccountSteps, title: &str) {
    let transport = HttpTransport::new(config.request_timeout());
    let mut host = LoaderHost::new();
    if let Err(e) = host.begin(DataLoader::new(title, Box::new(steps), Box::new(transport))) {
        log::error!("Could not start account sync: {e}");
        return;
    }

    let mut canvas = RecordingCanvas::default();
    while host.is_busy() {
        match host.tick(Instant::now()) {
            Some(LoaderPoll::ShowResult(text)) => log::info!("{title}: {text}"),
            Some(LoaderPoll::ShowError(message)) => log::warn!("{title} failed: {message}"),
            Some(LoaderPoll::Navigate(view)) => log::warn!("{title} redirected to {view:?}"),
            Some(LoaderPoll::Waiting | LoaderPoll::Advanced) | None => {}
        }
        if let Some(loader) = host.active() {
            loader.draw(&mut canvas);
        }
        std::thread::sleep(POLL_INTERVAL / 5);
    }
    log::info!("{title} finished on {:?}", host.view());
    host.finish();
}
