use anyhow::{Context, Result};
use clap::Parser;
use eframe::egui;
use log::{debug, info, warn};
use std::sync::Arc;

use keysheet::app::{AppServices, KeysheetApp, Startup};
use keysheet::cli::Args;
use keysheet::config::{CONFIG_FILE_NAME, EditorConfig};
use keysheet::core::SystemClock;
use keysheet::export::{SheetEncoder, SpriteEncoder};
use keysheet::paths::{self, PathConfig};
use keysheet::shell;
use keysheet::storage::{FsProjectStore, SharedStore};

/// eframe window/UI state, kept apart from the editor config
const UI_STATE_FILE: &str = "keysheet_ui.ron";

#[cfg(feature = "ffmpeg")]
fn build_encoder() -> Arc<dyn SpriteEncoder> {
    use keysheet::media::decode::FfmpegGrabber;
    Arc::new(SheetEncoder::new(Arc::new(FfmpegGrabber)))
}

#[cfg(not(feature = "ffmpeg"))]
fn build_encoder() -> Arc<dyn SpriteEncoder> {
    use keysheet::media::UnavailableGrabber;
    Arc::new(SheetEncoder::new(Arc::new(UnavailableGrabber)))
}

fn main() -> Result<()> {
    let args = Args::parse();
    shell::init_logger(args.verbosity);

    info!("keysheet v{} starting", env!("CARGO_PKG_VERSION"));
    debug!("Command-line args: {:?}", args);

    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = paths::ensure_dirs(&path_config) {
        warn!("{:#}", e);
    }

    let config_path = paths::config_file(CONFIG_FILE_NAME, &path_config);
    info!("Config path: {}", config_path.display());
    let config = EditorConfig::load_or_default(&config_path);

    let projects_dir = paths::projects_dir(&path_config);
    info!("Projects: {}", projects_dir.display());
    let store: SharedStore = Arc::new(
        FsProjectStore::open(&projects_dir)
            .with_context(|| format!("Failed to open project store at {}", projects_dir.display()))?,
    );

    let services = AppServices {
        store,
        config,
        clock: SystemClock::shared(),
        encoder: build_encoder(),
    };

    let startup = match (args.video, args.project) {
        (Some(video), _) => Startup::New(video),
        (None, Some(id)) => Startup::Open(id),
        (None, None) => Startup::Dashboard,
    };

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(format!("keysheet v{}", env!("CARGO_PKG_VERSION")))
            .with_inner_size([1280.0, 800.0])
            .with_resizable(true),
        persist_window: true,
        persistence_path: Some(paths::data_file(UI_STATE_FILE, &path_config)),
        ..Default::default()
    };

    eframe::run_native(
        "keysheet",
        native_options,
        Box::new(move |cc| {
            let ui_state = KeysheetApp::load_ui_state(cc.storage);
            Ok(Box::new(KeysheetApp::new(services, ui_state, startup)))
        }),
    )
    .map_err(|e| anyhow::anyhow!("eframe error: {}", e))
}
