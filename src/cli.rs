use clap::Parser;
use std::path::PathBuf;

#[cfg(feature = "ffmpeg")]
const VIDEO_BACKEND: &str = "playa-ffmpeg 8.0 (static)";
#[cfg(not(feature = "ffmpeg"))]
const VIDEO_BACKEND: &str = "none (built without ffmpeg)";

const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Video:  ", VIDEO_BACKEND, "\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Keyframe picker and sprite-sheet exporter for video clips
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Video to start a new project from
    #[arg(value_name = "VIDEO", conflicts_with = "project")]
    pub video: Option<PathBuf>,

    /// Open an existing project by id
    #[arg(short = 'p', long = "project", value_name = "ID")]
    pub project: Option<String>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}
