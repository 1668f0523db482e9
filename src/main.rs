//! Vigil: identity and attire compliance monitoring for video streams.

use anyhow::Result;
use clap::Parser;
use log::info;
use vigil::app::{MonitorApp, VideoSource};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Camera index to use
    #[arg(long, default_value = "0")]
    cam: i32,

    /// Video file to process instead of a camera
    #[arg(short, long)]
    video: Option<String>,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<String>,

    /// Run without a display window
    #[arg(long)]
    headless: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    info!("Vigil - Stream Monitoring");

    let config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {}", config_path);
        match vigil::config::Config::from_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::warn!("Failed to load config file: {}. Using defaults.", e);
                vigil::config::Config::default()
            }
        }
    } else {
        vigil::config::Config::default()
    };
    config.validate()?;

    let video_source = if let Some(video_path) = args.video {
        VideoSource::File(video_path)
    } else {
        VideoSource::Camera(args.cam)
    };

    let mut app = MonitorApp::new(video_source, !args.headless, &config)?;
    app.run()?;

    Ok(())
}
