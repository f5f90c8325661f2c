use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};

use city_core::config::{resolve_dashboard_config, API_BASE_URL_ENV, CONFIG_PATH_ENV};
use city_core::{completion_channel, dispatch_channel, run_request_pump, StateClient};
use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use tracing::info;

mod app;
mod ui;

use app::DashboardApp;

#[derive(Clone)]
struct ChannelWriter {
    sender: Sender<String>,
}

impl std::io::Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(text) = String::from_utf8(buf.to_vec()) {
            let _ = self.sender.send(text);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Terminal dashboard for a city in the strategy game", long_about = None)]
struct Cli {
    /// Base URL of the game-state API. Overrides CITY_API_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,
    /// City to load with `GET /state?cityId=`.
    #[arg(long)]
    city_id: Option<String>,
    /// Player to load with `GET /state?playerId=` when no city is given.
    #[arg(long)]
    player_id: Option<String>,
    /// Seconds between automatic refreshes.
    #[arg(long)]
    refresh_secs: Option<u64>,
    /// JSON config file. Overrides CITY_DASHBOARD_CONFIG_PATH.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let (log_tx, log_rx) = mpsc::channel::<String>();
    let log_writer_tx = log_tx.clone();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .with_ansi(false)
        .with_writer(move || ChannelWriter {
            sender: log_writer_tx.clone(),
        })
        .init();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));
    let env_base_url = std::env::var(API_BASE_URL_ENV).ok();
    let (mut config, metadata) =
        resolve_dashboard_config(config_path.as_deref(), env_base_url.as_deref());
    if let Some(url) = cli.base_url {
        config.set_api_base_url(url);
    }
    if cli.city_id.is_some() {
        config.set_city_id(cli.city_id);
    }
    if cli.player_id.is_some() {
        config.set_player_id(cli.player_id);
    }
    if let Some(secs) = cli.refresh_secs {
        config.set_refresh_interval_secs(secs);
    }

    let client = StateClient::from_config(&config)?;
    info!(
        base_url = %client.base_url(),
        config_path = ?metadata.path(),
        city_id = ?config.city_id(),
        "Dashboard starting"
    );

    let (dispatch_tx, dispatch_rx) = dispatch_channel();
    let (completion_tx, completion_rx) = completion_channel();
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

    let ui_config = config.clone();
    let ui_handle = std::thread::spawn(move || -> Result<()> {
        let app = DashboardApp::new(&ui_config, dispatch_tx, completion_rx, shutdown_tx, log_rx)?;
        app.run()
    });

    // Returns once the dashboard drops its dispatch sender.
    run_request_pump(client, dispatch_rx, completion_tx).await;

    if shutdown_rx.try_recv().is_ok() {
        info!("Dashboard requested shutdown");
    }
    ui_handle
        .join()
        .map_err(|_| eyre!("dashboard thread panicked"))?
}
