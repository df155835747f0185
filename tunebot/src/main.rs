//! tunebot: sits in one IRC channel and reports the track playing on mpd.
//!
//! Chat commands (keyword configurable):
//!
//!   mpc current    — what is playing
//!   mpc next       — skip forward, then report
//!   mpc previous   — skip back, then report
//!   mpc playlist   — the first few queued tracks
//!
//! Runs until the connection fails; there is no reconnect.

use anyhow::Result;
use clap::Parser;
use tunebot::config::{Cli, Config, Settings};
use tunebot::session::Session;
use tunebot_irc::client;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tunebot=info,tunebot_irc=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?;
    let settings = Settings::merge(&cli, &config);

    tracing::info!(
        server = %settings.server,
        nick = %settings.nick,
        channel = %settings.channel,
        mpd = %format!("{}:{}", settings.mpd_host, settings.mpd_port),
        "Starting tunebot"
    );

    let conn = client::establish_connection(&settings.connect_config()).await?;
    tracing::info!(server = %settings.server, "Connected");

    let session = Session::new(settings.session_config(), settings.player());
    if let Err(e) = client::run(conn, session).await {
        tracing::error!(error = %e, "Session ended");
        return Err(e.into());
    }
    Ok(())
}
