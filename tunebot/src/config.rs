//! Configuration for tunebot.
//!
//! Built-in defaults, overridden by an optional TOML file
//! (`~/.config/tunebot/config.toml` unless `--config` says otherwise),
//! overridden by command-line flags and their environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tunebot_irc::client::ConnectConfig;

use crate::player::Mpc;
use crate::session::SessionConfig;

pub const DEFAULT_SERVER: &str = "irc.pirc.pl:6697";
pub const DEFAULT_NICK: &str = "WhatItSaysOnTheBox";
pub const DEFAULT_CHANNEL: &str = "#WhatItSaysOnTheBox";
pub const DEFAULT_MPC: &str = "mpc";
pub const DEFAULT_MPD_HOST: &str = "localhost";
pub const DEFAULT_MPD_PORT: u16 = 6600;
pub const DEFAULT_KEYWORD: &str = "mpc";
/// Wait after next/previous before asking mpd what is playing.
pub const DEFAULT_SETTLE_MS: u64 = 200;
pub const DEFAULT_PLAYLIST_LIMIT: usize = 5;

#[derive(Parser, Debug, Default)]
#[command(name = "tunebot", about = "IRC bot that reports and skips tracks on mpd")]
pub struct Cli {
    /// Config file (default: ~/.config/tunebot/config.toml)
    #[arg(long, env = "TUNEBOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// IRC server address (host:port)
    #[arg(long, env = "TUNEBOT_SERVER")]
    pub server: Option<String>,

    /// Bot nick
    #[arg(long, env = "TUNEBOT_NICK")]
    pub nick: Option<String>,

    /// Channel to join
    #[arg(long, env = "TUNEBOT_CHANNEL")]
    pub channel: Option<String>,

    /// Force TLS on or off (`--tls`, `--tls=false`); port 6697 is always TLS
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub tls: Option<bool>,

    /// Skip TLS certificate verification (`--tls-insecure`, `--tls-insecure=false`)
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub tls_insecure: Option<bool>,

    /// mpd host
    #[arg(long, env = "MPD_HOST")]
    pub mpd_host: Option<String>,

    /// mpd port
    #[arg(long, env = "MPD_PORT")]
    pub mpd_port: Option<u16>,
}

/// Contents of the config file. Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Server address (host:port).
    pub server: Option<String>,
    pub nick: Option<String>,
    pub channel: Option<String>,
    /// Use TLS (auto-detected from :6697, but can force).
    pub tls: Option<bool>,
    pub tls_insecure: Option<bool>,
    /// Path or name of the mpc binary.
    pub mpc: Option<String>,
    pub mpd_host: Option<String>,
    pub mpd_port: Option<u16>,
    /// First word of every chat trigger.
    pub keyword: Option<String>,
    pub settle_ms: Option<u64>,
    pub playlist_limit: Option<usize>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tunebot")
            .join("config.toml")
    }

    /// Read a config file. A missing file is an empty config; a file that
    /// exists but cannot be read or parsed is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("can't read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("bad config file {}", path.display()))
    }
}

/// Effective settings after merging all sources.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server: String,
    pub tls: bool,
    pub tls_insecure: bool,
    pub nick: String,
    pub channel: String,
    pub mpc: String,
    pub mpd_host: String,
    pub mpd_port: u16,
    pub keyword: String,
    pub settle_delay: Duration,
    pub playlist_limit: usize,
}

impl Settings {
    /// Merge: CLI overrides > config file > defaults.
    pub fn merge(cli: &Cli, config: &Config) -> Self {
        let server = cli
            .server
            .clone()
            .or_else(|| config.server.clone())
            .unwrap_or_else(|| DEFAULT_SERVER.to_string());
        // Ensure server has a port; default to 6697 (TLS) if missing
        let server = if server.contains(':') {
            server
        } else {
            format!("{server}:6697")
        };

        let channel = cli
            .channel
            .clone()
            .or_else(|| config.channel.clone())
            .unwrap_or_else(|| DEFAULT_CHANNEL.to_string());
        let channel = if channel.starts_with(['#', '&']) {
            channel
        } else {
            format!("#{channel}")
        };

        Self {
            server,
            tls: cli.tls.or(config.tls).unwrap_or(false),
            tls_insecure: cli.tls_insecure.or(config.tls_insecure).unwrap_or(false),
            nick: cli
                .nick
                .clone()
                .or_else(|| config.nick.clone())
                .unwrap_or_else(|| DEFAULT_NICK.to_string()),
            channel,
            mpc: config.mpc.clone().unwrap_or_else(|| DEFAULT_MPC.to_string()),
            mpd_host: cli
                .mpd_host
                .clone()
                .or_else(|| config.mpd_host.clone())
                .unwrap_or_else(|| DEFAULT_MPD_HOST.to_string()),
            mpd_port: cli.mpd_port.or(config.mpd_port).unwrap_or(DEFAULT_MPD_PORT),
            keyword: config
                .keyword
                .clone()
                .unwrap_or_else(|| DEFAULT_KEYWORD.to_string()),
            settle_delay: Duration::from_millis(config.settle_ms.unwrap_or(DEFAULT_SETTLE_MS)),
            playlist_limit: config.playlist_limit.unwrap_or(DEFAULT_PLAYLIST_LIMIT),
        }
    }

    pub fn connect_config(&self) -> ConnectConfig {
        ConnectConfig {
            server_addr: self.server.clone(),
            tls: self.tls,
            tls_insecure: self.tls_insecure,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            nick: self.nick.clone(),
            channel: self.channel.clone(),
            keyword: self.keyword.clone(),
            settle_delay: self.settle_delay,
            playlist_limit: self.playlist_limit,
        }
    }

    pub fn player(&self) -> Mpc {
        Mpc {
            program: self.mpc.clone(),
            host: self.mpd_host.clone(),
            port: self.mpd_port,
        }
    }
}
