//! Music player control.
//!
//! The bot talks to the player through [`Player`]. The real implementation,
//! [`Mpc`], shells out to the `mpc` command-line client of an mpd server.

use std::fmt;
use std::future::Future;
use std::process::ExitStatus;

use tokio::process::Command;

/// Output format passed to `mpc -f`: one field per line.
const TRACK_FORMAT: &str = "%artist%\n%album%\n%title%\n%file%";
const TRACK_FIELDS: usize = 4;

/// A track as reported by the player. Fields the player does not know are
/// empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Track {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub uri: String,
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} – {}", self.title, self.artist)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {output}")]
    Failed {
        program: String,
        status: ExitStatus,
        output: String,
    },
    #[error("unexpected player output: {0}")]
    Malformed(String),
}

/// Operations the bot needs from a music player.
pub trait Player: Send + Sync + 'static {
    /// The track playing now.
    fn current(&self) -> impl Future<Output = Result<Track, PlayerError>> + Send;
    /// Skip to the next track.
    fn advance(&self) -> impl Future<Output = Result<(), PlayerError>> + Send;
    /// Go back to the previous track.
    fn rewind(&self) -> impl Future<Output = Result<(), PlayerError>> + Send;
    /// The queued tracks, in play order.
    fn playlist(&self) -> impl Future<Output = Result<Vec<Track>, PlayerError>> + Send;
}

/// `mpc` wrapper bound to one mpd server.
#[derive(Debug, Clone)]
pub struct Mpc {
    pub program: String,
    pub host: String,
    pub port: u16,
}

impl Default for Mpc {
    fn default() -> Self {
        Self {
            program: "mpc".to_string(),
            host: "localhost".to_string(),
            port: 6600,
        }
    }
}

impl Mpc {
    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-h")
            .arg(&self.host)
            .arg("-p")
            .arg(self.port.to_string())
            .args(args)
            .kill_on_drop(true);
        cmd
    }

    /// Run mpc and return its stdout. A non-zero exit is an error carrying
    /// whatever mpc printed.
    async fn output(&self, args: &[&str]) -> Result<String, PlayerError> {
        tracing::debug!(host = %self.host, port = self.port, ?args, "Running mpc");
        let output = self
            .command(args)
            .output()
            .await
            .map_err(|source| PlayerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(PlayerError::Failed {
                program: self.program.clone(),
                status: output.status,
                output: text.trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Player for Mpc {
    async fn current(&self) -> Result<Track, PlayerError> {
        let out = self.output(&["-f", TRACK_FORMAT, "current"]).await?;
        parse_current(&out)
    }

    async fn advance(&self) -> Result<(), PlayerError> {
        self.output(&["next"]).await.map(|_| ())
    }

    async fn rewind(&self) -> Result<(), PlayerError> {
        self.output(&["previous"]).await.map(|_| ())
    }

    async fn playlist(&self) -> Result<Vec<Track>, PlayerError> {
        let out = self.output(&["-f", TRACK_FORMAT, "playlist"]).await?;
        Ok(parse_playlist(&out))
    }
}

fn output_lines(output: &str) -> Vec<&str> {
    let trimmed = output.trim_end_matches(['\r', '\n']);
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed
        .split('\n')
        .map(|l| l.trim_end_matches('\r'))
        .collect()
}

fn track_from_fields(fields: &[&str]) -> Track {
    let field = |i: usize| fields.get(i).map(|s| s.to_string()).unwrap_or_default();
    Track {
        artist: field(0),
        album: field(1),
        title: field(2),
        uri: field(3),
    }
}

/// Parse `mpc -f TRACK_FORMAT current`. Empty output means nothing is
/// playing.
pub fn parse_current(output: &str) -> Result<Track, PlayerError> {
    let lines = output_lines(output);
    if lines.is_empty() {
        return Err(PlayerError::Malformed("nothing is playing".to_string()));
    }
    if lines.len() < TRACK_FIELDS {
        return Err(PlayerError::Malformed(format!(
            "expected {TRACK_FIELDS} lines, got {}",
            lines.len()
        )));
    }
    Ok(track_from_fields(&lines))
}

/// Parse `mpc -f TRACK_FORMAT playlist`. An incomplete trailing group is
/// dropped.
pub fn parse_playlist(output: &str) -> Vec<Track> {
    output_lines(output)
        .chunks_exact(TRACK_FIELDS)
        .map(track_from_fields)
        .collect()
}
