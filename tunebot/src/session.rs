//! Session state machine: registration, keep-alive, channel join and the
//! chat triggers that drive the music player.
//!
//! A [`Session`] sits in the dispatcher slot of the pipeline. It sees one
//! inbound message at a time and returns the messages to send back.

use std::fmt;
use std::time::Duration;

use tunebot_irc::irc::{self, Message};
use tunebot_irc::pipeline::Dispatch;

use crate::player::Player;

/// Server replies and notices the bot recognizes and deliberately ignores.
const IGNORED_COMMANDS: &[&str] = &[
    "NOTICE",
    "PONG",
    "MODE",
    "JOIN",
    "PART",
    "QUIT",
    "NICK",
    irc::RPL_WELCOME,
    irc::RPL_YOURHOST,
    irc::RPL_CREATED,
    irc::RPL_MYINFO,
    irc::RPL_ISUPPORT,
    irc::RPL_STATSCONN,
    irc::RPL_LUSERCLIENT,
    irc::RPL_LUSEROP,
    irc::RPL_LUSERUNKNOWN,
    irc::RPL_LUSERCHANNELS,
    irc::RPL_LUSERME,
    irc::RPL_LOCALUSERS,
    irc::RPL_GLOBALUSERS,
    irc::RPL_TOPIC,
    irc::RPL_TOPICWHOTIME,
    irc::RPL_NAMREPLY,
    irc::RPL_ENDOFNAMES,
    irc::RPL_MOTD,
    irc::RPL_MOTDSTART,
    irc::RPL_HOSTHIDDEN,
];

/// Per-connection flags. Both start false and only ever flip to true.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    /// USER/NICK have been sent.
    pub registered: bool,
    /// JOIN for the configured channel has been sent.
    pub joined: bool,
}

/// Chat commands the bot reacts to, e.g. `mpc next`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// `<keyword> next`: skip forward, then report.
    Advance,
    /// `<keyword> previous`: skip back, then report.
    Rewind,
    /// `<keyword> current`: report the playing track.
    Query,
    /// `<keyword> playlist`: list the queue.
    Playlist,
}

impl Trigger {
    pub fn parse(text: &str, keyword: &str) -> Option<Self> {
        let text = text.trim();
        let action = if keyword.is_empty() {
            text
        } else {
            let rest = text.strip_prefix(keyword)?;
            if !rest.starts_with(char::is_whitespace) {
                return None;
            }
            rest.trim_start()
        };
        match action {
            "next" => Some(Self::Advance),
            "previous" => Some(Self::Rewind),
            "current" => Some(Self::Query),
            "playlist" => Some(Self::Playlist),
            _ => None,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Advance => "next",
            Self::Rewind => "previous",
            Self::Query => "current",
            Self::Playlist => "playlist",
        };
        f.write_str(name)
    }
}

/// Fixed parameters of a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub nick: String,
    pub channel: String,
    /// First word of every trigger.
    pub keyword: String,
    /// Pause between skipping a track and asking what is playing, so the
    /// player has caught up.
    pub settle_delay: Duration,
    /// Most tracks listed in reply to `playlist`.
    pub playlist_limit: usize,
}

/// The dispatcher. Owns the session flags and the player.
pub struct Session<P> {
    config: SessionConfig,
    state: SessionState,
    player: P,
}

impl<P: Player> Session<P> {
    pub fn new(config: SessionConfig, player: P) -> Self {
        Self {
            config,
            state: SessionState::default(),
            player,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Process one inbound message and return the replies, in send order.
    pub async fn handle(&mut self, msg: Message) -> Vec<Message> {
        let mut out = Vec::new();

        // Whatever the server says first, answer with registration.
        if !self.state.registered {
            let nick = self.config.nick.as_str();
            tracing::info!(nick, "Registering");
            out.push(Message::new("USER", vec![nick, "0", "*", nick]));
            out.push(Message::new("NICK", vec![nick]));
            self.state.registered = true;
        }

        match msg.command.as_str() {
            irc::RPL_ENDOFMOTD | irc::ERR_NOMOTD => {
                if !self.state.joined {
                    tracing::info!(channel = %self.config.channel, "Joining");
                    out.push(Message::new("JOIN", vec![self.config.channel.as_str()]));
                    self.state.joined = true;
                }
            }
            "PING" => {
                out.push(Message {
                    prefix: None,
                    command: "PONG".to_string(),
                    params: msg.params,
                });
            }
            "PRIVMSG" => self.handle_privmsg(&msg, &mut out).await,
            cmd if IGNORED_COMMANDS.contains(&cmd) => {}
            _ => {
                tracing::debug!(
                    command = %msg.command,
                    prefix = ?msg.prefix,
                    params = ?msg.params,
                    "Unrecognized command"
                );
            }
        }
        out
    }

    async fn handle_privmsg(&self, msg: &Message, out: &mut Vec<Message>) {
        let (Some(target), Some(text)) = (msg.params.first(), msg.params.get(1)) else {
            tracing::warn!(params = ?msg.params, "PRIVMSG without target and text");
            return;
        };

        let Some(trigger) = Trigger::parse(text, &self.config.keyword) else {
            return;
        };

        let reply_to = if target.eq_ignore_ascii_case(&self.config.channel) {
            self.config.channel.clone()
        } else if let Some(nick) = msg.source_nick() {
            nick.to_string()
        } else {
            tracing::warn!(%trigger, "Private trigger without a sender, ignoring");
            return;
        };
        tracing::info!(%trigger, from = ?msg.source_nick(), reply_to = %reply_to, "Trigger");

        match trigger {
            Trigger::Advance => {
                if let Err(e) = self.player.advance().await {
                    tracing::warn!(error = %e, "Skipping to next track failed");
                }
                tokio::time::sleep(self.config.settle_delay).await;
                self.reply_current(&reply_to, out).await;
            }
            Trigger::Rewind => {
                if let Err(e) = self.player.rewind().await {
                    tracing::warn!(error = %e, "Skipping to previous track failed");
                }
                tokio::time::sleep(self.config.settle_delay).await;
                self.reply_current(&reply_to, out).await;
            }
            Trigger::Query => self.reply_current(&reply_to, out).await,
            Trigger::Playlist => self.reply_playlist(&reply_to, out).await,
        }
    }

    async fn reply_current(&self, reply_to: &str, out: &mut Vec<Message>) {
        match self.player.current().await {
            Ok(track) => {
                let text = track.to_string();
                out.push(Message::new("PRIVMSG", vec![reply_to, text.as_str()]));
            }
            Err(e) => tracing::warn!(error = %e, "Querying current track failed"),
        }
    }

    async fn reply_playlist(&self, reply_to: &str, out: &mut Vec<Message>) {
        match self.player.playlist().await {
            Ok(tracks) => {
                for (i, track) in tracks.iter().take(self.config.playlist_limit).enumerate() {
                    let text = format!("{}. {track}", i + 1);
                    out.push(Message::new("PRIVMSG", vec![reply_to, text.as_str()]));
                }
            }
            Err(e) => tracing::warn!(error = %e, "Listing playlist failed"),
        }
    }
}

impl<P: Player> Dispatch for Session<P> {
    async fn dispatch(&mut self, msg: Message) -> Vec<Message> {
        self.handle(msg).await
    }
}
