//! Full bot over an in-memory connection: pipeline + session + a scripted
//! player standing in for mpd.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use tunebot::player::{Player, PlayerError, Track};
use tunebot::session::{Session, SessionConfig};
use tunebot_irc::pipeline::{self, PipelineError};

const CHANNEL: &str = "#WhatItSaysOnTheBox";

#[derive(Clone, Default)]
struct ScriptedPlayer {
    calls: Arc<Mutex<Vec<&'static str>>>,
    fail: bool,
}

impl ScriptedPlayer {
    fn record(&self, call: &'static str) -> Result<(), PlayerError> {
        self.calls.lock().unwrap().push(call);
        if self.fail {
            return Err(PlayerError::Malformed("mpd unreachable".to_string()));
        }
        Ok(())
    }
}

impl Player for ScriptedPlayer {
    async fn current(&self) -> Result<Track, PlayerError> {
        self.record("current")?;
        Ok(Track {
            title: "Olson".to_string(),
            artist: "Boards of Canada".to_string(),
            album: "Music Has the Right to Children".to_string(),
            uri: "boc/mhtrtc/06.flac".to_string(),
        })
    }

    async fn advance(&self) -> Result<(), PlayerError> {
        self.record("advance")
    }

    async fn rewind(&self) -> Result<(), PlayerError> {
        self.record("rewind")
    }

    async fn playlist(&self) -> Result<Vec<Track>, PlayerError> {
        self.record("playlist")?;
        Ok(Vec::new())
    }
}

fn session(player: ScriptedPlayer) -> Session<ScriptedPlayer> {
    Session::new(
        SessionConfig {
            nick: "WhatItSaysOnTheBox".to_string(),
            channel: CHANNEL.to_string(),
            keyword: "mpc".to_string(),
            settle_delay: Duration::from_millis(10),
            playlist_limit: 5,
        },
        player,
    )
}

#[tokio::test]
async fn handshake_join_ping_and_trigger() {
    let player = ScriptedPlayer::default();
    let (server, client) = tokio::io::duplex(4096);
    let (read_half, write_half) = tokio::io::split(client);
    let bot = tokio::spawn(pipeline::run(
        BufReader::new(read_half),
        write_half,
        session(player.clone()),
    ));

    let (server_read, mut server_write) = tokio::io::split(server);
    let mut lines = BufReader::new(server_read).lines();

    server_write
        .write_all(b":irc.example.net NOTICE * :*** Looking up your hostname...\r\n")
        .await
        .unwrap();
    assert_eq!(
        lines.next_line().await.unwrap().unwrap(),
        "USER WhatItSaysOnTheBox 0 * WhatItSaysOnTheBox"
    );
    assert_eq!(lines.next_line().await.unwrap().unwrap(), "NICK WhatItSaysOnTheBox");

    server_write
        .write_all(
            b":irc.example.net 001 WhatItSaysOnTheBox :Welcome\r\n\
              :irc.example.net 375 WhatItSaysOnTheBox :- MOTD -\r\n\
              :irc.example.net 372 WhatItSaysOnTheBox :- hi\r\n\
              :irc.example.net 376 WhatItSaysOnTheBox :End of /MOTD command.\r\n",
        )
        .await
        .unwrap();
    assert_eq!(lines.next_line().await.unwrap().unwrap(), format!("JOIN {CHANNEL}"));

    server_write.write_all(b"PING :irc.example.net\r\n").await.unwrap();
    assert_eq!(lines.next_line().await.unwrap().unwrap(), "PONG irc.example.net");

    server_write
        .write_all(format!(":alice!a@host PRIVMSG {CHANNEL} :mpc next\r\n").as_bytes())
        .await
        .unwrap();
    assert_eq!(
        lines.next_line().await.unwrap().unwrap(),
        format!("PRIVMSG {CHANNEL} :Olson – Boards of Canada")
    );
    assert_eq!(*player.calls.lock().unwrap(), vec!["advance", "current"]);

    // A second end-of-MOTD must not rejoin; the PING after it proves the
    // bot produced nothing in between.
    server_write
        .write_all(b":irc.example.net 376 WhatItSaysOnTheBox :End\r\nPING :again\r\n")
        .await
        .unwrap();
    assert_eq!(lines.next_line().await.unwrap().unwrap(), "PONG again");

    drop(server_write);
    drop(lines);
    assert!(matches!(bot.await.unwrap(), Err(PipelineError::Closed)));
}

#[tokio::test]
async fn player_outage_is_silent_and_not_fatal() {
    let player = ScriptedPlayer {
        fail: true,
        ..Default::default()
    };
    let input = format!(
        ":srv NOTICE * :hi\r\n\
         :alice!a@host PRIVMSG {CHANNEL} :mpc current\r\n\
         :bob!b@host PRIVMSG WhatItSaysOnTheBox :mpc previous\r\n\
         PING :srv\r\n"
    );
    let input: &'static [u8] = Box::leak(input.into_bytes().into_boxed_slice());

    let (out_write, mut out_read) = tokio::io::duplex(4096);
    let result = pipeline::run(BufReader::new(input), out_write, session(player.clone())).await;
    assert!(matches!(result, Err(PipelineError::Closed)));

    let mut written = String::new();
    tokio::io::AsyncReadExt::read_to_string(&mut out_read, &mut written)
        .await
        .unwrap();
    assert_eq!(
        written,
        "USER WhatItSaysOnTheBox 0 * WhatItSaysOnTheBox\r\n\
         NICK WhatItSaysOnTheBox\r\n\
         PONG srv\r\n"
    );
    assert_eq!(*player.calls.lock().unwrap(), vec!["current", "rewind", "current"]);
}
