//! Reader → dispatcher → writer pipeline.
//!
//! Three tasks joined by two single-slot channels:
//!
//! ```text
//! transport ─▶ read_loop ─▶ inbound ─▶ dispatch_loop ─▶ outbound ─▶ write_loop ─▶ transport
//! ```
//!
//! Every send waits until the previous message has been taken, so the
//! reader never gets ahead of the dispatcher and the dispatcher never gets
//! ahead of the writer. Messages are handled one at a time, in arrival
//! order.
//!
//! Any transport error is terminal for the whole pipeline and comes back
//! out of [`run`]. There is no reconnect.

use std::future::Future;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::irc::Message;

/// Capacity of the inbound and outbound channels. tokio does not allow
/// rendezvous channels, one slot is the closest.
pub const CHANNEL_CAPACITY: usize = 1;

/// Terminal pipeline failure.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("read from server failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("write to server failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("server closed the connection")]
    Closed,
    #[error("{0} channel closed unexpectedly")]
    ChannelClosed(&'static str),
    #[error("pipeline task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Consumer of inbound messages. Implemented by the bot's session state
/// machine; the pipeline calls it for one message at a time and forwards
/// the returned messages, in order, to the writer.
pub trait Dispatch: Send + 'static {
    fn dispatch(&mut self, msg: Message) -> impl Future<Output = Vec<Message>> + Send;
}

/// Run the full pipeline over a split transport until it fails.
///
/// When the read side fails, messages already read are still dispatched
/// and their replies written before the read error is returned. When the
/// write side fails, the other tasks are stopped straight away.
pub async fn run<R, W, D>(reader: R, writer: W, dispatcher: D) -> Result<(), PipelineError>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
    D: Dispatch,
{
    let (in_tx, in_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (out_tx, out_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let mut reader_task = tokio::spawn(read_loop(reader, in_tx));
    let dispatch_task = tokio::spawn(dispatch_loop(dispatcher, in_rx, out_tx));
    let mut writer_task = tokio::spawn(write_loop(writer, out_rx));

    tokio::select! {
        biased;
        read = &mut reader_task => {
            // Inbound sender is gone: the dispatcher finishes what it holds,
            // drops the outbound sender, and the writer drains after it.
            let dispatched = dispatch_task.await.map_err(PipelineError::from);
            let written = flatten(writer_task.await);
            terminal_error(flatten(read), dispatched, written)
        }
        written = &mut writer_task => {
            let written = flatten(written);
            if written.is_err() {
                reader_task.abort();
                dispatch_task.abort();
                return written;
            }
            // Outbound closed without a write error: the dispatcher has
            // stopped, and the reader stops on its next send.
            let dispatched = dispatch_task.await.map_err(PipelineError::from);
            let read = flatten(reader_task.await);
            terminal_error(read, dispatched, Err(PipelineError::ChannelClosed("outbound")))
        }
    }
}

impl PipelineError {
    /// Transport failures name the actual cause. A closed channel only
    /// means another task stopped first.
    fn rank(&self) -> u8 {
        match self {
            Self::Read(_) | Self::Write(_) | Self::Closed => 2,
            Self::Task(_) => 1,
            Self::ChannelClosed(_) => 0,
        }
    }
}

fn flatten(joined: Result<Result<(), PipelineError>, tokio::task::JoinError>) -> Result<(), PipelineError> {
    joined?
}

/// Pick the error that ended the pipeline: highest rank wins, the reader
/// wins ties, then the writer.
fn terminal_error(
    read: Result<(), PipelineError>,
    dispatched: Result<(), PipelineError>,
    written: Result<(), PipelineError>,
) -> Result<(), PipelineError> {
    [read, written, dispatched]
        .into_iter()
        .filter_map(Result::err)
        .reduce(|best, e| if e.rank() > best.rank() { e } else { best })
        .map_or(Ok(()), Err)
}

/// Pull lines off the transport, decode them, and hand them to the
/// dispatcher. Malformed lines are logged and dropped.
pub async fn read_loop<R>(mut reader: R, inbound: mpsc::Sender<Message>) -> Result<(), PipelineError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::with_capacity(512);
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(PipelineError::Read)?;
        if n == 0 {
            return Err(PipelineError::Closed);
        }

        let line = String::from_utf8_lossy(&buf);
        let raw = line.trim_end_matches(['\r', '\n']);
        tracing::debug!(line = %raw, "IN");

        match Message::parse(raw) {
            Ok(msg) => {
                if inbound.send(msg).await.is_err() {
                    return Err(PipelineError::ChannelClosed("inbound"));
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, line = %raw, "Dropping malformed line");
            }
        }
    }
}

/// Feed inbound messages to the dispatcher one at a time and pass its
/// replies on. Returns when the reader goes away.
pub async fn dispatch_loop<D>(
    mut dispatcher: D,
    mut inbound: mpsc::Receiver<Message>,
    outbound: mpsc::Sender<Message>,
) where
    D: Dispatch,
{
    while let Some(msg) = inbound.recv().await {
        for reply in dispatcher.dispatch(msg).await {
            if outbound.send(reply).await.is_err() {
                tracing::debug!("Writer gone, stopping dispatcher");
                return;
            }
        }
    }
}

/// Serialize outbound messages onto the transport. No-op messages are
/// skipped. Returns `Ok` once every sender is gone.
pub async fn write_loop<W>(mut writer: W, mut outbound: mpsc::Receiver<Message>) -> Result<(), PipelineError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = outbound.recv().await {
        if msg.is_noop() {
            continue;
        }
        let line = msg.to_string();
        tracing::debug!(line = %line, "OUT");
        writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .map_err(PipelineError::Write)?;
        writer.flush().await.map_err(PipelineError::Write)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, BufReader};

    #[tokio::test]
    async fn read_loop_decodes_and_skips_malformed() {
        let input: &[u8] = b":srv NOTICE * :hello\r\n\r\n:onlyprefix\r\nPING :abc\n";
        let (tx, mut rx) = mpsc::channel(8);
        let result = read_loop(BufReader::new(input), tx).await;
        assert!(matches!(result, Err(PipelineError::Closed)));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.command, "NOTICE");
        assert_eq!(first.params, vec!["*", "hello"]);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.command, "PING");
        assert_eq!(second.params, vec!["abc"]);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn read_loop_handles_last_line_without_newline() {
        let input: &[u8] = b"PING :tail";
        let (tx, mut rx) = mpsc::channel(8);
        let result = read_loop(BufReader::new(input), tx).await;
        assert!(matches!(result, Err(PipelineError::Closed)));
        assert_eq!(rx.recv().await.unwrap().params, vec!["tail"]);
    }

    #[tokio::test]
    async fn read_loop_tolerates_invalid_utf8() {
        let input: &[u8] = b"PRIVMSG #chan :caf\xe9\r\n";
        let (tx, mut rx) = mpsc::channel(8);
        let _ = read_loop(BufReader::new(input), tx).await;
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.params[1], "caf\u{fffd}");
    }

    #[tokio::test]
    async fn write_loop_skips_noop_and_terminates_lines() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(Message::new("NICK", vec!["bot"])).await.unwrap();
        tx.send(Message::noop()).await.unwrap();
        tx.send(Message::new("PRIVMSG", vec!["#chan", "two words"])).await.unwrap();
        drop(tx);

        let mut out = Vec::new();
        write_loop(&mut out, rx).await.unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "NICK bot\r\nPRIVMSG #chan :two words\r\n"
        );
    }

    #[test]
    fn transport_errors_outrank_closed_channels() {
        let write_err = || PipelineError::Write(std::io::Error::other("broken pipe"));

        let chosen = terminal_error(Err(PipelineError::ChannelClosed("inbound")), Ok(()), Err(write_err()));
        assert!(matches!(chosen, Err(PipelineError::Write(_))));

        let chosen = terminal_error(Err(PipelineError::Closed), Ok(()), Err(write_err()));
        assert!(matches!(chosen, Err(PipelineError::Closed)));

        let chosen = terminal_error(
            Err(PipelineError::ChannelClosed("inbound")),
            Ok(()),
            Err(PipelineError::ChannelClosed("outbound")),
        );
        assert!(matches!(chosen, Err(PipelineError::ChannelClosed("inbound"))));

        assert!(terminal_error(Ok(()), Ok(()), Ok(())).is_ok());
    }

    struct Echo;

    impl Dispatch for Echo {
        async fn dispatch(&mut self, msg: Message) -> Vec<Message> {
            vec![Message::new("ECHO", msg.params.iter().map(String::as_str).collect())]
        }
    }

    #[tokio::test]
    async fn run_drains_replies_before_reporting_eof() {
        let input: &[u8] = b"A one\r\nB two\r\nC three\r\n";
        let (client, mut server) = tokio::io::duplex(4096);

        let result = run(BufReader::new(input), client, Echo).await;
        assert!(matches!(result, Err(PipelineError::Closed)));

        let mut written = String::new();
        server.read_to_string(&mut written).await.unwrap();
        assert_eq!(written, "ECHO one\r\nECHO two\r\nECHO three\r\n");
    }
}
