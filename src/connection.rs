use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::codec::FrameError;
use crate::config::{ConnectOptions, HeartbeatPolicy};
use crate::error::{ConnError, ServerError};
use crate::frame::{Command, Frame};
use crate::reader::FrameReader;
use crate::transport::BoxedTransport;
use crate::writer::FrameWriter;

/// Protocol versions offered in CONNECT.
pub const ACCEPT_VERSIONS: &str = "1.0,1.1,1.2";

/// Parse the `heart-beat` header value (format: "cx,cy").
///
/// Returns a tuple `(cx, cy)` where each value is the heartbeat interval in
/// milliseconds. Missing or invalid fields default to `0`.
pub fn parse_heartbeat_header(header: &str) -> (u64, u64) {
    let mut parts = header.split(',');
    let cx = parts
        .next()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0);
    let cy = parts
        .next()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0);
    (cx, cy)
}

/// Negotiate heartbeat intervals between client and server.
///
/// Parameters
/// - `local`: `(client-send, server-send)` periods this client asked for.
/// - `peer`: the broker's `heart-beat` reply, `(server-send, client-send)`
///   from the broker's point of view.
/// - `policy`: how a 0 on one side is treated, see [`HeartbeatPolicy`].
///
/// Returns `(client_send, server_send)`; `None` means that direction is off.
/// Under [`HeartbeatPolicy::Max`] a local request `(cx, sx)` and peer reply
/// `(cy, sy)` give `(max(cx, sy), max(sx, cy))`.
pub fn negotiate_heartbeats(
    local: (u64, u64),
    peer: (u64, u64),
    policy: HeartbeatPolicy,
) -> (Option<Duration>, Option<Duration>) {
    let (client_out, client_in) = local;
    let (server_out, server_in) = peer;

    let pick = |ours: u64, theirs: u64| -> Option<Duration> {
        let ms = match policy {
            HeartbeatPolicy::Max => ours.max(theirs),
            HeartbeatPolicy::Strict if ours == 0 || theirs == 0 => 0,
            HeartbeatPolicy::Strict => ours.max(theirs),
        };
        (ms > 0).then(|| Duration::from_millis(ms))
    };

    (pick(client_out, server_in), pick(client_in, server_out))
}

/// What the broker told us in CONNECTED.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionInfo {
    /// `server` header
    pub server: Option<String>,
    /// Versions from the `version` header; a broker that omits it speaks 1.0
    pub versions: Vec<String>,
    /// `session` header
    pub session_id: Option<String>,
    /// How often this client must send something
    pub client_heartbeat: Option<Duration>,
    /// Negotiated period for broker-to-client heartbeats
    pub server_heartbeat: Option<Duration>,
    /// The broker's own `heart-beat` reply, `(server-send, client-send)`
    pub peer_heartbeat: (u64, u64),
}

impl SessionInfo {
    fn from_connected(frame: &Frame, opts: &ConnectOptions) -> Self {
        let versions = match frame.get_header("version") {
            Some(v) => v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => vec!["1.0".to_string()],
        };
        let peer = frame
            .get_header("heart-beat")
            .map(parse_heartbeat_header)
            .unwrap_or((0, 0));
        let (client_heartbeat, server_heartbeat) =
            negotiate_heartbeats(opts.heartbeat, peer, opts.heartbeat_policy);

        Self {
            server: frame.get_header("server").map(str::to_string),
            versions,
            session_id: frame.get_header("session").map(str::to_string),
            client_heartbeat,
            server_heartbeat,
            peer_heartbeat: peer,
        }
    }

    /// How long the read side may stay silent before the broker counts as
    /// dead: twice the negotiated server period.
    ///
    /// `None` when the broker declared it sends no heartbeats (a `0` first
    /// value, or no `heart-beat` header at all), whatever the negotiation
    /// reports.
    pub fn read_window(&self) -> Option<Duration> {
        if self.peer_heartbeat.0 == 0 {
            return None;
        }
        self.server_heartbeat.map(|d| d * 2)
    }
}

/// An established connection: the write side of the transport, the
/// negotiated session and the disconnect-in-progress flag.
///
/// The read side is handed back separately by [`Connection::handshake`] so
/// it can move into the background read loop.
pub struct Connection {
    writer: FrameWriter,
    session: SessionInfo,
    disconnecting: AtomicBool,
}

impl Connection {
    /// Run the CONNECT/CONNECTED exchange over `transport`.
    ///
    /// Heartbeats before the reply are skipped; the first frame decides the
    /// outcome. An ERROR reply becomes [`ConnError::ServerRejected`].
    pub async fn handshake(
        transport: BoxedTransport,
        opts: &ConnectOptions,
    ) -> Result<(Connection, FrameReader), ConnError> {
        let (read_half, write_half) = tokio::io::split(transport);
        let writer = FrameWriter::new(write_half);
        let mut reader = FrameReader::new(read_half);

        writer.write(connect_frame(opts)?).await?;

        let reply = match opts.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, await_reply(&mut reader))
                .await
                .map_err(|_| ConnError::ConnectTimeout)??,
            None => await_reply(&mut reader).await?,
        };

        match reply.command {
            Command::Connected => {
                let session = SessionInfo::from_connected(&reply, opts);
                tracing::debug!(
                    server = ?session.server,
                    session = ?session.session_id,
                    versions = ?session.versions,
                    client_hb = ?session.client_heartbeat,
                    server_hb = ?session.server_heartbeat,
                    "connected"
                );
                let conn = Connection {
                    writer,
                    session,
                    disconnecting: AtomicBool::new(false),
                };
                Ok((conn, reader))
            }
            Command::Error => Err(ConnError::ServerRejected(ServerError::from_frame(&reply))),
            other => Err(ConnError::Protocol(format!(
                "expected CONNECTED, got {}",
                other
            ))),
        }
    }

    pub fn session(&self) -> &SessionInfo {
        &self.session
    }

    /// Write one frame.
    ///
    /// Once a disconnect has started, anything but DISCONNECT is refused
    /// without touching the transport.
    pub async fn send(&self, frame: Frame) -> Result<(), ConnError> {
        if frame.command != Command::Disconnect && self.is_disconnecting() {
            return Err(ConnError::Disconnecting);
        }
        self.writer.write(frame).await?;
        Ok(())
    }

    pub async fn heartbeat(&self) -> Result<(), ConnError> {
        self.writer.heartbeat().await?;
        Ok(())
    }

    /// Mark the connection as disconnecting. Returns `false` if it already was.
    pub fn begin_disconnect(&self) -> bool {
        !self.disconnecting.swap(true, Ordering::SeqCst)
    }

    pub fn is_disconnecting(&self) -> bool {
        self.disconnecting.load(Ordering::SeqCst)
    }

    /// Shut down the write half.
    pub async fn close(&self) -> Result<(), ConnError> {
        self.writer.close().await?;
        Ok(())
    }
}

/// CONNECT headers go out unescaped, so a line break or NUL in a value
/// would end the header or the frame early.
fn literal_value<'a>(name: &str, value: &'a str) -> Result<&'a str, ConnError> {
    if value.contains(['\r', '\n', '\0']) {
        return Err(ConnError::Protocol(format!(
            "{} contains a line break or NUL and cannot be sent in CONNECT",
            name
        )));
    }
    Ok(value)
}

fn connect_frame(opts: &ConnectOptions) -> Result<Frame, ConnError> {
    let host = opts.host();
    let mut frame = Frame::new(Command::Connect)
        .header("accept-version", ACCEPT_VERSIONS)
        .header("host", literal_value("host", &host)?);
    if let Some(login) = opts.login.as_deref().filter(|l| !l.is_empty()) {
        frame = frame.header("login", literal_value("login", login)?);
        if let Some(passcode) = opts.passcode.as_deref().filter(|p| !p.is_empty()) {
            frame = frame.header("passcode", literal_value("passcode", passcode)?);
        }
    }
    Ok(frame
        .header("heart-beat", opts.heartbeat_header())
        .receipt(uuid::Uuid::new_v4().to_string()))
}

async fn await_reply(reader: &mut FrameReader) -> Result<Frame, ConnError> {
    loop {
        match reader.read().await {
            Ok(Some(frame)) => return Ok(frame),
            Ok(None) => continue,
            Err(FrameError::Closed) => {
                return Err(ConnError::Protocol(
                    "connection closed before CONNECTED".into(),
                ));
            }
            Err(e) => return Err(e.into()),
        }
    }
}
