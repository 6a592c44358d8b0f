use log::{debug, warn};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, watch};

use crate::constants::MAX_LINE_LENGTH;
use crate::errors::ConnectionError;
use crate::message::IrcLine;
use crate::types::{ConnectionId, Nickname};

// Longest we wait for an in-flight send before shutting a stream down regardless.
const CLOSE_WRITER_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Accepted, waiting for the NICK line.
    Handshaking,
    /// Welcomed, lines are relayed and correlated.
    Active,
    Closed,
}

/// Write side and bookkeeping of one accepted client. The read side is handed to the
/// connection task on creation and never shared.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    addr: SocketAddr,
    initial_nick: OnceLock<Nickname>,
    status: watch::Sender<ConnectionStatus>,
    writer: Mutex<BufWriter<OwnedWriteHalf>>,
}

/// Line reader over the read half of a connection.
pub struct LineReader {
    reader: BufReader<OwnedReadHalf>,
    buffer: Vec<u8>,
}

impl LineReader {
    /// Next line without its terminator, `None` at end of stream. Bytes that are not
    /// UTF-8 are replaced rather than rejected.
    pub async fn next_line(&mut self) -> Result<Option<String>, ConnectionError> {
        self.buffer.clear();
        let limit = MAX_LINE_LENGTH as u64;
        let bytes_read = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.buffer)
            .await?;
        if bytes_read == 0 {
            return Ok(None);
        }
        if bytes_read as u64 == limit && self.buffer.last() != Some(&b'\n') {
            return Err(ConnectionError::LineTooLong(MAX_LINE_LENGTH));
        }
        let line = String::from_utf8_lossy(&self.buffer);
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_owned()))
    }
}

impl Connection {
    pub fn new(id: ConnectionId, socket: TcpStream, addr: SocketAddr) -> (Self, LineReader) {
        let (read_half, write_half) = socket.into_split();
        let (status, _) = watch::channel(ConnectionStatus::Handshaking);
        let connection = Connection {
            id,
            addr,
            initial_nick: OnceLock::new(),
            status,
            writer: Mutex::new(BufWriter::new(write_half)),
        };
        let reader = LineReader {
            reader: BufReader::new(read_half),
            buffer: Vec::new(),
        };
        (connection, reader)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn initial_nick(&self) -> Option<&Nickname> {
        self.initial_nick.get()
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.status() == ConnectionStatus::Active
    }

    /// Resolves once the connection is closed.
    pub async fn closed(&self) {
        let mut status = self.status.subscribe();
        let _ = status.wait_for(|s| *s == ConnectionStatus::Closed).await;
    }

    /// Ends the handshake. The nick can only be set once.
    pub fn activate(&self, nick: Nickname) -> Result<(), ConnectionError> {
        if self.initial_nick.set(nick).is_err() {
            warn!("[{}] initial nick already set", self.id);
        }
        let activated = self.status.send_if_modified(|status| {
            if *status == ConnectionStatus::Handshaking {
                *status = ConnectionStatus::Active;
                true
            } else {
                false
            }
        });
        if activated {
            Ok(())
        } else {
            Err(ConnectionError::Closed)
        }
    }

    /// Writes one line and flushes it. Concurrent callers are serialized so lines never
    /// interleave.
    pub async fn send_line(&self, line: &str) -> Result<(), ConnectionError> {
        if self.status() == ConnectionStatus::Closed {
            return Err(ConnectionError::Closed);
        }
        let line = IrcLine::new(line);
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        debug!("<< outgoing [{}] # {}", self.id, line.raw_line.trim_end());
        Ok(())
    }

    /// Marks the connection closed and shuts its write side down. The connection task
    /// notices the status change and drops the read side. Safe to call more than once.
    pub async fn close(&self) {
        let previous = self.status.send_replace(ConnectionStatus::Closed);
        if previous == ConnectionStatus::Closed {
            return;
        }
        debug!("[{}] closing connection from {}", self.id, self.addr);
        match tokio::time::timeout(CLOSE_WRITER_GRACE, self.writer.lock()).await {
            Ok(mut writer) => {
                if let Err(e) = writer.shutdown().await {
                    debug!("[{}] shutdown failed: {e}", self.id);
                }
            }
            Err(_) => warn!("[{}] writer busy, leaving shutdown to drop", self.id),
        }
    }
}
