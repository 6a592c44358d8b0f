use dashmap::DashMap;
use log::{debug, error, info, trace, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::connection::{Connection, LineReader};
use crate::correlation::{CorrelationRegistry, LinePredicate, PendingReply};
use crate::errors::{ConnectionError, ServerError};
use crate::parsers::{join_message_parser, nick_message_parser};
use crate::replies::IrcReply;
use crate::types::{ConnectionId, Nickname};

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);
const CLIENT_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Listening,
    Closed,
}

#[derive(Debug)]
struct ServerInner {
    local_addr: SocketAddr,
    handshake_timeout: Duration,
    status: watch::Sender<ServerStatus>,
    connections: DashMap<ConnectionId, Arc<Connection>>,
    correlation: Arc<CorrelationRegistry>,
    next_connection_id: AtomicU64,
    next_client: AtomicUsize,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

/// Test-double IRC server: accepts clients, runs the NICK handshake, relays JOINs and
/// hands every other inbound line to the correlation registry.
///
/// Cloning is cheap and every clone drives the same server.
#[derive(Debug, Clone)]
pub struct IrcServer {
    inner: Arc<ServerInner>,
}

impl IrcServer {
    /// Binds the listening socket and spawns the accept loop.
    pub async fn start(config: &ServerConfig) -> Result<Self, ServerError> {
        let bind_error = |source| ServerError::Bind {
            port: config.port,
            source,
        };
        let listener = TcpListener::bind((config.bind_address.as_str(), config.port))
            .await
            .map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;
        info!("Server created on {local_addr}");

        let (status, _) = watch::channel(ServerStatus::Listening);
        let server = IrcServer {
            inner: Arc::new(ServerInner {
                local_addr,
                handshake_timeout: config.handshake_timeout(),
                status,
                connections: DashMap::new(),
                correlation: CorrelationRegistry::new(),
                next_connection_id: AtomicU64::new(0),
                next_client: AtomicUsize::new(0),
                accept_task: Mutex::new(None),
            }),
        };
        let accept_task = tokio::spawn(accept_loop(server.clone(), listener));
        *server.inner.accept_task.lock().await = Some(accept_task);
        Ok(server)
    }

    pub fn port(&self) -> u16 {
        self.inner.local_addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    pub fn status(&self) -> ServerStatus {
        *self.inner.status.borrow()
    }

    pub fn is_listening(&self) -> bool {
        self.status() == ServerStatus::Listening
    }

    /// Resolves once `close` has been called.
    pub async fn closed(&self) {
        let mut status = self.inner.status.subscribe();
        let _ = status.wait_for(|s| *s == ServerStatus::Closed).await;
    }

    pub fn correlation(&self) -> &Arc<CorrelationRegistry> {
        &self.inner.correlation
    }

    /// Registers a waiter for the next inbound line accepted by `predicate`.
    pub fn wait_for(&self, owner: &str, predicate: LinePredicate) -> PendingReply {
        self.inner.correlation.register(owner, predicate)
    }

    /// Every registered connection, handshaking ones included.
    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    pub fn active_connection_count(&self) -> usize {
        self.inner
            .connections
            .iter()
            .filter(|entry| entry.value().is_active())
            .count()
    }

    /// Initial nicks of the welcomed clients, by connection sequence number.
    pub fn client_nicks(&self) -> Vec<(ConnectionId, Nickname)> {
        let mut nicks: Vec<_> = self
            .inner
            .connections
            .iter()
            .filter(|entry| entry.value().is_active())
            .filter_map(|entry| {
                let nick = entry.value().initial_nick()?.clone();
                Some((*entry.key(), nick))
            })
            .collect();
        nicks.sort_by_key(|(id, _)| *id);
        nicks
    }

    /// Polls until at least one client finished its handshake.
    pub async fn wait_for_active_client(&self, timeout: Duration) -> bool {
        let poll = async {
            while self.active_connection_count() == 0 {
                tokio::time::sleep(CLIENT_POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(timeout, poll).await.is_ok()
    }

    /// Sends one line to a single connection.
    pub async fn send(&self, connection_id: ConnectionId, line: &str) -> Result<(), ConnectionError> {
        let connection = self
            .inner
            .connections
            .get(&connection_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(ConnectionError::Closed)?;
        let result = connection.send_line(line).await;
        if result.is_err() {
            self.forget_connection(&connection).await;
        }
        result
    }

    /// Sends one line to a single welcomed client, taking clients in turn, and returns
    /// the id of the one that got it. A client whose send fails is dropped and the next
    /// one is tried.
    pub async fn send_to_next_client(&self, line: &str) -> Option<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self
            .inner
            .connections
            .iter()
            .filter(|entry| entry.value().is_active())
            .map(|entry| *entry.key())
            .collect();
        ids.sort_unstable();
        for _ in 0..ids.len() {
            let turn = self.inner.next_client.fetch_add(1, Ordering::Relaxed);
            let id = ids[turn % ids.len()];
            match self.send(id, line).await {
                Ok(()) => return Some(id),
                Err(e) => warn!("[{id}] Failed to send line: {e}"),
            }
        }
        None
    }

    /// Sends one line to every welcomed client and returns how many got it.
    pub async fn send_to_clients(&self, line: &str) -> usize {
        self.broadcast(line, None).await
    }

    async fn broadcast(&self, line: &str, except: Option<ConnectionId>) -> usize {
        // snapshot first: no map guard may live across an await
        let targets: Vec<Arc<Connection>> = self
            .inner
            .connections
            .iter()
            .filter(|entry| Some(*entry.key()) != except && entry.value().is_active())
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut delivered = 0;
        for connection in targets {
            match connection.send_line(line).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("[{}] Failed to send line: {e}", connection.id());
                    self.forget_connection(&connection).await;
                }
            }
        }
        delivered
    }

    /// Closes every connection, cancels pending waiters and releases the listening
    /// socket. Returns once the accept loop is gone; calling it again does nothing.
    pub async fn close(&self) {
        if self.inner.status.send_replace(ServerStatus::Closed) == ServerStatus::Closed {
            return;
        }
        info!("Closing server on port {}", self.port());

        let connections: Vec<Arc<Connection>> = self
            .inner
            .connections
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for connection in connections {
            self.forget_connection(&connection).await;
        }

        let cancelled = self.inner.correlation.clear();
        if cancelled > 0 {
            info!("{cancelled} pending waiters cancelled");
        }

        let accept_task = self.inner.accept_task.lock().await.take();
        if let Some(accept_task) = accept_task {
            if let Err(e) = accept_task.await {
                error!("Accept loop of port {} ended abnormally: {e}", self.port());
            }
        }
    }

    fn spawn_connection(&self, socket: TcpStream, addr: SocketAddr) {
        let id = self.inner.next_connection_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (connection, reader) = Connection::new(id, socket, addr);
        let connection = Arc::new(connection);
        info!("[{id}] New client connection accepted from {addr}");
        self.inner.connections.insert(id, Arc::clone(&connection));

        let server = self.clone();
        tokio::spawn(async move {
            server.handle_connection(connection, reader).await;
        });
    }

    async fn forget_connection(&self, connection: &Connection) {
        connection.close().await;
        if self.inner.connections.remove(&connection.id()).is_some() {
            debug!("[{}] Forgetting about client", connection.id());
        }
    }

    async fn handle_connection(&self, connection: Arc<Connection>, mut reader: LineReader) {
        let id = connection.id();
        if !self.is_listening() {
            // accepted while the server was closing
            self.forget_connection(&connection).await;
            return;
        }

        let outcome = tokio::select! {
            outcome = self.serve_connection(&connection, &mut reader) => outcome,
            _ = connection.closed() => Ok(()),
        };
        match outcome {
            Ok(()) => info!("[{id}] Client has disconnected, ending"),
            Err(ConnectionError::HandshakeTimeout(timeout)) => {
                info!("[{id}] No NICK within {timeout:?}. Disconnecting...")
            }
            Err(e) => warn!("[{id}] {e}. Forgetting about client now..."),
        }
        self.forget_connection(&connection).await;
    }

    async fn serve_connection(
        &self,
        connection: &Connection,
        reader: &mut LineReader,
    ) -> Result<(), ConnectionError> {
        let id = connection.id();
        let timeout = self.inner.handshake_timeout;
        debug!("[{id}] Waiting for initial NICK line");
        let nick = match tokio::time::timeout(timeout, read_initial_nick(id, reader)).await {
            Ok(Ok(Some(nick))) => nick,
            Ok(Ok(None)) => return Ok(()),
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(ConnectionError::HandshakeTimeout(timeout)),
        };

        connection.send_line(&IrcReply::MyInfo.format()).await?;
        debug!("[{id}] Nick {nick} received, client welcomed");
        connection.activate(nick)?;

        while let Some(line) = reader.next_line().await? {
            debug!(">> incoming [{id}] # {line}");
            self.dispatch_line(connection, &line).await;
        }
        Ok(())
    }

    async fn dispatch_line(&self, connection: &Connection, line: &str) {
        if self.inner.correlation.offer(line) {
            trace!("[{}] line claimed by a waiter", connection.id());
            return;
        }
        match join_message_parser(line) {
            Ok((_, target)) => {
                let nick = connection
                    .initial_nick()
                    .map(|nick| nick.0.as_str())
                    .unwrap_or("*");
                let relay = IrcReply::Join { nick, target }.format();
                let delivered = self.broadcast(&relay, Some(connection.id())).await;
                debug!("[{}] JOIN {target} relayed to {delivered} clients", connection.id());
            }
            Err(_) => warn!("Client #{} line not matched - {line}", connection.id()),
        }
    }
}

async fn read_initial_nick(
    id: ConnectionId,
    reader: &mut LineReader,
) -> Result<Option<Nickname>, ConnectionError> {
    while let Some(line) = reader.next_line().await? {
        match nick_message_parser(&line) {
            Ok((_, nick)) => return Ok(Some(Nickname(nick.to_owned()))),
            Err(_) => debug!("[{id}] Ignoring line before NICK - {line}"),
        }
    }
    Ok(None)
}

async fn accept_loop(server: IrcServer, listener: TcpListener) {
    loop {
        debug!("Waiting for clients");
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((socket, addr)) => server.spawn_connection(socket, addr),
                Err(e) => {
                    error!("Failed to accept client: {e}");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },
            _ = server.closed() => break,
        }
    }
    info!("Listener on {} released", server.local_addr());
}
