use log::{error, info};
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::server::IrcServer;

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerStatus {
    Stopped,
    Listening { port: u16 },
    Failed(String),
}

impl Display for ControllerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerStatus::Stopped => write!(f, "Status: Stopped"),
            ControllerStatus::Listening { port } => write!(f, "Status: Started on port {port}"),
            ControllerStatus::Failed(reason) => write!(f, "Status: Error ({reason})"),
        }
    }
}

#[derive(Debug, Default)]
struct ControllerState {
    server: Option<IrcServer>,
    config: Option<ServerConfig>,
    last_error: Option<String>,
}

/// Operator-facing lifecycle of the single harness server. At most one server runs at a
/// time; starting a new one always closes the previous one first.
#[derive(Debug, Clone, Default)]
pub struct ServerController {
    state: Arc<Mutex<ControllerState>>,
}

impl ServerController {
    pub fn new() -> Self {
        ServerController::default()
    }

    /// Closes the running server, if any, then binds a new one.
    pub async fn start(&self, config: &ServerConfig) -> Result<IrcServer, ServerError> {
        let mut state = self.state.lock().await;
        if let Some(previous) = state.server.take() {
            info!("Closing server on port {} before restart", previous.port());
            previous.close().await;
        }
        state.config = Some(config.clone());
        match IrcServer::start(config).await {
            Ok(server) => {
                state.server = Some(server.clone());
                state.last_error = None;
                Ok(server)
            }
            Err(e) => {
                error!("{e}");
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Moves the server to another port. Nothing happens when it already listens there.
    pub async fn restart(&self, port: u16) -> Result<IrcServer, ServerError> {
        let config = {
            let state = self.state.lock().await;
            if let Some(server) = state.server.as_ref().filter(|s| s.is_listening()) {
                if server.port() == port {
                    return Ok(server.clone());
                }
            }
            state.config.clone().unwrap_or_default()
        };
        self.start(&config.with_port(port)).await
    }

    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        if let Some(server) = state.server.take() {
            server.close().await;
        }
        state.last_error = None;
    }

    pub async fn current(&self) -> Option<IrcServer> {
        self.state.lock().await.server.clone()
    }

    pub async fn status(&self) -> ControllerStatus {
        let state = self.state.lock().await;
        match (&state.server, &state.last_error) {
            (_, Some(reason)) => ControllerStatus::Failed(reason.clone()),
            (Some(server), None) if server.is_listening() => ControllerStatus::Listening {
                port: server.port(),
            },
            _ => ControllerStatus::Stopped,
        }
    }
}
