use std::time::Duration;

use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ServerError {
    /// The port is already bound by someone else.
    #[error("Cannot bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("No NICK line received within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("Connection closed")]
    Closed,

    #[error("Line longer than {0} bytes")]
    LineTooLong(usize),

    #[error("Connection I/O error: '{0}'")]
    Io(#[from] std::io::Error),
}

/// Everything that can turn a sample into a failed result.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SampleError {
    #[error("IRC server has not been started")]
    NoServer,

    #[error("IRC server is not listening")]
    ServerNotListening,

    #[error("No IRC client is connected to the server")]
    NoConnectedClient,

    #[error("Bot prefix is not configured")]
    MissingBotPrefix,

    #[error("Invalid configuration: '{0}'")]
    InvalidConfig(String),

    #[error("No action category is enabled")]
    EmptyActionQueue,

    #[error("No reply received within {0:?}")]
    ReplyTimeout(Duration),

    #[error("Wait for reply was cancelled")]
    Cancelled,

    #[error("Failed to send line: {0}")]
    Send(#[from] ConnectionError),
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot access configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}
