use std::time::Duration;

// Server identity announced in the welcome line:
//    :<server> 004 <server> <version> <user modes> <channel modes>
pub const SERVER_ADDRESS: &str = "irc.jmeter";
pub const SERVER_VERSION: &str = "jmeter-ircd-basic-0.1";
pub const SERVER_USER_MODES: &str = "ov";
pub const SERVER_CHANNEL_MODES: &str = "b";
pub const RPL_MYINFO_NB: u16 = 4;

// Host part used when relaying a client's JOIN to the other clients.
pub const CLIENT_DOMAIN: &str = "clients.jmeter";
pub const CLIENT_USER: &str = "~client";

// Host part of every virtual user hostmask.
pub const BOT_DOMAIN: &str = "bots.jmeter";
pub const BOT_USER: &str = "~jmeter";

/// Digits reserved for the virtual user ordinal inside a nick.
pub const NICK_ORDINAL_WIDTH: usize = 7;

pub const DEFAULT_PORT: u16 = 6667;
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_BOT_PREFIX: &str = "jmeterBot";
pub const DEFAULT_CHANNEL_PREFIX: &str = "#jmeter";
pub const DEFAULT_COMMAND: &str = "?jmeter";

pub const CRLF: &str = "\r\n";
/// Longest inbound line accepted, terminator included.
pub const MAX_LINE_LENGTH: usize = 8192;
