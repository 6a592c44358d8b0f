use crate::constants::*;

/// Lines the harness server writes on its own behalf.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum IrcReply<'a> {
    /// Sent once, right after the client's NICK.
    MyInfo,
    /// Relay of a client's JOIN to the other clients.
    Join { nick: &'a str, target: &'a str },
}

impl<'a> IrcReply<'a> {
    pub fn format(&self) -> String {
        match self {
            IrcReply::MyInfo => format!(
                ":{SERVER_ADDRESS} {RPL_MYINFO_NB:03} {SERVER_ADDRESS} {SERVER_VERSION} {SERVER_USER_MODES} {SERVER_CHANNEL_MODES}"
            ),
            IrcReply::Join { nick, target } => {
                format!(":{nick}!{CLIENT_USER}@{CLIENT_DOMAIN} JOIN :{target}")
            }
        }
    }
}
