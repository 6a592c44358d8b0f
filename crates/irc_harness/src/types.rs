use std::fmt::Display;

/// Sequence number handed out to accepted connections, starting at 1.
pub type ConnectionId = u64;

/// Registration order of a correlation waiter.
pub type WaiterId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nickname(pub String);
impl Display for Nickname {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl AsRef<str> for Nickname {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelName(pub String);
impl Display for ChannelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
