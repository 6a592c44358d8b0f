//! Minimal client under test: registers a nick and answers every harness action with a
//! NOTICE quoting it, which always mentions the acting bot.

use log::{debug, info};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::constants::{CLIENT_DOMAIN, SERVER_ADDRESS};
use crate::message::IrcLine;

/// Server chatter that is not a bot action and must not be answered.
pub fn should_echo(line: &str) -> bool {
    let welcome = format!(":{SERVER_ADDRESS} 004 ");
    let relayed_join = format!("@{CLIENT_DOMAIN} JOIN ");
    !line.is_empty() && !line.starts_with(&welcome) && !line.contains(&relayed_join)
}

pub fn echo_reply(nick: &str, line: &str) -> String {
    format!("NOTICE {nick} :{line}")
}

/// Connects, sends NICK and echoes until the server closes the connection.
pub async fn run_echo_bot(addr: &str, nick: &str) -> io::Result<usize> {
    let stream = TcpStream::connect(addr).await?;
    info!("{nick} connected to {addr}");
    let (read_half, mut write_half) = stream.into_split();
    write_half
        .write_all(IrcLine::new(&format!("NICK {nick}")).as_bytes())
        .await?;

    let mut lines = BufReader::new(read_half).lines();
    let mut echoed = 0;
    while let Some(line) = lines.next_line().await? {
        debug!("{nick} >> {line}");
        if !should_echo(&line) {
            continue;
        }
        let reply = IrcLine::new(&echo_reply(nick, &line));
        write_half.write_all(reply.as_bytes()).await?;
        echoed += 1;
    }
    info!("{nick} disconnected after {echoed} replies");
    Ok(echoed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_actions_are_echoed() {
        assert!(!should_echo(":irc.jmeter 004 irc.jmeter jmeter-ircd-basic-0.1 ov b"));
        assert!(!should_echo(":alice!~client@clients.jmeter JOIN :#test"));
        assert!(!should_echo(""));
        assert!(should_echo(":vu0000000!~jmeter@bots.jmeter JOIN :#t0"));
        assert!(should_echo(":irc.jmeter MODE #t0 +o vu0000000"));
    }

    #[test]
    fn test_echo_mentions_the_bot() {
        let reply = echo_reply("bob", ":vu0000000!~jmeter@bots.jmeter PRIVMSG #t0 :vu0000000");
        assert!(reply.starts_with("NOTICE bob :"));
        assert!(reply.contains("vu0000000"));
    }
}
