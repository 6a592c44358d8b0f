#![allow(dead_code)]

use irc_harness::config::ServerConfig;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

pub const WELCOME: &str = ":irc.jmeter 004 irc.jmeter jmeter-ircd-basic-0.1 ov b";
pub const RECV_TIMEOUT: Duration = Duration::from_secs(3);

/// Server settings for tests: loopback, OS-assigned port.
pub fn test_server_config() -> ServerConfig {
    ServerConfig {
        bind_address: "127.0.0.1".to_owned(),
        port: 0,
        ..ServerConfig::default()
    }
}

/// Raw line client standing in for the IRC client under test.
pub struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, writer) = stream.into_split();
        Ok(TestClient {
            lines: BufReader::new(read_half).lines(),
            writer,
        })
    }

    /// Connects, sends NICK and consumes the welcome line.
    pub async fn register(addr: SocketAddr, nick: &str) -> Self {
        let mut client = TestClient::connect(addr).await.expect("Failed to connect");
        client
            .send(&format!("NICK {nick}"))
            .await
            .expect("Failed to send NICK");
        let welcome = client.recv().await.expect("No welcome line");
        assert_eq!(welcome.as_deref(), Some(WELCOME));
        client
    }

    pub async fn send(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(format!("{line}\r\n").as_bytes()).await?;
        self.writer.flush().await
    }

    /// Writes bytes as they are, terminator included by the caller.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await
    }

    /// Next line, `None` once the server closed the connection.
    pub async fn recv(&mut self) -> io::Result<Option<String>> {
        match tokio::time::timeout(RECV_TIMEOUT, self.lines.next_line()).await {
            Ok(line) => line,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "no line received")),
        }
    }

    /// `Err` when nothing arrives within `timeout`.
    pub async fn recv_timeout(
        &mut self,
        timeout: Duration,
    ) -> Result<io::Result<Option<String>>, tokio::time::error::Elapsed> {
        tokio::time::timeout(timeout, self.lines.next_line()).await
    }
}

/// Polls `condition` until it holds or `timeout` expires.
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
