use clap::Parser;
use flexi_logger::Logger;
use irc_harness::echo_bot::run_echo_bot;
use log::error;
use tokio::time::{self, Duration};

#[derive(Parser, Debug)]
#[command(name = "echo_bot", about = "IRC client echoing harness actions back")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:6667")]
    addr: String,

    #[arg(long, default_value = "echobot")]
    nick: String,

    /// Number of clients, nicks get a numeric suffix when more than one
    #[arg(long, default_value = "1")]
    clients: usize,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let _logger = Logger::try_with_str(&args.log_level)
        .and_then(|op| op.log_to_stderr().start())
        .ok();

    let mut clients = Vec::with_capacity(args.clients);
    for i in 0..args.clients {
        let addr = args.addr.clone();
        let nick = if args.clients == 1 {
            args.nick.clone()
        } else {
            format!("{}{i}", args.nick)
        };
        clients.push(tokio::spawn(async move {
            if let Err(e) = run_echo_bot(&addr, &nick).await {
                error!("Client {nick} error: {e}");
            }
        }));
        // stagger connects
        time::sleep(Duration::from_millis(5)).await;
    }
    for client in clients {
        client.await?;
    }
    Ok(())
}
