use clap::{Parser, Subcommand};
use flexi_logger::Logger;
use irc_harness::config::Config;
use irc_harness::controller::ServerController;
use irc_harness::load::{LoadPlan, run_load};
use log::{info, warn};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "irc_harness", about = "Synthetic IRC server driving virtual users against an IRC client")]
struct Cli {
    /// TOML configuration file, defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the server until Ctrl-C
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Start the server, wait for a client and drive the virtual users
    Run {
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        users: Option<usize>,
        #[arg(long)]
        samples: Option<usize>,
        /// How long to wait for a client to complete its handshake
        #[arg(long, default_value = "30")]
        client_wait_secs: u64,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _logger = Logger::try_with_str(&cli.log_level)
        .and_then(|op| op.log_to_stderr().start())
        .ok();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let controller = ServerController::new();

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            controller.start(&config.server).await?;
            info!("{}", controller.status().await);
            tokio::signal::ctrl_c().await?;
            controller.stop().await;
        }
        Command::Run {
            port,
            users,
            samples,
            client_wait_secs,
        } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(users) = users {
                config.load.users = users;
            }
            if let Some(samples) = samples {
                config.load.samples = samples;
            }
            let server = controller.start(&config.server).await?;
            info!("{}", controller.status().await);
            if !server
                .wait_for_active_client(Duration::from_secs(client_wait_secs))
                .await
            {
                warn!("No client connected within {client_wait_secs}s");
            }
            for (id, nick) in server.client_nicks() {
                info!("Client #{id} connected as {nick}");
            }
            let report = run_load(&controller, &config, &LoadPlan::from(&config.load)).await;
            println!("{report}");
            controller.stop().await;
        }
        Command::Config => print!("{}", config.to_toml()?),
    }
    Ok(())
}
