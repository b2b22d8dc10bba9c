//! TCP echo server: answers every line with `Server received: <line>`.

use std::process::ExitCode;
use tracing::{error, info};
use twin_echo::config::{Config, Endpoint};
use twin_echo::tcp::TcpEchoServer;
use twin_echo::{logging, shutdown};

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = Config::load(Endpoint::TcpServer)?;
    logging::init(&config.log_level);

    info!(
        endpoint = %config.endpoint,
        address = %config.address(),
        max_workers = config.max_workers,
        "Starting TCP server"
    );

    let server = match TcpEchoServer::bind(&config).await {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "Server error");
            return Ok(ExitCode::FAILURE);
        }
    };

    let (trigger, signal) = shutdown::channel();
    trigger.trigger_on_ctrl_c();

    match server.run(signal).await {
        Ok(()) => {
            info!("Server stopped");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "Server error");
            Ok(ExitCode::FAILURE)
        }
    }
}
