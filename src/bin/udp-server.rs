//! UDP echo server: answers every datagram with `UDP Server received: <payload>`.

use std::process::ExitCode;
use tracing::{error, info};
use twin_echo::config::{Config, Endpoint};
use twin_echo::udp::UdpEchoServer;
use twin_echo::{logging, shutdown};

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = Config::load(Endpoint::UdpServer)?;
    logging::init(&config.log_level);

    info!(
        endpoint = %config.endpoint,
        address = %config.address(),
        max_workers = config.max_workers,
        "Starting UDP server"
    );

    let server = match UdpEchoServer::bind(&config).await {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "Could not create UDP socket");
            return Ok(ExitCode::FAILURE);
        }
    };

    let (trigger, signal) = shutdown::channel();
    trigger.trigger_on_ctrl_c();

    server.run(signal).await;
    info!("Server stopped");
    Ok(ExitCode::SUCCESS)
}
