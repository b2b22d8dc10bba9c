//! Interactive UDP echo client.

use std::process::ExitCode;
use tokio::io::BufReader;
use tracing::{error, info};
use twin_echo::config::{Config, Endpoint};
use twin_echo::logging;
use twin_echo::udp::UdpEchoClient;

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = Config::load(Endpoint::UdpClient)?;
    logging::init(&config.log_level);

    let runtime = tokio::runtime::Runtime::new()?;
    let code = runtime.block_on(run(config));
    // A pending stdin read sits on a blocking thread that never returns.
    runtime.shutdown_background();

    Ok(code)
}

async fn run(config: Config) -> ExitCode {
    info!(
        endpoint = %config.endpoint,
        server = %config.address(),
        recv_timeout_ms = config.recv_timeout.as_millis() as u64,
        "Starting UDP client"
    );

    let client = match UdpEchoClient::connect(&config).await {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Could not start UDP client");
            return ExitCode::FAILURE;
        }
    };

    println!("Type messages to send to server (type 'quit' to exit):");

    let operator = BufReader::new(tokio::io::stdin());
    match client.run(operator, tokio::io::stdout()).await {
        Ok(exit) => {
            info!(reason = ?exit, "Session ended");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Session failed");
            ExitCode::FAILURE
        }
    }
}
