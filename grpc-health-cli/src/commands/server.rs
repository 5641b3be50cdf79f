use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use grpc_health::prelude::*;

#[derive(Args, Debug)]
pub struct ServerArgs {
    /// Address to listen on (host:port, :port, /path.sock or unix:path)
    #[arg(value_name = "ADDRESS")]
    pub address: String,

    /// TLS certificate file (PEM)
    #[arg(short = 'c', long, value_name = "PATH")]
    pub cert_file: Option<PathBuf>,

    /// TLS private key file (PEM)
    #[arg(short = 'k', long, value_name = "PATH")]
    pub key_file: Option<PathBuf>,
}

pub async fn execute(args: ServerArgs) -> Result<()> {
    let config = ServerConfig::from_flags(&args.address, args.cert_file, args.key_file);

    let token = CancellationToken::new();
    let signals = cancel_on_signal(token.clone());

    let result = HealthCheckServer::new(config).run(token.clone()).await;

    // Release the signal task if the server failed on its own
    token.cancel();
    let _ = signals.await;

    result?;
    Ok(())
}
