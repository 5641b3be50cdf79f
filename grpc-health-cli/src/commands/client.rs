use anyhow::Result;
use clap::Args;
use colored::Colorize;
use grpc_health::prelude::*;

#[derive(Args, Debug)]
pub struct ClientArgs {
    /// Address of the gRPC server (host:port, :port, /path.sock or unix:path)
    #[arg(value_name = "ADDRESS")]
    pub address: String,

    /// Use TLS
    #[arg(short = 't', long)]
    pub tls: bool,

    /// Skip certificate verification (only with --tls)
    #[arg(short = 'k', long)]
    pub insecure: bool,

    /// Service name to check (empty for overall server health)
    #[arg(short = 's', long, value_name = "NAME", default_value = "")]
    pub service: String,
}

pub async fn execute(args: ClientArgs) -> Result<()> {
    let config = ClientConfig::new(&args.address)
        .with_tls(ClientTls::from_flags(args.tls, args.insecure))
        .with_service(args.service);
    let client = HealthCheckClient::new(config);

    let report = tokio::select! {
        result = client.check() => result?,
        _ = shutdown_signal() => anyhow::bail!("Health check interrupted"),
    };

    let target = if report.service.is_empty() {
        "server".to_string()
    } else {
        format!("service {:?}", report.service)
    };
    println!(
        "{} {} is {} ({:.2?})",
        "✓".green().bold(),
        target,
        report.status.as_str_name().green().bold(),
        report.duration
    );

    if let Some(peer) = &report.peer {
        println!("  Peer: {}", peer.address);
        if let Some(cert) = &peer.certificate {
            println!("  Subject: {}", cert.subject);
            println!("  Issuer: {}", cert.issuer);
            println!("  Valid: {} to {}", cert.not_before, cert.not_after);
        }
    }

    Ok(())
}
