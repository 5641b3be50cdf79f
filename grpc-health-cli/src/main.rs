use clap::{Parser, Subcommand};
use colored::Colorize;
use grpc_health::prelude::{init_tracing, Config};

mod commands;

use commands::client::ClientArgs;
use commands::server::ServerArgs;

/// grpc-health - gRPC health check server and client
#[derive(Parser)]
#[command(name = "grpc-health")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a gRPC server that reports SERVING
    Server(ServerArgs),
    /// Run one health check against a gRPC server
    Client(ClientArgs),
}

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Logging is configured from GRPC_HEALTH_* variables
    let result = match Config::load().and_then(|config| init_tracing(&config)) {
        Ok(()) => match cli.command {
            Commands::Server(args) => commands::server::execute(args).await,
            Commands::Client(args) => commands::client::execute(args).await,
        },
        Err(e) => Err(e.into()),
    };

    // Handle result
    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);

            // Show context if available
            for cause in extra_causes(&e) {
                eprintln!("\n{} {}", "Caused by:".yellow(), cause);
            }

            std::process::exit(1);
        }
    }
}

/// Causes in the error chain whose text the top-level message does not
/// already include
fn extra_causes(err: &anyhow::Error) -> Vec<String> {
    let mut shown = err.to_string();
    let mut extra = Vec::new();
    for cause in err.chain().skip(1) {
        let text = cause.to_string();
        if !shown.contains(&text) {
            shown.push_str(&text);
            extra.push(text);
        }
    }
    extra
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_server_flags() {
        let cli = Cli::try_parse_from([
            "grpc-health",
            "server",
            ":50051",
            "-c",
            "server.crt",
            "--key-file",
            "server.key",
        ])
        .unwrap();

        match cli.command {
            Commands::Server(args) => {
                assert_eq!(args.address, ":50051");
                assert_eq!(args.cert_file.unwrap().to_str(), Some("server.crt"));
                assert_eq!(args.key_file.unwrap().to_str(), Some("server.key"));
            }
            Commands::Client(_) => panic!("expected server command"),
        }
    }

    #[test]
    fn test_parse_client_flags() {
        let cli =
            Cli::try_parse_from(["grpc-health", "client", "localhost:50051", "-t", "-k", "-s", "api"]).unwrap();

        match cli.command {
            Commands::Client(args) => {
                assert_eq!(args.address, "localhost:50051");
                assert!(args.tls);
                assert!(args.insecure);
                assert_eq!(args.service, "api");
            }
            Commands::Server(_) => panic!("expected client command"),
        }
    }

    #[test]
    fn test_client_service_defaults_to_overall_health() {
        let cli = Cli::try_parse_from(["grpc-health", "client", "/tmp/grpc.sock"]).unwrap();

        match cli.command {
            Commands::Client(args) => {
                assert_eq!(args.service, "");
                assert!(!args.tls);
                assert!(!args.insecure);
            }
            Commands::Server(_) => panic!("expected client command"),
        }
    }

    #[test]
    fn test_causes_already_in_message_are_not_repeated() {
        let err: anyhow::Error = grpc_health::error::Error::Bind {
            endpoint: "127.0.0.1:1".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
        }
        .into();
        assert!(extra_causes(&err).is_empty());
    }

    #[test]
    fn test_context_causes_are_shown() {
        let err = anyhow::anyhow!("address in use").context("failed to start");
        assert_eq!(extra_causes(&err), vec!["address in use".to_string()]);
    }

    #[test]
    fn test_address_is_required() {
        assert!(Cli::try_parse_from(["grpc-health", "server"]).is_err());
        assert!(Cli::try_parse_from(["grpc-health", "client"]).is_err());
    }
}
