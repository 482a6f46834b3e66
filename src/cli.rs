use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "relaybox")]
#[command(about = "Loopback dispatch bridge for a TLS-fingerprinting HTTP engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the bridge HTTP server
    Server(ServerArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Host to bind; overrides the configured value
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind; 0 picks an ephemeral port. Overrides the configured value
    #[arg(long)]
    pub port: Option<u16>,
}
