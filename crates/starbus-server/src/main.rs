use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use starbus_core::Bus;
use starbus_devices::{ConfigStore, DEFAULT_PORT};
use starbus_server::Server;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "starbus-server", version, about = "Property bus server")]
struct Args {
    /// TCP port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,

    /// Directory for saved device configurations (default: ~/.starbus).
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config_dir = args.config_dir.unwrap_or_else(ConfigStore::default_dir);
    let bus = Bus::new("main");
    let server = Server::new(bus, ConfigStore::new(config_dir, args.port));
    let addr = SocketAddr::new(args.bind, args.port);
    info!(version = starbus_core::VERSION, %addr, "starting");

    tokio::select! {
        result = server.run(addr) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    }
}
