use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pal_app::{bootstrap_registry, Pal, PalConfig};
use pal_backends::AdapterRegistry;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pal-server")]
#[command(about = "Reservoir simulator adapter layer - job gateway over HTTP", long_about = None)]
struct Cli {
    /// YAML configuration file; defaults plus PAL_* variables when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the job gateway
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,
    },
    /// Probe every configured backend and print the result
    Health,
    /// Compare two results saved as JSON using the configured tolerances
    Compare {
        a: PathBuf,
        b: PathBuf,
    },
}

type MainResult = Result<(), Box<dyn std::error::Error>>;

fn main() -> MainResult {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = PalConfig::load(cli.config.as_deref())?;
    let registry = AdapterRegistry::global();
    bootstrap_registry(&config, &registry)?;
    let pal = Pal::new(Some(registry));

    match cli.command {
        Commands::Serve { bind } => serve(&pal, &config, bind),
        Commands::Health => {
            let health = pal.health();
            print!("{}", serde_yaml::to_string(&health)?);
            if health.iter().any(|h| !h.available) {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Compare { a, b } => {
            let report = pal.compare_files(&a, &b, &config.compare)?;
            print!("{}", serde_yaml::to_string(&report)?);
            Ok(())
        }
    }
}

fn serve(pal: &Pal, config: &PalConfig, bind: SocketAddr) -> MainResult {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async {
        let gateway = pal.gateway(config.gateway())?;
        let app = pal_gateway::router(gateway);
        let listener = tokio::net::TcpListener::bind(bind).await?;
        tracing::info!(%bind, workspace = %config.workspace_root.display(), "gateway listening");
        axum::serve(listener, app).await?;
        Ok::<_, Box<dyn std::error::Error>>(())
    })
}
