//! Point d'entrée CLI pour zoning-check

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::{CommonArgs, Commands};
use zoning_check::QueryInput;

/// Trouver la zone d'urbanisme et les overlays contenant un point de Brisbane
#[derive(Parser)]
#[command(name = "zoning-check")]
#[command(author, version)]
#[command(about = "Find the Brisbane zoning and overlays containing a point or an address")]
#[command(long_about = "Downloads the Brisbane City Council zoning layer once, caches it locally and answers point-in-polygon queries.\n\nOverlay layers can be added with --overlay NAME=URL or a JSON config.")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    let config = cli::build_config(&cli.common)?;
    info!(
        config = cli.common.config.as_str(),
        data_dir = %config.data_dir.display(),
        overlays = config.overlays.len(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::Query {
            lon,
            lat,
            address,
            outputs,
            json,
        } => {
            let input = match (lon, lat, address) {
                (Some(lon), Some(lat), _) => QueryInput::Coordinates { lon, lat },
                (_, _, Some(address)) => QueryInput::Address(address),
                _ => anyhow::bail!("Provide --lon and --lat, or --address"),
            };
            cli::cmd_query(&config, input, outputs.into(), json).await?;
        }
        Commands::Interactive { outputs } => {
            cli::cmd_interactive(&config, outputs.into()).await?;
        }
        Commands::Fetch { refresh } => {
            cli::cmd_fetch(&config, refresh).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}
