//! Définition et implémentation des commandes CLI
//!
//! - `query` : une requête par coordonnées ou adresse
//! - `interactive` : boucle sur l'entrée standard, couches chargées une fois
//! - `fetch` : remplit (ou rafraîchit) le cache de toutes les couches

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use zoning_check::{
    Config, LayerConfig, NominatimGeocoder, OutputOptions, QueryInput, QueryOutcome, Session,
    ZoneReport,
};
use zonestore::{CacheStatus, DatasetCache};

/// Options communes à toutes les commandes
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Config preset name (brisbane) or path to a JSON config
    #[arg(long, default_value = "brisbane", global = true)]
    pub config: String,

    /// Directory for cached datasets
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Read at most N features per layer (zones beyond the cap are never found)
    #[arg(long, global = true)]
    pub row_limit: Option<usize>,

    /// Extra overlay layer, repeatable
    #[arg(long = "overlay", value_name = "NAME=URL", value_parser = LayerConfig::parse_overlay_arg, global = true)]
    pub overlays: Vec<LayerConfig>,

    /// User-Agent sent to the geocoding service
    #[arg(long, global = true)]
    pub user_agent: Option<String>,

    /// Download timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Re-download cached files older than N seconds
    #[arg(long, global = true)]
    pub max_age: Option<u64>,
}

/// Fichiers produits après une requête fructueuse
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Write the map (.png or .svg)
    #[arg(long)]
    pub map: Option<PathBuf>,

    /// Write the PDF report
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Write matched features as GeoJSON
    #[arg(long)]
    pub geojson: Option<PathBuf>,
}

impl From<OutputArgs> for OutputOptions {
    fn from(args: OutputArgs) -> Self {
        Self {
            map: args.map,
            report: args.report,
            geojson: args.geojson,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find the zone and overlays containing a point or an address
    Query {
        /// Longitude (WGS84)
        #[arg(long, allow_negative_numbers = true, requires = "lat", conflicts_with = "address")]
        lon: Option<f64>,

        /// Latitude (WGS84)
        #[arg(long, allow_negative_numbers = true, requires = "lon")]
        lat: Option<f64>,

        /// Free-text address, geocoded with Nominatim
        #[arg(long)]
        address: Option<String>,

        #[command(flatten)]
        outputs: OutputArgs,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read 'lon,lat' or addresses from stdin until 'quit'
    Interactive {
        #[command(flatten)]
        outputs: OutputArgs,
    },

    /// Download every configured layer into the cache
    Fetch {
        /// Download again even if a cached file exists
        #[arg(long)]
        refresh: bool,
    },
}

/// Assemble la configuration : preset/fichier < env < CLI
pub fn build_config(args: &CommonArgs) -> Result<Config> {
    let mut config = Config::resolve(&args.config)?;
    config.apply_env()?;

    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(limit) = args.row_limit {
        config.row_limit = Some(limit);
    }
    if let Some(ua) = &args.user_agent {
        config.geocoder.user_agent = ua.clone();
    }
    if let Some(secs) = args.timeout {
        config.download_timeout_secs = secs;
    }
    if let Some(secs) = args.max_age {
        config.max_age_secs = Some(secs);
    }
    for overlay in &args.overlays {
        config.upsert_overlay(overlay.clone());
    }

    config.validate()?;
    Ok(config)
}

async fn open_session(config: &Config) -> Result<Session<NominatimGeocoder>> {
    let geocoder = NominatimGeocoder::new(&config.geocoder)?;
    let session = Session::open(config, geocoder)
        .await
        .context("Failed to load zoning data")?;

    for name in session.unavailable_overlays() {
        println!("Warning: overlay '{}' is unavailable", name);
    }
    Ok(session)
}

fn print_outcome(outcome: &QueryOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }
    if outcome.is_empty() {
        println!("No zoning data found for {}.", outcome.point);
        return Ok(());
    }
    ZoneReport::build(outcome).display();
    Ok(())
}

/// Exécute la commande query
pub async fn cmd_query(
    config: &Config,
    input: QueryInput,
    outputs: OutputOptions,
    json: bool,
) -> Result<()> {
    let mut session = open_session(config).await?;
    let outcome = session.run(input, &outputs).await?;
    print_outcome(&outcome, json)?;

    if !outcome.is_empty() {
        for (label, path) in [
            ("Map", &outputs.map),
            ("Report", &outputs.report),
            ("GeoJSON", &outputs.geojson),
        ] {
            if let Some(path) = path {
                println!("{}: {}", label, path.display());
            }
        }
    }
    Ok(())
}

/// Exécute la boucle interactive
pub async fn cmd_interactive(config: &Config, outputs: OutputOptions) -> Result<()> {
    let mut session = open_session(config).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Enter 'lon,lat' or an address ('quit' to exit)");
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "quit" | "exit") {
            break;
        }

        // Une requête en erreur ne termine pas la session
        match session.run(QueryInput::parse(line), &outputs).await {
            Ok(outcome) => print_outcome(&outcome, false)?,
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    info!("Interactive session closed");
    Ok(())
}

/// Exécute la commande fetch
pub async fn cmd_fetch(config: &Config, refresh: bool) -> Result<()> {
    let cache = DatasetCache::new(config.cache_config())?;
    let descriptors =
        std::iter::once(config.zoning_descriptor()).chain(config.overlay_descriptors());

    let mut failed = 0;
    for descriptor in descriptors {
        let result = if refresh {
            cache.refresh(&descriptor).await
        } else {
            cache.ensure_cached(&descriptor).await
        };

        match result {
            Ok(path) => println!(
                "{:<24} {:<28} {}",
                descriptor.name,
                describe_status(cache.status(&descriptor)),
                path.display()
            ),
            Err(e) => {
                failed += 1;
                println!("{:<24} FAILED: {}", descriptor.name, e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} layer(s) could not be fetched", failed);
    }
    Ok(())
}

fn describe_status(status: CacheStatus) -> String {
    match status {
        CacheStatus::Missing => "missing".to_string(),
        CacheStatus::Fresh { size, age } => format!("{} bytes, {}s old", size, age.as_secs()),
        CacheStatus::Stale { size, age } => {
            format!("{} bytes, {}s old (stale)", size, age.as_secs())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn common() -> CommonArgs {
        CommonArgs {
            config: "brisbane".into(),
            data_dir: None,
            row_limit: None,
            overlays: vec![],
            user_agent: None,
            timeout: None,
            max_age: None,
        }
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = CommonArgs {
            data_dir: Some(PathBuf::from("/tmp/cache")),
            row_limit: Some(100),
            overlays: vec![LayerConfig::parse_overlay_arg("Flood Risk=http://x/flood").unwrap()],
            user_agent: Some("my-agent".into()),
            ..common()
        };

        let config = build_config(&args).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/cache"));
        assert_eq!(config.row_limit, Some(100));
        assert_eq!(config.overlays.len(), 1);
        assert_eq!(config.geocoder.user_agent, "my-agent");
    }

    #[test]
    fn test_unknown_config_file() {
        let args = CommonArgs {
            config: "/nonexistent/zoning.json".into(),
            ..common()
        };
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn test_describe_status() {
        assert_eq!(describe_status(CacheStatus::Missing), "missing");
        assert_eq!(
            describe_status(CacheStatus::Fresh {
                size: 42,
                age: Duration::from_secs(5)
            }),
            "42 bytes, 5s old"
        );
    }
}
