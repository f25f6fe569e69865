use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as b64, Engine as _};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use url::Url;

use haystack_reports::{
    accessory::{import_accessories_file, MemoryKeyStore},
    config::Config,
    owner::{batch, AccessoriesManager, RetrievalPipeline},
    protocol::{AdvertisementKey, KeyIdentifier, PrivateKey},
    server::{ReportFetchClient, ReportFetchRequest, ReportResults, ReqwestHttpClient},
};

#[derive(Parser)]
struct CliParser {
    /// Path to a JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// URL of the report aggregation server. Overrides the configuration file.
    #[arg(long, env = "HAYSTACK_SERVER_URL")]
    server_url: Option<String>,

    /// Value of the Authorization header sent to the server. Overrides the configuration file.
    #[arg(long, env = "HAYSTACK_AUTHORIZATION", hide_env_values = true)]
    authorization: Option<String>,

    /// Command to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch raw reports from the server without decrypting them.
    FetchRawReports {
        /// Base64-encoded 28-byte P224 private key.
        #[arg(long, group = "fetch-by")]
        private_key: Option<String>,
        /// Base64-encoded 28-byte advertisement key.
        #[arg(long, group = "fetch-by")]
        public_key: Option<String>,
        /// Base64-encoded SHA256 hash of an advertisement key.
        #[arg(long, group = "fetch-by")]
        hashed_public_key: Option<String>,
    },
    /// Fetch reports by private key and decrypt them.
    FetchReports {
        /// Base64-encoded 28-byte P224 private keys.
        #[arg(required = true)]
        private_keys: Vec<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Debug)]
        format: OutputFormat,
    },
    /// Import an OpenHaystack accessories plist and refresh their locations.
    Refresh {
        #[arg(long)]
        accessories: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Debug,
    Geojson,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli_args = CliParser::parse();

    let config = match &cli_args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    }
    .with_overrides(cli_args.server_url.clone(), cli_args.authorization.clone());

    match cli_args.command {
        Command::FetchRawReports {
            private_key,
            public_key,
            hashed_public_key,
        } => {
            let key_identifier = match (private_key, public_key, hashed_public_key) {
                (Some(sk), _, _) => parse_private_key(&sk)?.key_identifier(),
                (_, Some(pk), _) => {
                    let decoded = b64.decode(pk)?;
                    AdvertisementKey::try_from(decoded.as_slice())
                        .context("advertisement keys are 28 bytes")?
                        .hash()
                }
                (_, _, Some(hpk)) => KeyIdentifier::from_base64(&hpk)
                    .context("hashed public keys are 32 bytes of base64")?,
                _ => bail!("one of --private-key, --public-key or --hashed-public-key is required"),
            };

            let results = fetch(&config, &[key_identifier]).await?;
            for raw_report in results.results {
                println!("{:?}", raw_report);
            }
        }
        Command::FetchReports {
            private_keys,
            format,
        } => {
            let keys = private_keys
                .iter()
                .map(|sk| parse_private_key(sk).map(|key| (key.key_identifier(), key)))
                .collect::<Result<Vec<_>>>()?;
            let ids: Vec<_> = keys.iter().map(|(id, _)| *id).collect();

            let results = fetch(&config, &ids).await?;
            let decrypted = batch::decrypt_reports(results.results, &keys).await?;
            let reports = decrypted.values().flatten();

            match format {
                OutputFormat::Debug => {
                    for report in reports {
                        println!("{:?}", report);
                    }
                }
                OutputFormat::Geojson => {
                    let collection: geojson::FeatureCollection =
                        reports.map(geojson::Feature::from).collect();
                    println!("{}", collection);
                }
            }
        }
        Command::Refresh { accessories } => {
            let mut key_store = MemoryKeyStore::new();
            let imported = import_accessories_file(&accessories, &mut key_store)
                .with_context(|| format!("importing {}", accessories.display()))?;

            let pipeline = RetrievalPipeline::new(ReqwestHttpClient::new()?, key_store, config);
            let manager = AccessoriesManager::new(pipeline, imported);

            for accessory in manager.refresh().await? {
                match accessory.latest_location() {
                    Some(location) => println!(
                        "{} ({:?}): {}, {} ±{}m at {}",
                        accessory.name,
                        accessory.status,
                        location.latitude,
                        location.longitude,
                        location.accuracy,
                        location.timestamp,
                    ),
                    None => println!("{} ({:?}): no locations", accessory.name, accessory.status),
                }
            }
        }
    }

    Ok(())
}

fn parse_private_key(encoded: &str) -> Result<PrivateKey> {
    let decoded = b64.decode(encoded).context("private keys are base64")?;
    Ok(PrivateKey::from_bytes(&decoded)?)
}

async fn fetch(config: &Config, ids: &[KeyIdentifier]) -> Result<ReportResults> {
    let server_url = config
        .server
        .server_url
        .as_deref()
        .context("no server URL configured")?;
    let server_url = Url::parse(server_url).context("invalid server URL")?;

    let client = ReportFetchClient::new(ReqwestHttpClient::new()?);
    let request = ReportFetchRequest::new(ids, config.reports.number_of_days, Utc::now());

    Ok(client
        .fetch(&server_url, &config.server.authorization, &request)
        .await?)
}
