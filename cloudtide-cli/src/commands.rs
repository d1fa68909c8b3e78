//! CLI command implementations

use anyhow::{Context, Result};
use clap::Subcommand;
use cloudtide_core::CloudtideConfig;
use cloudtide_search::sync::normalize;
use cloudtide_search::{DocumentFetcher, HttpFetcher, ProviderCatalog};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server and the search provider sync loop
    Server {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
        /// Fetch search providers from this URL instead of the default
        #[arg(long)]
        search_config_url: Option<String>,
    },
    /// Fetch, validate and list a search provider document
    Providers {
        /// Document URL; defaults to the configured source
        #[arg(long)]
        url: Option<String>,
        /// Print the canonical document instead of a summary
        #[arg(long)]
        canonical: bool,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns the error of the command that failed, with context
pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Server {
            host,
            port,
            search_config_url,
        } => start_server(host, port, search_config_url).await,
        Commands::Providers { url, canonical } => show_providers(url, canonical).await,
    }
}

/// Start the server with environment configuration plus command-line overrides.
///
/// # Errors
/// - Invalid settings, bind failure, or a refused bundled provider document
pub async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    search_config_url: Option<String>,
) -> Result<()> {
    let mut config = CloudtideConfig::from_env();
    apply_server_overrides(&mut config, host, port, search_config_url);

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "Starting Cloudtide server"
    );

    cloudtide_web::run_server(config)
        .await
        .context("Cloudtide server stopped with an error")
}

/// One-shot fetch and validation of a provider document.
///
/// # Errors
/// - The document could not be fetched, is not JSON, or fails validation
pub async fn show_providers(url: Option<String>, canonical: bool) -> Result<()> {
    let config = CloudtideConfig::from_env();
    let url = resolve_source_url(url, &config);

    let fetcher = HttpFetcher::new(&config.search_sync).context("Failed to build HTTP client")?;
    let raw = fetcher
        .fetch(&url)
        .await
        .with_context(|| format!("Failed to fetch {url}"))?;
    let document = normalize(&raw)?;
    let providers = ProviderCatalog::parse(&document)
        .with_context(|| format!("Provider document at {url} is invalid"))?;

    if canonical {
        println!("{}", String::from_utf8_lossy(&document));
        return Ok(());
    }

    println!("{} search providers from {url}", providers.len());
    for (id, definition) in providers.iter() {
        let kind = if definition.list.is_some() { "search" } else { "item" };
        println!("  {id:<16} {kind:<7} {}", definition.name);
    }

    Ok(())
}

fn apply_server_overrides(
    config: &mut CloudtideConfig,
    host: Option<String>,
    port: Option<u16>,
    search_config_url: Option<String>,
) {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(url) = search_config_url {
        config.engine.search_config_url = Some(url);
    }
}

fn resolve_source_url(explicit: Option<String>, config: &CloudtideConfig) -> String {
    explicit
        .or_else(|| config.engine.search_config_override().map(str::to_string))
        .unwrap_or_else(|| config.search_sync.default_url.clone())
}
