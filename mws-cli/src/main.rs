//! `mws` - run a paginated list operation from the command line.
//!
//! ```text
//! mws --config mws.toml --store main --action ListOrders --section orders \
//!     --param CreatedAfter=2024-01-01T00:00:00Z --param MarketplaceId.Id.1=ATVPDKIKX0DER \
//!     --record-path Orders/Order
//! ```
//!
//! With `--mock orders_1.xml,503,orders_2.xml` the same run replays fixture
//! files from the configured fixture directory instead of calling the service.

#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from reqwest and tracing-subscriber"
)]

mod observability;

use std::{num::NonZeroU32, path::PathBuf, time::Duration};

use anyhow::{Context as _, Result};
use clap::Parser;
use mws_client::{
    MwsClient,
    clock::Clock,
    config::ClientConfig,
    pagination::{ActionPair, ElementList, Paginator},
    reliability::ThrottleConfig,
    request::ApiSection,
    signing::Parameters,
    transport::{MockQueue, Transport},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::observability::{LogFormat, init_observability};

/// Runs one list operation and prints every record.
#[derive(Debug, Parser)]
#[command(name = "mws", version, about)]
struct Cli {
    /// Configuration file.
    #[arg(long, default_value = "mws.toml")]
    config: PathBuf,

    /// Store whose credentials sign the requests.
    #[arg(long, default_value = "main")]
    store: String,

    /// First-page action, e.g. `ListOrders`.
    #[arg(long)]
    action: String,

    /// Continuation action; defaults to `<action>ByNextToken`.
    #[arg(long)]
    next_action: Option<String>,

    /// API section: orders, products, sellers, inbound-shipments,
    /// inventory, reports, or any name together with `--api-version`.
    #[arg(long, default_value = "orders")]
    section: String,

    /// API version of the section.
    #[arg(long)]
    api_version: Option<String>,

    /// Request parameter, repeatable.
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Element path of one record inside the result.
    #[arg(long)]
    record_path: String,

    /// Throttle quota group, for logging; defaults to the action.
    #[arg(long)]
    throttle_group: Option<String>,

    /// Seconds to sleep after a 503.
    #[arg(long, default_value_t = 60)]
    throttle_secs: u64,

    /// Fetch only the first page.
    #[arg(long)]
    no_auto_continue: bool,

    /// Stop after this many pages, keeping the token.
    #[arg(long)]
    max_pages: Option<NonZeroU32>,

    /// Replay fixtures instead of calling the service, e.g. `a.xml,503,b.xml`.
    #[arg(long, value_name = "LIST")]
    mock: Option<String>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long)]
    verbose: bool,
}

fn parse_param(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

fn section(name: &str, version: Option<&str>) -> std::result::Result<ApiSection, String> {
    if let Some(version) = version {
        return Ok(ApiSection::new(name, version));
    }
    match name {
        "orders" => Ok(ApiSection::orders()),
        "products" => Ok(ApiSection::products()),
        "sellers" => Ok(ApiSection::sellers()),
        "inbound-shipments" => Ok(ApiSection::inbound_shipments()),
        "inventory" => Ok(ApiSection::inventory()),
        "reports" => Ok(ApiSection::reports()),
        other => Err(format!("unknown section '{other}'; pass --api-version for custom sections")),
    }
}

impl Cli {
    fn resource(&self) -> Result<ElementList> {
        let params = self.params.iter().fold(Parameters::new(), |params, (k, v)| params.with(k, v));
        let throttle = ThrottleConfig::new(
            self.throttle_group.as_deref().unwrap_or(&self.action),
            Duration::from_secs(self.throttle_secs),
        );
        let actions = match &self.next_action {
            Some(next) => ActionPair::with_next(&self.action, next),
            None => ActionPair::new(&self.action),
        };

        Ok(ElementList::new(
            &self.action,
            section(&self.section, self.api_version.as_deref()).map_err(anyhow::Error::msg)?,
            params,
            &self.record_path,
        )
        .with_actions(actions)
        .with_throttle(throttle))
    }
}

async fn run<T: Transport, C: Clock>(
    client: &MwsClient<T, C>,
    cli: &Cli,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut paginator =
        Paginator::new(client, cli.resource()?).auto_continue(!cli.no_auto_continue);
    if let Some(max) = cli.max_pages {
        paginator = paginator.max_pages(max);
    }

    let records = paginator.fetch(cancel).await.with_context(|| format!("{} failed", cli.action))?;
    for (index, record) in records.iter().enumerate() {
        println!("--- record {}", index + 1);
        for (path, value) in record.flatten() {
            println!("{path}={value}");
        }
    }

    let state = paginator.state();
    println!(
        "pages={} records={} has_token={}",
        state.pages_fetched,
        state.records.len(),
        paginator.has_token()
    );
    if let Some(token) = paginator.next_token() {
        println!("next_token={token}");
    }
    Ok(())
}

async fn execute(cli: &Cli, cancel: &CancellationToken) -> Result<()> {
    let config = ClientConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;

    if let Some(list) = &cli.mock {
        let queue = MockQueue::parse(list).context("invalid --mock list")?;
        let client = MwsClient::mock(&config, &cli.store, queue)
            .with_context(|| format!("cannot build mock client for store '{}'", cli.store))?;
        info!(fixture_dir = %config.mock.fixture_dir.display(), "replaying fixtures");
        run(&client, cli, cancel).await
    } else {
        let client = MwsClient::from_config(&config, &cli.store)
            .with_context(|| format!("cannot build client for store '{}'", cli.store))?;
        run(&client, cli, cancel).await
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_observability(LogFormat::from_env(), cli.verbose.then_some("debug"));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    execute(&cli, &cancel).await
}
