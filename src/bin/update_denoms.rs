use anyhow::Context;
use clap::Parser;

use cosmos_indexer::application::denoms::{select_asset_lists, update_denoms};
use cosmos_indexer::config::AppConfig;
use cosmos_indexer::domain::services::RetryPolicy;
use cosmos_indexer::infrastructure::persistence::DbPool;
use cosmos_indexer::infrastructure::rpc::AssetListClient;
use cosmos_indexer::utils::logging;

/// Update denom metadata from the vetted chain registry asset lists
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Update every supported asset list instead of the configured chain's
    #[arg(long)]
    update_all: bool,
    /// Chain whose asset list to update (CHAIN_ID if not specified)
    #[arg(long)]
    chain_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logger();

    let cli = Cli::parse();
    let config = AppConfig::from_env();
    let chain_id = cli.chain_id.unwrap_or_else(|| config.chain.chain_id.clone());
    let asset_lists =
        select_asset_lists(cli.update_all, &chain_id).context("no asset list selected")?;

    let db_pool = DbPool::new(&config)
        .await
        .context("failed to connect to database")?;
    let client = AssetListClient::new(RetryPolicy::from_secs(
        config.indexer.request_retry_attempts,
        config.indexer.request_retry_max_wait,
    ))
    .context("failed to create asset list client")?;

    let summary = update_denoms(db_pool.get_connection(), &client, &asset_lists)
        .await
        .context("denom update failed")?;
    logging::log_info(&format!(
        "[DENOMS] Done: {} denoms upserted, {} base units added",
        summary.denoms, summary.units_backfilled
    ));

    Ok(())
}
