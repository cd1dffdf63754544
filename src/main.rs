use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use cosmos_indexer::application::indexer::Indexer;
use cosmos_indexer::config::AppConfig;
use cosmos_indexer::domain::ports::IndexStore;
use cosmos_indexer::domain::services::event_registry::handlers::{
    register_epoch_reward_handlers, register_generic_handlers,
};
use cosmos_indexer::domain::services::message_registry::handlers::register_generic_message_handlers;
use cosmos_indexer::domain::services::tx_decoder::register_cosmos_sdk_message_types;
use cosmos_indexer::domain::services::{
    AddressResolver, EventHandlerRegistry, IndexFilters, MessageDecoder, MessageHandlerRegistry,
    RetryPolicy,
};
use cosmos_indexer::infrastructure::persistence::{DbPool, MemoryIndexStore, SeaOrmIndexStore};
use cosmos_indexer::infrastructure::rpc::{ChainClient, TendermintProvider};
use cosmos_indexer::utils::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logger();

    let config = AppConfig::from_env();
    config.validate().context("invalid configuration")?;

    logging::log_info(&format!(
        "cosmos-indexer {} indexing {} ({})",
        env!("CARGO_PKG_VERSION"),
        config.chain.chain_id,
        config.chain.chain_name
    ));
    logging::log_rpc_connection_details(
        &config.chain.chain_id,
        &config.chain.rpc_url,
        &config.chain.rest_url,
        config.chain.rpc_timeout_secs,
    );

    let store: Arc<dyn IndexStore> = if config.database.dry_run {
        logging::log_warning("Dry run: indexed data is kept in memory only");
        Arc::new(MemoryIndexStore::new())
    } else {
        let db_pool = DbPool::new(&config)
            .await
            .context("failed to connect to database")?;
        Arc::new(SeaOrmIndexStore::new(&db_pool))
    };

    let mut registry = EventHandlerRegistry::new();
    register_generic_handlers(&mut registry).context("failed to register event handlers")?;
    if let Some(epoch_identifier) = &config.indexer.epoch_identifier {
        register_epoch_reward_handlers(&mut registry, epoch_identifier)
            .context("failed to register epoch handlers")?;
    }

    let mut messages = MessageHandlerRegistry::new();
    register_generic_message_handlers(&mut messages)
        .context("failed to register message handlers")?;

    let filters = if config.indexer.filter_file.is_empty() {
        IndexFilters::default()
    } else {
        let filters = IndexFilters::from_file(&config.indexer.filter_file)
            .context("failed to load filter file")?;
        let (block_event_filters, message_type_filters) = filters.counts();
        logging::log_info(&format!(
            "Loaded {} block event filters and {} message type filters from {}",
            block_event_filters, message_type_filters, config.indexer.filter_file
        ));
        filters
    };

    let resolver = AddressResolver::new(&config.chain.account_prefix)
        .context("invalid account prefix")?;
    let mut decoder = MessageDecoder::new(resolver);
    register_cosmos_sdk_message_types(&mut decoder);

    let provider = TendermintProvider::new(
        &config.chain.rpc_url,
        &config.chain.rest_url,
        Duration::from_secs(config.chain.rpc_timeout_secs),
    )
    .context("failed to create chain RPC provider")?;
    let client = ChainClient::new(
        Arc::new(provider),
        RetryPolicy::from_secs(
            config.indexer.request_retry_attempts,
            config.indexer.request_retry_max_wait,
        ),
    );

    let indexer = Indexer::new(config, client, store, decoder, registry)
        .with_message_handlers(messages)
        .with_filters(filters);

    tokio::select! {
        result = indexer.run() => {
            let summary = result.context("indexing pipeline failed")?;
            logging::log_info(&format!(
                "Indexing finished: {} heights enqueued, {} txs written",
                summary.enqueued, summary.writer.txs
            ));
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl+C")?;
            logging::log_info("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
