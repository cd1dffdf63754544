//! Turns fetched block data into persistence requests.
//!
//! Transactions are decoded one by one, filtered by message type and passed
//! through the message handlers. A transaction that cannot be decoded or
//! handled is recorded and left out while the rest of the block is still
//! written. Block events go through the event handler registry, and the
//! epoch handlers run too when the block starts an epoch. The block event
//! filters only decide which events are stored.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::domain::models::{
    Block, BlockEventBatch, BlockHeight, BlockResults, BlockTxBatch, FailedBlockRecord,
    FailureKind, FailureReason, FetchOutcome, IndexerBlockEventData, NormalizedTx, PersistRequest,
    TxSource,
};
use crate::domain::errors::MessageHandlerError;
use crate::domain::ports::IndexStore;
use crate::domain::services::block_events::block_event_records;
use crate::domain::services::event_registry::handlers::starts_epoch;
use crate::domain::services::tx_decoder::normalize::tx_hash;
use crate::domain::services::{
    EventHandlerRegistry, IndexFilters, MessageDecoder, MessageHandlerRegistry,
};
use crate::utils::logging;

#[derive(Debug, Clone)]
pub struct BlockProcessorSettings {
    pub chain_id: String,
    pub chain_name: String,
    pub epoch_identifier: Option<String>,
    pub block_event_attributes_base64: bool,
}

impl BlockProcessorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            chain_id: config.chain.chain_id.clone(),
            chain_name: config.chain.chain_name.clone(),
            epoch_identifier: config.indexer.epoch_identifier.clone(),
            block_event_attributes_base64: config.indexer.block_event_attributes_base64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlockProcessor {
    decoder: Arc<MessageDecoder>,
    registry: Arc<EventHandlerRegistry>,
    messages: Arc<MessageHandlerRegistry>,
    filters: Arc<IndexFilters>,
    store: Arc<dyn IndexStore>,
    settings: BlockProcessorSettings,
}

impl BlockProcessor {
    pub fn new(
        decoder: Arc<MessageDecoder>,
        registry: Arc<EventHandlerRegistry>,
        store: Arc<dyn IndexStore>,
        settings: BlockProcessorSettings,
    ) -> Self {
        Self {
            decoder,
            registry,
            messages: Arc::new(MessageHandlerRegistry::new()),
            filters: Arc::new(IndexFilters::default()),
            store,
            settings,
        }
    }

    pub fn with_message_handlers(mut self, messages: Arc<MessageHandlerRegistry>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_filters(mut self, filters: Arc<IndexFilters>) -> Self {
        self.filters = filters;
        self
    }

    /// Process worker output until the channel closes
    pub fn spawn(
        self,
        mut receiver: mpsc::Receiver<IndexerBlockEventData>,
        sender: mpsc::Sender<PersistRequest>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut processed = 0u64;
            while let Some(data) = receiver.recv().await {
                for request in self.process(data).await {
                    if sender.send(request).await.is_err() {
                        logging::log_error(&format!(
                            "[{}] Persistence channel closed, stopping block processor",
                            self.settings.chain_id
                        ));
                        return;
                    }
                }
                processed += 1;
            }
            logging::log_info(&format!(
                "[{}] Block processor finished after {} heights",
                self.settings.chain_id, processed
            ));
        })
    }

    /// Persistence requests for one height
    pub async fn process(&self, data: IndexerBlockEventData) -> Vec<PersistRequest> {
        let mut requests = Vec::with_capacity(2);

        if let FetchOutcome::Fetched(source) = &data.txs {
            requests.push(PersistRequest::Transactions(
                self.process_txs(&data.block, source).await,
            ));
        }

        if let FetchOutcome::Fetched(results) = &data.block_results {
            if let Some(batch) = self.process_events(&data.block, results).await {
                requests.push(PersistRequest::BlockEvents(batch));
            }
        }

        requests
    }

    async fn process_txs(&self, block: &Block, source: &TxSource) -> BlockTxBatch {
        let (results, identifiers): (_, Vec<String>) = match source {
            TxSource::Search(response) => (
                self.decoder.normalize_search_response(block, response),
                response
                    .tx_responses
                    .iter()
                    .map(|r| r.txhash.to_uppercase())
                    .collect(),
            ),
            TxSource::BlockBytes(block_results) => (
                self.decoder.normalize_block_txs(block, block_results),
                block.txs.iter().map(|bytes| tx_hash(bytes)).collect(),
            ),
        };

        let mut txs: Vec<NormalizedTx> = Vec::with_capacity(results.len());
        let mut unprocessable_txs = Vec::new();
        for (index, result) in results.into_iter().enumerate() {
            let outcome = result
                .map_err(|e| e.to_string())
                .and_then(|tx| self.handle_messages(tx).map_err(|e| e.to_string()));
            match outcome {
                Ok(tx) => txs.push(tx),
                Err(error) => {
                    let identifier = identifiers
                        .get(index)
                        .cloned()
                        .unwrap_or_else(|| format!("{}:{}", block.height, index));
                    logging::log_error(&format!(
                        "[{}] Unprocessable tx {} at height {}: {}",
                        self.settings.chain_id, identifier, block.height, error
                    ));
                    unprocessable_txs.push(identifier);
                }
            }
        }

        if !unprocessable_txs.is_empty() {
            self.record_failure(
                block.height,
                FailureKind::TxData,
                FailureReason::UnprocessableTxError,
            )
            .await;
        }

        BlockTxBatch {
            chain_id: self.settings.chain_id.clone(),
            height: block.height,
            block_hash: block.hash.clone(),
            time: block.time,
            proposer_address: block.proposer_address.clone(),
            txs,
            unprocessable_txs,
        }
    }

    /// Drop filtered messages and collect what the message handlers read
    fn handle_messages(&self, mut tx: NormalizedTx) -> Result<NormalizedTx, MessageHandlerError> {
        if !self.filters.is_empty() {
            let before = tx.messages.len();
            tx.messages
                .retain(|message| self.filters.should_index_message(message));
            if tx.messages.len() < before {
                let kept: Vec<usize> = tx.messages.iter().map(|m| m.message_index).collect();
                tx.per_message_logs
                    .retain(|log| kept.contains(&log.msg_index));
                logging::log_debug(&format!(
                    "[{}] Skipped {} filtered messages of tx {}",
                    self.settings.chain_id,
                    before - tx.messages.len(),
                    tx.hash
                ));
            }
        }

        tx.relevant_data = self.messages.dispatch_tx(&tx)?;
        Ok(tx)
    }

    async fn process_events(&self, block: &Block, results: &BlockResults) -> Option<BlockEventBatch> {
        let height = block.height;

        let (begin, end, events) =
            match block_event_records(results, self.settings.block_event_attributes_base64) {
                Ok(parsed) => parsed,
                Err(e) => {
                    logging::log_error(&format!(
                        "[{}] Could not normalize block events at height {}: {}",
                        self.settings.chain_id, height, e
                    ));
                    self.record_failure(
                        height,
                        FailureKind::EventData,
                        FailureReason::FailedBlockEventHandling,
                    )
                    .await;
                    return None;
                }
            };

        let mut relevant_data = match self.registry.dispatch_block_events(height, &begin, &end) {
            Ok(data) => data,
            Err(e) => {
                logging::log_error(&format!(
                    "[{}] Block event handling failed at height {}: {}",
                    self.settings.chain_id, height, e
                ));
                self.record_failure(
                    height,
                    FailureKind::EventData,
                    FailureReason::FailedBlockEventHandling,
                )
                .await;
                return None;
            }
        };

        let mut has_epoch_data = false;
        if let Some(epoch_identifier) = &self.settings.epoch_identifier {
            if starts_epoch(&begin, epoch_identifier) {
                match self
                    .registry
                    .dispatch_epoch_events(epoch_identifier, height, &begin, &end)
                {
                    Ok(epoch_data) => {
                        logging::log_info(&format!(
                            "[{}] Epoch {} starts at height {}, {} reward entries",
                            self.settings.chain_id,
                            epoch_identifier,
                            height,
                            epoch_data.len()
                        ));
                        has_epoch_data = !epoch_data.is_empty();
                        relevant_data.extend(epoch_data);
                    }
                    Err(e) => {
                        logging::log_error(&format!(
                            "[{}] Epoch reward lookup failed at height {}: {}",
                            self.settings.chain_id, height, e
                        ));
                        self.record_failure(
                            height,
                            FailureKind::EventData,
                            FailureReason::RewardLookupError,
                        )
                        .await;
                        return None;
                    }
                }
            }
        }

        Some(BlockEventBatch {
            chain_id: self.settings.chain_id.clone(),
            height,
            block_hash: block.hash.clone(),
            time: block.time,
            events: self.filters.filter_block_events(events),
            relevant_data,
            has_epoch_data,
        })
    }

    async fn record_failure(&self, height: BlockHeight, kind: FailureKind, reason: FailureReason) {
        let record = FailedBlockRecord::new(
            height,
            &self.settings.chain_id,
            &self.settings.chain_name,
            kind,
            reason,
        );
        logging::log_failed_block(&record);
        if let Err(e) = self.store.upsert_failed_block(&record).await {
            logging::log_failed_block_not_recorded(&record, &e);
        }
    }
}
