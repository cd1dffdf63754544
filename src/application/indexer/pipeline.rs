//! Indexing pipeline.
//!
//! enqueuer -> RPC workers -> block processor -> persistence writer, each
//! stage connected by a bounded channel. Closing the request channel drains
//! the stages in order. A stage that stops early closes its input, which
//! unwinds the stages upstream of it.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::application::indexer::block_processor::{BlockProcessor, BlockProcessorSettings};
use crate::application::indexer::enqueue::{
    select_strategy, wait_for_chain, BlockEnqueuer, EnqueueSettings, FailedBlockEnqueuer,
    ENQUEUE_CHANNEL_CAPACITY,
};
use crate::application::indexer::rpc_worker::{RpcWorkerPool, RpcWorkerSettings};
use crate::config::AppConfig;
use crate::domain::errors::{EnqueueError, PipelineError};
use crate::domain::models::EnqueueRequest;
use crate::domain::ports::IndexStore;
use crate::domain::services::{
    EventHandlerRegistry, IndexFilters, MessageDecoder, MessageHandlerRegistry,
};
use crate::infrastructure::queue::{PersistenceWriterBuilder, WriterSummary};
use crate::infrastructure::rpc::ChainClient;
use crate::utils::logging;

/// Totals of a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub enqueued: u64,
    pub writer: WriterSummary,
}

/// Wires the pipeline stages for one chain
#[derive(Debug)]
pub struct Indexer {
    config: AppConfig,
    client: ChainClient,
    store: Arc<dyn IndexStore>,
    decoder: Arc<MessageDecoder>,
    registry: Arc<EventHandlerRegistry>,
    messages: Arc<MessageHandlerRegistry>,
    filters: Arc<IndexFilters>,
}

impl Indexer {
    pub fn new(
        config: AppConfig,
        client: ChainClient,
        store: Arc<dyn IndexStore>,
        decoder: MessageDecoder,
        registry: EventHandlerRegistry,
    ) -> Self {
        Self {
            config,
            client,
            store,
            decoder: Arc::new(decoder),
            registry: Arc::new(registry),
            messages: Arc::new(MessageHandlerRegistry::new()),
            filters: Arc::new(IndexFilters::default()),
        }
    }

    pub fn with_message_handlers(mut self, messages: MessageHandlerRegistry) -> Self {
        self.messages = Arc::new(messages);
        self
    }

    pub fn with_filters(mut self, filters: IndexFilters) -> Self {
        self.filters = Arc::new(filters);
        self
    }

    /// Run until the enqueue strategies are exhausted and every stage drained
    pub async fn run(self) -> Result<PipelineSummary, PipelineError> {
        let chain_id = self.config.chain.chain_id.clone();
        let worker_settings = RpcWorkerSettings::from_config(&self.config);
        let stage_capacity = worker_settings.output_capacity();

        logging::log_info(&format!(
            "[{}] Starting pipeline with {} RPC workers via {}",
            chain_id,
            worker_settings.workers,
            self.client.provider_name()
        ));

        let (request_tx, request_rx) = mpsc::channel::<EnqueueRequest>(ENQUEUE_CHANNEL_CAPACITY);
        let (data_tx, data_rx) = mpsc::channel(stage_capacity);
        let (persist_tx, persist_rx) = mpsc::channel(stage_capacity);

        let writer = PersistenceWriterBuilder::new()
            .batch_size(self.config.indexer.writer_batch_size)
            .batch_timeout(Duration::from_millis(
                self.config.indexer.writer_batch_timeout_ms,
            ))
            .max_retries(self.config.indexer.writer_max_retries)
            .block_timer(self.config.indexer.block_timer)
            .build(
                self.store.clone(),
                &chain_id,
                &self.config.chain.chain_name,
                persist_rx,
            );
        let mut writer_handle = tokio::spawn(writer.start());

        let processor = BlockProcessor::new(
            self.decoder.clone(),
            self.registry.clone(),
            self.store.clone(),
            BlockProcessorSettings::from_config(&self.config),
        )
        .with_message_handlers(self.messages.clone())
        .with_filters(self.filters.clone());
        let processor_handle = processor.spawn(data_rx, persist_tx);

        let workers = RpcWorkerPool::new(self.client.clone(), self.store.clone(), worker_settings);
        let workers_handle = workers.spawn(request_rx, data_tx);

        let enqueue_result = tokio::select! {
            result = self.enqueue(&request_tx) => result,
            writer = &mut writer_handle => {
                // The writer only returns early on a fatal error
                return match writer? {
                    Err(e) => Err(e),
                    Ok(_) => Err(PipelineError::WriterFailed(
                        "writer stopped before the enqueuer finished".to_string(),
                    )),
                };
            }
        };
        drop(request_tx);

        if let Err(e) = &enqueue_result {
            logging::log_error(&format!(
                "[{}] Enqueue failed, draining pipeline: {}",
                chain_id, e
            ));
        }

        workers_handle.await?;
        processor_handle.await?;
        let writer_summary = writer_handle.await??;
        let enqueued = enqueue_result?;

        logging::log_info(&format!(
            "[{}] Pipeline finished: {} heights enqueued, {} tx batches ({} txs), {} event batches, {} event batches failed",
            chain_id,
            enqueued,
            writer_summary.tx_batches,
            writer_summary.txs,
            writer_summary.event_batches,
            writer_summary.failed_event_batches
        ));

        Ok(PipelineSummary {
            enqueued,
            writer: writer_summary,
        })
    }

    /// Failed-block reattempt first, then the primary strategy
    async fn enqueue(&self, sender: &mpsc::Sender<EnqueueRequest>) -> Result<u64, EnqueueError> {
        let indexer = &self.config.indexer;
        if indexer.wait_for_chain {
            wait_for_chain(&self.client, Duration::from_secs(indexer.wait_for_chain_delay)).await?;
        }

        let mut enqueued = 0;
        let mut in_flight = Vec::new();
        if indexer.reattempt_failed_blocks {
            let reattempt = FailedBlockEnqueuer::new(
                EnqueueSettings::from_config(&self.config),
                self.store.clone(),
            );
            enqueued += self.run_enqueuer(&reattempt, sender).await?;
            in_flight = reattempt.sent_requests().await;
        }

        let primary = select_strategy(
            &self.config,
            self.client.clone(),
            self.store.clone(),
            in_flight,
        );
        enqueued += self.run_enqueuer(primary.as_ref(), sender).await?;
        Ok(enqueued)
    }

    async fn run_enqueuer(
        &self,
        enqueuer: &dyn BlockEnqueuer,
        sender: &mpsc::Sender<EnqueueRequest>,
    ) -> Result<u64, EnqueueError> {
        logging::log_info(&format!(
            "[{}] Running {} enqueuer",
            self.config.chain.chain_id,
            enqueuer.name()
        ));
        let sent = enqueuer.enqueue(sender).await?;
        logging::log_info(&format!(
            "[{}] {} enqueuer sent {} heights",
            self.config.chain.chain_id,
            enqueuer.name(),
            sent
        ));
        Ok(sent)
    }
}
