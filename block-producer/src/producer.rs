use async_trait::async_trait;
use primitives::ChainEpoch;

/// Failure of a single production attempt.
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    /// The attempt was interrupted by shutdown. Ends the production loop.
    #[error("production attempt cancelled")]
    Cancelled,

    /// Any other failure. The loop records it and keeps ticking; transient
    /// conditions (an unavailable sealed sector, a lagging state store) must
    /// not kill the scheduler.
    #[error("production attempt failed: {0}")]
    Failed(String),
}

/// Result of a single production attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProductionOutcome {
    /// A block was produced and submitted at `epoch`.
    Produced { epoch: ChainEpoch },
    /// The round ran to completion but this miner was not selected.
    NotSelected,
}

/// Single-round block producer.
///
/// Implementations run the election and assembly for exactly one round per
/// call; the scheduling around it lives in [`crate::BlockProducer`].
#[async_trait]
pub trait EpochProducer: Send + Sync {
    /// Performs one production attempt for the current epoch, first
    /// injecting `inject_nulls` null rounds.
    async fn produce(&self, inject_nulls: u64) -> Result<ProductionOutcome, ProducerError>;
}
