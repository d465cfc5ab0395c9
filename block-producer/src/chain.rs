use async_trait::async_trait;
use primitives::{Address, DeadlineInfo, PartitionSet, Tipset, TipsetKey};

/// Failure to resolve chain state.
///
/// These are environmental, not logical: the scheduler logs them and retries
/// on its next tick.
#[derive(Debug, thiserror::Error)]
pub enum ChainQueryError {
    #[error("miner {0} is not known at the queried tipset")]
    MinerNotFound(Address),

    #[error("deadline {index} does not exist in the proving period")]
    DeadlineOutOfRange { index: u64 },

    #[error("chain state unavailable: {0}")]
    Unavailable(String),
}

/// One proving deadline of a miner, as recorded in chain state.
#[derive(Clone, Debug, Default)]
pub struct DeadlineStatus {
    /// Partitions that have had a valid windowed PoSt recorded during the
    /// current challenge window.
    pub post_submissions: PartitionSet,
    /// Number of optimistically accepted proofs still open to dispute.
    pub disputable_proof_count: u64,
}

/// One partition of a deadline, as recorded in chain state.
#[derive(Clone, Copy, Debug, Default)]
pub struct PartitionStatus {
    /// Sectors assigned to the partition, including unproven and faulty ones.
    pub all_sectors: u64,
    /// Subset of `all_sectors` currently faulty.
    pub faulty_sectors: u64,
}

/// Read-only view of the chain state the engine needs.
///
/// Every call is a point-in-time read at the given tipset; nothing is cached
/// here, so staleness is managed by re-querying.
#[async_trait]
pub trait ChainView: Send + Sync {
    /// The node's current head tipset.
    async fn head(&self) -> Result<Tipset, ChainQueryError>;

    /// All deadlines of `miner`'s proving period, ordered by deadline index.
    async fn miner_deadlines(
        &self,
        miner: Address,
        tipset: &TipsetKey,
    ) -> Result<Vec<DeadlineStatus>, ChainQueryError>;

    /// Partitions of one deadline, ordered by partition number.
    async fn miner_partitions(
        &self,
        miner: Address,
        deadline_index: u64,
        tipset: &TipsetKey,
    ) -> Result<Vec<PartitionStatus>, ChainQueryError>;

    /// The deadline `miner` is currently proving.
    async fn proving_deadline(
        &self,
        miner: Address,
        tipset: &TipsetKey,
    ) -> Result<DeadlineInfo, ChainQueryError>;
}
