//! Chain-level primitives shared by the block-production engine and its
//! consumers: actor addresses, tipsets, mempool messages, window-PoSt
//! deadline arithmetic and partition accounting.

mod address;
mod deadline;
mod message;
mod partition;
mod tipset;

pub use address::{Address, AddressParseError};
pub use deadline::{
    DeadlineInfo, FAULT_DECLARATION_CUTOFF, WPOST_CHALLENGE_LOOKBACK, WPOST_CHALLENGE_WINDOW,
    WPOST_PERIOD_DEADLINES, WPOST_PROVING_PERIOD,
};
pub use message::{
    Message, ParamsCodecError, PoStPartition, SignedMessage, SubmitWindowedPoStParams,
    METHOD_SUBMIT_WINDOWED_POST,
};
pub use partition::{
    PartitionNumber, PartitionSet, PartitionSetError, MAX_PARTITIONS_PER_DEADLINE,
};
pub use tipset::{Tipset, TipsetKey};

/// Epoch number of a point in the chain.
///
/// Signed because network configuration may place upgrade heights before
/// genesis.
pub type ChainEpoch = i64;

/// Method number of an actor invocation.
pub type MethodNum = u64;

/// Sector number within a miner's partition.
pub type SectorNumber = u64;
