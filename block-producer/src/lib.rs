//! Deadline-synchronized block production.
//!
//! The engine drives a miner's block production on a fixed cadence while
//! enforcing the window-PoSt liveness rule: in [`ProductionMode::MustPost`]
//! a proving deadline is never closed before a proof submission covering
//! every one of its partitions has been observed in the message pool.
//!
//! Chain state, the message pool and the per-round producer are consumed
//! through the [`ChainView`], [`MessagePool`] and [`EpochProducer`] traits;
//! the engine never mutates chain state itself.

mod chain;
mod pool;
mod producer;
mod scheduler;
mod tracker;

pub use chain::{ChainQueryError, ChainView, DeadlineStatus, PartitionStatus};
pub use pool::{MessagePool, PoolEvent, PoolEventKind, PoolEvents};
pub use producer::{EpochProducer, ProducerError, ProductionOutcome};
pub use scheduler::{BlockProducer, MineUntilError, ProductionMode, SchedulerError};
pub use tracker::{DeadlineSnapshot, PartitionTracker};
