use async_trait::async_trait;
use futures::stream::BoxStream;
use primitives::{SignedMessage, TipsetKey};

use crate::chain::ChainQueryError;

/// Kind of change a [`PoolEvent`] reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolEventKind {
    Added,
    Removed,
}

/// One message-pool change.
#[derive(Clone, Debug)]
pub struct PoolEvent {
    pub kind: PoolEventKind,
    pub message: SignedMessage,
}

/// Live feed of pool changes. Infinite; each subscriber owns its own feed.
pub type PoolEvents = BoxStream<'static, PoolEvent>;

/// Read-only view of the node's message pool.
#[async_trait]
pub trait MessagePool: Send + Sync {
    /// Messages currently pending inclusion on top of `tipset`.
    async fn pending(&self, tipset: &TipsetKey) -> Result<Vec<SignedMessage>, ChainQueryError>;

    /// Subscribes to pool changes from this point on.
    ///
    /// Consumers waiting on the feed must remain cancellable; the engine
    /// always polls it under a cancellation token.
    async fn subscribe(&self) -> Result<PoolEvents, ChainQueryError>;
}
