use primitives::{
    Address, PartitionSet, SignedMessage, SubmitWindowedPoStParams, TipsetKey,
    METHOD_SUBMIT_WINDOWED_POST,
};

use crate::chain::{ChainQueryError, ChainView, PartitionStatus};

/// Point-in-time view of one proving deadline: its partitions and the
/// partitions already proven at the queried tipset.
#[derive(Clone, Debug)]
pub struct DeadlineSnapshot {
    partitions: Vec<PartitionStatus>,
    post_submissions: PartitionSet,
}

impl DeadlineSnapshot {
    pub fn new(partitions: Vec<PartitionStatus>, post_submissions: PartitionSet) -> Self {
        Self {
            partitions,
            post_submissions,
        }
    }

    /// Reads deadline `deadline_index` of `miner` at `tipset`.
    ///
    /// The snapshot goes stale the moment it is taken; callers re-load when
    /// they need a fresh view.
    #[tracing::instrument(skip(chain), fields(%miner))]
    pub async fn load<C>(
        chain: &C,
        miner: Address,
        deadline_index: u64,
        tipset: &TipsetKey,
    ) -> Result<Self, ChainQueryError>
    where
        C: ChainView + ?Sized,
    {
        let deadline = chain
            .miner_deadlines(miner, tipset)
            .await?
            .into_iter()
            .nth(deadline_index as usize)
            .ok_or(ChainQueryError::DeadlineOutOfRange {
                index: deadline_index,
            })?;
        let partitions = chain.miner_partitions(miner, deadline_index, tipset).await?;

        Ok(Self {
            partitions,
            post_submissions: deadline.post_submissions,
        })
    }

    pub fn partitions(&self) -> &[PartitionStatus] {
        &self.partitions
    }

    pub fn post_submissions(&self) -> &PartitionSet {
        &self.post_submissions
    }
}

/// Folds observed windowed-PoSt submissions into a deadline snapshot and
/// answers whether every partition of the deadline is covered.
///
/// Completion is derived from message content alone; at the moment the
/// tracker is consulted the relevant submission may exist only in the pool,
/// not yet in any block.
pub struct PartitionTracker {
    miner: Address,
    expected: usize,
    proven: PartitionSet,
}

impl PartitionTracker {
    pub fn new(miner: Address, snapshot: DeadlineSnapshot) -> Self {
        Self {
            miner,
            expected: snapshot.partitions.len(),
            proven: snapshot.post_submissions,
        }
    }

    /// True once every partition has a recorded proof submission.
    pub fn is_complete(&self) -> bool {
        self.proven.count() as usize == self.expected
    }

    /// Partitions the deadline holds.
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Partitions proven so far.
    pub fn proven(&self) -> u32 {
        self.proven.count()
    }

    /// Folds `message` in if it is a windowed-PoSt submission for the
    /// tracked miner; anything else is ignored. Returns the new
    /// [`PartitionTracker::is_complete`].
    ///
    /// A matching message whose parameters fail to decode is not a proof
    /// submission; it is skipped, never an error.
    pub fn observe(&mut self, message: &SignedMessage) -> bool {
        self.record_if_post(message);
        self.is_complete()
    }

    /// Folds a batch of pending messages, stopping once complete.
    pub fn drain_pending<I>(&mut self, messages: I) -> bool
    where
        I: IntoIterator<Item = SignedMessage>,
    {
        for message in messages {
            if self.observe(&message) {
                return true;
            }
        }
        self.is_complete()
    }

    fn record_if_post(&mut self, message: &SignedMessage) {
        let message = &message.message;
        if message.to != self.miner || message.method != METHOD_SUBMIT_WINDOWED_POST {
            return;
        }

        let params = match SubmitWindowedPoStParams::from_cbor(&message.params) {
            Ok(params) => params,
            Err(err) => {
                tracing::debug!(
                    %err,
                    from = %message.from,
                    "ignoring windowed-PoSt message with undecodable parameters"
                );
                return;
            }
        };

        for partition in &params.partitions {
            if let Err(err) = self.proven.insert(partition.index) {
                tracing::warn!(
                    %err,
                    deadline = params.deadline,
                    "windowed-PoSt message proves a partition its deadline cannot hold"
                );
            }
        }
    }
}
