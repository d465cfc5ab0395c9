//! In-memory stand-ins for the chain, the message pool and the per-round
//! producer, driving the scheduler without a node.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use block_producer::{
    ChainQueryError, ChainView, DeadlineStatus, EpochProducer, MessagePool, PartitionStatus,
    PoolEvent, PoolEventKind, PoolEvents, ProducerError, ProductionOutcome,
};
use futures::StreamExt;
use primitives::{
    Address, ChainEpoch, DeadlineInfo, Message, PartitionNumber, PartitionSet, PoStPartition,
    SignedMessage, SubmitWindowedPoStParams, Tipset, TipsetKey, METHOD_SUBMIT_WINDOWED_POST,
};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Polls `cond` until it holds or `wait` elapses.
pub async fn eventually<F>(wait: Duration, mut cond: F) -> bool
where
    F: FnMut() -> bool,
{
    let started = tokio::time::Instant::now();
    while started.elapsed() < wait {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

/// A windowed-PoSt submission for `partitions`, addressed to `miner`.
pub fn post_message(miner: Address, partitions: &[PartitionNumber]) -> SignedMessage {
    let params = SubmitWindowedPoStParams {
        deadline: 0,
        partitions: partitions
            .iter()
            .map(|&index| PoStPartition {
                index,
                skipped: vec![],
            })
            .collect(),
        chain_commit_epoch: 0,
        proof: vec![0xaa, 0xbb],
    };
    SignedMessage {
        message: Message {
            to: miner,
            from: Address::new(101),
            nonce: 0,
            method: METHOD_SUBMIT_WINDOWED_POST,
            params: params.to_cbor().expect("parameters encode"),
        },
        signature: vec![0x01],
    }
}

struct ChainInner {
    head: Mutex<Tipset>,
    partitions: usize,
    posted: Mutex<PartitionSet>,
    head_failures: AtomicUsize,
}

/// Chain view over a single miner with one proving deadline (index 0) whose
/// proving period starts at epoch 0.
#[derive(Clone)]
pub struct StubChain(Arc<ChainInner>);

impl StubChain {
    pub fn new(head_height: ChainEpoch, partitions: usize) -> Self {
        Self(Arc::new(ChainInner {
            head: Mutex::new(Tipset::new(TipsetKey::default(), head_height)),
            partitions,
            posted: Mutex::new(PartitionSet::new()),
            head_failures: AtomicUsize::new(0),
        }))
    }

    pub fn set_head_height(&self, height: ChainEpoch) {
        *self.0.head.lock().unwrap() = Tipset::new(TipsetKey::default(), height);
    }

    /// Marks a partition as already proven in chain state.
    pub fn mark_posted(&self, partition: PartitionNumber) {
        self.0.posted.lock().unwrap().insert(partition).unwrap();
    }

    /// Makes the next `n` head queries fail.
    pub fn fail_next_heads(&self, n: usize) {
        self.0.head_failures.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainView for StubChain {
    async fn head(&self) -> Result<Tipset, ChainQueryError> {
        let remaining = self.0.head_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.0.head_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ChainQueryError::Unavailable("stub chain offline".into()));
        }
        Ok(self.0.head.lock().unwrap().clone())
    }

    async fn miner_deadlines(
        &self,
        _miner: Address,
        _tipset: &TipsetKey,
    ) -> Result<Vec<DeadlineStatus>, ChainQueryError> {
        Ok(vec![DeadlineStatus {
            post_submissions: self.0.posted.lock().unwrap().clone(),
            disputable_proof_count: 0,
        }])
    }

    async fn miner_partitions(
        &self,
        _miner: Address,
        _deadline_index: u64,
        _tipset: &TipsetKey,
    ) -> Result<Vec<PartitionStatus>, ChainQueryError> {
        Ok(vec![
            PartitionStatus {
                all_sectors: 2,
                faulty_sectors: 0,
            };
            self.0.partitions
        ])
    }

    async fn proving_deadline(
        &self,
        _miner: Address,
        _tipset: &TipsetKey,
    ) -> Result<DeadlineInfo, ChainQueryError> {
        let height = self.0.head.lock().unwrap().height();
        Ok(DeadlineInfo::new(height, 0, 0))
    }
}

struct PoolInner {
    pending: Mutex<Vec<SignedMessage>>,
    events: broadcast::Sender<PoolEvent>,
}

/// Message pool with a scripted pending set and a broadcast event feed.
#[derive(Clone)]
pub struct StubPool(Arc<PoolInner>);

impl StubPool {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self(Arc::new(PoolInner {
            pending: Mutex::new(Vec::new()),
            events,
        }))
    }

    pub fn push_pending(&self, message: SignedMessage) {
        self.0.pending.lock().unwrap().push(message);
    }

    pub fn publish_added(&self, message: SignedMessage) {
        let _ = self.0.events.send(PoolEvent {
            kind: PoolEventKind::Added,
            message,
        });
    }

    pub fn publish_removed(&self, message: SignedMessage) {
        let _ = self.0.events.send(PoolEvent {
            kind: PoolEventKind::Removed,
            message,
        });
    }

    /// Number of live feed subscriptions.
    pub fn subscribers(&self) -> usize {
        self.0.events.receiver_count()
    }
}

#[async_trait]
impl MessagePool for StubPool {
    async fn pending(&self, _tipset: &TipsetKey) -> Result<Vec<SignedMessage>, ChainQueryError> {
        Ok(self.0.pending.lock().unwrap().clone())
    }

    async fn subscribe(&self) -> Result<PoolEvents, ChainQueryError> {
        let stream = BroadcastStream::new(self.0.events.subscribe())
            .filter_map(|event| async move { event.ok() });
        Ok(stream.boxed())
    }
}

struct CountingInner {
    calls: AtomicU64,
    nulls_seen: Mutex<Vec<u64>>,
}

/// Producer that always succeeds, recording every call and the null rounds
/// requested with it.
#[derive(Clone)]
pub struct CountingProducer(Arc<CountingInner>);

impl CountingProducer {
    pub fn new() -> Self {
        Self(Arc::new(CountingInner {
            calls: AtomicU64::new(0),
            nulls_seen: Mutex::new(Vec::new()),
        }))
    }

    pub fn calls(&self) -> u64 {
        self.0.calls.load(Ordering::SeqCst)
    }

    pub fn nulls_seen(&self) -> Vec<u64> {
        self.0.nulls_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl EpochProducer for CountingProducer {
    async fn produce(&self, inject_nulls: u64) -> Result<ProductionOutcome, ProducerError> {
        self.0.nulls_seen.lock().unwrap().push(inject_nulls);
        let call = self.0.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ProductionOutcome::Produced {
            epoch: call as ChainEpoch,
        })
    }
}

struct ScriptedInner {
    script: Mutex<VecDeque<Result<ProductionOutcome, ProducerError>>>,
    calls: AtomicU64,
}

/// Producer that replays a scripted sequence of outcomes, then reports
/// "not selected" forever.
#[derive(Clone)]
pub struct ScriptedProducer(Arc<ScriptedInner>);

impl ScriptedProducer {
    pub fn new(script: Vec<Result<ProductionOutcome, ProducerError>>) -> Self {
        Self(Arc::new(ScriptedInner {
            script: Mutex::new(script.into()),
            calls: AtomicU64::new(0),
        }))
    }

    pub fn calls(&self) -> u64 {
        self.0.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EpochProducer for ScriptedProducer {
    async fn produce(&self, _inject_nulls: u64) -> Result<ProductionOutcome, ProducerError> {
        self.0.calls.fetch_add(1, Ordering::SeqCst);
        self.0
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(ProductionOutcome::NotSelected))
    }
}
