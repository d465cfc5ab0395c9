use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use futures::StreamExt;
use primitives::{Address, ChainEpoch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    chain::{ChainQueryError, ChainView},
    pool::{MessagePool, PoolEventKind},
    producer::{EpochProducer, ProducerError, ProductionOutcome},
    tracker::{DeadlineSnapshot, PartitionTracker},
};

/// Upper bound on unselected rounds in [`BlockProducer::mine_until`].
const MAX_PRODUCTION_ATTEMPTS: usize = 1000;

/// Bounds on waiting for a produced epoch to become the observed head.
const SYNC_POLL_LIMIT: usize = 200;
const SYNC_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How the scheduler decides whether a tick may produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProductionMode {
    /// Produce on every tick.
    Continuous,
    /// Refuse to close a proving deadline until a windowed PoSt covering
    /// every one of its partitions has been observed in the message pool.
    MustPost,
}

/// Terminal scheduler conditions.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("the production loop is already running")]
    AlreadyRunning,

    #[error("the scheduler has been stopped and cannot be restarted")]
    AlreadyStopped,

    /// Null-round injection and proof-gated production are mutually
    /// exclusive.
    #[error("null-round injection is not supported while proof-gated production is active")]
    NullInjectionWhileGated,

    #[error("the production loop panicked: {0}")]
    Panicked(String),
}

/// Failure of the one-shot [`BlockProducer::mine_until`] contract.
#[derive(Debug, thiserror::Error)]
pub enum MineUntilError {
    #[error("no block produced after {attempts} production attempts")]
    RetryLimitExceeded { attempts: usize },

    #[error("produced epoch {epoch} never became the observed chain head")]
    HeadNeverSynced { epoch: ChainEpoch },

    #[error(transparent)]
    Producer(#[from] ProducerError),

    #[error(transparent)]
    ChainQuery(#[from] ChainQueryError),
}

enum Phase {
    Idle,
    Running {
        token: CancellationToken,
        handle: JoinHandle<Result<(), SchedulerError>>,
    },
    Stopping,
    Stopped,
}

struct Shared<C, P, E> {
    chain: C,
    pool: P,
    producer: E,
    miner: Address,
    mode: ProductionMode,
    next_nulls: AtomicU64,
    production_errors: Mutex<Vec<ProducerError>>,
    on_produced: Option<Box<dyn Fn(ChainEpoch) + Send + Sync>>,
}

/// Timer-driven block-production scheduler.
///
/// While running it owns exactly one background task that attempts
/// production once per cadence interval. In [`ProductionMode::MustPost`]
/// a tick that would close the current proving deadline first blocks until
/// windowed-PoSt coverage for it is visible in the message pool.
///
/// [`BlockProducer::request_null_rounds`] and [`BlockProducer::stop`] are
/// safe to call from any task concurrently with the loop.
pub struct BlockProducer<C, P, E> {
    shared: Arc<Shared<C, P, E>>,
    phase: Mutex<Phase>,
}

impl<C, P, E> BlockProducer<C, P, E>
where
    C: ChainView + 'static,
    P: MessagePool + 'static,
    E: EpochProducer + 'static,
{
    pub fn new(chain: C, pool: P, producer: E, miner: Address, mode: ProductionMode) -> Self {
        Self {
            shared: Arc::new(Shared {
                chain,
                pool,
                producer,
                miner,
                mode,
                next_nulls: AtomicU64::new(0),
                production_errors: Mutex::new(Vec::new()),
                on_produced: None,
            }),
            phase: Mutex::new(Phase::Idle),
        }
    }

    /// Registers a callback invoked with the epoch of every block the loop
    /// produces. Must be called before [`BlockProducer::start`].
    pub fn with_on_produced(mut self, callback: impl Fn(ChainEpoch) + Send + Sync + 'static) -> Self {
        let shared = Arc::get_mut(&mut self.shared)
            .expect("callbacks are registered before the loop is spawned");
        shared.on_produced = Some(Box::new(callback));
        self
    }

    pub fn miner(&self) -> Address {
        self.shared.miner
    }

    /// Spawns the production loop, ticking once per `blocktime`.
    ///
    /// Must be called within a tokio runtime. Starting a running or stopped
    /// scheduler is an error.
    pub fn start(&self, blocktime: Duration) -> Result<(), SchedulerError> {
        let mut phase = self.phase.lock().expect("scheduler phase lock poisoned");
        match *phase {
            Phase::Running { .. } => Err(SchedulerError::AlreadyRunning),
            Phase::Stopping | Phase::Stopped => Err(SchedulerError::AlreadyStopped),
            Phase::Idle => {
                let token = CancellationToken::new();
                let handle = tokio::spawn(production_loop(
                    self.shared.clone(),
                    blocktime,
                    token.clone(),
                ));
                *phase = Phase::Running { token, handle };
                Ok(())
            }
        }
    }

    /// Requests `rounds` null rounds to be injected ahead of an upcoming
    /// production attempt. Requests accumulate until a tick consumes them in
    /// a single read-and-reset. No effect once stopped.
    pub fn request_null_rounds(&self, rounds: u64) {
        let phase = self.phase.lock().expect("scheduler phase lock poisoned");
        if matches!(*phase, Phase::Stopped) {
            return;
        }
        self.shared.next_nulls.fetch_add(rounds, Ordering::SeqCst);
    }

    /// Signals the loop to stop and waits until it has exited, returning its
    /// terminal result. The in-flight tick is drained, never interrupted
    /// mid-production; a tick blocked waiting for proof coverage observes
    /// the cancellation and unwinds. Calling `stop` again returns `Ok`.
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        let running = {
            let mut phase = self.phase.lock().expect("scheduler phase lock poisoned");
            match std::mem::replace(&mut *phase, Phase::Stopping) {
                Phase::Running { token, handle } => Some((token, handle)),
                previous => {
                    *phase = previous;
                    None
                }
            }
        };

        let Some((token, handle)) = running else {
            let mut phase = self.phase.lock().expect("scheduler phase lock poisoned");
            if matches!(*phase, Phase::Idle) {
                *phase = Phase::Stopped;
            }
            return Ok(());
        };

        tracing::debug!(miner = %self.shared.miner, "shutting down block production");
        token.cancel();
        let result = match handle.await {
            Ok(result) => result,
            Err(err) => Err(SchedulerError::Panicked(err.to_string())),
        };

        *self.phase.lock().expect("scheduler phase lock poisoned") = Phase::Stopped;
        result
    }

    /// Drains the production errors the loop has recorded so far.
    ///
    /// The loop absorbs non-cancellation producer failures to keep ticking;
    /// they are parked here for the operator or test harness to inspect.
    pub fn take_production_errors(&self) -> Vec<ProducerError> {
        std::mem::take(
            &mut *self
                .shared
                .production_errors
                .lock()
                .expect("production error sink poisoned"),
        )
    }

    /// Attempts single production rounds until one is selected to produce,
    /// then waits until `full_node` reports the produced epoch as its head
    /// and invokes `on_epoch` with it.
    ///
    /// Exhausting [`MAX_PRODUCTION_ATTEMPTS`] rounds, or the head never
    /// catching up, is fatal rather than retried.
    #[tracing::instrument(skip_all, fields(miner = %self.shared.miner))]
    pub async fn mine_until<V, F>(
        &self,
        full_node: &V,
        on_epoch: F,
    ) -> Result<ChainEpoch, MineUntilError>
    where
        V: ChainView,
        F: FnOnce(ChainEpoch),
    {
        for attempt in 0..MAX_PRODUCTION_ATTEMPTS {
            match self.shared.producer.produce(0).await? {
                ProductionOutcome::Produced { epoch } => {
                    wait_for_head(full_node, epoch).await?;
                    on_epoch(epoch);
                    return Ok(epoch);
                }
                ProductionOutcome::NotSelected => {
                    tracing::debug!(attempt, "round finished without being selected, trying again");
                }
            }
        }

        Err(MineUntilError::RetryLimitExceeded {
            attempts: MAX_PRODUCTION_ATTEMPTS,
        })
    }
}

/// Polls `full_node` until its head reaches `epoch`.
async fn wait_for_head<V>(full_node: &V, epoch: ChainEpoch) -> Result<(), MineUntilError>
where
    V: ChainView,
{
    for _ in 0..SYNC_POLL_LIMIT {
        if full_node.head().await?.height() >= epoch {
            return Ok(());
        }
        tokio::time::sleep(SYNC_POLL_INTERVAL).await;
    }
    Err(MineUntilError::HeadNeverSynced { epoch })
}

#[tracing::instrument(skip_all, fields(miner = %shared.miner, mode = ?shared.mode))]
async fn production_loop<C, P, E>(
    shared: Arc<Shared<C, P, E>>,
    blocktime: Duration,
    token: CancellationToken,
) -> Result<(), SchedulerError>
where
    C: ChainView,
    P: MessagePool,
    E: EpochProducer,
{
    loop {
        tokio::select! {
            () = token.cancelled() => return Ok(()),
            () = tokio::time::sleep(blocktime) => {}
        }

        // Single read-and-reset; a request is consumed by exactly one tick.
        let nulls = shared.next_nulls.swap(0, Ordering::SeqCst);

        if shared.mode == ProductionMode::MustPost {
            if nulls > 0 {
                tracing::error!(
                    nulls,
                    "null rounds were requested while proof-gated production is active"
                );
                return Err(SchedulerError::NullInjectionWhileGated);
            }

            match wait_for_deadline_coverage(&shared, &token).await {
                Ok(Gate::Covered) => {}
                Ok(Gate::Cancelled) => return Ok(()),
                Err(err) => {
                    tracing::warn!(%err, "skipping production tick, chain state unavailable");
                    continue;
                }
            }
        }

        match shared.producer.produce(nulls).await {
            Ok(ProductionOutcome::Produced { epoch }) => {
                tracing::debug!(epoch, "produced block");
                if let Some(on_produced) = &shared.on_produced {
                    on_produced(epoch);
                }
            }
            Ok(ProductionOutcome::NotSelected) => {
                tracing::trace!("not selected to produce this round");
            }
            Err(ProducerError::Cancelled) => return Ok(()),
            Err(err) if token.is_cancelled() => {
                tracing::debug!(%err, "production failed during shutdown");
                return Ok(());
            }
            Err(err) => {
                tracing::error!(%err, "production attempt failed");
                shared
                    .production_errors
                    .lock()
                    .expect("production error sink poisoned")
                    .push(err);
            }
        }
    }
}

enum Gate {
    Covered,
    Cancelled,
}

/// Holds the tick until the deadline the next epoch would close is fully
/// covered by windowed-PoSt submissions, observed in the pending pool or on
/// the live pool feed. Ticks that do not close a deadline pass straight
/// through.
async fn wait_for_deadline_coverage<C, P, E>(
    shared: &Shared<C, P, E>,
    token: &CancellationToken,
) -> Result<Gate, ChainQueryError>
where
    C: ChainView,
    P: MessagePool,
    E: EpochProducer,
{
    let head = shared.chain.head().await?;
    let deadline = shared
        .chain
        .proving_deadline(shared.miner, head.key())
        .await?;
    if head.height() + 1 != deadline.last() {
        return Ok(Gate::Covered);
    }

    let snapshot =
        DeadlineSnapshot::load(&shared.chain, shared.miner, deadline.index, head.key()).await?;
    let mut tracker = PartitionTracker::new(shared.miner, snapshot);
    if tracker.is_complete() {
        return Ok(Gate::Covered);
    }

    // Subscribe before reading the pending set so no submission can slip
    // between the two reads.
    let mut events = shared.pool.subscribe().await?;

    tracing::info!(
        deadline = deadline.index,
        expected = tracker.expected(),
        proven = tracker.proven(),
        "closing epoch reached without full windowed-PoSt coverage"
    );

    if tracker.drain_pending(shared.pool.pending(head.key()).await?) {
        return Ok(Gate::Covered);
    }

    tracing::info!(
        deadline = deadline.index,
        "windowed PoSt missing from the pool, production suspended until it arrives"
    );

    loop {
        tokio::select! {
            () = token.cancelled() => return Ok(Gate::Cancelled),
            event = events.next() => match event {
                Some(event) if event.kind == PoolEventKind::Added => {
                    if tracker.observe(&event.message) {
                        tracing::info!(deadline = deadline.index, "windowed-PoSt coverage complete");
                        return Ok(Gate::Covered);
                    }
                    tracing::debug!(
                        expected = tracker.expected(),
                        proven = tracker.proven(),
                        "partial windowed-PoSt coverage"
                    );
                }
                Some(_) => {}
                None => {
                    return Err(ChainQueryError::Unavailable(
                        "message pool event feed ended".into(),
                    ))
                }
            },
        }
    }
}
