use crate::ChainEpoch;

/// The number of non-overlapping window-PoSt deadlines in a proving period.
pub const WPOST_PERIOD_DEADLINES: u64 = 48;

/// The period over which all of a miner's active sectors are challenged, in
/// epochs.
pub const WPOST_PROVING_PERIOD: ChainEpoch = 2880;

/// The duration of a deadline's challenge window, the period before its close
/// during which a PoSt for it is accepted.
pub const WPOST_CHALLENGE_WINDOW: ChainEpoch = 60;

/// Lookback from a deadline's open to the epoch its challenge randomness is
/// sampled at.
pub const WPOST_CHALLENGE_LOOKBACK: ChainEpoch = 20;

/// Minimum period between a fault declaration and the deadline it targets.
pub const FAULT_DECLARATION_CUTOFF: ChainEpoch = WPOST_CHALLENGE_LOOKBACK + 50;

/// The state of one proving deadline, computed at a given epoch.
///
/// All windows are half-open: `open` is the first epoch a proof is accepted
/// at, `close` the first epoch it no longer is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeadlineInfo {
    /// Epoch at which this info was computed.
    pub current_epoch: ChainEpoch,
    /// First epoch of the proving period containing this deadline.
    pub period_start: ChainEpoch,
    /// Deadline index within its proving period.
    pub index: u64,
    /// First epoch from which a proof may be submitted.
    pub open: ChainEpoch,
    /// First epoch from which a proof may *no longer* be submitted.
    pub close: ChainEpoch,
    /// Epoch at which the challenge randomness is sampled.
    pub challenge: ChainEpoch,
    /// First epoch at which a fault declaration for this deadline is no
    /// longer accepted.
    pub fault_cutoff: ChainEpoch,
}

impl DeadlineInfo {
    /// Computes the window of deadline `index` in the proving period starting
    /// at `period_start`, as seen from `current_epoch`.
    ///
    /// An index at or past [`WPOST_PERIOD_DEADLINES`] does not name a real
    /// deadline; its window collapses onto the end of the proving period.
    pub fn new(current_epoch: ChainEpoch, period_start: ChainEpoch, index: u64) -> Self {
        if index < WPOST_PERIOD_DEADLINES {
            let open = period_start + index as ChainEpoch * WPOST_CHALLENGE_WINDOW;
            Self {
                current_epoch,
                period_start,
                index,
                open,
                close: open + WPOST_CHALLENGE_WINDOW,
                challenge: open - WPOST_CHALLENGE_LOOKBACK,
                fault_cutoff: open - FAULT_DECLARATION_CUTOFF,
            }
        } else {
            let after_last = period_start + WPOST_PROVING_PERIOD;
            Self {
                current_epoch,
                period_start,
                index,
                open: after_last,
                close: after_last,
                challenge: after_last - WPOST_CHALLENGE_LOOKBACK,
                fault_cutoff: 0,
            }
        }
    }

    /// Last epoch at which a proof for this deadline is still accepted.
    pub fn last(&self) -> ChainEpoch {
        self.close - 1
    }

    /// Whether the deadline is open at `current_epoch`.
    pub fn is_open(&self) -> bool {
        self.current_epoch >= self.open && self.current_epoch < self.close
    }

    /// Whether the deadline has already closed at `current_epoch`.
    pub fn has_elapsed(&self) -> bool {
        self.current_epoch >= self.close
    }

    /// Returns this deadline advanced by whole proving periods until it no
    /// longer lies in the past.
    pub fn next_not_elapsed(self) -> Self {
        if !self.has_elapsed() {
            return self;
        }

        let gap = self.current_epoch - self.close;
        let delta_periods = 1 + gap / WPOST_PROVING_PERIOD;
        Self::new(
            self.current_epoch,
            self.period_start + WPOST_PROVING_PERIOD * delta_periods,
            self.index,
        )
    }
}
