//! Startup lifecycle typestate
//!
//! ```text
//! [Cold] -> [BusReady] -> [CodecConfigured] -> [BusReleased] -> [PlatformReady]
//!        -> [PolicyInstalled] -> [BoardHandedOff] -> [NetworkJoining] -> [Operational]
//! ```
//!
//! Each state is a zero-sized marker and only the next transition is
//! provided, so skipping or reordering a stage does not compile. Every
//! transition also appends to a shared [`StartupLog`], which the status
//! command and tests read at runtime.
//!
//! Transitions happen whether or not the stage's work succeeded; the
//! outcome of codec bring-up is recorded separately in the log.

use core::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use heapless::Vec;

/// Runtime tag for each lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    /// Power-on, nothing initialised
    Cold,
    /// Control bus installed
    BusReady,
    /// Codec bring-up sequence attempted
    CodecConfigured,
    /// Control bus released
    BusReleased,
    /// Media OS adapter installed
    PlatformReady,
    /// Thread policy registered
    PolicyInstalled,
    /// Board handed to the codec driver
    BoardHandedOff,
    /// Network join in progress, console installed
    NetworkJoining,
    /// Supervisory loop running
    Operational,
}

impl LifecycleState {
    /// Number of states
    pub const COUNT: usize = 9;

    /// Short name used in logs and the status line
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cold => "cold",
            Self::BusReady => "bus-ready",
            Self::CodecConfigured => "codec-configured",
            Self::BusReleased => "bus-released",
            Self::PlatformReady => "platform-ready",
            Self::PolicyInstalled => "policy-installed",
            Self::BoardHandedOff => "board-handed-off",
            Self::NetworkJoining => "network-joining",
            Self::Operational => "operational",
        }
    }
}

impl core::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// How codec bring-up went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecOutcome {
    /// Board has no bring-up sequence
    NotRequired,
    /// Bus could not be installed; no writes issued
    BusUnavailable,
    /// Sequence ran
    Ran {
        /// Writes attempted
        attempted: usize,
        /// Failures that count
        failed: usize,
        /// ALC failures that were ignored
        ignored: usize,
    },
}

impl CodecOutcome {
    /// True if the codec is known to be configured, or needed no configuration.
    pub const fn is_ok(&self) -> bool {
        match self {
            Self::NotRequired => true,
            Self::BusUnavailable => false,
            Self::Ran { failed, .. } => *failed == 0,
        }
    }
}

impl core::fmt::Display for CodecOutcome {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotRequired => f.write_str("not required"),
            Self::BusUnavailable => f.write_str("bus unavailable"),
            Self::Ran {
                attempted,
                failed,
                ignored,
            } => write!(f, "{attempted} writes, {failed} failed, {ignored} ignored"),
        }
    }
}

#[derive(Debug, Default)]
struct LogInner {
    visited: Vec<LifecycleState, { LifecycleState::COUNT }>,
    codec: Option<CodecOutcome>,
}

/// Shared record of the states visited so far
#[derive(Debug, Default)]
pub struct StartupLog {
    inner: Mutex<LogInner>,
}

impl StartupLog {
    /// Empty log
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, LogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self, state: LifecycleState) {
        let mut inner = self.lock();
        // Each state is entered once per boot, so the log never overflows.
        let _ = inner.visited.push(state);
    }

    /// Record the codec bring-up outcome.
    pub fn record_codec(&self, outcome: CodecOutcome) {
        self.lock().codec = Some(outcome);
    }

    /// States visited, in order.
    pub fn visited(&self) -> std::vec::Vec<LifecycleState> {
        self.lock().visited.iter().copied().collect()
    }

    /// Most recent state
    pub fn current(&self) -> Option<LifecycleState> {
        self.lock().visited.last().copied()
    }

    /// Codec outcome, once bring-up has been attempted
    pub fn codec(&self) -> Option<CodecOutcome> {
        self.lock().codec
    }
}

/// Marker types, one per state
pub mod state {
    /// Power-on
    #[derive(Debug)]
    pub struct Cold;
    /// Bus installed
    #[derive(Debug)]
    pub struct BusReady;
    /// Bring-up attempted
    #[derive(Debug)]
    pub struct CodecConfigured;
    /// Bus released
    #[derive(Debug)]
    pub struct BusReleased;
    /// Adapter installed
    #[derive(Debug)]
    pub struct PlatformReady;
    /// Policy registered
    #[derive(Debug)]
    pub struct PolicyInstalled;
    /// Board handed off
    #[derive(Debug)]
    pub struct BoardHandedOff;
    /// Joining the network
    #[derive(Debug)]
    pub struct NetworkJoining;
    /// Steady state
    #[derive(Debug)]
    pub struct Operational;
}

use state::{
    BoardHandedOff, BusReady, BusReleased, Cold, CodecConfigured, NetworkJoining, Operational,
    PlatformReady, PolicyInstalled,
};

/// Startup state machine; `S` is the current state.
#[derive(Debug)]
pub struct Lifecycle<S> {
    log: Arc<StartupLog>,
    _state: PhantomData<S>,
}

impl<S> Lifecycle<S> {
    fn advance<T>(self, next: LifecycleState) -> Lifecycle<T> {
        tracing::info!(state = %next, "lifecycle");
        self.log.enter(next);
        Lifecycle {
            log: self.log,
            _state: PhantomData,
        }
    }

    /// The shared log
    pub fn log(&self) -> &Arc<StartupLog> {
        &self.log
    }
}

impl Lifecycle<Cold> {
    /// Start in `Cold`, recording into `log`.
    pub fn new(log: Arc<StartupLog>) -> Self {
        log.enter(LifecycleState::Cold);
        Self {
            log,
            _state: PhantomData,
        }
    }

    /// Bus installed (or installation attempted).
    #[must_use]
    pub fn bus_ready(self) -> Lifecycle<BusReady> {
        self.advance(LifecycleState::BusReady)
    }
}

impl Lifecycle<BusReady> {
    /// Bring-up sequence has run.
    #[must_use]
    pub fn codec_configured(self) -> Lifecycle<CodecConfigured> {
        self.advance(LifecycleState::CodecConfigured)
    }
}

impl Lifecycle<CodecConfigured> {
    /// Bus given back.
    #[must_use]
    pub fn bus_released(self) -> Lifecycle<BusReleased> {
        self.advance(LifecycleState::BusReleased)
    }
}

impl Lifecycle<BusReleased> {
    /// Media OS adapter installed.
    #[must_use]
    pub fn platform_ready(self) -> Lifecycle<PlatformReady> {
        self.advance(LifecycleState::PlatformReady)
    }
}

impl Lifecycle<PlatformReady> {
    /// Thread policy registered with the task factory.
    #[must_use]
    pub fn policy_installed(self) -> Lifecycle<PolicyInstalled> {
        self.advance(LifecycleState::PolicyInstalled)
    }
}

impl Lifecycle<PolicyInstalled> {
    /// Board handed to the codec driver and media system built.
    #[must_use]
    pub fn board_handed_off(self) -> Lifecycle<BoardHandedOff> {
        self.advance(LifecycleState::BoardHandedOff)
    }
}

impl Lifecycle<BoardHandedOff> {
    /// Console installed, network join started.
    #[must_use]
    pub fn network_joining(self) -> Lifecycle<NetworkJoining> {
        self.advance(LifecycleState::NetworkJoining)
    }
}

impl Lifecycle<NetworkJoining> {
    /// Enter the supervisory loop.
    #[must_use]
    pub fn operational(self) -> Lifecycle<Operational> {
        self.advance(LifecycleState::Operational)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn full_walk_records_every_state_in_order() {
        let log = StartupLog::shared();
        let _operational = Lifecycle::new(log.clone())
            .bus_ready()
            .codec_configured()
            .bus_released()
            .platform_ready()
            .policy_installed()
            .board_handed_off()
            .network_joining()
            .operational();

        let visited = log.visited();
        assert_eq!(visited.len(), LifecycleState::COUNT);
        assert!(visited.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(log.current(), Some(LifecycleState::Operational));
    }

    #[test]
    fn codec_outcome_is_recorded_separately() {
        let log = StartupLog::shared();
        assert_eq!(log.codec(), None);
        log.record_codec(CodecOutcome::Ran {
            attempted: 36,
            failed: 1,
            ignored: 0,
        });
        let outcome = log.codec().unwrap();
        assert!(!outcome.is_ok());
        assert_eq!(outcome.to_string(), "36 writes, 1 failed, 0 ignored");
        assert!(CodecOutcome::NotRequired.is_ok());
    }
}
