//! Boot orchestration
//!
//! Walks the [`Lifecycle`] typestate from `Cold` to `Operational`:
//!
//! 1. install the codec control bus and run the board's bring-up sequence
//! 2. release the bus
//! 3. install the media OS adapter
//! 4. build the thread policy table and the task factory
//! 5. hand the board to the codec driver and build the media system
//! 6. join the network, then install the command surface
//! 7. supervise the session forever
//!
//! No stage failure stops startup. Failures are logged, recorded in the
//! [`StartupReport`] and the walk continues; the operator recovers by
//! re-issuing `start` from the console.

use std::sync::Arc;

use embassy_time::Duration;
use platform::codec_bringup::BringUpReport;
use platform::{
    bring_up_report, BringUpError, BusHandle, BusInitError, CodecInitConfig, PolicyError,
    ThreadPolicyTable, TwoWireBus,
};
use tracing::{debug, error, info, warn};

use crate::config::DeviceConfig;
use crate::console::{Console, ConsoleHost};
use crate::lifecycle::state::{BusReleased, Cold, Operational};
use crate::lifecycle::{CodecOutcome, Lifecycle, LifecycleState, StartupLog};
use crate::media::{MediaPlatform, PlatformError};
use crate::network::{NetworkError, NetworkJoin};
use crate::session::{RealtimeSession, SessionController, SessionStatus};
use crate::tasks::TaskFactory;

/// Why a startup stage did not fully succeed
#[derive(Debug, thiserror_no_std::Error)]
pub enum StageError {
    /// Codec control bus could not be installed
    #[error(transparent)]
    Bus(#[from] BusInitError),
    /// One or more counted codec writes failed
    #[error(transparent)]
    BringUp(#[from] BringUpError),
    /// Reference thread policy could not be built
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// Adapter, board handoff or media build-up failed
    #[error(transparent)]
    Platform(#[from] PlatformError),
    /// Network join failed
    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// Everything that went wrong during startup
#[derive(Debug, Default)]
pub struct StartupReport {
    failures: Vec<(LifecycleState, StageError)>,
    bring_up: Option<BringUpReport>,
}

impl StartupReport {
    fn record(&mut self, stage: LifecycleState, err: impl Into<StageError>) {
        let err = err.into();
        warn!(stage = %stage, error = %err, "startup stage failed");
        self.failures.push((stage, err));
    }

    /// Stage failures, in the order they happened.
    pub fn failures(&self) -> &[(LifecycleState, StageError)] {
        &self.failures
    }

    /// True if every stage succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Detailed codec bring-up result, if the sequence ran
    pub fn bring_up(&self) -> Option<&BringUpReport> {
        self.bring_up.as_ref()
    }

    /// Failure recorded for `stage`, if any.
    pub fn failure_at(&self, stage: LifecycleState) -> Option<&StageError> {
        self.failures
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, e)| e)
    }
}

/// External collaborators and configuration for one boot
pub struct Startup<B, P, H> {
    config: DeviceConfig,
    bus: B,
    platform: P,
    console_host: H,
    session: Arc<dyn RealtimeSession>,
    network: Arc<dyn NetworkJoin>,
    log: Arc<StartupLog>,
}

impl<B, P, H> Startup<B, P, H>
where
    B: TwoWireBus,
    P: MediaPlatform,
    H: ConsoleHost,
{
    /// Prepare a boot with the given collaborators.
    pub fn new(
        config: DeviceConfig,
        bus: B,
        platform: P,
        console_host: H,
        session: Arc<dyn RealtimeSession>,
        network: Arc<dyn NetworkJoin>,
    ) -> Self {
        Self {
            config,
            bus,
            platform,
            console_host,
            session,
            network,
            log: StartupLog::shared(),
        }
    }

    /// Run every startup stage and enter the operational state.
    pub fn run(mut self) -> Running<B, P, H> {
        info!(
            board = %self.config.board,
            chip = ?self.config.chip,
            opus = self.config.opus_encoder,
            "{} v{}",
            platform::config::APP_NAME,
            platform::config::APP_VERSION
        );
        let mut report = StartupReport::default();
        let lifecycle = Lifecycle::new(Arc::clone(&self.log));

        let lifecycle = self.configure_codec(lifecycle, &mut report);

        if let Err(e) = self.platform.install_default_adapter() {
            report.record(LifecycleState::PlatformReady, e);
        }
        let lifecycle = lifecycle.platform_ready();

        let policy = match ThreadPolicyTable::reference(self.config.media_profile()) {
            Ok(table) => table,
            Err(e) => {
                report.record(LifecycleState::PolicyInstalled, e);
                ThreadPolicyTable::empty()
            }
        };
        info!(policies = policy.len(), "thread policy registered");
        let mut tasks = TaskFactory::new(Arc::new(policy), self.config.thread_defaults);
        if let Some(hook) = self.platform.spawn_hook() {
            tasks = tasks.with_hook(hook);
        }
        let lifecycle = lifecycle.policy_installed();

        let codec = CodecInitConfig::for_chip(self.config.chip);
        if let Err(e) = self.platform.hand_off_board(self.config.board, codec) {
            report.record(LifecycleState::BoardHandedOff, e);
        }
        if let Err(e) = self.platform.build_media_system() {
            report.record(LifecycleState::BoardHandedOff, e);
        }
        let lifecycle = lifecycle.board_handed_off();

        let session = SessionController::new(Arc::clone(&self.session), tasks.clone());
        let on_change = {
            let session = session.clone();
            Box::new(move |connected: bool| {
                if let Err(e) = session.on_connectivity(connected) {
                    error!(error = %e, connected, "could not spawn session task");
                }
            })
        };
        if let Err(e) = self.network.join(self.config.wifi.as_ref(), on_change) {
            report.record(LifecycleState::NetworkJoining, e);
        }
        let lifecycle = lifecycle.network_joining();

        let console = Arc::new(Console::new(
            self.config.console,
            session.clone(),
            Arc::clone(&self.network),
            Arc::clone(&self.log),
        ));
        if let Err(e) = self.console_host.install(Arc::clone(&console), &tasks) {
            report.record(LifecycleState::NetworkJoining, e);
        }

        let lifecycle = lifecycle.operational();
        if report.is_clean() {
            info!("startup complete");
        } else {
            warn!(failures = report.failures().len(), "startup complete with failures");
        }

        Running {
            lifecycle,
            report,
            session,
            console,
            tasks,
            interval: self.config.supervisor_interval,
            bus: self.bus,
            platform: self.platform,
            console_host: self.console_host,
        }
    }

    fn configure_codec(
        &mut self,
        lifecycle: Lifecycle<Cold>,
        report: &mut StartupReport,
    ) -> Lifecycle<BusReleased> {
        let board = self.config.board;
        let Some(codec_bus) = board.codec_bus() else {
            info!(board = %board, "no codec bring-up for this board");
            self.log.record_codec(CodecOutcome::NotRequired);
            return lifecycle.bus_ready().codec_configured().bus_released();
        };

        let mut handle = match BusHandle::acquire(&mut self.bus, codec_bus.config) {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "codec bus unavailable, skipping bring-up");
                self.log.record_codec(CodecOutcome::BusUnavailable);
                report.record(LifecycleState::BusReady, e);
                return lifecycle.bus_ready().codec_configured().bus_released();
            }
        };
        let lifecycle = lifecycle.bus_ready();

        let outcome = bring_up_report(&mut handle, board, self.config.codec_write_timeout);
        for failed in outcome.failures() {
            warn!(
                index = failed.index,
                register = failed.register,
                error = %failed.error,
                "codec write failed"
            );
        }
        for failed in outcome.ignored_failures() {
            debug!(
                index = failed.index,
                register = failed.register,
                error = %failed.error,
                "ALC write failed, ignored"
            );
        }
        self.log.record_codec(CodecOutcome::Ran {
            attempted: outcome.attempted(),
            failed: outcome.failures().len(),
            ignored: outcome.ignored_failures().len(),
        });
        info!(
            attempted = outcome.attempted(),
            failed = outcome.failures().len(),
            "codec bring-up finished"
        );
        if let Err(e) = outcome.clone().into_result() {
            report.record(LifecycleState::CodecConfigured, e);
        }
        report.bring_up = Some(outcome);
        let lifecycle = lifecycle.codec_configured();

        handle.release();
        lifecycle.bus_released()
    }
}

/// The booted system
pub struct Running<B, P, H> {
    lifecycle: Lifecycle<Operational>,
    report: StartupReport,
    session: SessionController,
    console: Arc<Console>,
    tasks: TaskFactory,
    interval: Duration,
    bus: B,
    platform: P,
    console_host: H,
}

impl<B, P, H> Running<B, P, H> {
    /// What went wrong during startup
    pub fn report(&self) -> &StartupReport {
        &self.report
    }

    /// Shared startup log
    pub fn log(&self) -> &Arc<StartupLog> {
        self.lifecycle.log()
    }

    /// Session entry points
    pub fn session(&self) -> &SessionController {
        &self.session
    }

    /// Installed command surface
    pub fn console(&self) -> &Arc<Console> {
        &self.console
    }

    /// Task factory every worker is spawned through
    pub fn tasks(&self) -> &TaskFactory {
        &self.tasks
    }

    /// The codec control bus, released
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Mutable access to the released bus, for re-installation.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Media platform glue
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Console host
    pub fn console_host(&self) -> &H {
        &self.console_host
    }

    /// Interval between liveness polls
    pub fn supervisor_interval(&self) -> Duration {
        self.interval
    }

    /// One supervisory tick: poll session liveness.
    pub fn supervise_once(&self) -> SessionStatus {
        let status = self.session.poll();
        debug!(session = %status, "supervisor tick");
        status
    }

    /// Sleep, poll, repeat. Never returns.
    pub fn supervise(&self) -> ! {
        let interval = std::time::Duration::from_micros(self.interval.as_micros());
        loop {
            std::thread::sleep(interval);
            self.supervise_once();
        }
    }
}

impl<B, P, H> core::fmt::Debug for Running<B, P, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Running")
            .field("report", &self.report)
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}
