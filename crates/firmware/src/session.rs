//! Realtime session control
//!
//! The transport and signalling library is an external collaborator behind
//! [`RealtimeSession`]. [`SessionController`] decides on which task each
//! entry point runs: connectivity changes and `stop` always go to a freshly
//! spawned, policy-resolved task so the caller (a network event callback or
//! the console) is never blocked; console `start` runs inline.
//!
//! Spawned tasks take effect in the order they were issued: a link that
//! drops and comes back spawns `stop` then `start`, and `start` waits for
//! `stop` to finish.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use crate::tasks::{SpawnError, TaskFactory, TaskHandle};

/// Task name for session start
pub const START_TASK: &str = "start";
/// Task name for session stop
pub const STOP_TASK: &str = "stop";

/// What the session reports when polled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// No session
    #[default]
    Idle,
    /// Signalling in progress
    Connecting,
    /// Media flowing
    Connected,
    /// Session ended with an error
    Failed,
}

impl core::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        })
    }
}

/// A session operation failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror_no_std::Error)]
pub enum SessionError {
    /// Text or stop issued with no session running
    #[error("no session running")]
    NotRunning,
    /// The transport library rejected the request
    #[error("session transport: {0}")]
    Transport(String),
}

/// The realtime transport/session library
pub trait RealtimeSession: Send + Sync {
    /// Open a session.
    fn start(&self) -> Result<(), SessionError>;
    /// Close the session, if any.
    fn stop(&self) -> Result<(), SessionError>;
    /// Send a text message on the data channel.
    fn send_text(&self, text: &str) -> Result<(), SessionError>;
    /// Poll liveness. Called periodically by the supervisory loop.
    fn query(&self) -> SessionStatus;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hands out tickets at spawn time and lets task bodies run in ticket order.
#[derive(Debug, Default)]
struct TaskOrder {
    next: Mutex<u64>,
    served: Mutex<u64>,
    turn: Condvar,
}

impl TaskOrder {
    fn wait_turn(&self, ticket: u64) -> Turn<'_> {
        let mut served = lock(&self.served);
        while *served != ticket {
            served = self
                .turn
                .wait(served)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Turn { order: self }
    }
}

/// Passes the turn on when the task body ends, panicking or not.
struct Turn<'a> {
    order: &'a TaskOrder,
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        let mut served = lock(&self.order.served);
        *served = served.wrapping_add(1);
        self.order.turn.notify_all();
    }
}

/// Routes session entry points onto the right task
#[derive(Clone)]
pub struct SessionController {
    session: Arc<dyn RealtimeSession>,
    tasks: TaskFactory,
    order: Arc<TaskOrder>,
}

impl core::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionController")
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Controller over `session`, spawning through `tasks`.
    pub fn new(session: Arc<dyn RealtimeSession>, tasks: TaskFactory) -> Self {
        Self {
            session,
            tasks,
            order: Arc::default(),
        }
    }

    /// Start the session on the calling task.
    pub fn start_now(&self) -> Result<(), SessionError> {
        info!("starting session");
        self.session.start()
    }

    /// Start the session on a new `start` task.
    pub fn start_async(&self) -> Result<TaskHandle<()>, SpawnError> {
        self.spawn_in_order(START_TASK, |session| {
            info!("starting session");
            if let Err(e) = session.start() {
                warn!(error = %e, "session start failed");
            }
        })
    }

    /// Stop the session on a new `stop` task.
    pub fn stop_async(&self) -> Result<TaskHandle<()>, SpawnError> {
        self.spawn_in_order(STOP_TASK, |session| {
            info!("stopping session");
            if let Err(e) = session.stop() {
                warn!(error = %e, "session stop failed");
            }
        })
    }

    fn spawn_in_order(
        &self,
        name: &str,
        body: fn(&dyn RealtimeSession),
    ) -> Result<TaskHandle<()>, SpawnError> {
        // Held across the spawn so a failed spawn never leaves a gap.
        let mut next = lock(&self.order.next);
        let ticket = *next;
        let session = Arc::clone(&self.session);
        let order = Arc::clone(&self.order);
        let handle = self.tasks.spawn(name, move || {
            let _turn = order.wait_turn(ticket);
            body(session.as_ref());
        })?;
        *next = next.wrapping_add(1);
        Ok(handle)
    }

    /// Send `text` to the peer.
    pub fn send_text(&self, text: &str) -> Result<(), SessionError> {
        self.session.send_text(text)
    }

    /// Network came up or went down.
    pub fn on_connectivity(&self, connected: bool) -> Result<TaskHandle<()>, SpawnError> {
        info!(connected, "connectivity changed");
        if connected {
            self.start_async()
        } else {
            self.stop_async()
        }
    }

    /// Poll session liveness.
    pub fn poll(&self) -> SessionStatus {
        self.session.query()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use super::*;
    use platform::{MediaProfile, PlatformThreadDefaults, ThreadPolicyTable};
    use std::sync::Mutex;
    use std::thread;

    #[derive(Default)]
    struct Probe {
        calls: Mutex<Vec<(&'static str, Option<String>)>>,
    }

    impl Probe {
        fn record(&self, op: &'static str) {
            let name = thread::current().name().map(str::to_owned);
            self.calls.lock().unwrap().push((op, name));
        }
    }

    impl RealtimeSession for Probe {
        fn start(&self) -> Result<(), SessionError> {
            self.record("start");
            Ok(())
        }
        fn stop(&self) -> Result<(), SessionError> {
            self.record("stop");
            Ok(())
        }
        fn send_text(&self, _text: &str) -> Result<(), SessionError> {
            self.record("text");
            Err(SessionError::NotRunning)
        }
        fn query(&self) -> SessionStatus {
            SessionStatus::Idle
        }
    }

    fn controller() -> (SessionController, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        let policy = Arc::new(ThreadPolicyTable::reference(MediaProfile::default()).unwrap());
        let tasks = TaskFactory::new(policy, PlatformThreadDefaults::default());
        (SessionController::new(probe.clone(), tasks), probe)
    }

    #[test]
    fn connectivity_up_starts_on_the_start_task() {
        let (ctl, probe) = controller();
        let handle = ctl.on_connectivity(true).unwrap();
        assert_eq!(handle.name(), "start");
        assert_eq!(handle.params().stack_bytes, 6 * 1024);
        handle.join().unwrap();
        let calls = probe.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[("start", Some("start".to_owned()))]);
    }

    #[test]
    fn connectivity_down_stops_on_the_stop_task() {
        let (ctl, probe) = controller();
        ctl.on_connectivity(false).unwrap().join().unwrap();
        let calls = probe.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[("stop", Some("stop".to_owned()))]);
    }

    #[test]
    fn start_now_runs_on_the_caller() {
        let (ctl, probe) = controller();
        let caller = thread::current().name().map(str::to_owned);
        ctl.start_now().unwrap();
        assert_eq!(probe.calls.lock().unwrap()[0].1, caller);
    }

    struct SlowStop {
        inner: Probe,
        status: Mutex<SessionStatus>,
    }

    impl RealtimeSession for SlowStop {
        fn start(&self) -> Result<(), SessionError> {
            self.inner.record("start");
            *self.status.lock().unwrap() = SessionStatus::Connected;
            Ok(())
        }
        fn stop(&self) -> Result<(), SessionError> {
            thread::sleep(std::time::Duration::from_millis(50));
            self.inner.record("stop");
            *self.status.lock().unwrap() = SessionStatus::Idle;
            Ok(())
        }
        fn send_text(&self, _text: &str) -> Result<(), SessionError> {
            Ok(())
        }
        fn query(&self) -> SessionStatus {
            *self.status.lock().unwrap()
        }
    }

    #[test]
    fn link_bounce_stops_before_it_starts_again() {
        let session = Arc::new(SlowStop {
            inner: Probe::default(),
            status: Mutex::new(SessionStatus::Connected),
        });
        let policy = Arc::new(ThreadPolicyTable::reference(MediaProfile::default()).unwrap());
        let tasks = TaskFactory::new(policy, PlatformThreadDefaults::default());
        let ctl = SessionController::new(session.clone(), tasks);

        let down = ctl.on_connectivity(false).unwrap();
        let up = ctl.on_connectivity(true).unwrap();
        up.join().unwrap();
        down.join().unwrap();

        let ops: Vec<_> = session.inner.calls.lock().unwrap().iter().map(|c| c.0).collect();
        assert_eq!(ops, vec!["stop", "start"]);
        assert_eq!(ctl.poll(), SessionStatus::Connected);
    }

    #[test]
    fn panicking_body_does_not_stall_later_tasks() {
        struct Flaky(Probe);
        impl RealtimeSession for Flaky {
            fn start(&self) -> Result<(), SessionError> {
                self.0.record("start");
                Ok(())
            }
            fn stop(&self) -> Result<(), SessionError> {
                panic!("transport torn down twice");
            }
            fn send_text(&self, _text: &str) -> Result<(), SessionError> {
                Ok(())
            }
            fn query(&self) -> SessionStatus {
                SessionStatus::Idle
            }
        }

        let session = Arc::new(Flaky(Probe::default()));
        let policy = Arc::new(ThreadPolicyTable::reference(MediaProfile::default()).unwrap());
        let tasks = TaskFactory::new(policy, PlatformThreadDefaults::default());
        let ctl = SessionController::new(session.clone(), tasks);

        assert!(ctl.stop_async().unwrap().join().is_err());
        ctl.start_async().unwrap().join().unwrap();
        assert_eq!(session.0.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn text_errors_propagate() {
        let (ctl, _) = controller();
        assert_eq!(ctl.send_text("hi"), Err(SessionError::NotRunning));
        assert_eq!(ctl.poll(), SessionStatus::Idle);
    }
}
