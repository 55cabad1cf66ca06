//! Task factory
//!
//! The only way the firmware creates worker threads. Each spawn looks the
//! task name up in the shared [`ThreadPolicyTable`] exactly once, fills any
//! unset field from the platform defaults, hands the result to the platform
//! [`SpawnHook`] (which applies priority and core affinity on real targets)
//! and creates a named OS thread with the resolved stack size.
//!
//! On a desktop host a 4 KiB stack is not enough for the standard library's
//! own frames, so the OS stack is raised to [`HOST_STACK_FLOOR`]; the policy
//! value is still what the hook receives and what gets logged.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use platform::{PlatformThreadDefaults, ThreadBudget, ThreadPolicyTable, ThreadSpawnParams};
use tracing::debug;

/// Minimum OS stack for threads on a desktop host.
pub const HOST_STACK_FLOOR: usize = 64 * 1024;

/// Applies resolved parameters to the platform scheduler.
///
/// Called on the spawning thread, right before the OS thread is created.
pub trait SpawnHook: Send + Sync {
    /// Apply `params` for the task called `name`.
    fn apply(&self, name: &str, params: &ThreadSpawnParams);
}

/// A thread could not be created or ended abnormally.
#[derive(Debug, thiserror_no_std::Error)]
pub enum SpawnError {
    /// The OS refused to create the thread
    #[error("failed to spawn task `{name}`")]
    Os {
        /// Task name
        name: String,
        /// OS error
        #[source]
        source: std::io::Error,
    },
    /// The task panicked before finishing
    #[error("task `{0}` panicked")]
    Panicked(String),
}

/// A running task
#[derive(Debug)]
pub struct TaskHandle<T> {
    name: String,
    params: ThreadSpawnParams,
    inner: JoinHandle<T>,
}

impl<T> TaskHandle<T> {
    /// Task name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameters the task was created with
    pub fn params(&self) -> ThreadSpawnParams {
        self.params
    }

    /// True once the task body has returned.
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Wait for the task to finish.
    pub fn join(self) -> Result<T, SpawnError> {
        self.inner.join().map_err(|_| SpawnError::Panicked(self.name))
    }
}

/// Creates policy-resolved worker threads
#[derive(Clone)]
pub struct TaskFactory {
    policy: Arc<ThreadPolicyTable>,
    defaults: PlatformThreadDefaults,
    hook: Option<Arc<dyn SpawnHook>>,
}

impl core::fmt::Debug for TaskFactory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TaskFactory")
            .field("policies", &self.policy.len())
            .field("defaults", &self.defaults)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl TaskFactory {
    /// Factory over `policy` with no platform hook.
    pub fn new(policy: Arc<ThreadPolicyTable>, defaults: PlatformThreadDefaults) -> Self {
        Self {
            policy,
            defaults,
            hook: None,
        }
    }

    /// Route every spawn through `hook`.
    pub fn with_hook(mut self, hook: Arc<dyn SpawnHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// The shared policy table
    pub fn policy(&self) -> &Arc<ThreadPolicyTable> {
        &self.policy
    }

    /// Parameters a task called `name` would get.
    pub fn resolve(&self, name: &str) -> ThreadSpawnParams {
        self.policy.resolve(name).resolve_with(&self.defaults)
    }

    /// Spawn `job` as the task called `name`.
    pub fn spawn<F, T>(&self, name: &str, job: F) -> Result<TaskHandle<T>, SpawnError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.spawn_with_budget(name, self.policy.resolve(name), job)
    }

    /// Spawn with an explicit budget instead of the table entry.
    ///
    /// For tasks whose budget is owned by another component's configuration,
    /// such as the console REPL.
    pub fn spawn_with_budget<F, T>(
        &self,
        name: &str,
        budget: ThreadBudget,
        job: F,
    ) -> Result<TaskHandle<T>, SpawnError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let params = budget.resolve_with(&self.defaults);
        if let Some(hook) = &self.hook {
            hook.apply(name, &params);
        }
        debug!(
            task = name,
            stack = params.stack_bytes,
            priority = params.priority,
            core = ?params.core,
            "spawning task"
        );

        let stack = usize::try_from(params.stack_bytes)
            .unwrap_or(HOST_STACK_FLOOR)
            .max(HOST_STACK_FLOOR);
        let inner = thread::Builder::new()
            .name(name.to_owned())
            .stack_size(stack)
            .spawn(job)
            .map_err(|source| SpawnError::Os {
                name: name.to_owned(),
                source,
            })?;

        Ok(TaskHandle {
            name: name.to_owned(),
            params,
            inner,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use platform::MediaProfile;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, ThreadSpawnParams)>>);

    impl SpawnHook for Recorder {
        fn apply(&self, name: &str, params: &ThreadSpawnParams) {
            self.0.lock().unwrap().push((name.to_owned(), *params));
        }
    }

    fn factory() -> (TaskFactory, Arc<Recorder>) {
        let policy = Arc::new(ThreadPolicyTable::reference(MediaProfile::default()).unwrap());
        let hook = Arc::new(Recorder::default());
        let factory = TaskFactory::new(policy, PlatformThreadDefaults::default())
            .with_hook(hook.clone());
        (factory, hook)
    }

    #[test]
    fn spawn_applies_the_named_policy() {
        let (factory, hook) = factory();
        let handle = factory.spawn("pc_send", || 7).unwrap();
        assert_eq!(handle.name(), "pc_send");
        assert_eq!(handle.join().unwrap(), 7);

        let calls = hook.0.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].1,
            ThreadSpawnParams {
                stack_bytes: 4096,
                priority: 15,
                core: Some(1),
            }
        );
    }

    #[test]
    fn unknown_task_runs_with_platform_defaults() {
        let (factory, _) = factory();
        let handle = factory.spawn("rec2play", || ()).unwrap();
        assert_eq!(handle.params(), ThreadSpawnParams {
            stack_bytes: 4096,
            priority: 5,
            core: None,
        });
        handle.join().unwrap();
    }

    #[test]
    fn os_thread_carries_the_task_name() {
        let (factory, _) = factory();
        let handle = factory
            .spawn("Adec", || thread::current().name().map(str::to_owned))
            .unwrap();
        assert_eq!(handle.join().unwrap().as_deref(), Some("Adec"));
    }

    #[test]
    fn panicking_task_reports_its_name() {
        let (factory, _) = factory();
        #[allow(clippy::panic)]
        let handle = factory.spawn("venc", || panic!("boom")).unwrap();
        match handle.join() {
            Err(SpawnError::Panicked(name)) => assert_eq!(name, "venc"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
