//! Thread resource policy
//!
//! Maps logical worker-task names to the stack size, priority and core
//! affinity the task-creation facility applies when it instantiates that
//! worker. Fields left unset fall back to the platform default for that
//! field, never to zero.
//!
//! The table is built once at startup through [`ThreadPolicyBuilder`] and is
//! read-only afterwards, so concurrent lookups need no locking.
//!
//! ## Reference budgets
//!
//! | task        | stack  | prio | core |
//! |-------------|--------|------|------|
//! | `pc_task`   | 25 KiB | 18   | 1    |
//! | `start`     | 6 KiB  | -    | -    |
//! | `pc_send`   | 4 KiB  | 15   | 1    |
//! | `Adec`      | 40 KiB | 10   | 1    |
//! | `venc`      | 20 KiB (S3 only) | 10 | - |
//! | `aenc`      | 40 KiB | 10   | -    |
//! | `SrcRead`   | 40 KiB | 16   | 0    |
//! | `buffer_in` | 6 KiB  | 10   | 0    |
//!
//! The last three exist only when the Opus encoder is built in. Network send
//! and audio decode are pinned to core 1 above best-effort work; capture
//! reads sit on core 0.

use heapless::Vec;

use crate::board::ChipTarget;

/// Maximum number of named policies in one table.
pub const MAX_POLICIES: usize = 16;

const KIB: u32 = 1024;

/// Resource budget for one worker. `None` means "platform default".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThreadBudget {
    /// Stack size in bytes
    pub stack_bytes: Option<u32>,
    /// Scheduler priority (higher runs first)
    pub priority: Option<u8>,
    /// Core the task is pinned to
    pub core: Option<u8>,
}

impl ThreadBudget {
    /// Every field left to the platform.
    pub const PLATFORM_DEFAULT: Self = Self {
        stack_bytes: None,
        priority: None,
        core: None,
    };

    /// Budget with only a stack size.
    pub const fn stack(stack_bytes: u32) -> Self {
        Self {
            stack_bytes: Some(stack_bytes),
            priority: None,
            core: None,
        }
    }

    /// Set the priority.
    pub const fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Pin to `core`.
    pub const fn on_core(mut self, core: u8) -> Self {
        self.core = Some(core);
        self
    }

    /// True if every field is left to the platform.
    pub const fn is_platform_default(&self) -> bool {
        self.stack_bytes.is_none() && self.priority.is_none() && self.core.is_none()
    }

    /// Fill unset fields from `defaults`.
    pub fn resolve_with(&self, defaults: &PlatformThreadDefaults) -> ThreadSpawnParams {
        ThreadSpawnParams {
            stack_bytes: self.stack_bytes.unwrap_or(defaults.stack_bytes),
            priority: self.priority.unwrap_or(defaults.priority),
            core: self.core.or(defaults.core),
        }
    }
}

/// Values the task-creation facility uses for unset budget fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlatformThreadDefaults {
    /// Default stack size in bytes
    pub stack_bytes: u32,
    /// Default priority
    pub priority: u8,
    /// Default affinity, `None` for "any core"
    pub core: Option<u8>,
}

impl Default for PlatformThreadDefaults {
    /// Media-library defaults on ESP-IDF: 4 KiB, priority 5, unpinned.
    fn default() -> Self {
        Self {
            stack_bytes: 4 * KIB,
            priority: 5,
            core: None,
        }
    }
}

/// Fully resolved parameters for one thread creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThreadSpawnParams {
    /// Stack size in bytes
    pub stack_bytes: u32,
    /// Scheduler priority
    pub priority: u8,
    /// Pinned core, `None` for "any core"
    pub core: Option<u8>,
}

/// One named policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThreadPolicyEntry {
    /// Logical task name, as passed to the task-creation facility
    pub name: &'static str,
    /// Resource budget
    pub budget: ThreadBudget,
}

impl ThreadPolicyEntry {
    /// Entry for `name` with `budget`.
    pub const fn new(name: &'static str, budget: ThreadBudget) -> Self {
        Self { name, budget }
    }
}

/// The table could not be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PolicyError {
    /// Two entries share a name
    DuplicateName(&'static str),
    /// More than [`MAX_POLICIES`] entries
    TableFull,
}

impl core::fmt::Display for PolicyError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DuplicateName(name) => write!(f, "duplicate thread policy for {name}"),
            Self::TableFull => write!(f, "thread policy table full ({MAX_POLICIES} entries)"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PolicyError {}

/// Which optional media workers the build carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MediaProfile {
    /// Target SoC
    pub chip: ChipTarget,
    /// Opus encoder and its capture workers are built in
    pub opus_encoder: bool,
}

impl Default for MediaProfile {
    fn default() -> Self {
        Self {
            chip: ChipTarget::Esp32S3,
            opus_encoder: true,
        }
    }
}

/// Builds a [`ThreadPolicyTable`], rejecting duplicate names.
#[derive(Debug, Default)]
pub struct ThreadPolicyBuilder {
    entries: Vec<ThreadPolicyEntry, MAX_POLICIES>,
}

impl ThreadPolicyBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a policy for `name`.
    pub fn with(mut self, name: &'static str, budget: ThreadBudget) -> Result<Self, PolicyError> {
        if self.entries.iter().any(|entry| entry.name == name) {
            return Err(PolicyError::DuplicateName(name));
        }
        self.entries
            .push(ThreadPolicyEntry::new(name, budget))
            .map_err(|_| PolicyError::TableFull)?;
        Ok(self)
    }

    /// Freeze the table.
    pub fn build(self) -> ThreadPolicyTable {
        ThreadPolicyTable {
            entries: self.entries,
        }
    }
}

/// Immutable name → budget table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadPolicyTable {
    entries: Vec<ThreadPolicyEntry, MAX_POLICIES>,
}

impl ThreadPolicyTable {
    /// Start building a table.
    pub fn builder() -> ThreadPolicyBuilder {
        ThreadPolicyBuilder::new()
    }

    /// Table with no entries: every task gets platform defaults.
    pub fn empty() -> Self {
        ThreadPolicyBuilder::new().build()
    }

    /// Budgets for the voice-chat media pipeline.
    pub fn reference(profile: MediaProfile) -> Result<Self, PolicyError> {
        let venc = match profile.chip {
            ChipTarget::Esp32S3 => ThreadBudget::stack(20 * KIB),
            ChipTarget::Esp32 => ThreadBudget::PLATFORM_DEFAULT,
        };
        let mut builder = Self::builder()
            .with("pc_task", ThreadBudget::stack(25 * KIB).with_priority(18).on_core(1))?
            .with("start", ThreadBudget::stack(6 * KIB))?
            .with("pc_send", ThreadBudget::stack(4 * KIB).with_priority(15).on_core(1))?
            .with("Adec", ThreadBudget::stack(40 * KIB).with_priority(10).on_core(1))?
            .with("venc", venc.with_priority(10))?;
        if profile.opus_encoder {
            builder = builder
                .with("aenc", ThreadBudget::stack(40 * KIB).with_priority(10))?
                .with("SrcRead", ThreadBudget::stack(40 * KIB).with_priority(16).on_core(0))?
                .with("buffer_in", ThreadBudget::stack(6 * KIB).with_priority(10).on_core(0))?;
        }
        Ok(builder.build())
    }

    /// Budget for `name`; unknown names get [`ThreadBudget::PLATFORM_DEFAULT`].
    pub fn resolve(&self, name: &str) -> ThreadBudget {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map_or(ThreadBudget::PLATFORM_DEFAULT, |entry| entry.budget)
    }

    /// All entries, in insertion order.
    pub fn entries(&self) -> &[ThreadPolicyEntry] {
        &self.entries
    }

    /// Number of named policies.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no policies are configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn reference() -> ThreadPolicyTable {
        ThreadPolicyTable::reference(MediaProfile::default()).unwrap()
    }

    #[test]
    fn pc_send_is_pinned_and_elevated() {
        assert_eq!(
            reference().resolve("pc_send"),
            ThreadBudget {
                stack_bytes: Some(4096),
                priority: Some(15),
                core: Some(1),
            }
        );
    }

    #[test]
    fn unknown_task_gets_platform_defaults() {
        let budget = reference().resolve("unknown_task");
        assert!(budget.is_platform_default());
    }

    #[test]
    fn start_task_sets_stack_only() {
        assert_eq!(reference().resolve("start"), ThreadBudget::stack(6 * 1024));
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert!(reference().resolve("adec").is_platform_default());
        assert_eq!(reference().resolve("Adec").stack_bytes, Some(40 * 1024));
    }

    #[test]
    fn opus_workers_follow_profile() {
        let with = reference();
        let without = ThreadPolicyTable::reference(MediaProfile {
            opus_encoder: false,
            ..MediaProfile::default()
        })
        .unwrap();
        for name in ["aenc", "SrcRead", "buffer_in"] {
            assert!(!with.resolve(name).is_platform_default());
            assert!(without.resolve(name).is_platform_default());
        }
        assert_eq!(with.len(), 8);
        assert_eq!(without.len(), 5);
    }

    #[test]
    fn video_encoder_stack_only_on_s3() {
        let s3 = reference();
        let classic = ThreadPolicyTable::reference(MediaProfile {
            chip: ChipTarget::Esp32,
            opus_encoder: true,
        })
        .unwrap();
        assert_eq!(s3.resolve("venc").stack_bytes, Some(20 * 1024));
        assert_eq!(classic.resolve("venc").stack_bytes, None);
        assert_eq!(classic.resolve("venc").priority, Some(10));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = ThreadPolicyTable::builder()
            .with("pc_send", ThreadBudget::stack(4096))
            .unwrap()
            .with("pc_send", ThreadBudget::stack(8192))
            .err();
        assert_eq!(err, Some(PolicyError::DuplicateName("pc_send")));
    }

    #[test]
    fn table_capacity_is_enforced() {
        const NAMES: [&str; MAX_POLICIES + 1] = [
            "t0", "t1", "t2", "t3", "t4", "t5", "t6", "t7", "t8", "t9", "t10", "t11", "t12",
            "t13", "t14", "t15", "t16",
        ];
        let mut builder = ThreadPolicyTable::builder();
        for name in NAMES.iter().take(MAX_POLICIES).copied() {
            builder = builder.with(name, ThreadBudget::stack(4096)).unwrap();
        }
        let err = builder.with(NAMES[MAX_POLICIES], ThreadBudget::stack(4096)).err();
        assert_eq!(err, Some(PolicyError::TableFull));
    }

    #[test]
    fn unset_fields_fall_back_to_defaults_not_zero() {
        let defaults = PlatformThreadDefaults::default();
        let params = ThreadBudget::stack(6 * 1024).resolve_with(&defaults);
        assert_eq!(params.stack_bytes, 6 * 1024);
        assert_eq!(params.priority, defaults.priority);
        assert_eq!(params.core, None);

        let params = ThreadBudget::PLATFORM_DEFAULT.resolve_with(&PlatformThreadDefaults {
            stack_bytes: 8192,
            priority: 3,
            core: Some(0),
        });
        assert_eq!(
            params,
            ThreadSpawnParams {
                stack_bytes: 8192,
                priority: 3,
                core: Some(0),
            }
        );
    }
}
