//! Log subscriber setup
//!
//! The library only emits `tracing` events. The emulator binary installs a
//! formatting subscriber once at boot; the global level is `info` unless
//! `RUST_LOG` says otherwise.

/// Directive used when `RUST_LOG` is unset or empty.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Pick the filter directive from the `RUST_LOG` value, if any.
pub fn directive(rust_log: Option<&str>) -> &str {
    match rust_log.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => DEFAULT_DIRECTIVE,
    }
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed or the directive does not
/// parse.
#[cfg(feature = "emulator")]
pub fn init() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = EnvFilter::try_new(directive(rust_log.as_deref()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("log subscriber: {e}"))
}
