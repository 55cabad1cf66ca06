//! Network join
//!
//! Joining the network is a collaborator concern. The firmware hands it the
//! boot credentials and a connectivity callback and later forwards `wifi`
//! commands to it.

use crate::config::WifiCredentials;

/// Called with `true` when the link comes up and `false` when it drops.
///
/// Invoked on the network stack's own context; it must not block.
pub type ConnectivityCallback = Box<dyn Fn(bool) + Send + Sync>;

/// The network could not be joined.
#[derive(Debug, Clone, PartialEq, Eq, thiserror_no_std::Error)]
pub enum NetworkError {
    /// `connect` was called with an empty SSID
    #[error("SSID must not be empty")]
    EmptySsid,
    /// `connect` before `join`
    #[error("network stack not initialised")]
    NotInitialised,
    /// The stack refused the request
    #[error("network stack: {0}")]
    Stack(String),
}

/// The network-join procedure
pub trait NetworkJoin: Send + Sync {
    /// Bring up the stack, joining `credentials` if given, and report
    /// connectivity changes through `on_change`.
    fn join(
        &self,
        credentials: Option<&WifiCredentials>,
        on_change: ConnectivityCallback,
    ) -> Result<(), NetworkError>;

    /// Switch to another network.
    fn connect(&self, ssid: &str, password: Option<&str>) -> Result<(), NetworkError>;
}
