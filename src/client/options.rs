//! Construction options for [`super::NetSchool`].

use crate::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use crate::report::PollPolicy;

/// Tunables for one client instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientOptions {
    /// Report poll cadence and budget.
    pub poll: PollPolicy,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            poll: PollPolicy::default(),
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
        }
    }
}

impl ClientOptions {
    /// Replaces the report poll policy.
    #[must_use]
    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Replaces the transport timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        self.connect_timeout_secs = connect_timeout_secs;
        self.read_timeout_secs = read_timeout_secs;
        self
    }
}
