//! Constants for the client (timeouts, session margin, report polling).

use std::time::Duration;

/// Default HTTP connect timeout (10 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default HTTP read timeout (30 seconds).
pub const READ_TIMEOUT_SECS: u64 = 30;

/// Remaining session lifetime below which the token is treated as expired.
///
/// Covers network latency between the expiry check and the server seeing the request.
pub const SESSION_EXPIRY_MARGIN: Duration = Duration::from_secs(1);

/// Delay before the first report status poll.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound for a single poll delay.
pub const DEFAULT_POLL_MAX_INTERVAL: Duration = Duration::from_secs(5);

/// Growth factor applied to the poll delay after each pending status.
pub const DEFAULT_POLL_MULTIPLIER: f32 = 1.5;

/// Total wait budget for one report job.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// Login type marker sent with the login form.
pub const LOGIN_TYPE: &str = "1";
