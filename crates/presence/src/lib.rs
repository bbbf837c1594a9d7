//! Presence and notifications.
//!
//! [`PresenceFacade`] holds the process-wide [`Presence`] and fronts the
//! host's notification and idle-time capabilities so that host failures
//! never reach callers as errors. [`IdleMonitor`] polls idle time in the
//! background.

pub mod facade;
pub mod host;
pub mod idle;
pub mod stub;

pub use facade::PresenceFacade;
pub use host::{HostError, HostFuture, HostShell};
pub use idle::{IDLE_POLL_PERIOD, IdleMonitor};
pub use voffice_protocol::Presence;
