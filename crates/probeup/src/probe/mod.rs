/// Probe executor module - performs single HTTP probes
///
/// Each probe issues exactly one request and always yields a `ProbeResult`:
/// transport errors, timeouts and unreadable bodies are converted into
/// results classified `ERROR` instead of being returned as errors.
pub mod executor;
pub mod types;

pub use executor::{HttpProber, Prober};
pub use types::{ProbeResult, StatusClass};
