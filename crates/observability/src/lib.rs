//! Process-wide tracing setup shared by binaries and tests.

pub mod subscriber;

/// Initialize structured logging for the process.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init() {
    subscriber::init(subscriber::DEFAULT_FILTER);
}
