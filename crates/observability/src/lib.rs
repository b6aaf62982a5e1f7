//! Process-wide logging setup shared by the API binary and test harnesses.

pub mod tracing;

/// Install the global tracing subscriber. Repeat calls are no-ops.
pub fn init() {
    tracing::init();
}
