//! Clock effect interface

use async_trait::async_trait;

/// Wall-clock time and sleeping.
///
/// Simulated handlers advance a virtual clock on `sleep_ms`, so polling loops
/// run instantly in tests.
#[async_trait]
pub trait ClockEffects: Send + Sync {
    /// Unix time in milliseconds.
    async fn now_ms(&self) -> u64;

    /// Suspend for `ms` milliseconds.
    async fn sleep_ms(&self, ms: u64);
}
