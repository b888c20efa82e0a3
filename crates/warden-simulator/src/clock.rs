//! Virtual clock.
//!
//! Sleeping advances time instantly, then yields to the runtime so other
//! tasks observe the in-between state.

use crate::network::SimulatedNetwork;
use async_trait::async_trait;
use warden_core::effects::ClockEffects;

#[async_trait]
impl ClockEffects for SimulatedNetwork {
    async fn now_ms(&self) -> u64 {
        self.state.lock().now_ms
    }

    async fn sleep_ms(&self, ms: u64) {
        {
            let mut state = self.state.lock();
            state.now_ms = state.now_ms.saturating_add(ms);
        }
        tokio::task::yield_now().await;
    }
}
