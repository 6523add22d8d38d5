//! Readiness check port.

use async_trait::async_trait;

/// A single bounded-timeout readiness check against the engine.
///
/// Implementations never fail: transport errors, timeouts and non-success
/// statuses all read as "not healthy". Retrying is the caller's job.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn is_healthy(&self) -> bool;
}
