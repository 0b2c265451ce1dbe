use crate::context::Context;

/// A service with explicit start and stop phases.
///
/// Hooks take `&self`, so a service keeps its running state behind interior mutability.
/// The container calls `start` at most once per started period and `stop` only on
/// started instances.
pub trait Lifecycle: Send + Sync + 'static {
    /// # Errors
    /// Any error aborts the operation that triggered the start
    fn start(&self, ctx: &Context) -> anyhow::Result<()>;

    /// # Errors
    /// Any error is reported by [`crate::Container::stop`]
    fn stop(&self, ctx: &Context) -> anyhow::Result<()>;
}

pub trait HealthCheck: Send + Sync + 'static {
    /// # Errors
    /// An error marks the service unhealthy
    fn health(&self, ctx: &Context) -> anyhow::Result<()>;
}

/// Cleanup for scoped instances, run when their scope ends
pub trait Dispose: Send + Sync + 'static {
    /// # Errors
    /// Errors are collected and reported by [`crate::Scope::end`]
    fn dispose(&self) -> anyhow::Result<()>;
}
