use std::sync::Arc;

use crate::{context::Context, errors::ResolveErrorKind, instance::Instance};

/// Hooks around resolution and automatic start of services.
///
/// Hooks run in the order the middleware was added.
/// An error from a `before_*` hook aborts the operation,
/// an error from an `after_*` hook replaces its outcome, even a successful one.
#[allow(unused_variables)]
pub trait Middleware: Send + Sync + 'static {
    /// # Errors
    /// Aborts the resolution
    fn before_resolve(&self, ctx: &Context, name: &str) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after every resolution attempt, successful or not
    ///
    /// # Errors
    /// Replaces the resolution result
    fn after_resolve(&self, ctx: &Context, name: &str, result: Result<&Instance, &ResolveErrorKind>) -> anyhow::Result<()> {
        Ok(())
    }

    /// # Errors
    /// Aborts the start, the start hook isn't called
    fn before_start(&self, ctx: &Context, name: &str) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after every start hook, `err` is the hook's error if it failed
    ///
    /// # Errors
    /// Replaces the start result
    fn after_start(&self, ctx: &Context, name: &str, err: Option<&anyhow::Error>) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub(crate) struct MiddlewareChain {
    middleware: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    #[inline]
    pub(crate) fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.middleware.push(middleware);
    }

    pub(crate) fn before_resolve(&self, ctx: &Context, name: &str) -> anyhow::Result<()> {
        self.middleware.iter().try_for_each(|mw| mw.before_resolve(ctx, name))
    }

    pub(crate) fn after_resolve(
        &self,
        ctx: &Context,
        name: &str,
        result: Result<&Instance, &ResolveErrorKind>,
    ) -> anyhow::Result<()> {
        self.middleware.iter().try_for_each(|mw| mw.after_resolve(ctx, name, result))
    }

    pub(crate) fn before_start(&self, ctx: &Context, name: &str) -> anyhow::Result<()> {
        self.middleware.iter().try_for_each(|mw| mw.before_start(ctx, name))
    }

    pub(crate) fn after_start(&self, ctx: &Context, name: &str, err: Option<&anyhow::Error>) -> anyhow::Result<()> {
        self.middleware.iter().try_for_each(|mw| mw.after_start(ctx, name, err))
    }
}

type BeforeFn = Box<dyn Fn(&Context, &str) -> anyhow::Result<()> + Send + Sync>;
type AfterResolveFn = Box<dyn Fn(&Context, &str, Result<&Instance, &ResolveErrorKind>) -> anyhow::Result<()> + Send + Sync>;
type AfterStartFn = Box<dyn Fn(&Context, &str, Option<&anyhow::Error>) -> anyhow::Result<()> + Send + Sync>;

/// Middleware built from closures, hooks without a closure do nothing
#[derive(Default)]
pub struct FnMiddleware {
    before_resolve: Option<BeforeFn>,
    after_resolve: Option<AfterResolveFn>,
    before_start: Option<BeforeFn>,
    after_start: Option<AfterStartFn>,
}

impl FnMiddleware {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn before_resolve<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context, &str) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.before_resolve = Some(Box::new(f));
        self
    }

    #[inline]
    #[must_use]
    pub fn after_resolve<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context, &str, Result<&Instance, &ResolveErrorKind>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.after_resolve = Some(Box::new(f));
        self
    }

    #[inline]
    #[must_use]
    pub fn before_start<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context, &str) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.before_start = Some(Box::new(f));
        self
    }

    #[inline]
    #[must_use]
    pub fn after_start<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context, &str, Option<&anyhow::Error>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.after_start = Some(Box::new(f));
        self
    }
}

impl Middleware for FnMiddleware {
    fn before_resolve(&self, ctx: &Context, name: &str) -> anyhow::Result<()> {
        self.before_resolve.as_ref().map_or(Ok(()), |f| f(ctx, name))
    }

    fn after_resolve(&self, ctx: &Context, name: &str, result: Result<&Instance, &ResolveErrorKind>) -> anyhow::Result<()> {
        self.after_resolve.as_ref().map_or(Ok(()), |f| f(ctx, name, result))
    }

    fn before_start(&self, ctx: &Context, name: &str) -> anyhow::Result<()> {
        self.before_start.as_ref().map_or(Ok(()), |f| f(ctx, name))
    }

    fn after_start(&self, ctx: &Context, name: &str, err: Option<&anyhow::Error>) -> anyhow::Result<()> {
        self.after_start.as_ref().map_or(Ok(()), |f| f(ctx, name, err))
    }
}

#[cfg(test)]
mod tests {
    use super::FnMiddleware;
    use crate::{Config, Container, Context, Instance, Lifecycle, ResolveErrorKind, ServiceError};

    use parking_lot::Mutex;
    use std::sync::Arc;
    use tracing_test::traced_test;

    struct Worker;

    impl Lifecycle for Worker {
        fn start(&self, _ctx: &Context) -> anyhow::Result<()> {
            Ok(())
        }

        fn stop(&self, _ctx: &Context) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    #[traced_test]
    fn test_hooks_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let container = Container::new();
        container
            .register("worker", |_| Ok(Instance::service(Worker)), Config::default())
            .unwrap();

        for tag in ["first", "second"] {
            let calls = calls.clone();
            let calls_after = calls.clone();
            let calls_start = calls.clone();
            let calls_after_start = calls.clone();
            container.use_middleware(
                FnMiddleware::new()
                    .before_resolve(move |_, name| {
                        calls.lock().push(format!("{tag}:before_resolve:{name}"));
                        Ok(())
                    })
                    .after_resolve(move |_, name, result| {
                        calls_after.lock().push(format!("{tag}:after_resolve:{name}:{}", result.is_ok()));
                        Ok(())
                    })
                    .before_start(move |_, name| {
                        calls_start.lock().push(format!("{tag}:before_start:{name}"));
                        Ok(())
                    })
                    .after_start(move |_, name, err| {
                        calls_after_start.lock().push(format!("{tag}:after_start:{name}:{}", err.is_none()));
                        Ok(())
                    }),
            );
        }

        container.resolve("worker").unwrap();

        assert_eq!(
            *calls.lock(),
            [
                "first:before_resolve:worker",
                "second:before_resolve:worker",
                "first:before_start:worker",
                "second:before_start:worker",
                "first:after_start:worker:true",
                "second:after_start:worker:true",
                "first:after_resolve:worker:true",
                "second:after_resolve:worker:true",
            ]
        );
    }

    #[test]
    #[traced_test]
    fn test_before_resolve_aborts() {
        let container = Container::new();
        container.register("db", |_| Ok(Instance::new(5_u8)), Config::default()).unwrap();
        container.use_middleware(FnMiddleware::new().before_resolve(|_, _| Err(anyhow::anyhow!("denied"))));

        let err = container.resolve("db").unwrap_err();
        assert!(matches!(err, ResolveErrorKind::Middleware { ref name, .. } if name == "db"));
    }

    #[test]
    #[traced_test]
    fn test_after_resolve_overrides_success() {
        let container = Container::new();
        container.register("db", |_| Ok(Instance::new(5_u8)), Config::default()).unwrap();
        container.use_middleware(FnMiddleware::new().after_resolve(|_, _, result| {
            assert!(result.is_ok());
            Err(anyhow::anyhow!("audit failed"))
        }));

        assert!(matches!(container.resolve("db"), Err(ResolveErrorKind::Middleware { .. })));
    }

    #[test]
    #[traced_test]
    fn test_before_start_aborts_start() {
        let container = Container::new();
        container
            .register("worker", |_| Ok(Instance::service(Worker)), Config::default())
            .unwrap();
        container.use_middleware(FnMiddleware::new().before_start(|_, _| Err(anyhow::anyhow!("not now"))));

        let err = container.resolve("worker").unwrap_err();
        assert!(matches!(err, ResolveErrorKind::Middleware { .. }));
        assert!(!container.is_started("worker"));
    }

    #[test]
    #[traced_test]
    fn test_after_start_sees_start_error() {
        struct Broken;

        impl Lifecycle for Broken {
            fn start(&self, _ctx: &Context) -> anyhow::Result<()> {
                Err(anyhow::anyhow!("boom"))
            }

            fn stop(&self, _ctx: &Context) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let seen = Arc::new(Mutex::new(None));
        let container = Container::new();
        container
            .register("broken", |_| Ok(Instance::service(Broken)), Config::default())
            .unwrap();
        container.use_middleware(FnMiddleware::new().after_start({
            let seen = seen.clone();
            move |_, _, err| {
                *seen.lock() = err.map(ToString::to_string);
                Ok(())
            }
        }));

        let err = container.resolve("broken").unwrap_err();
        assert!(matches!(
            err,
            ResolveErrorKind::Service(ServiceError { ref name, .. }) if name == "broken"
        ));
        assert_eq!(seen.lock().as_deref(), Some("boom"));
    }
}
