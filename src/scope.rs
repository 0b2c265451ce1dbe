use parking_lot::Mutex;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, error, info_span, warn};

use crate::{
    any::RcAny,
    container::{downcast_instance, Container},
    errors::{DisposeError, ResolveErrorKind, ScopeErrorKind},
    instance::Instance,
    lifetime::Lifetime,
};

/// A bounded unit of work owning its own scoped instances.
///
/// Singletons and transients are resolved through the parent container,
/// scoped services are created once per scope and disposed by [`Scope::end`].
/// A scope dropped without being ended is ended on drop.
pub struct Scope {
    parent: Container,
    state: Mutex<ScopeState>,
}

#[derive(Default)]
struct ScopeState {
    instances: BTreeMap<String, Instance>,
    /// Creation order of `instances`
    order: Vec<String>,
    values: BTreeMap<String, RcAny>,
    ended: bool,
}

impl Scope {
    #[inline]
    pub(crate) fn new(parent: Container) -> Self {
        debug!("Scope created");
        Self {
            parent,
            state: Mutex::new(ScopeState::default()),
        }
    }

    /// # Errors
    /// - Returns [`ResolveErrorKind::ScopeEnded`] if the scope has ended
    /// - See [`Container::resolve`] for the other errors
    pub fn resolve(&self, name: &str) -> Result<Instance, ResolveErrorKind> {
        let span = info_span!("scope_resolve", service = name);
        let _guard = span.enter();

        if self.state.lock().ended {
            let err = ResolveErrorKind::ScopeEnded;
            error!("{}", err);
            return Err(err);
        }

        let registration = self.parent.registration(name)?;
        if registration.lifetime() != Lifetime::Scoped {
            return self.parent.resolve(name);
        }

        let mut state = self.state.lock();
        if state.ended {
            let err = ResolveErrorKind::ScopeEnded;
            error!("{}", err);
            return Err(err);
        }
        if let Some(instance) = state.instances.get(name) {
            debug!("Found in scope cache");
            return Ok(instance.clone());
        }
        debug!("Not found in scope cache");

        let instance = self.parent.create(&registration)?;
        state.order.push(name.to_owned());
        state.instances.insert(name.to_owned(), instance.clone());
        debug!("Cached in scope");

        Ok(instance)
    }

    /// # Errors
    /// See [`Self::resolve`], also returns [`ResolveErrorKind::TypeMismatch`] if the service has another type
    #[inline]
    pub fn resolve_as<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ResolveErrorKind> {
        let instance = self.resolve(name)?;
        downcast_instance(name, &instance)
    }

    /// Ends the scope, disposing its instances in reverse creation order.
    ///
    /// Every instance is disposed even if some fail, the failures are returned together.
    /// The scope is ended afterwards either way.
    ///
    /// # Errors
    /// - Returns [`ScopeErrorKind::Ended`] if the scope has already ended
    /// - Returns [`ScopeErrorKind::Dispose`] with every dispose failure
    pub fn end(&self) -> Result<(), ScopeErrorKind> {
        let span = info_span!("scope_end");
        let _guard = span.enter();

        let (mut instances, order) = {
            let mut state = self.state.lock();
            if state.ended {
                let err = ScopeErrorKind::Ended;
                error!("{}", err);
                return Err(err);
            }
            state.ended = true;
            state.values.clear();
            (std::mem::take(&mut state.instances), std::mem::take(&mut state.order))
        };

        let mut errors = Vec::new();
        for name in order.into_iter().rev() {
            let Some(instance) = instances.remove(&name) else {
                continue;
            };
            let Some(dispose) = instance.as_dispose() else {
                continue;
            };
            match dispose.dispose() {
                Ok(()) => debug!(service = name.as_str(), "Disposed"),
                Err(source) => {
                    error!(service = name.as_str(), "Failed to dispose: {:#}", source);
                    errors.push(DisposeError { name, source });
                }
            }
        }

        debug!("Scope ended");

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ScopeErrorKind::Dispose { errors })
        }
    }

    #[inline]
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.parent.has(name)
    }

    #[inline]
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.state.lock().ended
    }

    /// Names of scoped services created in this scope, in creation order
    #[inline]
    #[must_use]
    pub fn services(&self) -> Vec<String> {
        self.state.lock().order.clone()
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> &Container {
        &self.parent
    }

    /// Stores a value in the scope, ignored once the scope has ended
    pub fn set<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T) {
        let mut state = self.state.lock();
        if state.ended {
            warn!("Value set on ended scope is ignored");
            return;
        }
        state.values.insert(key.into(), Arc::new(value));
    }

    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<RcAny> {
        self.state.lock().values.get(key).cloned()
    }

    #[inline]
    #[must_use]
    pub fn get_as<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        self.get(key).and_then(|value| value.downcast().ok())
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if self.state.get_mut().ended {
            return;
        }
        if let Err(err) = self.end() {
            error!("Failed to end scope on drop: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Scope;
    use crate::{Config, Container, Context, Dispose, Instance, Lifecycle, ResolveErrorKind, ScopeErrorKind};

    use parking_lot::Mutex;
    use std::sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    };
    use tracing_test::traced_test;

    struct Transaction {
        id: u8,
        disposed: Arc<Mutex<Vec<u8>>>,
        fail: bool,
    }

    impl Dispose for Transaction {
        fn dispose(&self) -> anyhow::Result<()> {
            self.disposed.lock().push(self.id);
            if self.fail {
                anyhow::bail!("rollback of {} failed", self.id);
            }
            Ok(())
        }
    }

    fn container(disposed: &Arc<Mutex<Vec<u8>>>) -> Container {
        let counter = Arc::new(AtomicU8::new(0));
        let container = Container::new();
        for (name, fail) in [("tx", false), ("audit", false), ("broken", true), ("broken-too", true)] {
            let counter = counter.clone();
            let disposed = disposed.clone();
            container
                .register(
                    name,
                    move |_| {
                        Ok(Instance::builder(Transaction {
                            id: counter.fetch_add(1, Ordering::SeqCst),
                            disposed: disposed.clone(),
                            fail,
                        })
                        .dispose()
                        .build())
                    },
                    Config::scoped(),
                )
                .unwrap();
        }
        container.register_value("config", String::from("prod")).unwrap();
        container
    }

    #[test]
    #[traced_test]
    fn test_scoped_instance_per_scope() {
        let disposed = Arc::new(Mutex::new(Vec::new()));
        let container = container(&disposed);

        let first = container.begin_scope();
        let second = container.begin_scope();

        let a = first.resolve("tx").unwrap();
        let b = first.resolve("tx").unwrap();
        let c = second.resolve("tx").unwrap();

        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert_eq!(first.services(), ["tx"]);
    }

    #[test]
    #[traced_test]
    fn test_singleton_shared_with_parent() {
        let disposed = Arc::new(Mutex::new(Vec::new()));
        let container = container(&disposed);
        let scope = container.begin_scope();

        let from_scope = scope.resolve_as::<String>("config").unwrap();
        let from_container = container.resolve_as::<String>("config").unwrap();

        assert!(Arc::ptr_eq(&from_scope, &from_container));
        assert!(scope.services().is_empty());
    }

    #[test]
    #[traced_test]
    fn test_transient_in_scope_auto_started() {
        struct Job(AtomicU8);

        impl Lifecycle for Job {
            fn start(&self, _ctx: &Context) -> anyhow::Result<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }

            fn stop(&self, _ctx: &Context) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let container = Container::new();
        container
            .register("job", |_| Ok(Instance::service(Job(AtomicU8::new(0)))), Config::transient())
            .unwrap();
        let scope = container.begin_scope();

        let first = scope.resolve_as::<Job>("job").unwrap();
        let second = scope.resolve_as::<Job>("job").unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_end_disposes_and_closes() {
        let disposed = Arc::new(Mutex::new(Vec::new()));
        let container = container(&disposed);
        let scope = container.begin_scope();

        scope.resolve("tx").unwrap();
        scope.resolve("audit").unwrap();
        scope.end().unwrap();

        assert_eq!(*disposed.lock(), [1, 0]);
        assert!(scope.is_ended());
        assert!(matches!(scope.resolve("tx"), Err(ResolveErrorKind::ScopeEnded)));
        assert!(matches!(scope.resolve("config"), Err(ResolveErrorKind::ScopeEnded)));
        assert!(matches!(scope.end(), Err(ScopeErrorKind::Ended)));
    }

    #[test]
    #[traced_test]
    fn test_end_aggregates_errors() {
        let disposed = Arc::new(Mutex::new(Vec::new()));
        let container = container(&disposed);
        let scope = container.begin_scope();

        scope.resolve("broken").unwrap();
        scope.resolve("tx").unwrap();
        scope.resolve("broken-too").unwrap();

        let err = scope.end().unwrap_err();
        let ScopeErrorKind::Dispose { errors } = &err else {
            panic!("unexpected error: {err}");
        };

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].name, "broken-too");
        assert_eq!(errors[1].name, "broken");
        assert_eq!(disposed.lock().len(), 3);
        assert!(err.to_string().contains("rollback of 0 failed"));
        assert!(scope.is_ended());
    }

    #[test]
    #[traced_test]
    fn test_drop_ends_scope() {
        let disposed = Arc::new(Mutex::new(Vec::new()));
        let container = container(&disposed);

        {
            let scope = container.begin_scope();
            scope.resolve("tx").unwrap();
        }

        assert_eq!(*disposed.lock(), [0]);
    }

    #[test]
    #[traced_test]
    fn test_values() {
        let scope = Container::new().begin_scope();

        scope.set("user", String::from("alice"));
        assert_eq!(scope.get_as::<String>("user").unwrap().as_str(), "alice");
        assert!(scope.get_as::<u32>("user").is_none());
        assert!(scope.get("missing").is_none());

        scope.end().unwrap();
        assert!(scope.get("user").is_none());
        scope.set("user", String::from("bob"));
        assert!(scope.get("user").is_none());
    }

    #[test]
    #[traced_test]
    fn test_unknown_service() {
        let scope: Scope = Container::new().begin_scope();

        assert!(!scope.has("missing"));
        assert!(matches!(scope.resolve("missing"), Err(ResolveErrorKind::NotFound { .. })));
    }
}
