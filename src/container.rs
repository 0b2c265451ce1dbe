use parking_lot::{Mutex, RwLock};
use std::{any::type_name, collections::BTreeMap, sync::Arc};
use tracing::{debug, error, info_span, warn};

use crate::{
    config::Config,
    context::Context,
    dependency::{DepMode, Dependency},
    errors::{
        DependencyCycle, InstantiateErrorKind, LifecycleErrorKind, Operation, RegisterErrorKind, ResolveErrorKind, ServiceError,
    },
    graph::DependencyGraph,
    instance::Instance,
    lifetime::Lifetime,
    middleware::{Middleware, MiddlewareChain},
    registration::{Registration, ServiceRegistration},
    resolution::ResolutionGuard,
    scope::Scope,
    type_registry::TypeRegistry,
};

/// Dependency injection container.
///
/// The container is a cheap handle, clones share the same registrations and instances.
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

pub(crate) struct ContainerInner {
    pub(crate) services: RwLock<Services>,
    pub(crate) middleware: RwLock<Arc<MiddlewareChain>>,
    pub(crate) types: TypeRegistry,
    /// Serializes [`Container::start`] and [`Container::stop`]
    lifecycle: Mutex<()>,
}

#[derive(Default)]
pub(crate) struct Services {
    pub(crate) registrations: BTreeMap<String, Arc<ServiceRegistration>>,
    pub(crate) graph: DependencyGraph,
    pub(crate) started: bool,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                services: RwLock::new(Services::default()),
                middleware: RwLock::new(Arc::new(MiddlewareChain::default())),
                types: TypeRegistry::new(),
                lifecycle: Mutex::new(()),
            }),
        }
    }

    /// Registers a named service.
    ///
    /// The factory receives the container, so it can resolve what it depends on.
    /// `config.dependencies` only orders startup and shutdown.
    ///
    /// # Errors
    /// - Returns [`RegisterErrorKind::EmptyName`] if the name is empty
    /// - Returns [`RegisterErrorKind::AlreadyExists`] if the name is taken
    #[inline]
    pub fn register<F>(&self, name: impl Into<String>, factory: F, config: Config) -> Result<(), RegisterErrorKind>
    where
        F: Fn(&Container) -> Result<Instance, InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.add(Registration::new(name).factory(factory).config(config))
    }

    /// Registers an already created instance as a singleton
    ///
    /// # Errors
    /// See [`Self::register`]
    #[inline]
    pub fn register_instance(&self, name: impl Into<String>, instance: Instance) -> Result<(), RegisterErrorKind> {
        self.register(name, move |_| Ok(instance.clone()), Config::singleton())
    }

    /// Registers a plain value as a singleton
    ///
    /// # Errors
    /// See [`Self::register`]
    #[inline]
    pub fn register_value<T: Send + Sync + 'static>(&self, name: impl Into<String>, value: T) -> Result<(), RegisterErrorKind> {
        self.register_instance(name, Instance::new(value))
    }

    /// # Errors
    /// - Returns [`RegisterErrorKind::EmptyName`] if the name is empty
    /// - Returns [`RegisterErrorKind::InvalidFactory`] if the registration has no factory
    /// - Returns [`RegisterErrorKind::AlreadyExists`] if the name is taken
    pub fn add(&self, registration: Registration) -> Result<(), RegisterErrorKind> {
        let Registration { name, factory, config } = registration;

        let span = info_span!("register", service = name.as_str());
        let _guard = span.enter();

        if name.is_empty() {
            let err = RegisterErrorKind::EmptyName;
            error!("{}", err);
            return Err(err);
        }
        let Some(factory) = factory else {
            let err = RegisterErrorKind::InvalidFactory { name };
            error!("{}", err);
            return Err(err);
        };

        let mut services = self.inner.services.write();
        if services.registrations.contains_key(&name) {
            let err = RegisterErrorKind::AlreadyExists { name };
            error!("{}", err);
            return Err(err);
        }

        debug!(lifetime = %config.lifetime, dependencies = config.dependencies.len(), "Registered");

        services.graph.add_node(name.clone(), config.dependencies.iter().cloned());
        services
            .registrations
            .insert(name.clone(), Arc::new(ServiceRegistration::new(name, factory, config)));

        Ok(())
    }

    /// Adds middleware, called after all previously added middleware
    pub fn use_middleware(&self, middleware: impl Middleware) {
        let mut chain = self.inner.middleware.write();
        let mut next = (**chain).clone();
        next.push(Arc::new(middleware));
        *chain = Arc::new(next);
    }

    /// Resolves a service by name.
    ///
    /// Singletons are created once and cached, transients are created on every call.
    /// A newly created instance with a [`crate::Lifecycle`] is started before it's returned,
    /// using an empty [`Context`].
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::NotFound`] if the name isn't registered
    /// - Returns [`ResolveErrorKind::ScopedOutsideScope`] for scoped services
    /// - Returns [`ResolveErrorKind::CircularDependency`] if the service is already being created on this thread,
    ///   or waiting for it would block on a thread that waits for this one
    /// - Returns [`ResolveErrorKind::Service`] if the factory or the start hook fails
    /// - Returns [`ResolveErrorKind::Middleware`] if middleware rejects the resolution
    #[inline]
    pub fn resolve(&self, name: &str) -> Result<Instance, ResolveErrorKind> {
        self.resolve_with(name, &Context::new())
    }

    /// Resolves a service and downcasts it
    ///
    /// # Errors
    /// See [`Self::resolve`], also returns [`ResolveErrorKind::TypeMismatch`] if the service has another type
    #[inline]
    pub fn resolve_as<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ResolveErrorKind> {
        let instance = self.resolve(name)?;
        downcast_instance(name, &instance)
    }

    /// Resolves a service, starting it with `ctx` first if it isn't started yet
    ///
    /// # Errors
    /// See [`Self::resolve`], start failures are reported as [`Operation::Start`]
    pub fn resolve_ready(&self, ctx: &Context, name: &str) -> Result<Instance, ResolveErrorKind> {
        let registration = self.registration(name)?;

        if !registration.is_started() {
            if let Err(err) = self.start_service(ctx, name) {
                let err = ServiceError::new(name, Operation::Start, err);
                error!("{}", err);
                return Err(err.into());
            }
        }

        self.resolve_with(name, ctx)
    }

    /// # Errors
    /// See [`Self::resolve_ready`] and [`Self::resolve_as`]
    #[inline]
    pub fn resolve_ready_as<T: Send + Sync + 'static>(&self, ctx: &Context, name: &str) -> Result<Arc<T>, ResolveErrorKind> {
        let instance = self.resolve_ready(ctx, name)?;
        downcast_instance(name, &instance)
    }

    /// Readies the given dependencies: eager ones are resolved and started,
    /// optional ones only if registered, lazy ones are left for first use
    ///
    /// # Errors
    /// Returns the first failing dependency's error
    pub fn resolve_dependencies(&self, ctx: &Context, dependencies: &[Dependency]) -> Result<(), ResolveErrorKind> {
        for dependency in dependencies {
            match dependency.mode {
                DepMode::Eager => {
                    self.resolve_ready(ctx, &dependency.name)?;
                }
                DepMode::Optional => {
                    if self.has(&dependency.name) {
                        self.resolve_ready(ctx, &dependency.name)?;
                    }
                }
                DepMode::Lazy | DepMode::LazyOptional => {}
            }
        }
        Ok(())
    }

    /// Starts every singleton with dependencies first, then creates constructor registrations
    /// marked eager.
    ///
    /// Calling it again while started does nothing. If any service fails, every started
    /// service is stopped in reverse order before the error is returned.
    ///
    /// # Errors
    /// - Returns [`LifecycleErrorKind::CircularDependency`] if declared dependencies form a cycle
    /// - Returns [`LifecycleErrorKind::Service`] with [`Operation::Start`] for the failed service
    pub fn start(&self, ctx: &Context) -> Result<(), LifecycleErrorKind> {
        let span = info_span!("start");
        let _guard = span.enter();

        let _lifecycle = self.inner.lifecycle.lock();

        let order = {
            let services = self.inner.services.read();
            if services.started {
                debug!("Already started");
                return Ok(());
            }
            services.graph.topological_sort_eager_only().map_err(|err| {
                error!("{}", err);
                err
            })?
        };

        for name in &order {
            if let Err(err) = self.start_service(ctx, name) {
                let err = ServiceError::new(name.as_str(), Operation::Start, err);
                error!("{}", err);
                self.rollback(ctx, &order);
                return Err(err.into());
            }
        }

        for entry in self.inner.types.eager_entries() {
            if let Err(err) = entry.resolve(self) {
                let err = ServiceError::new(entry.key().to_string(), Operation::Start, err);
                error!("{}", err);
                self.rollback(ctx, &order);
                return Err(err.into());
            }
        }

        self.inner.services.write().started = true;
        debug!(services = order.len(), "Started");

        Ok(())
    }

    /// Stops started services in reverse startup order, stopping at the first failure.
    /// Does nothing if the container isn't started.
    ///
    /// # Errors
    /// - Returns [`LifecycleErrorKind::CircularDependency`] if declared dependencies form a cycle
    /// - Returns [`LifecycleErrorKind::Service`] with [`Operation::Stop`] for the failed service
    pub fn stop(&self, ctx: &Context) -> Result<(), LifecycleErrorKind> {
        let span = info_span!("stop");
        let _guard = span.enter();

        let _lifecycle = self.inner.lifecycle.lock();

        let order = {
            let services = self.inner.services.read();
            if !services.started {
                debug!("Not started");
                return Ok(());
            }
            services.graph.topological_sort_eager_only()?
        };

        for name in order.iter().rev() {
            if let Err(err) = self.stop_service(ctx, name) {
                let err = ServiceError::new(name.as_str(), Operation::Stop, err);
                error!("{}", err);
                return Err(err.into());
            }
        }

        self.inner.services.write().started = false;
        debug!("Stopped");

        Ok(())
    }

    /// Checks the health of every created singleton, in registration order
    ///
    /// # Errors
    /// Returns [`ServiceError`] with [`Operation::Health`] for the first unhealthy service
    pub fn health(&self, ctx: &Context) -> Result<(), ServiceError> {
        let span = info_span!("health");
        let _guard = span.enter();

        for registration in self.registrations_in_order() {
            if registration.lifetime() != Lifetime::Singleton {
                continue;
            }
            let (Some(instance), _) = registration.snapshot() else {
                continue;
            };
            if let Some(check) = instance.as_health_check() {
                if let Err(err) = check.health(ctx) {
                    let err = ServiceError::new(registration.name.as_str(), Operation::Health, err);
                    error!("{}", err);
                    return Err(err);
                }
            }
        }

        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.inner.services.read().registrations.contains_key(name)
    }

    /// Whether the service's singleton instance is started, `false` for unknown names
    #[inline]
    #[must_use]
    pub fn is_started(&self, name: &str) -> bool {
        self.find(name).is_some_and(|registration| registration.is_started())
    }

    /// Whether [`Self::start`] completed and [`Self::stop`] wasn't called since
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.services.read().started
    }

    /// Registered names in registration order
    #[inline]
    #[must_use]
    pub fn services(&self) -> Vec<String> {
        self.inner.services.read().graph.names().to_vec()
    }

    /// Order in which [`Self::start`] starts services
    ///
    /// # Errors
    /// Returns [`DependencyCycle`] if declared dependencies form a cycle
    #[inline]
    pub fn dependency_order(&self) -> Result<Vec<String>, DependencyCycle> {
        self.inner.services.read().graph.topological_sort_eager_only()
    }

    /// Creates a scope for scoped services
    #[inline]
    #[must_use]
    pub fn begin_scope(&self) -> Scope {
        Scope::new(self.clone())
    }

    #[inline]
    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    #[inline]
    pub(crate) fn find(&self, name: &str) -> Option<Arc<ServiceRegistration>> {
        self.inner.services.read().registrations.get(name).cloned()
    }

    pub(crate) fn registration(&self, name: &str) -> Result<Arc<ServiceRegistration>, ResolveErrorKind> {
        self.find(name).ok_or_else(|| {
            let err = ResolveErrorKind::NotFound { name: name.to_owned() };
            error!("{}", err);
            err
        })
    }

    pub(crate) fn registrations_in_order(&self) -> Vec<Arc<ServiceRegistration>> {
        let services = self.inner.services.read();
        services
            .graph
            .names()
            .iter()
            .filter_map(|name| services.registrations.get(name).cloned())
            .collect()
    }

    #[inline]
    fn middleware(&self) -> Arc<MiddlewareChain> {
        self.inner.middleware.read().clone()
    }

    pub(crate) fn resolve_with(&self, name: &str, ctx: &Context) -> Result<Instance, ResolveErrorKind> {
        let span = info_span!("resolve", service = name);
        let _guard = span.enter();

        let middleware = self.middleware();
        if let Err(source) = middleware.before_resolve(ctx, name) {
            let err = ResolveErrorKind::Middleware {
                name: name.to_owned(),
                source,
            };
            error!("{}", err);
            return Err(err);
        }

        let result = self.resolve_inner(name, ctx);

        if let Err(source) = middleware.after_resolve(ctx, name, result.as_ref()) {
            let err = ResolveErrorKind::Middleware {
                name: name.to_owned(),
                source,
            };
            error!("{}", err);
            return Err(err);
        }

        result
    }

    fn resolve_inner(&self, name: &str, ctx: &Context) -> Result<Instance, ResolveErrorKind> {
        let registration = self.registration(name)?;

        match registration.lifetime() {
            Lifetime::Singleton => self.resolve_singleton(&registration, ctx),
            Lifetime::Transient => {
                let instance = self.create(&registration)?;
                self.auto_start(name, &instance, ctx)?;
                debug!("Created transient");
                Ok(instance)
            }
            Lifetime::Scoped => {
                let err = ResolveErrorKind::ScopedOutsideScope { name: name.to_owned() };
                error!("{}", err);
                Err(err)
            }
        }
    }

    fn resolve_singleton(&self, registration: &ServiceRegistration, ctx: &Context) -> Result<Instance, ResolveErrorKind> {
        if let Some(instance) = registration.ready_instance() {
            debug!("Found in cache");
            return Ok(instance);
        }
        debug!("Not found in cache");

        let _resolving = self.enter(&registration.name)?;
        let _init = registration.init.lock().map_err(|_| {
            let err = DependencyCycle {
                cycle: vec![registration.name.clone()],
            };
            error!("{}", err);
            err
        })?;

        if let Some(instance) = registration.ready_instance() {
            debug!("Created by another thread");
            return Ok(instance);
        }

        let instance = registration
            .instance
            .get_or_try_init(|| -> Result<Instance, ResolveErrorKind> {
                let instance = self.instantiate(registration)?;
                debug!("Cached");
                Ok(instance)
            })?
            .clone();

        self.auto_start(&registration.name, &instance, ctx)?;
        registration.set_started(true);

        Ok(instance)
    }

    #[inline]
    fn enter(&self, name: &str) -> Result<ResolutionGuard, ResolveErrorKind> {
        Ok(ResolutionGuard::enter(self.id(), name)?)
    }

    /// Runs the factory of a non-cached service
    pub(crate) fn create(&self, registration: &ServiceRegistration) -> Result<Instance, ResolveErrorKind> {
        let _resolving = self.enter(&registration.name)?;
        self.instantiate(registration)
    }

    fn instantiate(&self, registration: &ServiceRegistration) -> Result<Instance, ResolveErrorKind> {
        (registration.factory)(self).map_err(|err| {
            let err = ServiceError::new(registration.name.as_str(), Operation::Resolve, err);
            error!("{}", err);
            err.into()
        })
    }

    pub(crate) fn auto_start(&self, name: &str, instance: &Instance, ctx: &Context) -> Result<(), ResolveErrorKind> {
        let Some(lifecycle) = instance.as_lifecycle() else {
            return Ok(());
        };

        let middleware = self.middleware();
        if let Err(source) = middleware.before_start(ctx, name) {
            let err = ResolveErrorKind::Middleware {
                name: name.to_owned(),
                source,
            };
            error!("{}", err);
            return Err(err);
        }

        let result = lifecycle.start(ctx);

        if let Err(source) = middleware.after_start(ctx, name, result.as_ref().err()) {
            let err = ResolveErrorKind::Middleware {
                name: name.to_owned(),
                source,
            };
            error!("{}", err);
            return Err(err);
        }

        if let Err(err) = result {
            let err = ServiceError::new(name, Operation::AutoStart, err);
            error!("{}", err);
            return Err(err.into());
        }

        debug!("Auto-started");
        Ok(())
    }

    /// Resolves a singleton that isn't started yet, other lifetimes have nothing to start
    fn start_service(&self, ctx: &Context, name: &str) -> Result<(), ResolveErrorKind> {
        let Some(registration) = self.find(name) else {
            return Ok(());
        };
        if registration.lifetime() != Lifetime::Singleton || registration.is_started() {
            return Ok(());
        }

        self.resolve_with(name, ctx).map(drop)
    }

    fn stop_service(&self, ctx: &Context, name: &str) -> anyhow::Result<()> {
        let Some(registration) = self.find(name) else {
            return Ok(());
        };
        let (Some(instance), true) = registration.snapshot() else {
            return Ok(());
        };

        if let Some(lifecycle) = instance.as_lifecycle() {
            lifecycle.stop(ctx)?;
            registration.set_started(false);
            debug!(service = name, "Stopped");
        }

        Ok(())
    }

    fn rollback(&self, ctx: &Context, order: &[String]) {
        for name in order.iter().rev() {
            if let Err(err) = self.stop_service(ctx, name) {
                warn!(service = name.as_str(), "Failed to stop during rollback: {:#}", err);
            }
        }
    }
}

pub(crate) fn downcast_instance<T: Send + Sync + 'static>(name: &str, instance: &Instance) -> Result<Arc<T>, ResolveErrorKind> {
    instance.downcast().ok_or_else(|| {
        let err = ResolveErrorKind::TypeMismatch {
            name: name.to_owned(),
            expected: type_name::<T>(),
            actual: instance.type_name(),
        };
        error!("{}", err);
        err
    })
}
