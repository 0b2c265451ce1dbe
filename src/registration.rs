use once_cell::sync::OnceCell;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{
    config::Config, container::Container, dependency::Dependency, errors::InstantiateErrorKind, instance::Instance,
    lifetime::Lifetime, resolution::BuildLock,
};

pub(crate) type BoxedFactory = Arc<dyn Fn(&Container) -> Result<Instance, InstantiateErrorKind> + Send + Sync>;

/// A named service description, added to a container with [`Container::add`].
///
/// [`Container::register`] covers the common case, the builder exists for registrations
/// assembled in several steps.
#[derive(Clone)]
pub struct Registration {
    pub(crate) name: String,
    pub(crate) factory: Option<BoxedFactory>,
    pub(crate) config: Config,
}

impl Registration {
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            factory: None,
            config: Config::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Container) -> Result<Instance, InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    #[inline]
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    #[inline]
    #[must_use]
    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.config.lifetime = lifetime;
        self
    }

    #[inline]
    #[must_use]
    pub fn depends_on(mut self, dependency: impl Into<Dependency>) -> Self {
        self.config.dependencies.push(dependency.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

pub(crate) struct ServiceRegistration {
    pub(crate) name: String,
    pub(crate) factory: BoxedFactory,
    pub(crate) config: Config,
    pub(crate) instance: OnceCell<Instance>,
    started: AtomicBool,
    /// Held while the singleton is created and auto-started
    pub(crate) init: BuildLock,
}

impl ServiceRegistration {
    #[inline]
    pub(crate) fn new(name: String, factory: BoxedFactory, config: Config) -> Self {
        Self {
            name,
            factory,
            config,
            instance: OnceCell::new(),
            started: AtomicBool::new(false),
            init: BuildLock::new(),
        }
    }

    #[inline]
    pub(crate) fn lifetime(&self) -> Lifetime {
        self.config.lifetime
    }

    #[inline]
    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_started(&self, started: bool) {
        self.started.store(started, Ordering::Release);
    }

    /// Cached instance, only if it's also started
    #[inline]
    pub(crate) fn ready_instance(&self) -> Option<Instance> {
        if self.is_started() {
            self.instance.get().cloned()
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn snapshot(&self) -> (Option<Instance>, bool) {
        (self.instance.get().cloned(), self.is_started())
    }
}
