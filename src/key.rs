use std::{
    fmt::{self, Debug, Display, Formatter},
    marker::PhantomData,
    sync::Arc,
};

use crate::{
    config::Config,
    container::Container,
    errors::{InstantiateErrorKind, RegisterErrorKind, ResolveErrorKind},
    inspect::ServiceInfo,
    instance::Instance,
};

/// A service name bound to the type registered under it.
///
/// ```rust
/// use vessel::{Config, Container, ServiceKey};
///
/// struct Database {
///     url: &'static str,
/// }
///
/// const DATABASE: ServiceKey<Database> = ServiceKey::new("database");
///
/// let container = Container::new();
/// container
///     .register_key(DATABASE, |_| Ok(Database { url: "postgres://" }), Config::singleton())
///     .unwrap();
///
/// assert_eq!(container.resolve_key(DATABASE).unwrap().url, "postgres://");
/// ```
pub struct ServiceKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ServiceKey<T> {
    #[inline]
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for ServiceKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ServiceKey<T> {}

impl<T> Debug for ServiceKey<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ServiceKey").field(&self.name).finish()
    }
}

impl<T> Display for ServiceKey<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl Container {
    /// Registers a service whose factory returns the key's type
    ///
    /// # Errors
    /// See [`Container::register`]
    pub fn register_key<T, F>(&self, key: ServiceKey<T>, factory: F, config: Config) -> Result<(), RegisterErrorKind>
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.register(key.name, move |container| factory(container).map(Instance::new), config)
    }

    /// # Errors
    /// See [`Container::resolve_as`]
    #[inline]
    pub fn resolve_key<T: Send + Sync + 'static>(&self, key: ServiceKey<T>) -> Result<Arc<T>, ResolveErrorKind> {
        self.resolve_as(key.name)
    }

    #[inline]
    #[must_use]
    pub fn has_key<T>(&self, key: ServiceKey<T>) -> bool {
        self.has(key.name)
    }

    #[inline]
    #[must_use]
    pub fn is_started_key<T>(&self, key: ServiceKey<T>) -> bool {
        self.is_started(key.name)
    }

    #[inline]
    #[must_use]
    pub fn inspect_key<T>(&self, key: ServiceKey<T>) -> ServiceInfo {
        self.inspect(key.name)
    }
}

#[cfg(test)]
mod tests {
    use super::ServiceKey;
    use crate::{Config, Container, Lifetime, ResolveErrorKind};

    use tracing_test::traced_test;

    struct Cache {
        size: usize,
    }

    const CACHE: ServiceKey<Cache> = ServiceKey::new("cache");
    const SIZE: ServiceKey<usize> = ServiceKey::new("cache");

    #[test]
    #[traced_test]
    fn test_service_key() {
        let container = Container::new();
        assert!(!container.has_key(CACHE));

        container
            .register_key(CACHE, |_| Ok(Cache { size: 64 }), Config::transient())
            .unwrap();

        assert!(container.has_key(CACHE));
        assert_eq!(container.resolve_key(CACHE).unwrap().size, 64);
        assert!(!container.is_started_key(CACHE));
        assert_eq!(container.inspect_key(CACHE).lifetime, Some(Lifetime::Transient));
        assert_eq!(CACHE.to_string(), "cache");

        let err = container.resolve_key(SIZE).unwrap_err();
        assert!(matches!(err, ResolveErrorKind::TypeMismatch { .. }));
    }
}
