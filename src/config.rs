use std::collections::BTreeMap;

use crate::{dependency::Dependency, lifetime::Lifetime};

/// Config for a service registration
/// ## Fields
/// - `lifetime`:
///   Caching policy of the service, [`Lifetime::Singleton`] by default.
/// - `dependencies`:
///   Names the service depends on. They only order startup and shutdown,
///   the factory still resolves what it needs itself.
/// - `groups`:
///   Diagnostic labels, see [`crate::ServiceQuery`].
/// - `metadata`:
///   Free-form key/value pairs reported by [`crate::Container::inspect`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub lifetime: Lifetime,
    pub dependencies: Vec<Dependency>,
    pub groups: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

impl Config {
    #[inline]
    #[must_use]
    pub fn singleton() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn transient() -> Self {
        Self::default().with_lifetime(Lifetime::Transient)
    }

    #[inline]
    #[must_use]
    pub fn scoped() -> Self {
        Self::default().with_lifetime(Lifetime::Scoped)
    }

    #[inline]
    #[must_use]
    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    #[inline]
    #[must_use]
    pub fn depends_on(mut self, dependency: impl Into<Dependency>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_dependencies<I>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Dependency>,
    {
        self.dependencies.extend(dependencies.into_iter().map(Into::into));
        self
    }

    #[inline]
    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use crate::{DepMode, Dependency, Lifetime};

    #[test]
    fn test_default_is_singleton() {
        let config = Config::default();
        assert_eq!(config.lifetime, Lifetime::Singleton);
        assert!(config.dependencies.is_empty());
    }

    #[test]
    fn test_builder() {
        let config = Config::transient()
            .depends_on("database")
            .depends_on(Dependency::lazy("cache"))
            .group("http")
            .metadata("owner", "billing");

        assert_eq!(config.lifetime, Lifetime::Transient);
        assert_eq!(config.dependencies.len(), 2);
        assert_eq!(config.dependencies[1].mode, DepMode::Lazy);
        assert_eq!(config.groups, ["http"]);
        assert_eq!(config.metadata.get("owner").map(String::as_str), Some("billing"));
    }
}
