use std::collections::BTreeMap;

use crate::{container::Container, context::Context, dependency::Dependency, lifetime::Lifetime};

/// Diagnostic snapshot of a registration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: String,
    /// Type of the created singleton instance, `None` until one exists
    pub type_name: Option<&'static str>,
    /// `None` for unknown names
    pub lifetime: Option<Lifetime>,
    pub dependencies: Vec<Dependency>,
    pub groups: Vec<String>,
    pub started: bool,
    /// Whether the created instance has a health check that passes
    pub healthy: bool,
    pub metadata: BTreeMap<String, String>,
}

/// Filter over [`ServiceInfo`] snapshots, unset criteria match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceQuery {
    pub lifetime: Option<Lifetime>,
    pub group: Option<String>,
    /// Every pair must be present with the same value
    pub metadata: BTreeMap<String, String>,
    pub started: Option<bool>,
}

impl ServiceQuery {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    #[inline]
    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn started(mut self, started: bool) -> Self {
        self.started = Some(started);
        self
    }

    #[must_use]
    pub fn matches(&self, info: &ServiceInfo) -> bool {
        if self.lifetime.is_some() && info.lifetime != self.lifetime {
            return false;
        }
        if let Some(group) = &self.group {
            if !info.groups.contains(group) {
                return false;
            }
        }
        if !self
            .metadata
            .iter()
            .all(|(key, value)| info.metadata.get(key) == Some(value))
        {
            return false;
        }
        self.started.map_or(true, |started| info.started == started)
    }
}

impl Container {
    /// Snapshot of a registration, only the name is set for unknown names.
    ///
    /// The health check of a created instance runs with an empty [`Context`].
    #[must_use]
    pub fn inspect(&self, name: &str) -> ServiceInfo {
        let Some(registration) = self.find(name) else {
            return ServiceInfo {
                name: name.to_owned(),
                ..ServiceInfo::default()
            };
        };
        let (instance, started) = registration.snapshot();

        let healthy = instance
            .as_ref()
            .and_then(|instance| instance.as_health_check())
            .is_some_and(|check| check.health(&Context::new()).is_ok());

        ServiceInfo {
            name: registration.name.clone(),
            type_name: instance.as_ref().map(|instance| instance.type_name()),
            lifetime: Some(registration.lifetime()),
            dependencies: registration.config.dependencies.clone(),
            groups: registration.config.groups.clone(),
            started,
            healthy,
            metadata: registration.config.metadata.clone(),
        }
    }

    /// Snapshots of every registration matching the query, in registration order
    #[must_use]
    pub fn query(&self, query: &ServiceQuery) -> Vec<ServiceInfo> {
        self.services()
            .iter()
            .map(|name| self.inspect(name))
            .filter(|info| query.matches(info))
            .collect()
    }

    #[must_use]
    pub fn query_names(&self, query: &ServiceQuery) -> Vec<String> {
        self.query(query).into_iter().map(|info| info.name).collect()
    }
}
