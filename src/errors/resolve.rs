use super::{instantiate::InstantiateErrorKind, service::ServiceError};
use crate::type_registry::TypeKey;

/// Names (or type keys) forming a dependency cycle, the first entry repeated at the end
/// when the full path is known
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Circular dependency detected: {}", .cycle.join(" -> "))]
pub struct DependencyCycle {
    pub cycle: Vec<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("Service '{name}' not found")]
    NotFound { name: String },
    #[error("Scoped service '{name}' must be resolved from a scope")]
    ScopedOutsideScope { name: String },
    #[error("Scope has ended")]
    ScopeEnded,
    #[error("Service '{name}' has type {actual}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error(transparent)]
    CircularDependency(#[from] DependencyCycle),
    #[error("No provider for type {key}")]
    NoProvider { key: TypeKey },
    #[error("No providers for group '{group}'")]
    NoGroupProviders { group: String },
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("Middleware rejected service '{name}'")]
    Middleware {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ResolveErrorKind {
    /// Finds a dependency cycle anywhere in the chain of causes.
    ///
    /// Cycles found inside a factory surface wrapped in [`ServiceError`] of each
    /// factory on the path, this unwraps them.
    #[must_use]
    pub fn find_cycle(&self) -> Option<&DependencyCycle> {
        match self {
            Self::CircularDependency(cycle) => Some(cycle),
            Self::Service(ServiceError { source, .. }) => source.chain().find_map(|cause| {
                if let Some(cycle) = cause.downcast_ref::<DependencyCycle>() {
                    return Some(cycle);
                }
                if let Some(err) = cause.downcast_ref::<ResolveErrorKind>() {
                    return err.find_cycle();
                }
                match cause.downcast_ref::<InstantiateErrorKind>() {
                    Some(InstantiateErrorKind::Resolve(err)) => err.find_cycle(),
                    _ => None,
                }
            }),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::NoProvider { .. })
    }
}
