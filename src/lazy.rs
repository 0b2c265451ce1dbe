use once_cell::sync::OnceCell;
use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
};
use tracing::debug;

use crate::{container::Container, errors::ResolveErrorKind};

/// A named dependency resolved on first [`Lazy::get`] and kept afterwards.
///
/// Holding a `Lazy` instead of the service breaks a construction cycle: the factory
/// of one side stores the wrapper and resolves the other side only when it's used.
/// Failed resolutions aren't kept, the next `get` tries again.
pub struct Lazy<T> {
    container: Container,
    name: String,
    value: OnceCell<Arc<T>>,
}

impl<T: Send + Sync + 'static> Lazy<T> {
    #[inline]
    #[must_use]
    pub fn new(container: Container, name: impl Into<String>) -> Self {
        Self {
            container,
            name: name.into(),
            value: OnceCell::new(),
        }
    }

    /// # Errors
    /// See [`Container::resolve_as`]
    pub fn get(&self) -> Result<Arc<T>, ResolveErrorKind> {
        self.value
            .get_or_try_init(|| {
                debug!(service = self.name.as_str(), "Resolving lazy dependency");
                self.container.resolve_as(&self.name)
            })
            .cloned()
    }

    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.value.get().is_some()
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Debug for Lazy<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("name", &self.name)
            .field("resolved", &self.value.get().is_some())
            .finish()
    }
}

/// Like [`Lazy`], but an unregistered name resolves to `None` instead of an error
pub struct OptionalLazy<T> {
    container: Container,
    name: String,
    value: OnceCell<Option<Arc<T>>>,
}

impl<T: Send + Sync + 'static> OptionalLazy<T> {
    #[inline]
    #[must_use]
    pub fn new(container: Container, name: impl Into<String>) -> Self {
        Self {
            container,
            name: name.into(),
            value: OnceCell::new(),
        }
    }

    /// # Errors
    /// See [`Container::resolve_as`], a missing registration isn't an error
    pub fn get(&self) -> Result<Option<Arc<T>>, ResolveErrorKind> {
        self.value
            .get_or_try_init(|| {
                if !self.container.has(&self.name) {
                    debug!(service = self.name.as_str(), "Optional lazy dependency not registered");
                    return Ok(None);
                }
                self.container.resolve_as(&self.name).map(Some)
            })
            .cloned()
    }

    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.value.get().is_some()
    }

    /// Whether the dependency was there, `false` until resolved
    #[inline]
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self.value.get(), Some(Some(_)))
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Debug for OptionalLazy<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionalLazy")
            .field("name", &self.name)
            .field("resolved", &self.value.get().is_some())
            .finish()
    }
}

/// Resolves a named dependency on every call, a fresh instance each time for transient services
pub struct Provider<T> {
    container: Container,
    name: String,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Provider<T> {
    #[inline]
    #[must_use]
    pub fn new(container: Container, name: impl Into<String>) -> Self {
        Self {
            container,
            name: name.into(),
            _marker: std::marker::PhantomData,
        }
    }

    /// # Errors
    /// See [`Container::resolve_as`]
    #[inline]
    pub fn provide(&self) -> Result<Arc<T>, ResolveErrorKind> {
        self.container.resolve_as(&self.name)
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
            name: self.name.clone(),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T> Debug for Provider<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider").field("name", &self.name).finish()
    }
}

impl Container {
    #[inline]
    #[must_use]
    pub fn lazy<T: Send + Sync + 'static>(&self, name: impl Into<String>) -> Lazy<T> {
        Lazy::new(self.clone(), name)
    }

    #[inline]
    #[must_use]
    pub fn optional_lazy<T: Send + Sync + 'static>(&self, name: impl Into<String>) -> OptionalLazy<T> {
        OptionalLazy::new(self.clone(), name)
    }

    #[inline]
    #[must_use]
    pub fn provider<T: Send + Sync + 'static>(&self, name: impl Into<String>) -> Provider<T> {
        Provider::new(self.clone(), name)
    }
}
