use std::{any::TypeId, collections::BTreeMap, sync::Arc};

use crate::any::RcAny;

/// Request-scoped values passed into lifecycle hooks and middleware.
///
/// Values are keyed by their type, so a context holds at most one value per type.
/// [`crate::Container::resolve`] runs hooks with an empty context,
/// [`crate::Container::start`], [`crate::Container::stop`], [`crate::Container::health`]
/// and [`crate::Container::resolve_ready`] pass the caller's context through.
#[derive(Clone, Default)]
pub struct Context {
    pub(crate) map: BTreeMap<TypeId, RcAny>,
}

impl Context {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self { map: BTreeMap::new() }
    }

    #[inline]
    #[must_use]
    pub fn with<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    #[inline]
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<Arc<T>> {
        self.insert_rc(Arc::new(value))
    }

    #[inline]
    pub fn insert_rc<T: Send + Sync + 'static>(&mut self, value: Arc<T>) -> Option<Arc<T>> {
        self.map.insert(TypeId::of::<T>(), value).and_then(|boxed| boxed.downcast().ok())
    }

    #[inline]
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.clone().downcast().ok())
    }

    #[inline]
    #[must_use]
    pub fn contains<T: 'static>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
