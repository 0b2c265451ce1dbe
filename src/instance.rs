use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

use crate::{
    any::{RcAny, TypeInfo},
    lifecycle::{Dispose, HealthCheck, Lifecycle},
};

/// A service value produced by a factory.
///
/// Besides the type-erased value, an instance keeps the capabilities the factory
/// declared for it. All views point to the same allocation.
///
/// ```rust
/// use vessel::{Context, Instance, Lifecycle};
///
/// struct Server;
///
/// impl Lifecycle for Server {
///     fn start(&self, _ctx: &Context) -> anyhow::Result<()> {
///         Ok(())
///     }
///
///     fn stop(&self, _ctx: &Context) -> anyhow::Result<()> {
///         Ok(())
///     }
/// }
///
/// let instance = Instance::service(Server);
/// assert!(instance.as_lifecycle().is_some());
/// assert!(instance.downcast::<Server>().is_some());
/// ```
#[derive(Clone)]
pub struct Instance {
    value: RcAny,
    type_info: TypeInfo,
    lifecycle: Option<Arc<dyn Lifecycle>>,
    health_check: Option<Arc<dyn HealthCheck>>,
    dispose: Option<Arc<dyn Dispose>>,
}

impl Instance {
    /// Plain value without capabilities
    #[inline]
    #[must_use]
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self::builder(value).build()
    }

    #[inline]
    #[must_use]
    pub fn from_rc<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        InstanceBuilder::from_rc(value).build()
    }

    /// Value with start and stop hooks
    #[inline]
    #[must_use]
    pub fn service<T: Lifecycle>(value: T) -> Self {
        Self::builder(value).lifecycle().build()
    }

    #[inline]
    #[must_use]
    pub fn builder<T: Send + Sync + 'static>(value: T) -> InstanceBuilder<T> {
        InstanceBuilder::from_rc(Arc::new(value))
    }

    #[inline]
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_info.name
    }

    #[inline]
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    #[inline]
    #[must_use]
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast().ok()
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> &RcAny {
        &self.value
    }

    #[inline]
    #[must_use]
    pub fn as_lifecycle(&self) -> Option<&Arc<dyn Lifecycle>> {
        self.lifecycle.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn as_health_check(&self) -> Option<&Arc<dyn HealthCheck>> {
        self.health_check.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn as_dispose(&self) -> Option<&Arc<dyn Dispose>> {
        self.dispose.as_ref()
    }

    /// Whether both instances share the same value
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::as_ptr(&self.value).cast::<()>() == Arc::as_ptr(&other.value).cast::<()>()
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_info.name)
            .field("lifecycle", &self.lifecycle.is_some())
            .field("health_check", &self.health_check.is_some())
            .field("dispose", &self.dispose.is_some())
            .finish()
    }
}

pub struct InstanceBuilder<T> {
    value: Arc<T>,
    lifecycle: Option<Arc<dyn Lifecycle>>,
    health_check: Option<Arc<dyn HealthCheck>>,
    dispose: Option<Arc<dyn Dispose>>,
}

impl<T: Send + Sync + 'static> InstanceBuilder<T> {
    #[inline]
    #[must_use]
    pub fn from_rc(value: Arc<T>) -> Self {
        Self {
            value,
            lifecycle: None,
            health_check: None,
            dispose: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn lifecycle(mut self) -> Self
    where
        T: Lifecycle,
    {
        self.lifecycle = Some(self.value.clone() as Arc<dyn Lifecycle>);
        self
    }

    #[inline]
    #[must_use]
    pub fn health_check(mut self) -> Self
    where
        T: HealthCheck,
    {
        self.health_check = Some(self.value.clone() as Arc<dyn HealthCheck>);
        self
    }

    #[inline]
    #[must_use]
    pub fn dispose(mut self) -> Self
    where
        T: Dispose,
    {
        self.dispose = Some(self.value.clone() as Arc<dyn Dispose>);
        self
    }

    #[inline]
    #[must_use]
    pub fn build(self) -> Instance {
        Instance {
            value: self.value,
            type_info: TypeInfo::of::<T>(),
            lifecycle: self.lifecycle,
            health_check: self.health_check,
            dispose: self.dispose,
        }
    }
}
