use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Display, Formatter},
    sync::Arc,
};
use tracing::{debug, error};

use crate::{
    any::{RcAny, TypeInfo},
    constructor::AnalyzedConstructor,
    container::Container,
    errors::{
        DependencyCycle, InstantiateErrorKind, InstantiatorErrorKind, Operation, RegisterErrorKind, ResolveErrorKind,
        ServiceError,
    },
    lifetime::Lifetime,
    resolution::BuildLock,
};

/// Identity of a constructor registration: a type plus an optional name.
/// The empty name is the unnamed registration of the type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TypeKey {
    pub type_info: TypeInfo,
    pub name: String,
}

impl TypeKey {
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(TypeInfo::of::<T>(), String::new())
    }

    #[inline]
    #[must_use]
    pub fn named<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::new(TypeInfo::of::<T>(), name)
    }

    #[inline]
    #[must_use]
    pub fn new(type_info: TypeInfo, name: impl Into<String>) -> Self {
        Self {
            type_info,
            name: name.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_named(&self) -> bool {
        !self.name.is_empty()
    }
}

impl Display for TypeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_named() {
            write!(f, "{}[name={}]", self.type_info, self.name)
        } else {
            write!(f, "{}", self.type_info)
        }
    }
}

pub(crate) type ErasedFactory =
    Arc<dyn Fn(&Container) -> Result<RcAny, InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>> + Send + Sync>;

/// Projects a constructed value (an `Arc<T>` behind [`RcAny`]) onto another type it's bound as
pub(crate) type View = Arc<dyn Fn(&RcAny) -> Option<RcAny> + Send + Sync>;

pub(crate) struct TypeRegistration {
    key: TypeKey,
    constructor: Arc<AnalyzedConstructor>,
    factory: ErasedFactory,
    lifetime: Lifetime,
    groups: Vec<String>,
    eager: bool,
    /// Held while the factory runs, other threads wait for the result
    building: BuildLock,
    instance: OnceCell<RcAny>,
}

impl TypeRegistration {
    pub(crate) fn new(
        key: TypeKey,
        constructor: Arc<AnalyzedConstructor>,
        factory: ErasedFactory,
        lifetime: Lifetime,
        groups: Vec<String>,
        eager: bool,
    ) -> Self {
        Self {
            key,
            constructor,
            factory,
            lifetime,
            groups,
            eager,
            building: BuildLock::new(),
            instance: OnceCell::new(),
        }
    }

    #[inline]
    pub(crate) fn key(&self) -> &TypeKey {
        &self.key
    }

    #[inline]
    fn is_cached(&self) -> bool {
        self.lifetime == Lifetime::Singleton
    }

    pub(crate) fn resolve(&self, container: &Container) -> Result<RcAny, ResolveErrorKind> {
        if let Some(instance) = self.instance.get() {
            debug!(key = %self.key, "Found in cache");
            return Ok(instance.clone());
        }

        let result = {
            let _building = self.building.lock().map_err(|_| {
                let err = DependencyCycle {
                    cycle: vec![self.key.to_string()],
                };
                error!("{}", err);
                err
            })?;
            if self.is_cached() {
                self.instance.get_or_try_init(|| (self.factory)(container)).cloned()
            } else {
                (self.factory)(container)
            }
        };

        match result {
            Ok(value) => Ok(value),
            Err(InstantiatorErrorKind::Deps(err)) => Err(err),
            Err(InstantiatorErrorKind::Factory(err)) => {
                let err = ServiceError::new(self.key.to_string(), Operation::Resolve, err);
                error!("{}", err);
                Err(err.into())
            }
        }
    }
}

pub(crate) struct PendingBinding {
    pub(crate) key: TypeKey,
    pub(crate) view: Option<View>,
    /// Set for alias keys, reported on conflicts
    pub(crate) alias: Option<String>,
}

pub(crate) struct PendingEntry {
    pub(crate) registration: TypeRegistration,
    pub(crate) bindings: Vec<PendingBinding>,
}

#[derive(Clone)]
struct Binding {
    entry: Arc<TypeRegistration>,
    view: Option<View>,
}

#[derive(Default)]
struct Bindings {
    entries: Vec<Arc<TypeRegistration>>,
    bindings: BTreeMap<TypeKey, Binding>,
    groups: BTreeMap<String, Vec<TypeKey>>,
}

/// Constructor registrations indexed by [`TypeKey`].
///
/// Aliases and interface bindings are extra keys pointing to the same registration,
/// so they share its instance and its cycle detection.
#[derive(Default)]
pub(crate) struct TypeRegistry {
    inner: RwLock<Bindings>,
}

impl TypeRegistry {
    #[inline]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds all entries, or none of them if any key is taken
    pub(crate) fn register(&self, pending: Vec<PendingEntry>) -> Result<(), RegisterErrorKind> {
        let mut inner = self.inner.write();

        let mut seen = BTreeSet::new();
        for binding in pending.iter().flat_map(|entry| &entry.bindings) {
            if inner.bindings.contains_key(&binding.key) || !seen.insert(&binding.key) {
                let key = binding.key.clone();
                let err = match &binding.alias {
                    Some(alias) => RegisterErrorKind::AliasConflict { alias: alias.clone(), key },
                    None => RegisterErrorKind::TypeConflict { key },
                };
                error!("{}", err);
                return Err(err);
            }
        }

        for PendingEntry { registration, bindings } in pending {
            let registration = Arc::new(registration);
            for PendingBinding { key, view, alias } in bindings {
                if alias.is_none() {
                    for group in &registration.groups {
                        inner.groups.entry(group.clone()).or_default().push(key.clone());
                    }
                }
                inner.bindings.insert(
                    key,
                    Binding {
                        entry: registration.clone(),
                        view,
                    },
                );
            }
            debug!(key = %registration.key, lifetime = %registration.lifetime, "Registered");
            inner.entries.push(registration);
        }

        Ok(())
    }

    pub(crate) fn resolve(&self, key: &TypeKey, container: &Container) -> Result<RcAny, ResolveErrorKind> {
        let binding = self.inner.read().bindings.get(key).cloned();
        let Some(Binding { entry, view }) = binding else {
            let err = ResolveErrorKind::NoProvider { key: key.clone() };
            error!("{}", err);
            return Err(err);
        };

        let value = entry.resolve(container)?;
        match view {
            None => Ok(value),
            Some(view) => view(&value).ok_or_else(|| {
                let err = ResolveErrorKind::TypeMismatch {
                    name: key.to_string(),
                    expected: key.type_info.name,
                    actual: entry.key.type_info.name,
                };
                error!("{}", err);
                err
            }),
        }
    }

    /// Members of the group bound as the given type, in registration order
    pub(crate) fn resolve_group(
        &self,
        group: &str,
        type_info: TypeInfo,
        container: &Container,
    ) -> Result<Vec<RcAny>, ResolveErrorKind> {
        let keys: Vec<TypeKey> = self
            .inner
            .read()
            .groups
            .get(group)
            .map(|keys| keys.iter().filter(|key| key.type_info == type_info).cloned().collect())
            .unwrap_or_default();

        keys.iter().map(|key| self.resolve(key, container)).collect()
    }

    #[inline]
    pub(crate) fn contains(&self, key: &TypeKey) -> bool {
        self.inner.read().bindings.contains_key(key)
    }

    #[inline]
    pub(crate) fn constructor(&self, key: &TypeKey) -> Option<Arc<AnalyzedConstructor>> {
        self.inner
            .read()
            .bindings
            .get(key)
            .map(|binding| binding.entry.constructor.clone())
    }

    pub(crate) fn eager_entries(&self) -> Vec<Arc<TypeRegistration>> {
        self.inner
            .read()
            .entries
            .iter()
            .filter(|entry| entry.eager)
            .cloned()
            .collect()
    }

    #[inline]
    pub(crate) fn keys(&self) -> Vec<TypeKey> {
        self.inner.read().bindings.keys().cloned().collect()
    }
}
