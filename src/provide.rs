use parking_lot::Mutex;
use std::{any::type_name, iter, marker::PhantomData, sync::Arc};
use tracing::{debug, error, info_span};

use crate::{
    any::{RcAny, TypeInfo},
    constructor::{AnalyzedConstructor, Constructor, ResultSpec},
    container::Container,
    errors::{DependencyCycle, InstantiateErrorKind, InstantiatorErrorKind, RegisterErrorKind, ResolveErrorKind},
    lifetime::Lifetime,
    resolution::BuildLock,
    results::ResultObject,
    type_registry::{ErasedFactory, PendingBinding, PendingEntry, TypeKey, TypeRegistration, View},
};

/// The constructor returns a single value
pub struct Single;

/// The constructor returns a [`ResultObject`], each field is registered on its own
pub struct Multiple;

#[derive(Default)]
struct Options {
    name: String,
    aliases: Vec<String>,
    groups: Vec<String>,
    views: Vec<(TypeInfo, View)>,
    lifetime: Lifetime,
    eager: bool,
}

impl Options {
    /// Every key of the result: its own, the `as_type` views and the same again per alias
    fn entry(&self, result: &ResultSpec, constructor: Arc<AnalyzedConstructor>, factory: ErasedFactory) -> PendingEntry {
        let name = result.name.as_deref().unwrap_or(self.name.as_str());

        let mut groups = self.groups.clone();
        groups.extend(result.group.clone());

        let mut bindings = Vec::with_capacity((1 + self.aliases.len()) * (1 + self.views.len()));
        for alias in iter::once(None).chain(self.aliases.iter().map(Some)) {
            let bound_name = alias.map_or(name, String::as_str);
            bindings.push(PendingBinding {
                key: TypeKey::new(result.type_info, bound_name),
                view: None,
                alias: alias.cloned(),
            });
            for (type_info, view) in &self.views {
                bindings.push(PendingBinding {
                    key: TypeKey::new(*type_info, bound_name),
                    view: Some(view.clone()),
                    alias: alias.cloned(),
                });
            }
        }

        PendingEntry {
            registration: TypeRegistration::new(
                TypeKey::new(result.type_info, name),
                constructor,
                factory,
                self.lifetime,
                groups,
                self.eager,
            ),
            bindings,
        }
    }
}

/// Options of a constructor registration, see [`Container::provide`]
#[must_use = "the constructor is registered only by `register`"]
pub struct ProvideBuilder<'a, F, Params, Shape> {
    container: &'a Container,
    constructor: F,
    options: Options,
    _marker: PhantomData<fn(Params) -> Shape>,
}

impl<'a, F, Params, Shape> ProvideBuilder<'a, F, Params, Shape> {
    fn new(container: &'a Container, constructor: F) -> Self {
        Self {
            container,
            constructor,
            options: Options::default(),
            _marker: PhantomData,
        }
    }

    /// Registers under a name instead of the unnamed key of the type
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.options.name = name.into();
        self
    }

    /// Also binds the registration under another name, `""` is the unnamed key
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.options.aliases.push(alias.into());
        self
    }

    /// Adds the registration to a group, see [`Container::inject_group`]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.options.groups.push(group.into());
        self
    }

    #[inline]
    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.options.lifetime = lifetime;
        self
    }

    #[inline]
    pub fn singleton(self) -> Self {
        self.lifetime(Lifetime::Singleton)
    }

    #[inline]
    pub fn transient(self) -> Self {
        self.lifetime(Lifetime::Transient)
    }

    /// Scoped constructor registrations behave as transient when injected
    #[inline]
    pub fn scoped(self) -> Self {
        self.lifetime(Lifetime::Scoped)
    }

    /// Creates the value during [`Container::start`]
    #[inline]
    pub fn eager(mut self) -> Self {
        self.options.eager = true;
        self
    }
}

impl<F, Params> ProvideBuilder<'_, F, Params, Single>
where
    F: Constructor<Params, Error = InstantiateErrorKind>,
    Params: 'static,
{
    /// Also binds the value as `I`, usually a trait object.
    ///
    /// ```rust
    /// use vessel::{Container, InstantiateErrorKind};
    ///
    /// trait Greeter: Send + Sync {
    ///     fn greet(&self) -> &'static str;
    /// }
    ///
    /// struct English;
    ///
    /// impl Greeter for English {
    ///     fn greet(&self) -> &'static str {
    ///         "hello"
    ///     }
    /// }
    ///
    /// let container = Container::new();
    /// container
    ///     .provide(|| -> Result<English, InstantiateErrorKind> { Ok(English) })
    ///     .as_type::<dyn Greeter>(|english| english)
    ///     .register()
    ///     .unwrap();
    ///
    /// assert_eq!(container.inject::<dyn Greeter>().unwrap().greet(), "hello");
    /// ```
    pub fn as_type<I>(mut self, project: fn(Arc<F::Provides>) -> Arc<I>) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let view: View = Arc::new(move |value: &RcAny| {
            value
                .downcast_ref::<Arc<F::Provides>>()
                .map(|concrete| Arc::new(project(concrete.clone())) as RcAny)
        });
        self.options.views.push((TypeInfo::of::<I>(), view));
        self
    }

    /// # Errors
    /// - Returns [`RegisterErrorKind::Constructor`] if a parameter shape is invalid
    /// - Returns [`RegisterErrorKind::TypeConflict`] or [`RegisterErrorKind::AliasConflict`]
    ///   if a key is taken, nothing is registered then
    pub fn register(self) -> Result<(), RegisterErrorKind> {
        let span = info_span!("provide", constructor = type_name::<F>());
        let _guard = span.enter();

        let result = ResultSpec::of::<F::Provides>();
        let analyzed = Arc::new(analyze::<F, Params>(vec![result.clone()])?);

        let Self {
            container,
            constructor,
            options,
            ..
        } = self;
        let factory: ErasedFactory = Arc::new(move |container: &Container| {
            constructor
                .construct(container)
                .map(|value| Arc::new(Arc::new(value)) as RcAny)
        });

        container
            .inner
            .types
            .register(vec![options.entry(&result, analyzed, factory)])?;

        debug!("Provided");
        Ok(())
    }
}

impl<F, Params> ProvideBuilder<'_, F, Params, Multiple>
where
    F: Constructor<Params, Error = InstantiateErrorKind>,
    F::Provides: ResultObject,
    Params: 'static,
{
    /// # Errors
    /// - Returns [`RegisterErrorKind::Constructor`] if a parameter shape or a field tag is invalid,
    ///   or the result object has no fields
    /// - Returns [`RegisterErrorKind::TypeConflict`] or [`RegisterErrorKind::AliasConflict`]
    ///   if a key is taken, nothing is registered then
    pub fn register(self) -> Result<(), RegisterErrorKind> {
        let span = info_span!("provide", constructor = type_name::<F>());
        let _guard = span.enter();

        let results = <F::Provides as ResultObject>::describe().map_err(|err| {
            let err = RegisterErrorKind::from(err);
            error!("{}", err);
            err
        })?;
        let analyzed = Arc::new(analyze::<F, Params>(results)?);

        let Self {
            container,
            constructor,
            options,
            ..
        } = self;
        let shared = Arc::new(SharedResults {
            constructor,
            cached: options.lifetime == Lifetime::Singleton,
            building: BuildLock::new(),
            values: Mutex::new(None),
            _marker: PhantomData,
        });

        let pending = analyzed
            .results
            .iter()
            .enumerate()
            .map(|(index, result)| {
                let shared = shared.clone();
                let factory: ErasedFactory = Arc::new(move |container: &Container| shared.value(container, index));
                options.entry(result, analyzed.clone(), factory)
            })
            .collect();
        container.inner.types.register(pending)?;

        debug!(results = analyzed.results.len(), "Provided");
        Ok(())
    }
}

fn analyze<F, Params>(results: Vec<ResultSpec>) -> Result<AnalyzedConstructor, RegisterErrorKind>
where
    F: Constructor<Params>,
{
    AnalyzedConstructor::analyze::<F, Params>(results).map_err(|err| {
        let err = RegisterErrorKind::from(err);
        error!("{}", err);
        err
    })
}

/// One constructor call feeding every field registration of a result object
struct SharedResults<F, Params> {
    constructor: F,
    cached: bool,
    /// Held while the constructor runs
    building: BuildLock,
    values: Mutex<Option<Vec<RcAny>>>,
    _marker: PhantomData<fn(Params)>,
}

impl<F, Params> SharedResults<F, Params>
where
    F: Constructor<Params>,
    F::Provides: ResultObject,
{
    fn value(
        &self,
        container: &Container,
        index: usize,
    ) -> Result<RcAny, InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>> {
        if !self.cached {
            return Self::field(self.constructor.construct(container)?.into_values(), index);
        }

        let _building = self.building.lock().map_err(|_| {
            let err = DependencyCycle {
                cycle: vec![type_name::<F::Provides>().to_owned()],
            };
            error!("{}", err);
            InstantiatorErrorKind::Deps(err.into())
        })?;
        if let Some(values) = self.values.lock().as_ref() {
            return Self::field(values.clone(), index);
        }

        let values = self.constructor.construct(container)?.into_values();
        *self.values.lock() = Some(values.clone());
        Self::field(values, index)
    }

    fn field(
        mut values: Vec<RcAny>,
        index: usize,
    ) -> Result<RcAny, InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>> {
        if index < values.len() {
            Ok(values.swap_remove(index))
        } else {
            Err(InstantiatorErrorKind::Factory(
                anyhow::anyhow!("{} has no field {}", type_name::<F::Provides>(), index).into(),
            ))
        }
    }
}

impl Container {
    /// Registers a constructor whose parameters are resolved by type.
    ///
    /// ```rust
    /// use vessel::{Container, Inject, InstantiateErrorKind};
    ///
    /// struct Config {
    ///     url: &'static str,
    /// }
    ///
    /// struct Client {
    ///     url: &'static str,
    /// }
    ///
    /// fn new_client(Inject(config): Inject<Config>) -> Result<Client, InstantiateErrorKind> {
    ///     Ok(Client { url: config.url })
    /// }
    ///
    /// let container = Container::new();
    /// container
    ///     .provide(|| -> Result<Config, InstantiateErrorKind> { Ok(Config { url: "localhost" }) })
    ///     .register()
    ///     .unwrap();
    /// container.provide(new_client).register().unwrap();
    ///
    /// assert_eq!(container.inject::<Client>().unwrap().url, "localhost");
    /// ```
    #[inline]
    pub fn provide<F, Params>(&self, constructor: F) -> ProvideBuilder<'_, F, Params, Single>
    where
        F: Constructor<Params, Error = InstantiateErrorKind>,
    {
        ProvideBuilder::new(self, constructor)
    }

    /// Registers a constructor returning a [`ResultObject`], see [`crate::results`]
    #[inline]
    pub fn provide_results<F, Params>(&self, constructor: F) -> ProvideBuilder<'_, F, Params, Multiple>
    where
        F: Constructor<Params, Error = InstantiateErrorKind>,
        F::Provides: ResultObject,
    {
        ProvideBuilder::new(self, constructor)
    }

    /// Resolves the unnamed constructor registration of `T`
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::NoProvider`] if nothing provides `T`
    /// - Returns [`ResolveErrorKind::CircularDependency`] if `T` depends on itself
    /// - Returns [`ResolveErrorKind::Service`] if a constructor fails
    #[inline]
    pub fn inject<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        self.inject_key(&TypeKey::of::<T>())
    }

    /// # Errors
    /// See [`Container::inject`]
    #[inline]
    pub fn inject_named<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ResolveErrorKind> {
        self.inject_key(&TypeKey::named::<T>(name))
    }

    /// Resolves every member of the group bound as `T`, in registration order.
    /// An unknown group is empty.
    ///
    /// # Errors
    /// Returns the first member's error, see [`Container::inject`]
    pub fn inject_group<T: ?Sized + Send + Sync + 'static>(&self, group: &str) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        let span = info_span!("inject_group", group, element = type_name::<T>());
        let _guard = span.enter();

        let key = TypeKey::of::<T>();
        self.inner
            .types
            .resolve_group(group, key.type_info, self)?
            .iter()
            .map(|value| downcast_value(&key, value))
            .collect()
    }

    #[inline]
    #[must_use]
    pub fn has_type<T: ?Sized + 'static>(&self) -> bool {
        self.inner.types.contains(&TypeKey::of::<T>())
    }

    #[inline]
    #[must_use]
    pub fn has_type_named<T: ?Sized + 'static>(&self, name: &str) -> bool {
        self.inner.types.contains(&TypeKey::named::<T>(name))
    }

    /// The analyzed constructor behind a type key, `""` for the unnamed one
    #[inline]
    #[must_use]
    pub fn constructor_of<T: ?Sized + 'static>(&self, name: &str) -> Option<Arc<AnalyzedConstructor>> {
        self.inner.types.constructor(&TypeKey::named::<T>(name))
    }

    /// Every bound type key, aliases and `as_type` views included
    #[inline]
    #[must_use]
    pub fn provided_types(&self) -> Vec<TypeKey> {
        self.inner.types.keys()
    }

    pub(crate) fn inject_key<T: ?Sized + Send + Sync + 'static>(&self, key: &TypeKey) -> Result<Arc<T>, ResolveErrorKind> {
        let span = info_span!("inject", key = %key);
        let _guard = span.enter();

        let value = self.inner.types.resolve(key, self)?;
        downcast_value(key, &value)
    }
}

fn downcast_value<T: ?Sized + Send + Sync + 'static>(key: &TypeKey, value: &RcAny) -> Result<Arc<T>, ResolveErrorKind> {
    value.downcast_ref::<Arc<T>>().cloned().ok_or_else(|| {
        let err = ResolveErrorKind::TypeMismatch {
            name: key.to_string(),
            expected: type_name::<T>(),
            actual: key.type_info.name,
        };
        error!("{}", err);
        err
    })
}

#[cfg(test)]
mod tests {
    use crate::{
        params, results, Container, Inject, InstantiateErrorKind, ParamSpec, RegisterErrorKind, ResolveErrorKind,
        TypeKey,
    };

    use std::sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    };
    use tracing_test::traced_test;

    struct Config {
        port: u16,
    }

    struct Server {
        port: u16,
    }

    trait Handler: Send + Sync {
        fn route(&self) -> &'static str;
    }

    struct Users;
    struct Orders;

    impl Handler for Users {
        fn route(&self) -> &'static str {
            "/users"
        }
    }

    impl Handler for Orders {
        fn route(&self) -> &'static str {
            "/orders"
        }
    }

    fn new_config() -> Result<Config, InstantiateErrorKind> {
        Ok(Config { port: 8080 })
    }

    fn new_server(Inject(config): Inject<Config>) -> Result<Server, InstantiateErrorKind> {
        Ok(Server { port: config.port })
    }

    #[test]
    #[traced_test]
    fn test_provide_and_inject() {
        let container = Container::new();
        container.provide(new_config).register().unwrap();
        container.provide(new_server).register().unwrap();

        let server = container.inject::<Server>().unwrap();
        assert_eq!(server.port, 8080);
        assert!(Arc::ptr_eq(&server, &container.inject::<Server>().unwrap()));
        assert!(logs_contain("Found in cache"));
    }

    #[test]
    #[traced_test]
    fn test_transient() {
        let calls = Arc::new(AtomicU8::new(0));
        let container = Container::new();
        container
            .provide({
                let calls = calls.clone();
                move || -> Result<Config, InstantiateErrorKind> {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Config { port: 1 })
                }
            })
            .transient()
            .register()
            .unwrap();

        let first = container.inject::<Config>().unwrap();
        let second = container.inject::<Config>().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[traced_test]
    fn test_no_provider() {
        let container = Container::new();
        container.provide(new_server).register().unwrap();

        let err = container.inject::<Server>().err().unwrap();
        assert!(matches!(err, ResolveErrorKind::NoProvider { key } if key == TypeKey::of::<Config>()));
    }

    #[test]
    #[traced_test]
    fn test_named_and_aliases() {
        let container = Container::new();
        container
            .provide(new_config)
            .named("primary")
            .alias("main")
            .alias("")
            .register()
            .unwrap();

        let primary = container.inject_named::<Config>("primary").unwrap();
        assert!(Arc::ptr_eq(&primary, &container.inject_named::<Config>("main").unwrap()));
        assert!(Arc::ptr_eq(&primary, &container.inject::<Config>().unwrap()));
        assert!(container.has_type_named::<Config>("primary"));
        assert!(!container.has_type_named::<Config>("replica"));
    }

    #[test]
    #[traced_test]
    fn test_conflicts_register_nothing() {
        let container = Container::new();
        container.provide(new_config).named("main").register().unwrap();

        let err = container
            .provide(new_config)
            .named("primary")
            .alias("main")
            .register()
            .unwrap_err();
        assert!(matches!(err, RegisterErrorKind::AliasConflict { ref alias, .. } if alias == "main"));
        assert!(!container.has_type_named::<Config>("primary"));

        let err = container.provide(new_config).named("main").register().unwrap_err();
        assert!(matches!(err, RegisterErrorKind::TypeConflict { .. }));
    }

    #[test]
    #[traced_test]
    fn test_groups() {
        let container = Container::new();
        container
            .provide(|| -> Result<Users, InstantiateErrorKind> { Ok(Users) })
            .named("users")
            .as_type::<dyn Handler>(|users| users)
            .group("http")
            .register()
            .unwrap();
        container
            .provide(|| -> Result<Orders, InstantiateErrorKind> { Ok(Orders) })
            .named("orders")
            .as_type::<dyn Handler>(|orders| orders)
            .group("http")
            .register()
            .unwrap();

        let routes: Vec<_> = container
            .inject_group::<dyn Handler>("http")
            .unwrap()
            .iter()
            .map(|handler| handler.route())
            .collect();
        assert_eq!(routes, ["/users", "/orders"]);

        assert_eq!(container.inject_group::<Users>("http").unwrap().len(), 1);
        assert!(container.inject_group::<dyn Handler>("grpc").unwrap().is_empty());
    }

    params! {
        struct Routes {
            #[group = "http"]
            handlers: Vec<Arc<dyn Handler>>,
        }
    }

    params! {
        struct MaybeRoutes {
            #[group = "http"]
            #[optional]
            handlers: Vec<Arc<dyn Handler>>,
        }
    }

    struct Router(usize);

    #[test]
    #[traced_test]
    fn test_group_field() {
        let container = Container::new();
        container
            .provide(|routes: Routes| -> Result<Router, InstantiateErrorKind> { Ok(Router(routes.handlers.len())) })
            .register()
            .unwrap();

        let err = container.inject::<Router>().err().unwrap();
        assert!(matches!(
            err,
            ResolveErrorKind::NoGroupProviders { ref group } if group == "http"
        ));

        let container = Container::new();
        container
            .provide(|routes: MaybeRoutes| -> Result<Router, InstantiateErrorKind> { Ok(Router(routes.handlers.len())) })
            .register()
            .unwrap();
        assert_eq!(container.inject::<Router>().unwrap().0, 0);
    }

    struct Primary(u8);
    struct Replica(u8);

    results! {
        struct Databases {
            primary: Primary,
            #[name = "replica"]
            #[group = "readers"]
            replica: Replica,
        }
    }

    #[test]
    #[traced_test]
    fn test_result_object() {
        let calls = Arc::new(AtomicU8::new(0));
        let container = Container::new();
        container
            .provide_results({
                let calls = calls.clone();
                move || -> Result<Databases, InstantiateErrorKind> {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Databases {
                        primary: Primary(1),
                        replica: Replica(2),
                    })
                }
            })
            .register()
            .unwrap();

        assert_eq!(container.inject::<Primary>().unwrap().0, 1);
        assert_eq!(container.inject_named::<Replica>("replica").unwrap().0, 2);
        assert_eq!(container.inject_group::<Replica>("readers").unwrap().len(), 1);
        assert!(!container.has_type::<Replica>());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    results! {
        struct Nothing {}
    }

    #[test]
    #[traced_test]
    fn test_empty_result_object() {
        let container = Container::new();
        let err = container
            .provide_results(|| -> Result<Nothing, InstantiateErrorKind> { Ok(Nothing {}) })
            .register()
            .unwrap_err();
        assert!(matches!(err, RegisterErrorKind::Constructor(_)));
    }

    #[test]
    #[traced_test]
    fn test_constructor_of() {
        let container = Container::new();
        container.provide(new_server).register().unwrap();

        let analyzed = container.constructor_of::<Server>("").unwrap();
        assert_eq!(analyzed.params, [ParamSpec::Type(TypeKey::of::<Config>())]);
        assert_eq!(analyzed.dependencies(), [TypeKey::of::<Config>()]);
        assert!(container.constructor_of::<Config>("").is_none());
        assert_eq!(container.provided_types(), [TypeKey::of::<Server>()]);
    }

    #[test]
    #[traced_test]
    fn test_factory_error() {
        let container = Container::new();
        container
            .provide(|| -> Result<Config, InstantiateErrorKind> { Err(anyhow::anyhow!("no port").into()) })
            .register()
            .unwrap();

        let err = container.inject::<Config>().err().unwrap();
        assert!(matches!(err, ResolveErrorKind::Service(_)));
        assert!(logs_contain("failed during resolve"));
    }
}
