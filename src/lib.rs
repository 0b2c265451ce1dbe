#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
pub(crate) mod macros;

pub(crate) mod any;
pub(crate) mod config;
pub(crate) mod constructor;
pub(crate) mod container;
pub(crate) mod context;
pub(crate) mod dependency;
pub(crate) mod errors;
pub(crate) mod graph;
pub(crate) mod inspect;
pub(crate) mod instance;
pub(crate) mod key;
pub(crate) mod lazy;
pub(crate) mod lifecycle;
pub(crate) mod lifetime;
pub(crate) mod middleware;
pub(crate) mod param;
pub(crate) mod provide;
pub(crate) mod registration;
pub(crate) mod resolution;
pub(crate) mod results;
pub(crate) mod scope;
pub(crate) mod type_registry;

pub use any::{RcAny, TypeInfo};
pub use config::Config;
pub use constructor::{AnalyzedConstructor, Constructor, FieldSpec, ParamSpec, ResultSpec};
pub use container::Container;
pub use context::Context;
pub use dependency::{DepMode, Dependency};
pub use errors::{
    ConstructorErrorKind, DependencyCycle, DisposeError, InstantiateErrorKind, InstantiatorErrorKind, LifecycleErrorKind,
    Operation, RegisterErrorKind, ResolveErrorKind, ScopeErrorKind, ServiceError,
};
pub use graph::DependencyGraph;
pub use inspect::{ServiceInfo, ServiceQuery};
pub use instance::{Instance, InstanceBuilder};
pub use key::ServiceKey;
pub use lazy::{Lazy, OptionalLazy, Provider};
pub use lifecycle::{Dispose, HealthCheck, Lifecycle};
pub use lifetime::Lifetime;
pub use middleware::{FnMiddleware, Middleware};
pub use param::{Field, FieldTags, Inject, Param};
pub use provide::{Multiple, ProvideBuilder, Single};
pub use registration::Registration;
pub use results::ResultObject;
pub use scope::Scope;
pub use type_registry::TypeKey;
