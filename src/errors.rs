mod constructor;
mod instantiate;
mod instantiator;
mod lifecycle;
mod register;
mod resolve;
mod scope;
mod service;

pub use constructor::ConstructorErrorKind;
pub use instantiate::InstantiateErrorKind;
pub use instantiator::InstantiatorErrorKind;
pub use lifecycle::LifecycleErrorKind;
pub use register::RegisterErrorKind;
pub use resolve::{DependencyCycle, ResolveErrorKind};
pub use scope::{DisposeError, ScopeErrorKind};
pub use service::{Operation, ServiceError};
