use super::{resolve::DependencyCycle, service::ServiceError};

/// Error of [`crate::Container::start`] and [`crate::Container::stop`]
#[derive(thiserror::Error, Debug)]
pub enum LifecycleErrorKind {
    #[error(transparent)]
    CircularDependency(#[from] DependencyCycle),
    #[error(transparent)]
    Service(#[from] ServiceError),
}
