/// Failure of a constructor call, split by where it happened
#[derive(thiserror::Error, Debug)]
pub enum InstantiatorErrorKind<DepsErr, FactoryErr> {
    /// A parameter couldn't be resolved, the constructor wasn't called
    #[error(transparent)]
    Deps(DepsErr),
    /// The constructor itself returned an error
    #[error(transparent)]
    Factory(FactoryErr),
}
