#[derive(thiserror::Error, Debug)]
#[error("Failed to dispose service '{name}'")]
pub struct DisposeError {
    pub name: String,
    #[source]
    pub source: anyhow::Error,
}

#[derive(thiserror::Error, Debug)]
pub enum ScopeErrorKind {
    #[error("Scope has ended")]
    Ended,
    #[error("Scope cleanup errors: {}", join(.errors))]
    Dispose { errors: Vec<DisposeError> },
}

fn join(errors: &[DisposeError]) -> String {
    errors
        .iter()
        .map(|err| format!("{err}: {:#}", err.source))
        .collect::<Vec<_>>()
        .join("; ")
}
