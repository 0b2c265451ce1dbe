use std::fmt::{self, Display, Formatter};

/// Phase of a service operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Resolve,
    AutoStart,
    Start,
    Stop,
    Health,
}

impl Operation {
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::AutoStart => "auto_start",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Health => "health",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure of a named service, with the operation it happened in
#[derive(thiserror::Error, Debug)]
#[error("Service '{name}' failed during {operation}")]
pub struct ServiceError {
    pub name: String,
    pub operation: Operation,
    #[source]
    pub source: anyhow::Error,
}

impl ServiceError {
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, operation: Operation, source: impl Into<anyhow::Error>) -> Self {
        Self {
            name: name.into(),
            operation,
            source: source.into(),
        }
    }
}
