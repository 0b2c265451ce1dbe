use std::fmt::{self, Display, Formatter};

/// How many instances of a service exist and who caches them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lifetime {
    /// One instance per container, created on first use and cached
    #[default]
    Singleton,
    /// A fresh instance on every resolution, never cached
    Transient,
    /// One instance per scope, only resolvable through a [`crate::Scope`]
    Scoped,
}

impl Lifetime {
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Singleton => "singleton",
            Self::Transient => "transient",
            Self::Scoped => "scoped",
        }
    }
}

impl Display for Lifetime {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
