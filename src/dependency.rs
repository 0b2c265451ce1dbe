use std::fmt::{self, Display, Formatter};

/// How a service consumes one of its dependencies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DepMode {
    /// Must be available before the dependent starts
    #[default]
    Eager,
    /// Resolved on first use, doesn't constrain startup order
    Lazy,
    /// Used only if registered
    Optional,
    LazyOptional,
}

impl DepMode {
    #[inline]
    #[must_use]
    pub const fn is_lazy(self) -> bool {
        matches!(self, Self::Lazy | Self::LazyOptional)
    }

    #[inline]
    #[must_use]
    pub const fn is_optional(self) -> bool {
        matches!(self, Self::Optional | Self::LazyOptional)
    }

    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eager => "eager",
            Self::Lazy => "lazy",
            Self::Optional => "optional",
            Self::LazyOptional => "lazy_optional",
        }
    }
}

impl Display for DepMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared edge from a service to another service by name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub name: String,
    pub mode: DepMode,
}

impl Dependency {
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, mode: DepMode) -> Self {
        Self { name: name.into(), mode }
    }

    #[inline]
    #[must_use]
    pub fn eager(name: impl Into<String>) -> Self {
        Self::new(name, DepMode::Eager)
    }

    #[inline]
    #[must_use]
    pub fn lazy(name: impl Into<String>) -> Self {
        Self::new(name, DepMode::Lazy)
    }

    #[inline]
    #[must_use]
    pub fn optional(name: impl Into<String>) -> Self {
        Self::new(name, DepMode::Optional)
    }

    #[inline]
    #[must_use]
    pub fn lazy_optional(name: impl Into<String>) -> Self {
        Self::new(name, DepMode::LazyOptional)
    }

    #[inline]
    #[must_use]
    pub const fn is_lazy(&self) -> bool {
        self.mode.is_lazy()
    }

    #[inline]
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        self.mode.is_optional()
    }
}

impl From<&str> for Dependency {
    fn from(name: &str) -> Self {
        Self::eager(name)
    }
}

impl From<String> for Dependency {
    fn from(name: String) -> Self {
        Self::eager(name)
    }
}

impl Display for Dependency {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.mode {
            DepMode::Eager => f.write_str(&self.name),
            mode => write!(f, "{} ({mode})", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DepMode, Dependency};

    #[test]
    fn test_mode_flags() {
        assert!(!DepMode::Eager.is_lazy());
        assert!(!DepMode::Eager.is_optional());
        assert!(DepMode::Lazy.is_lazy());
        assert!(DepMode::Optional.is_optional());
        assert!(DepMode::LazyOptional.is_lazy());
        assert!(DepMode::LazyOptional.is_optional());
    }

    #[test]
    fn test_from_name_is_eager() {
        let dependency = Dependency::from("database");
        assert_eq!(dependency.mode, DepMode::Eager);
        assert_eq!(dependency.to_string(), "database");
        assert_eq!(Dependency::lazy("cache").to_string(), "cache (lazy)");
    }
}
