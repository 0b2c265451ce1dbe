use super::constructor::ConstructorErrorKind;
use crate::type_registry::TypeKey;

#[derive(thiserror::Error, Debug)]
pub enum RegisterErrorKind {
    #[error("Service name cannot be empty")]
    EmptyName,
    #[error("Service '{name}' has no factory")]
    InvalidFactory { name: String },
    #[error("Service '{name}' already exists")]
    AlreadyExists { name: String },
    #[error("Service already registered for type {key}")]
    TypeConflict { key: TypeKey },
    #[error("Failed to register alias '{alias}': service already registered for type {key}")]
    AliasConflict { alias: String, key: TypeKey },
    #[error(transparent)]
    Constructor(#[from] ConstructorErrorKind),
}
