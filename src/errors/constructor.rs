/// Constructor shapes rejected at registration time
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructorErrorKind {
    #[error("Constructor `{constructor}` provides no values")]
    NoResults { constructor: &'static str },
    #[error("Parameter {index} is invalid: {source}")]
    Param {
        index: usize,
        #[source]
        source: Box<ConstructorErrorKind>,
    },
    #[error("Field `{field}` has unknown tag `{tag}`")]
    UnknownTag { field: &'static str, tag: &'static str },
    #[error("Field `{field}` tag `{tag}` requires a value")]
    MissingTagValue { field: &'static str, tag: &'static str },
    #[error("Field `{field}` is tagged with a group and must be a `Vec<Arc<T>>`")]
    GroupNotSlice { field: &'static str },
    #[error("Field `{field}` is a `Vec` and must be tagged with a group")]
    MissingGroup { field: &'static str },
    #[error("Field `{field}` is tagged optional and must be an `Option<Arc<T>>` or a group")]
    OptionalNotOption { field: &'static str },
    #[error("Field `{field}` can't be both named and grouped")]
    NamedGroup { field: &'static str },
}
