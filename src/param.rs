use std::sync::Arc;

use crate::{
    any::TypeInfo,
    constructor::{ParamSpec, ResultSpec},
    container::Container,
    errors::{ConstructorErrorKind, ResolveErrorKind},
    type_registry::TypeKey,
};

/// A constructor parameter resolved from the container
pub trait Param: Sized + Send + 'static {
    /// # Errors
    /// Returns [`ConstructorErrorKind`] if the parameter shape is invalid
    fn describe() -> Result<ParamSpec, ConstructorErrorKind>;

    /// # Errors
    /// Returns [`ResolveErrorKind`] if the parameter can't be resolved
    fn resolve(container: &Container) -> Result<Self, ResolveErrorKind>;
}

/// The unnamed registration of `Dep`
pub struct Inject<Dep: ?Sized>(pub Arc<Dep>);

impl<Dep: ?Sized + Send + Sync + 'static> Param for Inject<Dep> {
    fn describe() -> Result<ParamSpec, ConstructorErrorKind> {
        Ok(ParamSpec::Type(TypeKey::of::<Dep>()))
    }

    fn resolve(container: &Container) -> Result<Self, ResolveErrorKind> {
        container.inject().map(Self)
    }
}

impl<Dep: ?Sized + Send + Sync + 'static> Param for Option<Inject<Dep>> {
    fn describe() -> Result<ParamSpec, ConstructorErrorKind> {
        Ok(ParamSpec::Optional(Box::new(ParamSpec::Type(TypeKey::of::<Dep>()))))
    }

    fn resolve(container: &Container) -> Result<Self, ResolveErrorKind> {
        if !container.has_type::<Dep>() {
            return Ok(None);
        }
        container.inject().map(|dep| Some(Inject(dep)))
    }
}

impl Param for Container {
    fn describe() -> Result<ParamSpec, ConstructorErrorKind> {
        Ok(ParamSpec::Container)
    }

    fn resolve(container: &Container) -> Result<Self, ResolveErrorKind> {
        Ok(container.clone())
    }
}

/// Tags of a parameter or result object field, built by [`crate::params`] and [`crate::results`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTags {
    pub field: &'static str,
    pub name: Option<&'static str>,
    pub group: Option<&'static str>,
    pub optional: bool,
    invalid: Option<ConstructorErrorKind>,
}

impl FieldTags {
    #[inline]
    #[must_use]
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            ..Self::default()
        }
    }

    /// Applies a `#[tag]` or `#[tag = "value"]` attribute, doc comments are ignored
    #[must_use]
    pub fn tag(mut self, tag: &'static str, value: Option<&'static str>) -> Self {
        let field = self.field;
        match (tag, value) {
            ("doc", _) => {}
            ("name", Some(value)) => self.name = Some(value),
            ("group", Some(value)) => self.group = Some(value),
            ("optional", None) => self.optional = true,
            ("optional", Some(value)) => self.optional = value == "true",
            ("name" | "group", None) => {
                self.invalid.get_or_insert(ConstructorErrorKind::MissingTagValue { field, tag });
            }
            _ => {
                self.invalid.get_or_insert(ConstructorErrorKind::UnknownTag { field, tag });
            }
        }
        self
    }

    /// # Errors
    /// Returns the first invalid tag
    pub fn validate(&self) -> Result<(), ConstructorErrorKind> {
        match &self.invalid {
            Some(err) => Err(err.clone()),
            None if self.name.is_some() && self.group.is_some() => {
                Err(ConstructorErrorKind::NamedGroup { field: self.field })
            }
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn key<T: ?Sized + 'static>(&self) -> TypeKey {
        TypeKey::named::<T>(self.name.unwrap_or_default())
    }

    /// Describes the field as a provided value
    ///
    /// # Errors
    /// Returns [`ConstructorErrorKind`] for invalid tags or `optional` on a result
    pub fn result<T: 'static>(&self) -> Result<ResultSpec, ConstructorErrorKind> {
        self.validate()?;
        if self.optional {
            return Err(ConstructorErrorKind::UnknownTag {
                field: self.field,
                tag: "optional",
            });
        }
        Ok(ResultSpec {
            field: Some(self.field),
            type_info: TypeInfo::of::<T>(),
            name: self.name.map(ToOwned::to_owned),
            group: self.group.map(ToOwned::to_owned),
        })
    }
}

/// A field of a parameter object
pub trait Field: Sized + Send + 'static {
    /// # Errors
    /// Returns [`ConstructorErrorKind`] if the tags don't fit the field type
    fn describe(tags: &FieldTags) -> Result<ParamSpec, ConstructorErrorKind>;

    /// # Errors
    /// Returns [`ResolveErrorKind`] if the field can't be resolved
    fn resolve(container: &Container, tags: &FieldTags) -> Result<Self, ResolveErrorKind>;
}

impl<T: ?Sized + Send + Sync + 'static> Field for Arc<T> {
    fn describe(tags: &FieldTags) -> Result<ParamSpec, ConstructorErrorKind> {
        tags.validate()?;
        if tags.group.is_some() {
            return Err(ConstructorErrorKind::GroupNotSlice { field: tags.field });
        }
        if tags.optional {
            return Err(ConstructorErrorKind::OptionalNotOption { field: tags.field });
        }
        Ok(ParamSpec::Type(tags.key::<T>()))
    }

    fn resolve(container: &Container, tags: &FieldTags) -> Result<Self, ResolveErrorKind> {
        container.inject_key(&tags.key::<T>())
    }
}

impl<T: ?Sized + Send + Sync + 'static> Field for Option<Arc<T>> {
    fn describe(tags: &FieldTags) -> Result<ParamSpec, ConstructorErrorKind> {
        tags.validate()?;
        if tags.group.is_some() {
            return Err(ConstructorErrorKind::GroupNotSlice { field: tags.field });
        }
        Ok(ParamSpec::Optional(Box::new(ParamSpec::Type(tags.key::<T>()))))
    }

    fn resolve(container: &Container, tags: &FieldTags) -> Result<Self, ResolveErrorKind> {
        let key = tags.key::<T>();
        if !container.inner.types.contains(&key) {
            return Ok(None);
        }
        container.inject_key(&key).map(Some)
    }
}

impl<T: ?Sized + Send + Sync + 'static> Field for Vec<Arc<T>> {
    fn describe(tags: &FieldTags) -> Result<ParamSpec, ConstructorErrorKind> {
        tags.validate()?;
        let Some(group) = tags.group else {
            return Err(ConstructorErrorKind::MissingGroup { field: tags.field });
        };
        let spec = ParamSpec::Group {
            group: group.to_owned(),
            element: TypeInfo::of::<T>(),
        };
        Ok(if tags.optional {
            ParamSpec::Optional(Box::new(spec))
        } else {
            spec
        })
    }

    fn resolve(container: &Container, tags: &FieldTags) -> Result<Self, ResolveErrorKind> {
        let group = tags.group.unwrap_or_default();
        let members = container.inject_group::<T>(group)?;
        if members.is_empty() && !tags.optional {
            return Err(ResolveErrorKind::NoGroupProviders {
                group: group.to_owned(),
            });
        }
        Ok(members)
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! field_tags {
    ($field:ident $(#[$tag:ident $(= $value:literal)?])*) => {
        $crate::FieldTags::new(::core::stringify!($field))
            $(
                .tag(
                    ::core::stringify!($tag),
                    {
                        #[allow(unused_mut)]
                        let mut value: ::core::option::Option<&'static str> = ::core::option::Option::None;
                        $( value = ::core::option::Option::Some($value); )?
                        value
                    },
                )
            )*
    };
}

/// Declares a parameter object: a struct whose fields are resolved one by one.
///
/// Fields are `Arc<T>` (required), `Option<Arc<T>>` (optional) or `Vec<Arc<T>>` (group).
/// Supported field tags:
/// - `#[name = "primary"]` resolves the named registration
/// - `#[group = "handlers"]` collects the group members, the field must be a `Vec`
/// - `#[optional]` on a group field allows the group to be empty
///
/// ```rust
/// use std::sync::Arc;
/// use vessel::{params, Container, InstantiateErrorKind};
///
/// struct Database(&'static str);
/// struct Cache;
///
/// params! {
///     struct Deps {
///         #[name = "primary"]
///         database: Arc<Database>,
///         cache: Option<Arc<Cache>>,
///     }
/// }
///
/// struct Repository(Arc<Database>);
///
/// fn new_repository(deps: Deps) -> Result<Repository, InstantiateErrorKind> {
///     assert!(deps.cache.is_none());
///     Ok(Repository(deps.database))
/// }
///
/// let container = Container::new();
/// container
///     .provide(|| -> Result<Database, InstantiateErrorKind> { Ok(Database("postgres")) })
///     .named("primary")
///     .register()
///     .unwrap();
/// container.provide(new_repository).register().unwrap();
///
/// assert_eq!(container.inject::<Repository>().unwrap().0 .0, "postgres");
/// ```
#[macro_export]
macro_rules! params {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$tag:ident $(= $value:literal)?])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $field_vis $field: $ty, )*
        }

        impl $crate::Param for $name {
            fn describe() -> ::core::result::Result<$crate::ParamSpec, $crate::ConstructorErrorKind> {
                ::core::result::Result::Ok($crate::ParamSpec::Object {
                    type_info: $crate::TypeInfo::of::<Self>(),
                    fields: ::std::vec![
                        $(
                            $crate::FieldSpec {
                                field: ::core::stringify!($field),
                                spec: <$ty as $crate::Field>::describe(
                                    &$crate::field_tags!($field $(#[$tag $(= $value)?])*),
                                )?,
                            },
                        )*
                    ],
                })
            }

            fn resolve(container: &$crate::Container) -> ::core::result::Result<Self, $crate::ResolveErrorKind> {
                ::core::result::Result::Ok(Self {
                    $(
                        $field: <$ty as $crate::Field>::resolve(
                            container,
                            &$crate::field_tags!($field $(#[$tag $(= $value)?])*),
                        )?,
                    )*
                })
            }
        }
    };
}
