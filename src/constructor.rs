use std::any::type_name;

use crate::{
    any::TypeInfo,
    container::Container,
    errors::{ConstructorErrorKind, InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
    param::Param,
    type_registry::TypeKey,
};

/// What a constructor parameter (or a field of a parameter object) asks the container for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamSpec {
    /// The registration of a type, named or not
    Type(TypeKey),
    /// Like the inner spec, but missing registrations resolve to nothing
    Optional(Box<ParamSpec>),
    /// Every group member bound as `element`
    Group { group: String, element: TypeInfo },
    /// The container itself
    Container,
    /// A parameter object, see [`crate::params`]
    Object { type_info: TypeInfo, fields: Vec<FieldSpec> },
}

impl ParamSpec {
    #[inline]
    #[must_use]
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    fn collect_keys(&self, required: bool, keys: &mut Vec<(TypeKey, bool)>) {
        match self {
            Self::Type(key) => keys.push((key.clone(), required)),
            Self::Optional(inner) => inner.collect_keys(false, keys),
            Self::Object { fields, .. } => {
                for field in fields {
                    field.spec.collect_keys(required, keys);
                }
            }
            Self::Group { .. } | Self::Container => {}
        }
    }

    fn collect_groups<'a>(&'a self, groups: &mut Vec<&'a str>) {
        match self {
            Self::Group { group, .. } => groups.push(group),
            Self::Optional(inner) => inner.collect_groups(groups),
            Self::Object { fields, .. } => {
                for field in fields {
                    field.spec.collect_groups(groups);
                }
            }
            Self::Type(_) | Self::Container => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: &'static str,
    pub spec: ParamSpec,
}

/// One value a constructor provides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSpec {
    /// Field of the result object, `None` for a constructor returning a single value
    pub field: Option<&'static str>,
    pub type_info: TypeInfo,
    pub name: Option<String>,
    pub group: Option<String>,
}

impl ResultSpec {
    #[inline]
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self {
            field: None,
            type_info: TypeInfo::of::<T>(),
            name: None,
            group: None,
        }
    }
}

/// Parameter and result shapes of a constructor, computed once at registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzedConstructor {
    pub constructor: &'static str,
    pub params: Vec<ParamSpec>,
    pub results: Vec<ResultSpec>,
}

impl AnalyzedConstructor {
    pub(crate) fn analyze<F, Params>(results: Vec<ResultSpec>) -> Result<Self, ConstructorErrorKind>
    where
        F: Constructor<Params>,
    {
        let constructor = type_name::<F>();
        if results.is_empty() {
            return Err(ConstructorErrorKind::NoResults { constructor });
        }

        Ok(Self {
            constructor,
            params: F::params()?,
            results,
        })
    }

    /// Type keys the constructor requires, in parameter order
    #[must_use]
    pub fn dependencies(&self) -> Vec<TypeKey> {
        self.keys().into_iter().filter_map(|(key, required)| required.then_some(key)).collect()
    }

    /// Type keys the constructor uses only when registered
    #[must_use]
    pub fn optional_dependencies(&self) -> Vec<TypeKey> {
        self.keys().into_iter().filter_map(|(key, required)| (!required).then_some(key)).collect()
    }

    #[must_use]
    pub fn groups(&self) -> Vec<&str> {
        let mut groups = Vec::new();
        for param in &self.params {
            param.collect_groups(&mut groups);
        }
        groups
    }

    fn keys(&self) -> Vec<(TypeKey, bool)> {
        let mut keys = Vec::new();
        for param in &self.params {
            param.collect_keys(true, &mut keys);
        }
        keys
    }
}

/// A function whose parameters are resolved by the container.
///
/// Implemented for functions and closures taking up to 12 [`Param`]s and returning
/// `Result<T, E>`. The error comes last by construction.
pub trait Constructor<Params>: Send + Sync + 'static {
    type Provides: Send + Sync + 'static;
    type Error: Into<InstantiateErrorKind>;

    /// # Errors
    /// Returns [`ConstructorErrorKind`] if a parameter shape is invalid
    fn params() -> Result<Vec<ParamSpec>, ConstructorErrorKind>;

    /// # Errors
    /// - Returns [`InstantiatorErrorKind::Deps`] if a parameter can't be resolved
    /// - Returns [`InstantiatorErrorKind::Factory`] if the function fails
    fn construct(
        &self,
        container: &Container,
    ) -> Result<Self::Provides, InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>>;
}

macro_rules! impl_constructor {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_variables, unused_mut)]
        impl<F, Response, Err, $($ty,)*> Constructor<($($ty,)*)> for F
        where
            F: Fn($($ty,)*) -> Result<Response, Err> + Send + Sync + 'static,
            Response: Send + Sync + 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: Param, )*
        {
            type Provides = Response;
            type Error = Err;

            fn params() -> Result<Vec<ParamSpec>, ConstructorErrorKind> {
                let mut params = Vec::new();
                $(
                    let index = params.len();
                    params.push(<$ty as Param>::describe().map_err(|source| ConstructorErrorKind::Param {
                        index,
                        source: Box::new(source),
                    })?);
                )*
                Ok(params)
            }

            fn construct(
                &self,
                container: &Container,
            ) -> Result<Response, InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>> {
                $(
                    let $ty = <$ty as Param>::resolve(container).map_err(InstantiatorErrorKind::Deps)?;
                )*
                self($($ty,)*).map_err(|err| InstantiatorErrorKind::Factory(err.into()))
            }
        }
    };
}

all_the_tuples!(impl_constructor);

#[cfg(test)]
mod tests {
    use super::{AnalyzedConstructor, ParamSpec, ResultSpec};
    use crate::{Container, Inject, InstantiateErrorKind, TypeKey};

    struct Config;
    struct Cache;
    struct Service;

    fn new_service(
        _config: Inject<Config>,
        _cache: Option<Inject<Cache>>,
        _container: Container,
    ) -> Result<Service, InstantiateErrorKind> {
        Ok(Service)
    }

    fn analyze<F, P>(_f: &F) -> AnalyzedConstructor
    where
        F: super::Constructor<P>,
    {
        AnalyzedConstructor::analyze::<F, P>(vec![ResultSpec::of::<F::Provides>()]).unwrap()
    }

    #[test]
    fn test_analyze() {
        let analyzed = analyze(&new_service);

        assert_eq!(
            analyzed.params,
            [
                ParamSpec::Type(TypeKey::of::<Config>()),
                ParamSpec::Optional(Box::new(ParamSpec::Type(TypeKey::of::<Cache>()))),
                ParamSpec::Container,
            ]
        );
        assert_eq!(analyzed.dependencies(), [TypeKey::of::<Config>()]);
        assert_eq!(analyzed.optional_dependencies(), [TypeKey::of::<Cache>()]);
        assert!(analyzed.constructor.contains("new_service"));
    }

    #[test]
    fn test_no_results() {
        let err = AnalyzedConstructor::analyze::<fn() -> Result<Service, InstantiateErrorKind>, ()>(Vec::new()).unwrap_err();
        assert!(matches!(err, crate::ConstructorErrorKind::NoResults { .. }));
    }
}
