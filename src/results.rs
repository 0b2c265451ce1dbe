use crate::{any::RcAny, constructor::ResultSpec, errors::ConstructorErrorKind};

/// A struct whose fields are registered as separate values, see [`crate::results`]
pub trait ResultObject: Sized + Send + Sync + 'static {
    /// # Errors
    /// Returns [`ConstructorErrorKind`] if a field's tags are invalid
    fn describe() -> Result<Vec<ResultSpec>, ConstructorErrorKind>;

    /// Field values in declaration order, each an `Arc<FieldType>` behind [`RcAny`]
    fn into_values(self) -> Vec<RcAny>;
}

/// Declares a result object: every field is provided as its own registration.
///
/// Supported field tags: `#[name = "..."]` and `#[group = "..."]`.
///
/// ```rust
/// use vessel::{results, Container, InstantiateErrorKind};
///
/// struct Reader(u8);
/// struct Writer(u8);
///
/// results! {
///     struct Connections {
///         #[name = "replica"]
///         reader: Reader,
///         writer: Writer,
///     }
/// }
///
/// fn connect() -> Result<Connections, InstantiateErrorKind> {
///     Ok(Connections { reader: Reader(1), writer: Writer(2) })
/// }
///
/// let container = Container::new();
/// container.provide_results(connect).register().unwrap();
///
/// assert_eq!(container.inject_named::<Reader>("replica").unwrap().0, 1);
/// assert_eq!(container.inject::<Writer>().unwrap().0, 2);
/// ```
#[macro_export]
macro_rules! results {
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

        impl $crate::ResultObject for $name {
            fn describe() -> ::core::result::Result<::std::vec::Vec<$crate::ResultSpec>, $crate::ConstructorErrorKind> {
                ::core::result::Result::Ok(::std::vec![
                    $( $crate::field_tags!($field $(#[$tag $(= $value)?])*).result::<$ty>()?, )*
                ])
            }

            fn into_values(self) -> ::std::vec::Vec<$crate::RcAny> {
                ::std::vec![
                    $( ::std::sync::Arc::new(::std::sync::Arc::new(self.$field)) as $crate::RcAny, )*
                ]
            }
        }
    };
}
