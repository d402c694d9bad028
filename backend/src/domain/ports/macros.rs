//! Defines helper macros for generating domain port error enums.
//!
//! Every generated enum derives `thiserror::Error`, gains one snake-case
//! constructor per variant (string-like fields accept `impl Into<_>`), and
//! converts request-context failures into its `Cancelled` variant.

macro_rules! define_port_error {
    (@ctor $variant:ident) => {
        ::paste::paste! {
            #[doc = concat!("Construct the `", stringify!($variant), "` variant.")]
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@ctor $variant:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        define_port_error!(@ctor_impl $variant () () $( $field : $ty, )*);
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) ) => {
        ::paste::paste! {
            #[doc = concat!("Construct the `", stringify!($variant), "` variant.")]
            pub fn [<$variant:snake>]($($params)*) -> Self {
                Self::$variant { $($inits)* }
            }
        }
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) $field:ident : $ty:ty, $($rest:tt)*) => {
        define_port_error!(
            @ctor_impl
            $variant
            ($($params)* $field: impl Into<$ty>,)
            ($($inits)* $field: $field.into(),)
            $($rest)*
        );
    };
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )? => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@ctor $variant $( { $($field : $ty),* } )?);
            )*
        }

        impl From<$crate::domain::ContextError> for $name {
            fn from(_: $crate::domain::ContextError) -> Self {
                Self::Cancelled
            }
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use crate::domain::{ContextError, PullRequestId};

    define_port_error! {
        pub enum ExamplePortError {
            Lookup { message: String } => "lookup: {message}",
            Capacity { max: usize } => "capacity: {max}",
            Missing { pull_request_id: PullRequestId, message: String } =>
                "missing {pull_request_id}: {message}",
            Cancelled => "cancelled",
        }
    }

    #[test]
    fn constructors_accept_str_for_string_fields() {
        let err = ExamplePortError::lookup("hello");
        assert_eq!(err.to_string(), "lookup: hello");
    }

    #[test]
    fn constructors_preserve_non_string_types() {
        let err = ExamplePortError::capacity(2_usize);
        assert_eq!(err.to_string(), "capacity: 2");
    }

    #[test]
    fn constructors_support_domain_identifiers() {
        let id = PullRequestId::new("pr-7").expect("valid id");
        let err = ExamplePortError::missing(id, "gone");
        assert_eq!(err.to_string(), "missing pr-7: gone");
    }

    #[test]
    fn context_errors_become_cancelled() {
        let err = ExamplePortError::from(ContextError::DeadlineExceeded);
        assert_eq!(err, ExamplePortError::cancelled());
    }
}
