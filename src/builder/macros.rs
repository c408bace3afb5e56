//! Macros for declaring BTF vocabulary enums.

/// Declare a fieldless enum whose variants map to their BTF text names.
///
/// Generates the enum with the usual value derives, an `ALL` slice in
/// declaration order, `as_str()`, `Display` and a `FromStr` that fails with
/// [`UnknownName`](crate::error::UnknownName).
///
/// Extra spellings accepted by `FromStr` follow the name, separated by `|`.
/// Only the first name is ever written.
///
/// # Example
///
/// ```
/// use btf_trace::btf_enum;
///
/// btf_enum! {
///     pub enum Access {
///         Read => "read",
///         Write => "write" | "store",
///     }
/// }
///
/// assert_eq!(Access::Write.as_str(), "write");
/// assert_eq!("read".parse::<Access>().unwrap(), Access::Read);
/// assert_eq!("store".parse::<Access>().unwrap(), Access::Write);
/// assert_eq!(Access::ALL.len(), 2);
/// ```
#[macro_export]
macro_rules! btf_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident => $text:literal $(| $alias:literal)*
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$(Self::$variant),*];

            /// The BTF text name of this variant.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),*
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::UnknownName;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text $(| $alias)* => Ok(Self::$variant),)*
                    _ => Err($crate::error::UnknownName {
                        kind: stringify!($name),
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}
