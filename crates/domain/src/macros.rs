//! Macro for implementing Display and FromStr for config enums
//!
//! Config enums are spelled in snake case in files and environment
//! variables. Parsing is case-insensitive and failures surface as
//! [`ConfigError::Invalid`](crate::errors::ConfigError::Invalid).
//!
//! # Example
//!
//! ```rust
//! use courier_domain::impl_config_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Backend {
//!     Primary,
//!     Fallback,
//! }
//!
//! impl_config_enum_conversions!(Backend {
//!     Primary => "primary",
//!     Fallback => "fallback",
//! });
//! ```

/// Implements Display and FromStr for a config enum
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their lowercase names
#[macro_export]
macro_rules! impl_config_enum_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = $crate::errors::ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err($crate::errors::ConfigError::invalid(
                        stringify!($enum_name),
                        format!("unknown value '{s}'"),
                    )),
                }
            }
        }
    };
}
