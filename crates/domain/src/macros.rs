//! Macro for implementing Display and FromStr for status enums
//!
//! Calendar backends exchange statuses, participation states and kinds as
//! strings. This macro provides a single definition of both conversions,
//! with case-insensitive parsing and a consistent lowercase rendering.
//!
//! # Example
//!
//! ```rust
//! use datebook_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Transparency {
//!     Opaque,
//!     Transparent,
//! }
//!
//! impl_domain_status_conversions!(Transparency {
//!     Opaque => "opaque",
//!     Transparent => "transparent",
//! });
//! ```

/// Implements Display and FromStr traits for status enums
///
/// This macro generates:
/// - Display trait: converts enum variants to lowercase strings
/// - FromStr trait: parses case-insensitive strings to enum variants
///
/// The string representations must be written in lowercase.
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Transparency {
        Opaque,
        Transparent,
    }

    impl_domain_status_conversions!(Transparency {
        Opaque => "opaque",
        Transparent => "transparent",
    });

    #[test]
    fn test_display_conversion() {
        assert_eq!(Transparency::Opaque.to_string(), "opaque");
        assert_eq!(Transparency::Transparent.to_string(), "transparent");
    }

    #[test]
    fn test_fromstr_is_case_insensitive() {
        assert_eq!(Transparency::from_str("OPAQUE").unwrap(), Transparency::Opaque);
        assert_eq!(Transparency::from_str("Transparent").unwrap(), Transparency::Transparent);
    }

    #[test]
    fn test_fromstr_invalid() {
        let result = Transparency::from_str("translucent");
        assert!(result.unwrap_err().contains("Invalid Transparency: translucent"));
        assert!(Transparency::from_str("").is_err());
    }
}
