//! Macro for implementing Display and FromStr for platform enums
//!
//! Platforms exchange status and priority values as lowercase strings; this
//! macro gives an enum both directions of that mapping in one place, with
//! case-insensitive parsing.
//!
//! # Example
//!
//! ```rust
//! use custops_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum DeliveryState {
//!     Queued,
//!     Delivered,
//!     Bounced,
//! }
//!
//! impl_domain_status_conversions!(DeliveryState {
//!     Queued => "queued",
//!     Delivered => "delivered",
//!     Bounced => "bounced",
//! });
//!
//! assert_eq!("DELIVERED".parse::<DeliveryState>().unwrap(), DeliveryState::Delivered);
//! ```

/// Implements Display and FromStr for a fieldless enum
///
/// Parsing failures return [`DomainError::InvalidValue`](crate::DomainError)
/// naming the enum.
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
            type Err = $crate::DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err($crate::DomainError::invalid(stringify!($enum_name), s)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use crate::DomainError;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Channel {
        Email,
        Chat,
    }

    impl_domain_status_conversions!(Channel {
        Email => "email",
        Chat => "chat",
    });

    #[test]
    fn test_display_conversion() {
        assert_eq!(Channel::Email.to_string(), "email");
        assert_eq!(Channel::Chat.to_string(), "chat");
    }

    #[test]
    fn test_fromstr_is_case_insensitive() {
        assert_eq!(Channel::from_str("CHAT").unwrap(), Channel::Chat);
        assert_eq!(Channel::from_str("eMaIl").unwrap(), Channel::Email);
    }

    #[test]
    fn test_fromstr_invalid() {
        assert_eq!(Channel::from_str("fax"), Err(DomainError::invalid("Channel", "fax")));
    }
}
