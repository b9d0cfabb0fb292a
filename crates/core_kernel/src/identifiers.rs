//! Strongly-typed identifiers for domain entities
//!
//! Stores key records by opaque string ids. Internally each id is a UUID
//! newtype so a deposit id can never be passed where an account id is expected;
//! at the edges they render as `PREFIX-uuid` and parse with or without prefix.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// An identifier string that is not `PREFIX-uuid` or a bare UUID
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{input}' is not a valid {prefix} identifier")]
pub struct IdParseError {
    pub prefix: &'static str,
    pub input: String,
}

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new time-ordered (v7) identifier, so ids sort in
            /// creation order
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            pub fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bare = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                Uuid::parse_str(bare).map(Self).map_err(|_| IdParseError {
                    prefix: $prefix,
                    input: s.to_string(),
                })
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

define_id!(UserId, "USR");

// Deposit domain identifiers
define_id!(DepositId, "DEP");
define_id!(AccountId, "ACC");
define_id!(ExpenseId, "EXP");
define_id!(IncomeId, "INC");

// Holding domain identifiers
define_id!(PositionId, "POS");
define_id!(LotId, "LOT");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_id_display() {
        let id = DepositId::new();
        assert!(id.to_string().starts_with("DEP-"));
    }

    #[test]
    fn test_id_parsing_with_and_without_prefix() {
        let original = AccountId::new();
        let prefixed: AccountId = original.to_string().parse().unwrap();
        let bare: AccountId = original.as_uuid().to_string().parse().unwrap();
        assert_eq!(prefixed, original);
        assert_eq!(bare, original);
    }

    #[test]
    fn test_foreign_prefix_is_rejected() {
        let account = AccountId::new();
        let err = account.to_string().replace("ACC-", "DEP-").parse::<AccountId>().unwrap_err();
        assert_eq!(err.prefix, "ACC");
        assert!(err.to_string().contains("not a valid ACC identifier"));
    }
}
