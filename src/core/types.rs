//! Strongly-typed wrappers for game concepts
//!
//! Newtypes instead of bare Strings so distinct concepts cannot be mixed up.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                $name(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }
    };
}

string_newtype! {
    /// Card name, e.g. "Grizzly Bears".
    CardName
}

string_newtype! {
    /// Card subtype (creature type, land type, etc.), e.g. "Bear", "Aura".
    Subtype
}

string_newtype! {
    /// Card supertype, e.g. "Legendary", "Basic".
    Supertype
}

string_newtype! {
    /// Counter kind, e.g. "+1/+1", "loyalty", "charge".
    CounterType
}

impl CounterType {
    pub fn plus_one_plus_one() -> Self {
        CounterType("+1/+1".to_string())
    }

    pub fn minus_one_minus_one() -> Self {
        CounterType("-1/-1".to_string())
    }

    pub fn loyalty() -> Self {
        CounterType("loyalty".to_string())
    }

    pub fn defense() -> Self {
        CounterType("defense".to_string())
    }
}

impl Subtype {
    pub fn aura() -> Self {
        Subtype("Aura".to_string())
    }

    pub fn equipment() -> Self {
        Subtype("Equipment".to_string())
    }
}

impl Supertype {
    pub fn legendary() -> Self {
        Supertype("Legendary".to_string())
    }

    pub fn basic() -> Self {
        Supertype("Basic".to_string())
    }
}

/// Sequence number assigned when a continuous effect becomes active.
///
/// Layer ordering within a (sub)layer is by timestamp; ties break by source
/// creation order, then registration order. The engine owns the counter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn new(seq: u64) -> Self {
        Timestamp(seq)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}
