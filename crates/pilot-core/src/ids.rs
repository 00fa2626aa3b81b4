//! Identifier types.
//!
//! Entity identifiers are UUIDs; ledger transaction identifiers are ULIDs so
//! that the transaction index sorts chronologically and supports time-range
//! scans without a secondary index.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Defines a UUID-backed identifier newtype with the standard trait set:
/// `Copy`, `Eq`, `Hash`, string-based serde, `FromStr`, `Display`, `Debug`.
macro_rules! uuid_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Wrap an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Generate a fresh random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// The raw 16 bytes of the UUID, used for store keys.
            #[must_use]
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|_| IdError::InvalidUuid)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0.to_string()
            }
        }
    };
}

uuid_id!(CompanyId, "A billing tenant identifier.");
uuid_id!(UserId, "A user identifier, taken from the JWT `sub` claim.");
uuid_id!(WorkspaceId, "A workspace (project container) identifier.");
uuid_id!(
    SessionId,
    "A game-session identifier, stable across conversation turns."
);
uuid_id!(GameId, "A published-game identifier.");

/// A ledger transaction identifier.
///
/// ULIDs embed a millisecond timestamp in their high bits, so transaction
/// keys sort by creation time and the per-company index can be range-scanned
/// by date without storing timestamps in the key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionId(Ulid);

impl TransactionId {
    /// Generate a new identifier stamped with the current time.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Build a boundary identifier for time-range scans: the smallest ULID
    /// with the given millisecond timestamp.
    #[must_use]
    pub fn lower_bound(timestamp_ms: u64) -> Self {
        Self(Ulid::from_parts(timestamp_ms, 0))
    }

    /// Build a boundary identifier for time-range scans: the largest ULID
    /// with the given millisecond timestamp.
    #[must_use]
    pub fn upper_bound(timestamp_ms: u64) -> Self {
        Self(Ulid::from_parts(timestamp_ms, u128::MAX))
    }

    /// The 16 big-endian bytes of the ULID, used for store keys.
    #[must_use]
    pub fn to_bytes(self) -> [u8; 16] {
        self.0.to_bytes()
    }

    /// Reconstruct an identifier from its 16-byte key form.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Ulid::from_bytes(bytes))
    }

    /// The embedded creation timestamp in milliseconds since the epoch.
    #[must_use]
    pub fn timestamp_ms(self) -> u64 {
        self.0.timestamp_ms()
    }
}

impl FromStr for TransactionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|_| IdError::InvalidUlid)
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self.0)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TransactionId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TransactionId> for String {
    fn from(id: TransactionId) -> Self {
        id.0.to_string()
    }
}

/// Errors produced when parsing identifiers from strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,

    /// The input is not a valid ULID.
    #[error("invalid ULID format")]
    InvalidUlid,
}
