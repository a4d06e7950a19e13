//! Opaque, unguessable identifiers.
//!
//! `TransactionId`, `RequestId`, and `ResponseCode` are distinct newtypes
//! with no cross-assignment: each wraps a `String`, but the compiler will
//! reject passing one where another is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The Verifier-facing identifier for a presentation transaction.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
pub struct TransactionId(pub(crate) String);

/// The Wallet-facing identifier, used as the OAuth `state` parameter.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
pub struct RequestId(pub(crate) String);

/// A one-shot handoff token minted for `GetWalletResponseMethod::Redirect`,
/// consumed the first time it is used to retrieve a Wallet response.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
pub struct ResponseCode(pub(crate) String);

macro_rules! opaque_id {
    ($ty:ty) => {
        impl $ty {
            /// Wrap an existing string as this identifier type, without
            /// generating a new value. Used when deserializing an
            /// identifier received over the wire (e.g. the `state` form
            /// field, or a `response_code` query parameter).
            #[must_use]
            pub fn from_raw(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$ty> for String {
            fn from(id: $ty) -> Self {
                id.0
            }
        }
    };
}

opaque_id!(TransactionId);
opaque_id!(RequestId);
opaque_id!(ResponseCode);
