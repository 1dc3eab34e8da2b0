//! Identity and cursor types.
//!
//! All identifiers are opaque strings issued by the server. They are wrapped
//! in newtypes so that a room id can never be passed where a cursor is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw string value.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the raw string value.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the raw string.
            pub fn into_inner(self) -> String {
                self.0
            }

            /// True if the wrapped string is empty.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

string_id!(
    /// The account on whose behalf syncing occurs.
    ///
    /// Used as the key for every persisted cursor and filter id.
    UserId
);

string_id!(
    /// A room identifier, e.g. `!abc:example.org`.
    RoomId
);

string_id!(
    /// Opaque id of a filter saved on the server.
    FilterId
);

string_id!(
    /// The `next_batch` cursor issued by the server.
    ///
    /// Cursors are strictly server-issued and monotonically advancing. A
    /// cursor is never reused once it has been superseded; persisting one is
    /// the durable checkpoint of "delivered up to".
    NextBatch
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_plain_strings() {
        let room = RoomId::new("!room:example.org");
        let json = serde_json::to_string(&room).unwrap();
        assert_eq!(json, "\"!room:example.org\"");

        let back: RoomId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, room);
    }

    #[test]
    fn display_is_raw_value() {
        let batch = NextBatch::from("s72594_4483_1934");
        assert_eq!(batch.to_string(), "s72594_4483_1934");
        assert_eq!(format!("{:?}", batch), "NextBatch(s72594_4483_1934)");
    }

    #[test]
    fn empty_detection() {
        assert!(NextBatch::default().is_empty());
        assert!(FilterId::new("").is_empty());
        assert!(!UserId::new("@alice:example.org").is_empty());
    }
}
