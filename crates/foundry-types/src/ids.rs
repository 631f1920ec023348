//! Type-safe identifier wrappers for pipeline tracking entities.
//!
//! Most identifiers in the tracking core are opaque strings supplied by
//! external producers (the generation workers, the transport layer, the
//! health configuration). Wrapping them in newtypes prevents accidental
//! mixing at compile time -- a `TaskId` can never be passed where a
//! `SessionId` is expected.
//!
//! Subscription identifiers are the exception: they are minted by the
//! broadcaster itself and use UUID v7 (time-ordered) so log output sorts
//! chronologically.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around an opaque [`String`] key with
/// standard derives.
macro_rules! define_key {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub String);

        impl $name {
            /// Create a key from any string-like value.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Return the key as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the key and return the inner [`String`].
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(key: $name) -> Self {
                key.0
            }
        }
    };
}

define_key! {
    /// Unique identifier for one end-to-end pipeline run (session).
    ///
    /// Opaque and producer-supplied; unique for the lifetime of the
    /// process.
    SessionId
}

define_key! {
    /// Identifier of the user who owns a session or subscription.
    UserId
}

define_key! {
    /// Identifier of a worker agent contributing tasks to a session.
    AgentId
}

define_key! {
    /// Identifier of a task, unique within its owning session.
    TaskId
}

define_key! {
    /// Identifier of a live observer connection, assigned by the
    /// transport layer.
    ConnectionId
}

define_key! {
    /// Name of a monitored service in the health configuration.
    ServiceName
}

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for one observer subscription, minted by the
    /// broadcaster when an observer attaches.
    SubscriptionId
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_distinct_types() {
        let session = SessionId::new("session-1");
        let task = TaskId::new("task-1");
        // These are different types -- the compiler enforces no mixing.
        assert_eq!(session.as_str(), "session-1");
        assert_eq!(task.as_str(), "task-1");
    }

    #[test]
    fn key_roundtrip_serde() {
        let original = SessionId::new("abc-123");
        let json = serde_json::to_string(&original).unwrap();
        // Keys serialize as bare strings, matching the wire contract.
        assert_eq!(json, "\"abc-123\"");
        let restored: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn key_display_matches_inner() {
        let agent = AgentId::new("quality-agent-2");
        assert_eq!(agent.to_string(), "quality-agent-2");
    }

    #[test]
    fn subscription_ids_are_unique() {
        let a = SubscriptionId::new();
        let b = SubscriptionId::new();
        assert_ne!(a, b);
        assert_ne!(a.into_inner(), Uuid::nil());
    }
}
